//! Token-authenticated admin API. The token may come in the query string or
//! in the JSON body.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use domains::models::{Attachment, Comment, Issue, IssueStatus, StatusChange};
use serde::Deserialize;
use serde_json::{json, Value};
use services::export::{parse_day, ExportPeriod};
use services::Authority;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct TokenQuery {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssuesQuery {
    token: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    token: Option<String>,
    issue_id: i64,
    status: String,
    comment: Option<String>,
    admin_tg: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentRequest {
    token: Option<String>,
    issue_id: i64,
    text: String,
    admin_tg: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportQuery {
    token: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// Display label first, then the short code.
fn parse_status(raw: &str) -> Result<IssueStatus, ApiError> {
    let raw = raw.trim();
    IssueStatus::from_label(raw)
        .or_else(|| IssueStatus::from_code(raw))
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {raw}")))
}

pub(crate) async fn ping(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    state.authorize("/admin/ping", [query.token.as_deref()])?;
    Ok(Json(json!({ "ok": true })))
}

pub(crate) async fn list_issues(
    State(state): State<AppState>,
    Query(query): Query<IssuesQuery>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    state.authorize("/admin/issues", [query.token.as_deref()])?;
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };
    Ok(Json(state.engine.moderation().search(status).await?))
}

pub(crate) async fn issue_attachments(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
    state.authorize("/admin/issues/attachments", [query.token.as_deref()])?;
    Ok(Json(state.engine.moderation().attachments(issue_id).await?))
}

pub(crate) async fn set_status(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<StatusChange>, ApiError> {
    state.authorize(
        "/admin/status",
        [query.token.as_deref(), request.token.as_deref()],
    )?;
    let status = parse_status(&request.status)?;
    let comment = request.comment.filter(|c| !c.trim().is_empty());
    let change = state
        .engine
        .status()
        .set_status(
            request.issue_id,
            status,
            Authority::ApiToken(request.admin_tg),
            comment,
        )
        .await?;
    Ok(Json(change))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    state.authorize(
        "/admin/comment",
        [query.token.as_deref(), request.token.as_deref()],
    )?;
    let comment = state
        .engine
        .comments()
        .append(request.issue_id, request.admin_tg, &request.text)
        .await?;
    Ok(Json(comment))
}

pub(crate) async fn export_csv(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize("/export", [query.token.as_deref()])?;
    let (Some(from), Some(to)) = (query.from.as_deref(), query.to.as_deref()) else {
        return Err(ApiError::BadRequest(
            "from and to are required (YYYY-MM-DD)".to_string(),
        ));
    };
    let period = ExportPeriod::new(parse_day(from)?, parse_day(to)?);
    let csv = state.engine.export().csv(period).await?;

    let (from, to) = period.label();
    let disposition = format!("attachment; filename=\"issues_{from}_{to}.csv\"");
    Ok((
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
