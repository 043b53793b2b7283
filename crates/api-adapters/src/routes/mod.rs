//! Axum router assembly.

mod admin;
mod public;
mod webhook;

use std::path::PathBuf;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Upper bound for one request body; web-form uploads are the largest.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub webhook_path: String,
    /// Served read-only under `/uploads`.
    pub upload_dir: PathBuf,
}

pub fn router(state: AppState, settings: &RouterSettings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route(&settings.webhook_path, post(webhook::telegram_update))
        // Admin API
        .route("/admin/ping", get(admin::ping))
        .route("/admin/issues", get(admin::list_issues))
        .route("/admin/issues/{id}/attachments", get(admin::issue_attachments))
        .route("/admin/status", post(admin::set_status))
        .route("/admin/comment", post(admin::add_comment))
        .route("/export", get(admin::export_csv))
        // Public web form
        .route("/api/issues", post(public::create_issue))
        .route("/api/issues/{id}/attachments", post(public::upload_attachments))
        .route("/api/districts", get(public::districts))
        .route("/api/categories", get(public::categories))
        .nest_service("/uploads", ServeDir::new(&settings.upload_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
