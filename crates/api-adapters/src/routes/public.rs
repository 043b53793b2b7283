//! Public web submission and the catalog it is built from.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use domains::catalog::{CATEGORIES, DISTRICTS};
use domains::models::{Attachment, GeoPoint, Issue};
use serde::Deserialize;
use services::WebIssueForm;

use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field carrying the uploaded files.
pub const ATTACHMENTS_FIELD: &str = "attachments";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WebIssueRequest {
    name: String,
    contact: String,
    district: String,
    category: String,
    description: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl WebIssueRequest {
    fn into_form(self) -> Result<WebIssueForm, ApiError> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            (None, None) => None,
            _ => {
                return Err(ApiError::BadRequest(
                    "latitude and longitude must be sent together".to_string(),
                ))
            }
        };
        Ok(WebIssueForm {
            name: self.name,
            contact: self.contact,
            district: self.district,
            category: self.category,
            description: self.description,
            location,
        })
    }
}

pub(crate) async fn create_issue(
    State(state): State<AppState>,
    Json(request): Json<WebIssueRequest>,
) -> Result<(StatusCode, Json<Issue>), ApiError> {
    let form = request.into_form()?;
    let issue = state.engine.intake().submit_web(form).await?;
    Ok((StatusCode::CREATED, Json(issue)))
}

pub(crate) async fn upload_attachments(
    State(state): State<AppState>,
    Path(issue_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<Attachment>>), ApiError> {
    let mut saved = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some(ATTACHMENTS_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_or_octet_stream()
                    .to_string()
            });
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        if data.is_empty() {
            continue;
        }

        let attachment = state
            .engine
            .intake()
            .add_web_attachment(issue_id, &file_name, &content_type, data)
            .await?;
        saved.push(attachment);
    }

    if saved.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "no files in field \"{ATTACHMENTS_FIELD}\""
        )));
    }
    tracing::info!(issue_id, files = saved.len(), "web attachments stored");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub(crate) async fn districts() -> Json<&'static [&'static str]> {
    Json(DISTRICTS)
}

pub(crate) async fn categories() -> Json<&'static [&'static str]> {
    Json(CATEGORIES)
}
