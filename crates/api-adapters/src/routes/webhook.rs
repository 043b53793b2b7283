//! Push delivery: Telegram POSTs each update here.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use transport_adapters::{dispatch_update, Update};

use crate::error::ApiError;
use crate::state::AppState;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Acknowledges at once; the update itself is handled in a spawned task.
pub(crate) async fn telegram_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let observed = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !state.webhook_secret_matches(observed) {
        state.metrics.webhook_rejected();
        tracing::warn!("webhook delivery with a bad secret");
        return ApiError::Unauthorized.into_response();
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            state.metrics.webhook_rejected();
            return ApiError::BadRequest(format!("malformed update: {err}")).into_response();
        }
    };

    state.metrics.webhook_update();
    dispatch_update(state.engine.clone(), update);
    Json(json!({ "ok": true })).into_response()
}
