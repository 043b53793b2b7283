//! HTTP error mapping for the domain taxonomy.

use domains::DomainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApiError {
    /// Status code and the message placed in `{"error": ...}`.
    pub fn parts(&self) -> (u16, String) {
        match self {
            Self::Unauthorized => (401, self.to_string()),
            Self::BadRequest(message) => (400, message.clone()),
            Self::Domain(DomainError::Validation(message)) => (400, message.clone()),
            Self::Domain(err @ DomainError::NotFound(..)) => (404, err.to_string()),
            Self::Domain(DomainError::PermissionDenied) => (403, "permission denied".to_string()),
            // Storage and delivery detail stays in the logs.
            Self::Domain(DomainError::Storage(_) | DomainError::Delivery(_)) => {
                (500, "internal error".to_string())
            }
        }
    }
}

#[cfg(feature = "web-axum")]
mod axum_impl {
    use super::ApiError;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::Json;
    use serde_json::json;

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let (code, message) = self.parts();
            if code >= 500 {
                tracing::error!(error = %self, "api request failed");
            }
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}
