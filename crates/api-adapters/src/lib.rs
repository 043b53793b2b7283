//! # api-adapters
//!
//! The HTTP surface of civic-bot: webhook ingress for push delivery, the
//! token-authenticated admin API, public web submission, health and
//! metrics. Handlers are thin; every operation goes through the same
//! services the chat dispatcher uses.

pub mod error;
pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod routes;
#[cfg(feature = "web-axum")]
mod state;

pub use error::ApiError;
pub use metrics::ApiMetrics;

#[cfg(feature = "web-axum")]
pub use routes::{router, RouterSettings};
#[cfg(feature = "web-axum")]
pub use state::AppState;
