//! # Errors
//!
//! Centralized error handling for civic-bot.
//! Port errors (`StoreError`, `DeliveryError`) are what adapters return;
//! `DomainError` is the taxonomy the services report to actors.

use thiserror::Error;

/// Failure reported by an `IssueStore` implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("record not found")]
    NotFound,

    /// A uniqueness or referential constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (connection lost, query failed, disk full).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Failure reported by a `ChatTransport` send. Always advisory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport answered and refused the request.
    #[error("rejected by transport: {0}")]
    Rejected(String),

    /// The request never got a usable answer.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// The primary error type for all service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed command arguments or a missing wizard step.
    #[error("validation error: {0}")]
    Validation(String),

    /// Issue, actor, district or category reference does not resolve.
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Non-admin invoking an admin-only action. Carries no reason.
    #[error("permission denied")]
    PermissionDenied,

    /// Any persistence-layer failure.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Outbound send failure where delivery is the point of the operation.
    #[error("delivery failure: {0}")]
    Delivery(#[from] DeliveryError),
}

impl DomainError {
    pub fn issue_not_found(id: i64) -> Self {
        Self::NotFound("issue", id.to_string())
    }
}

/// A specialized Result type for civic-bot logic.
pub type Result<T> = std::result::Result<T, DomainError>;
