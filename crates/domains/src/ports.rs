//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be wired in by the binary.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};

use crate::errors::{DeliveryError, StoreError};
use crate::models::{
    Actor, ActorProfile, Attachment, BroadcastRecord, Chat, Comment, ExportRow, GeoPoint,
    InboundEvent, Issue, IssueQuery, IssueStatus, NewAttachment, NewIssue, OutboundMessage,
    StatusChange,
};

/// Data persistence contract for issues, attachments, audit rows, comments,
/// actors and conversation endpoints.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IssueStore: Send + Sync {
    // Actor Operations
    async fn upsert_actor(&self, profile: &ActorProfile) -> Result<Actor, StoreError>;
    async fn find_actor(&self, external_id: i64) -> Result<Option<Actor>, StoreError>;
    /// Unknown actors are not admins.
    async fn is_admin(&self, external_id: i64) -> Result<bool, StoreError>;
    /// `StoreError::NotFound` when the actor was never observed.
    async fn promote_to_admin(&self, external_id: i64) -> Result<(), StoreError>;
    async fn list_admins(&self) -> Result<Vec<Actor>, StoreError>;

    // Conversation Endpoint Operations
    async fn upsert_chat(&self, chat: &Chat) -> Result<(), StoreError>;
    /// Every known endpoint except the reserved web endpoint.
    async fn list_broadcast_targets(&self) -> Result<Vec<i64>, StoreError>;

    // Issue Operations
    async fn create_issue(&self, issue: NewIssue) -> Result<Issue, StoreError>;
    async fn get_issue(&self, id: i64) -> Result<Option<Issue>, StoreError>;
    /// Newest first.
    async fn list_issues_by_owner(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Issue>, StoreError>;
    /// Newest first, restricted to the query's statuses and filter.
    async fn list_issues(
        &self,
        query: &IssueQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Issue>, StoreError>;
    async fn count_issues(
        &self,
        status: IssueStatus,
        created_since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError>;
    /// Atomically picks the owner's most recent issue without coordinates
    /// created within `window`, sets the coordinates, and returns it.
    async fn attach_location(
        &self,
        user_id: i64,
        point: GeoPoint,
        window: TimeDelta,
    ) -> Result<Option<Issue>, StoreError>;

    // Attachment Operations
    async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError>;
    /// Creation order.
    async fn list_attachments(&self, issue_id: i64) -> Result<Vec<Attachment>, StoreError>;

    // Audit Operations
    /// Reads the current status, updates it with the update timestamp, and
    /// appends one `StatusChange` row, all in one unit.
    async fn record_status_change(
        &self,
        issue_id: i64,
        new_status: IssueStatus,
        changed_by: Option<i64>,
        comment: Option<String>,
    ) -> Result<StatusChange, StoreError>;
    /// Oldest first.
    async fn list_status_changes(&self, issue_id: i64) -> Result<Vec<StatusChange>, StoreError>;

    // Comment Operations
    async fn add_comment(
        &self,
        issue_id: i64,
        admin_user_id: i64,
        text: &str,
    ) -> Result<Comment, StoreError>;
    async fn latest_comment(&self, issue_id: i64) -> Result<Option<Comment>, StoreError>;

    // Reporting
    /// Issues created in `[from, to)`, oldest first.
    async fn export_issues(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExportRow>, StoreError>;
    async fn record_broadcast(&self, record: BroadcastRecord) -> Result<(), StoreError>;
}

/// Outbound half of the chat transport. Every call is a single attempt.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Returns the transport message id of the sent message.
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<i64, DeliveryError>;
    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), DeliveryError>;
    /// Acknowledges an inline action with a short notice.
    async fn answer_action(&self, callback_id: &str, text: &str) -> Result<(), DeliveryError>;
    async fn download_file(&self, file_ref: &str) -> Result<Bytes, DeliveryError>;
}

/// Media storage contract for attachment bytes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes and returns the locator stored on the `Attachment`.
    async fn save_upload(&self, data: Bytes, file_name: &str) -> Result<String, StoreError>;
}

/// Inbound half: whatever consumes decoded transport events.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent);
}
