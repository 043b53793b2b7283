//! # services
//!
//! The conversational workflow and issue-lifecycle engine. Services depend
//! only on the port traits in `domains`; adapters are injected as trait
//! objects by the binary.

use std::sync::Arc;

use domains::models::OutboundMessage;
use domains::{ChatTransport, DomainError, IssueStore, MediaStore, Result};

pub mod broadcast;
pub mod comments;
pub mod digest;
pub mod engine;
pub mod export;
pub mod intake;
pub mod moderation;
pub mod render;
pub mod schedule;
pub mod session;
pub mod status;
pub mod texts;

pub use broadcast::BroadcastService;
pub use comments::CommentService;
pub use digest::DigestService;
pub use engine::{BotEngine, EngineSettings};
pub use export::ExportService;
pub use intake::{IntakeService, WebIssueForm};
pub use moderation::ModerationService;
pub use schedule::QuarterHourGuard;
pub use session::SessionRegistry;
pub use status::{Authority, StatusService};

/// The adapters every service talks through.
#[derive(Clone)]
pub struct Ports {
    pub store: Arc<dyn IssueStore>,
    pub transport: Arc<dyn ChatTransport>,
    pub media: Arc<dyn MediaStore>,
}

impl Ports {
    pub fn new(
        store: Arc<dyn IssueStore>,
        transport: Arc<dyn ChatTransport>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            store,
            transport,
            media,
        }
    }

    /// Single best-effort attempt. Returns the transport message id on success.
    pub async fn send(&self, chat_id: i64, message: OutboundMessage) -> Option<i64> {
        match self.transport.send(chat_id, message).await {
            Ok(message_id) => Some(message_id),
            Err(err) => {
                tracing::warn!(chat_id, error = %err, "outbound send failed");
                None
            }
        }
    }

    pub async fn reply(&self, chat_id: i64, text: impl Into<String>) {
        self.send(chat_id, OutboundMessage::text(text)).await;
    }

    /// Re-reads the privilege on every call; admin status can change
    /// between two actions of the same actor.
    pub async fn require_admin(&self, external_id: i64) -> Result<()> {
        if self.store.is_admin(external_id).await? {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied)
        }
    }
}
