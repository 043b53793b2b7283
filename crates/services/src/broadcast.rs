//! Admin broadcast: draft, preview, confirm or cancel, then a paced fanout.

use std::sync::Arc;
use std::time::Duration;

use domains::models::{BroadcastRecord, OutboundMessage};
use domains::{DomainError, Result};

use crate::session::SessionRegistry;
use crate::{render, texts, Ports};

/// Fixed pause between two sends of one fanout.
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(40);

pub struct BroadcastService {
    ports: Ports,
    sessions: Arc<SessionRegistry>,
    send_delay: Duration,
}

impl BroadcastService {
    pub fn new(ports: Ports, sessions: Arc<SessionRegistry>, send_delay: Duration) -> Self {
        Self {
            ports,
            sessions,
            send_delay,
        }
    }

    /// Stores the draft (replacing any earlier one) and shows the preview.
    pub async fn draft(&self, chat_id: i64, admin: i64, text: &str) -> Result<()> {
        self.ports.require_admin(admin).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation(texts::BROADCAST_USAGE.to_string()));
        }
        self.sessions.set_pending_broadcast(admin, text.to_string());
        self.ports.send(chat_id, render::broadcast_preview(text)).await;
        Ok(())
    }

    /// Starts the fanout in a detached task. The only observable result is
    /// the summary message sent to `chat_id` once it completes. Returns
    /// `false` when there was no draft to confirm.
    pub async fn confirm(&self, chat_id: i64, admin: i64) -> Result<bool> {
        self.ports.require_admin(admin).await?;
        let Some(text) = self.sessions.take_pending_broadcast(admin) else {
            return Ok(false);
        };

        let ports = self.ports.clone();
        let delay = self.send_delay;
        tokio::spawn(async move {
            let sent = fanout(&ports, &text, delay).await;
            ports.reply(chat_id, texts::broadcast_summary(sent)).await;
            record(&ports, admin, text, sent).await;
        });
        Ok(true)
    }

    pub fn cancel(&self, admin: i64) -> bool {
        self.sessions.take_pending_broadcast(admin).is_some()
    }
}

/// One send attempt per target, paced by `delay`. Returns the number of
/// successful sends. Target listing failure aborts with zero.
pub async fn fanout(ports: &Ports, text: &str, delay: Duration) -> usize {
    let targets = match ports.store.list_broadcast_targets().await {
        Ok(targets) => targets,
        Err(err) => {
            tracing::error!(error = %err, "broadcast target listing failed");
            return 0;
        }
    };

    let mut sent = 0;
    for chat_id in &targets {
        if ports
            .send(*chat_id, OutboundMessage::text(text))
            .await
            .is_some()
        {
            sent += 1;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    tracing::info!(targets = targets.len(), sent, "broadcast finished");
    sent
}

async fn record(ports: &Ports, admin: i64, text: String, sent: usize) {
    let created_by = match ports.store.find_actor(admin).await {
        Ok(actor) => actor.map(|a| a.id),
        Err(_) => None,
    };
    let record = BroadcastRecord {
        text,
        created_by,
        sent_count: sent as i64,
    };
    if let Err(err) = ports.store.record_broadcast(record).await {
        tracing::error!(error = %err, "broadcast log write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{DeliveryError, MockChatTransport, MockIssueStore, MockMediaStore};

    #[tokio::test]
    async fn fanout_counts_successes_not_targets() {
        let mut store = MockIssueStore::new();
        store
            .expect_list_broadcast_targets()
            .returning(|| Ok(vec![1, 2, 3, 4]));

        let mut transport = MockChatTransport::new();
        transport
            .expect_send()
            .times(4)
            .returning(|chat, _| {
                if chat % 2 == 0 {
                    Err(DeliveryError::Rejected("bot was blocked by the user".into()))
                } else {
                    Ok(chat)
                }
            });

        let ports = Ports::new(
            Arc::new(store),
            Arc::new(transport),
            Arc::new(MockMediaStore::new()),
        );
        assert_eq!(fanout(&ports, "Test", Duration::ZERO).await, 2);
    }

    #[tokio::test]
    async fn second_draft_overwrites_first() {
        let mut store = MockIssueStore::new();
        store.expect_is_admin().returning(|_| Ok(true));
        let mut transport = MockChatTransport::new();
        transport.expect_send().times(2).returning(|_, _| Ok(1));

        let sessions = Arc::new(SessionRegistry::new());
        let ports = Ports::new(
            Arc::new(store),
            Arc::new(transport),
            Arc::new(MockMediaStore::new()),
        );
        let service = BroadcastService::new(ports, sessions.clone(), Duration::ZERO);

        service.draft(10, 10, "first").await.unwrap();
        service.draft(10, 10, "second").await.unwrap();
        assert_eq!(sessions.take_pending_broadcast(10).as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn empty_draft_is_a_usage_error() {
        let mut store = MockIssueStore::new();
        store.expect_is_admin().returning(|_| Ok(true));
        let ports = Ports::new(
            Arc::new(store),
            Arc::new(MockChatTransport::new()),
            Arc::new(MockMediaStore::new()),
        );
        let service = BroadcastService::new(ports, Arc::new(SessionRegistry::new()), Duration::ZERO);

        let err = service.draft(1, 1, "  ").await.unwrap_err();
        assert_eq!(texts::for_error(&err), texts::BROADCAST_USAGE);
        assert!(!service.cancel(1));
    }
}
