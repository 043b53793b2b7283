//! Pull delivery: `getUpdates` long polling with offset tracking.

use std::sync::Arc;
use std::time::Duration;

use domains::EventHandler;
use tokio::sync::watch;

use crate::client::TelegramClient;
use crate::update::Update;
use crate::dispatch_update;

/// Server-side wait of one `getUpdates` call.
pub const POLL_TIMEOUT_SECS: u64 = 30;

const ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Offset acknowledging every update in `updates`: one past the largest id.
pub fn next_offset(current: i64, updates: &[Update]) -> i64 {
    updates
        .iter()
        .map(|u| u.update_id.saturating_add(1))
        .fold(current, i64::max)
}

pub struct PollingRunner {
    client: Arc<TelegramClient>,
    handler: Arc<dyn EventHandler>,
}

impl PollingRunner {
    pub fn new(client: Arc<TelegramClient>, handler: Arc<dyn EventHandler>) -> Self {
        Self { client, handler }
    }

    /// Polls until `shutdown` flips to `true`. Each update is handled in its
    /// own task, so a slow handler never delays the next poll.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        if let Err(err) = self.client.delete_webhook().await {
            tracing::warn!(error = %err, "could not clear webhook before polling");
        }
        tracing::info!("long polling started");

        let mut offset = 0;
        loop {
            let updates = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.client.get_updates(offset, POLL_TIMEOUT_SECS) => result,
            };

            match updates {
                Ok(updates) => {
                    offset = next_offset(offset, &updates);
                    for update in updates {
                        dispatch_update(self.handler.clone(), update);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "getUpdates failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("long polling stopped");
        Ok(())
    }
}
