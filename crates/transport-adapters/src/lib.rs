//! # transport-adapters
//!
//! Telegram Bot API binding: the outbound `ChatTransport`, decoding of
//! inbound updates into domain events, and the long-polling runner. The
//! webhook ingress lives in `api-adapters` and reuses [`dispatch_update`].

mod client;
mod markup;
mod polling;
mod update;

use std::sync::Arc;

use domains::EventHandler;

pub use client::TelegramClient;
pub use polling::{next_offset, PollingRunner, POLL_TIMEOUT_SECS};
pub use update::{decode_update, Update};

/// Decodes `update` and hands it to `handler` in its own task. Updates
/// that carry nothing the bot understands are dropped here.
pub fn dispatch_update(handler: Arc<dyn EventHandler>, update: Update) {
    let update_id = update.update_id;
    let Some(event) = decode_update(update) else {
        tracing::debug!(update_id, "update ignored");
        return;
    };
    tokio::spawn(async move {
        handler.handle(event).await;
    });
}
