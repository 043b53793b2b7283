//! Quarter-hourly admin digest of new issues.

use chrono::{TimeDelta, Utc};
use domains::models::{IssueStatus, OutboundMessage};
use domains::Result;

use crate::schedule::QuarterHourGuard;
use crate::{texts, Ports};

/// Look-back window for the "recent" count.
pub const RECENT_WINDOW: TimeDelta = TimeDelta::minutes(15);

pub struct DigestService {
    ports: Ports,
    guard: QuarterHourGuard,
}

impl DigestService {
    pub fn new(ports: Ports) -> Self {
        Self {
            ports,
            guard: QuarterHourGuard::new(),
        }
    }

    /// Called after every submission. Sends the digest only when the
    /// quarter-hour guard fires; failures are logged and swallowed.
    pub async fn on_issue_submitted(&self) {
        if !self.guard.check_and_fire() {
            return;
        }
        if let Err(err) = self.notify_admins().await {
            tracing::error!(error = %err, "admin digest failed");
        }
    }

    /// Computes both counts and sends them to every current admin.
    /// Returns how many admins were reached; an empty roster reaches none.
    pub async fn notify_admins(&self) -> Result<usize> {
        let admins = self.ports.store.list_admins().await?;
        let total_new = self.ports.store.count_issues(IssueStatus::New, None).await?;
        let recent_new = self
            .ports
            .store
            .count_issues(IssueStatus::New, Some(Utc::now() - RECENT_WINDOW))
            .await?;

        let text = texts::digest(total_new, recent_new);
        let mut reached = 0;
        for admin in admins {
            // Private chat ids equal the actor's transport id.
            let sent = self
                .ports
                .send(admin.external_id, OutboundMessage::text(&text))
                .await;
            if sent.is_some() {
                reached += 1;
            }
        }
        tracing::info!(total_new, recent_new, reached, "admin digest sent");
        Ok(reached)
    }
}
