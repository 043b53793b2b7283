//! # Status Transition Manager
//!
//! One path for every status change, whether it comes from an inline
//! control in chat or from the admin HTTP API.

use domains::models::{IssueStatus, OutboundMessage, StatusChange, WEB_CHAT_ID};
use domains::{DomainError, Result, StoreError};

use crate::{texts, Ports};

/// Who is asking for the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// An inline control pressed in chat by this transport identity.
    /// Privilege is checked on every call.
    ChatAdmin(i64),
    /// The token-authenticated API, optionally naming the acting admin.
    ApiToken(Option<i64>),
}

impl Authority {
    fn acting_external_id(self) -> Option<i64> {
        match self {
            Self::ChatAdmin(id) => Some(id),
            Self::ApiToken(id) => id,
        }
    }
}

pub struct StatusService {
    ports: Ports,
}

impl StatusService {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn set_status(
        &self,
        issue_id: i64,
        new_status: IssueStatus,
        authority: Authority,
        comment: Option<String>,
    ) -> Result<StatusChange> {
        if let Authority::ChatAdmin(external_id) = authority {
            self.ports.require_admin(external_id).await?;
        }

        let issue = self
            .ports
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| DomainError::issue_not_found(issue_id))?;

        let changed_by = match authority.acting_external_id() {
            Some(external_id) => self.resolve_actor(external_id).await,
            None => None,
        };

        let change = self
            .ports
            .store
            .record_status_change(issue_id, new_status, changed_by, comment)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => DomainError::issue_not_found(issue_id),
                other => other.into(),
            })?;

        tracing::info!(
            issue_id,
            old_status = ?change.old_status,
            status = %new_status,
            changed_by = ?changed_by,
            "issue status changed"
        );

        if issue.chat_id != WEB_CHAT_ID {
            self.ports
                .send(
                    issue.chat_id,
                    OutboundMessage::text(texts::status_notice(issue_id, new_status)),
                )
                .await;
        }

        Ok(change)
    }

    /// Best-effort attribution: a lookup failure leaves the change unattributed.
    async fn resolve_actor(&self, external_id: i64) -> Option<i64> {
        match self.ports.store.find_actor(external_id).await {
            Ok(actor) => actor.map(|a| a.id),
            Err(err) => {
                tracing::warn!(external_id, error = %err, "could not resolve acting admin");
                None
            }
        }
    }
}
