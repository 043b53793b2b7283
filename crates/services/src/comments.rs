//! Admin comments on issues.
//!
//! The chat path is two-step: an inline control marks the admin as pending,
//! and their next private text becomes the comment. The HTTP path appends
//! directly. Both end in [`CommentService::append`].

use std::sync::Arc;

use domains::models::{Actor, Comment, OutboundMessage, WEB_CHAT_ID};
use domains::{DomainError, Result};

use crate::session::SessionRegistry;
use crate::{texts, Ports};

pub struct CommentService {
    ports: Ports,
    sessions: Arc<SessionRegistry>,
}

impl CommentService {
    pub fn new(ports: Ports, sessions: Arc<SessionRegistry>) -> Self {
        Self { ports, sessions }
    }

    /// Marks `admin` as awaiting comment text for `issue_id`.
    pub async fn request(&self, admin: i64, issue_id: i64) -> Result<()> {
        self.ports.require_admin(admin).await?;
        self.ports
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| DomainError::issue_not_found(issue_id))?;
        self.sessions.set_pending_comment(admin, issue_id);
        Ok(())
    }

    /// Commits `text` against the admin's pending target and confirms in
    /// `chat_id`. Returns `Ok(None)` when nothing was pending, or when the
    /// admin lost the privilege in between; in that case the text is dropped.
    pub async fn commit_pending(
        &self,
        chat_id: i64,
        admin: i64,
        text: &str,
    ) -> Result<Option<Comment>> {
        let Some(issue_id) = self.sessions.take_pending_comment(admin) else {
            return Ok(None);
        };
        if !self.ports.store.is_admin(admin).await? {
            tracing::info!(admin, issue_id, "pending comment dropped, admin privilege revoked");
            return Ok(None);
        }

        let comment = self.append(issue_id, Some(admin), text).await?;
        self.ports
            .reply(chat_id, texts::comment_saved(issue_id))
            .await;
        Ok(Some(comment))
    }

    /// Appends a comment and notifies the issue owner. Without an explicit
    /// author the first admin on the roster signs it.
    pub async fn append(&self, issue_id: i64, author: Option<i64>, text: &str) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation(
                "Текст комментария не может быть пустым".to_string(),
            ));
        }

        let issue = self
            .ports
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| DomainError::issue_not_found(issue_id))?;

        let author = self.resolve_author(author).await?;
        let comment = self
            .ports
            .store
            .add_comment(issue.id, author.id, text)
            .await?;
        tracing::info!(issue_id, admin_user_id = author.id, "comment added");

        if issue.chat_id != WEB_CHAT_ID {
            self.ports
                .send(
                    issue.chat_id,
                    OutboundMessage::text(texts::comment_notice(issue_id, text)),
                )
                .await;
        }
        Ok(comment)
    }

    async fn resolve_author(&self, author: Option<i64>) -> Result<Actor> {
        match author {
            Some(external_id) => self
                .ports
                .store
                .find_actor(external_id)
                .await?
                .ok_or_else(|| DomainError::NotFound("actor", external_id.to_string())),
            None => self
                .ports
                .store
                .list_admins()
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| DomainError::NotFound("admin", "any".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockChatTransport, MockIssueStore, MockMediaStore};

    fn service(store: MockIssueStore, sessions: Arc<SessionRegistry>) -> CommentService {
        let ports = Ports::new(
            Arc::new(store),
            Arc::new(MockChatTransport::new()),
            Arc::new(MockMediaStore::new()),
        );
        CommentService::new(ports, sessions)
    }

    #[tokio::test]
    async fn revoked_admin_text_is_dropped_and_mark_cleared() {
        let sessions = Arc::new(SessionRegistry::new());
        sessions.set_pending_comment(50, 8);

        let mut store = MockIssueStore::new();
        store.expect_is_admin().returning(|_| Ok(false));
        store.expect_add_comment().never();

        let comments = service(store, sessions.clone());
        let committed = comments.commit_pending(50, 50, "late note").await.unwrap();

        assert!(committed.is_none());
        assert_eq!(sessions.pending_comment(50), None);
    }

    #[tokio::test]
    async fn request_requires_admin() {
        let mut store = MockIssueStore::new();
        store.expect_is_admin().returning(|_| Ok(false));
        let sessions = Arc::new(SessionRegistry::new());

        let comments = service(store, sessions.clone());
        assert!(matches!(
            comments.request(3, 1).await,
            Err(DomainError::PermissionDenied)
        ));
        assert_eq!(sessions.pending_comment(3), None);
    }

    #[tokio::test]
    async fn blank_comment_is_rejected() {
        let comments = service(MockIssueStore::new(), Arc::new(SessionRegistry::new()));
        assert!(matches!(
            comments.append(1, None, "   ").await,
            Err(DomainError::Validation(_))
        ));
    }
}
