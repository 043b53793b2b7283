//! # Moderation View Engine
//!
//! Paginated renders of the requester's own issues and of the admin list of
//! active issues. A render replaces the previous render of the same view in
//! the same chat.

use std::sync::Arc;

use domains::models::{
    Attachment, Comment, FilterDimension, Issue, IssueFilter, IssueQuery, IssueStatus, Keyboard,
    ListView, OutboundMessage, PageRequest,
};
use domains::{DomainError, Result};

use crate::session::SessionRegistry;
use crate::{render, texts, Ports};

/// Row cap of the HTTP issue search.
pub const SEARCH_LIMIT: i64 = 100;

pub struct ModerationService {
    ports: Ports,
    sessions: Arc<SessionRegistry>,
}

impl ModerationService {
    pub fn new(ports: Ports, sessions: Arc<SessionRegistry>) -> Self {
        Self { ports, sessions }
    }

    /// The requester's own issues, newest first, no controls.
    pub async fn render_own_issues(&self, chat_id: i64, actor: i64, page: PageRequest) -> Result<()> {
        self.sessions.record_page(chat_id, ListView::Own, page);
        self.clear_previous(chat_id, ListView::Own).await;
        let mut rendered = Vec::new();

        let Some(owner) = self.ports.store.find_actor(actor).await? else {
            self.track(chat_id, OutboundMessage::text(texts::OWN_NO_ACTOR), &mut rendered)
                .await;
            self.sessions.push_rendered(chat_id, ListView::Own, rendered);
            return Ok(());
        };

        let issues = self
            .ports
            .store
            .list_issues_by_owner(owner.id, page.limit(), page.offset())
            .await?;

        if issues.is_empty() {
            let text = if page.number() == 1 {
                texts::OWN_EMPTY
            } else {
                texts::OWN_EMPTY_PAGE
            };
            self.track(
                chat_id,
                OutboundMessage::with_keyboard(text, render::user_paging_keyboard()),
                &mut rendered,
            )
            .await;
        } else {
            self.track(
                chat_id,
                OutboundMessage::with_keyboard(
                    texts::own_header(page.number()),
                    render::user_paging_keyboard(),
                ),
                &mut rendered,
            )
            .await;
            for issue in &issues {
                let (comment, attachments) = self.issue_details(issue).await;
                let caption = render::own_caption(issue, comment.as_ref());
                for message in render::issue_unit(caption, None, attachments) {
                    self.track(chat_id, message, &mut rendered).await;
                }
            }
        }

        self.sessions.push_rendered(chat_id, ListView::Own, rendered);
        Ok(())
    }

    /// Active issues narrowed by the chat's filter, with inline controls.
    pub async fn render_admin_issues(&self, chat_id: i64, admin: i64, page: PageRequest) -> Result<()> {
        self.ports.require_admin(admin).await?;
        self.sessions.record_page(chat_id, ListView::Admin, page);
        self.clear_previous(chat_id, ListView::Admin).await;

        let filter = self.sessions.filter(chat_id);
        let issues = self
            .ports
            .store
            .list_issues(&IssueQuery::active(filter.clone()), page.limit(), page.offset())
            .await?;

        let mut rendered = Vec::new();
        if issues.is_empty() {
            let text = if page.number() == 1 {
                texts::ADMIN_EMPTY
            } else {
                texts::ADMIN_EMPTY_PAGE
            };
            self.track(
                chat_id,
                OutboundMessage::with_keyboard(text, render::admin_paging_keyboard()),
                &mut rendered,
            )
            .await;
        } else {
            self.track(
                chat_id,
                OutboundMessage::with_keyboard(
                    render::admin_header(page.number(), &filter),
                    render::admin_paging_keyboard(),
                ),
                &mut rendered,
            )
            .await;
            for issue in &issues {
                let (comment, attachments) = self.issue_details(issue).await;
                let caption = render::admin_caption(issue, comment.as_ref());
                let controls: Option<Keyboard> = Some(render::admin_controls(issue.id));
                for message in render::issue_unit(caption, controls, attachments) {
                    self.track(chat_id, message, &mut rendered).await;
                }
            }
            self.track(
                chat_id,
                OutboundMessage::with_keyboard(
                    texts::ADMIN_PAGE_TURNER,
                    render::admin_page_turner(page.number()),
                ),
                &mut rendered,
            )
            .await;
        }

        self.sessions.push_rendered(chat_id, ListView::Admin, rendered);
        Ok(())
    }

    /// `/issues`: drops the chat's filter and shows the first page.
    pub async fn open_admin_list(&self, chat_id: i64, admin: i64) -> Result<()> {
        self.ports.require_admin(admin).await?;
        self.sessions.reset_filter(chat_id);
        self.render_admin_issues(chat_id, admin, PageRequest::first())
            .await
    }

    /// Renders `page` of `view`; the admin view re-checks privilege.
    pub async fn show_page(&self, chat_id: i64, actor: i64, view: ListView, page: PageRequest) -> Result<()> {
        match view {
            ListView::Own => self.render_own_issues(chat_id, actor, page).await,
            ListView::Admin => self.render_admin_issues(chat_id, actor, page).await,
        }
    }

    /// Previous or next page of the list last opened in this chat. A chat
    /// that never opened a list starts from page one of its own issues.
    /// Returns the page that was rendered.
    pub async fn turn_page(&self, chat_id: i64, actor: i64, forward: bool) -> Result<PageRequest> {
        let (view, current) = self
            .sessions
            .current_page(chat_id)
            .unwrap_or((ListView::Own, PageRequest::first()));
        let page = if forward {
            current.next()
        } else {
            current.previous()
        };
        self.show_page(chat_id, actor, view, page).await?;
        Ok(page)
    }

    /// `/issues_filter`: first step of the two-step menu.
    pub async fn show_filter_menu(&self, chat_id: i64, admin: i64) -> Result<()> {
        self.ports.require_admin(admin).await?;
        self.ports.send(chat_id, render::district_filter_menu()).await;
        Ok(())
    }

    /// A district choice moves on to the category menu; a category choice
    /// completes the filter and shows page one. Returns the inline answer.
    pub async fn set_filter(
        &self,
        chat_id: i64,
        admin: i64,
        dimension: FilterDimension,
        value: Option<String>,
    ) -> Result<&'static str> {
        self.ports.require_admin(admin).await?;
        match dimension {
            FilterDimension::District => {
                self.sessions.set_filter_district(chat_id, value);
                self.ports.send(chat_id, render::category_filter_menu()).await;
                Ok(texts::FILTER_DISTRICT_CHOSEN)
            }
            FilterDimension::Category => {
                let filter: IssueFilter = self.sessions.set_filter_category(chat_id, value);
                tracing::debug!(chat_id, ?filter, "admin filter applied");
                self.render_admin_issues(chat_id, admin, PageRequest::first())
                    .await?;
                Ok(texts::FILTER_APPLIED)
            }
        }
    }

    /// Up to [`SEARCH_LIMIT`] issues, newest first, all statuses unless one is given.
    pub async fn search(&self, status: Option<IssueStatus>) -> Result<Vec<Issue>> {
        let statuses = match status {
            Some(status) => vec![status],
            None => IssueStatus::ALL.to_vec(),
        };
        let query = IssueQuery {
            statuses,
            filter: IssueFilter::default(),
        };
        Ok(self.ports.store.list_issues(&query, SEARCH_LIMIT, 0).await?)
    }

    pub async fn attachments(&self, issue_id: i64) -> Result<Vec<Attachment>> {
        self.ports
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| DomainError::issue_not_found(issue_id))?;
        Ok(self.ports.store.list_attachments(issue_id).await?)
    }

    async fn clear_previous(&self, chat_id: i64, view: ListView) {
        for message_id in self.sessions.take_rendered(chat_id, view) {
            if let Err(err) = self.ports.transport.delete_message(chat_id, message_id).await {
                tracing::debug!(chat_id, message_id, error = %err, "stale list message not deleted");
            }
        }
    }

    async fn track(&self, chat_id: i64, message: OutboundMessage, rendered: &mut Vec<i64>) {
        if let Some(message_id) = self.ports.send(chat_id, message).await {
            rendered.push(message_id);
        }
    }

    /// Latest comment and attachments; a failed lookup renders without them.
    async fn issue_details(&self, issue: &Issue) -> (Option<Comment>, Vec<Attachment>) {
        let comment = match self.ports.store.latest_comment(issue.id).await {
            Ok(comment) => comment,
            Err(err) => {
                tracing::error!(issue_id = issue.id, error = %err, "latest comment lookup failed");
                None
            }
        };
        let attachments = match self.ports.store.list_attachments(issue.id).await {
            Ok(attachments) => attachments,
            Err(err) => {
                tracing::error!(issue_id = issue.id, error = %err, "attachment lookup failed");
                Vec::new()
            }
        };
        (comment, attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::models::{Actor, AttachmentKind, MediaSource};
    use domains::{MockChatTransport, MockIssueStore, MockMediaStore};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    fn owner() -> Actor {
        Actor {
            id: 5,
            external_id: 500,
            username: None,
            first_name: None,
            last_name: None,
            is_admin: false,
            created_at: Utc::now(),
        }
    }

    fn issue(id: i64) -> Issue {
        Issue {
            id,
            user_id: 5,
            chat_id: 500,
            text: Some(format!("issue {id}")),
            location: None,
            status: IssueStatus::New,
            district: None,
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recording_transport(sent: Arc<Mutex<Vec<OutboundMessage>>>) -> MockChatTransport {
        let next_id = AtomicI64::new(1);
        let mut transport = MockChatTransport::new();
        transport.expect_send().returning(move |_, message| {
            sent.lock().unwrap().push(message);
            Ok(next_id.fetch_add(1, Ordering::SeqCst))
        });
        transport.expect_delete_message().returning(|_, _| Ok(()));
        transport
    }

    fn service(store: MockIssueStore, transport: MockChatTransport) -> (ModerationService, Arc<SessionRegistry>) {
        let sessions = Arc::new(SessionRegistry::new());
        let ports = Ports::new(
            Arc::new(store),
            Arc::new(transport),
            Arc::new(MockMediaStore::new()),
        );
        (ModerationService::new(ports, sessions.clone()), sessions)
    }

    #[tokio::test]
    async fn own_list_uses_photo_as_carrier() {
        let mut store = MockIssueStore::new();
        store.expect_find_actor().returning(|_| Ok(Some(owner())));
        store
            .expect_list_issues_by_owner()
            .returning(|_, _, _| Ok(vec![issue(2)]));
        store.expect_latest_comment().returning(|_| Ok(None));
        store.expect_list_attachments().returning(|issue_id| {
            Ok(vec![
                Attachment {
                    id: 1,
                    issue_id,
                    file_ref: "doc-ref".into(),
                    kind: AttachmentKind::Document,
                    locator: String::new(),
                    created_at: Utc::now(),
                },
                Attachment {
                    id: 2,
                    issue_id,
                    file_ref: "photo-ref".into(),
                    kind: AttachmentKind::Photo,
                    locator: "ab/cd/abcd.jpg".into(),
                    created_at: Utc::now(),
                },
            ])
        });

        let sent = Arc::new(Mutex::new(Vec::new()));
        let (moderation, sessions) = service(store, recording_transport(sent.clone()));
        moderation
            .render_own_issues(500, 500, PageRequest::first())
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].text_content(), Some("Ваши обращения (страница 1):"));
        match &sent[1] {
            OutboundMessage::Photo { source, caption, keyboard } => {
                assert_eq!(source, &MediaSource::Stored("ab/cd/abcd.jpg".into()));
                assert!(caption.as_deref().unwrap().starts_with("#2 — Новая"));
                assert!(keyboard.is_none());
            }
            other => panic!("expected photo carrier, got {other:?}"),
        }
        assert!(matches!(sent[2], OutboundMessage::Document { .. }));
        assert_eq!(sessions.take_rendered(500, ListView::Own), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_pages_are_distinguished() {
        let mut store = MockIssueStore::new();
        store.expect_find_actor().returning(|_| Ok(Some(owner())));
        store
            .expect_list_issues_by_owner()
            .returning(|_, _, _| Ok(Vec::new()));

        let sent = Arc::new(Mutex::new(Vec::new()));
        let (moderation, _) = service(store, recording_transport(sent.clone()));
        moderation
            .render_own_issues(500, 500, PageRequest::first())
            .await
            .unwrap();
        moderation
            .render_own_issues(500, 500, PageRequest::new(3))
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[0].text_content(), Some(texts::OWN_EMPTY));
        assert_eq!(sent[1].text_content(), Some(texts::OWN_EMPTY_PAGE));
    }

    #[tokio::test]
    async fn rerender_deletes_previous_messages() {
        let mut store = MockIssueStore::new();
        store.expect_is_admin().returning(|_| Ok(true));
        store
            .expect_list_issues()
            .returning(|_, _, _| Ok(vec![issue(1)]));
        store.expect_latest_comment().returning(|_| Ok(None));
        store.expect_list_attachments().returning(|_| Ok(Vec::new()));

        let deleted = Arc::new(Mutex::new(Vec::new()));
        let deleted_log = deleted.clone();
        let next_id = AtomicI64::new(10);
        let mut transport = MockChatTransport::new();
        transport
            .expect_send()
            .returning(move |_, _| Ok(next_id.fetch_add(1, Ordering::SeqCst)));
        transport.expect_delete_message().returning(move |_, id| {
            deleted_log.lock().unwrap().push(id);
            Err(domains::DeliveryError::Rejected("message can't be deleted".into()))
        });

        let (moderation, sessions) = service(store, transport);
        moderation
            .render_admin_issues(1, 1, PageRequest::first())
            .await
            .unwrap();
        moderation
            .render_admin_issues(1, 1, PageRequest::first())
            .await
            .unwrap();

        // Header, one issue, page turner.
        assert_eq!(*deleted.lock().unwrap(), vec![10, 11, 12]);
        assert_eq!(sessions.take_rendered(1, ListView::Admin), vec![13, 14, 15]);
    }

    #[tokio::test]
    async fn admin_list_requires_privilege() {
        let mut store = MockIssueStore::new();
        store.expect_is_admin().returning(|_| Ok(false));
        store.expect_list_issues().never();

        let (moderation, sessions) = service(store, MockChatTransport::new());
        let result = moderation
            .render_admin_issues(1, 1, PageRequest::first())
            .await;
        assert!(matches!(result, Err(DomainError::PermissionDenied)));
        assert_eq!(sessions.current_page(1), None);
    }
}
