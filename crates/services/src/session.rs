//! # Session State Registry
//!
//! Process-local conversational state, one concurrent map per state kind.
//! Every accessor locks a single shard for the duration of a map operation
//! and returns owned data, so callers never hold a guard across an await.

use dashmap::DashMap;
use domains::models::{IssueFilter, ListView, PageRequest};

/// Intake wizard progress for one actor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardState {
    pub district: Option<String>,
    pub category: Option<String>,
}

impl WizardState {
    /// Both steps done: the next content message finalizes an issue.
    pub fn completed(&self) -> Option<(String, String)> {
        Some((self.district.clone()?, self.category.clone()?))
    }
}

/// Per-chat list position: which view was opened last and the page of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListCursor {
    last_view: ListView,
    own_page: PageRequest,
    admin_page: PageRequest,
}

impl ListCursor {
    fn new(view: ListView) -> Self {
        Self {
            last_view: view,
            own_page: PageRequest::first(),
            admin_page: PageRequest::first(),
        }
    }

    fn page_mut(&mut self, view: ListView) -> &mut PageRequest {
        match view {
            ListView::Own => &mut self.own_page,
            ListView::Admin => &mut self.admin_page,
        }
    }
}

/// Keys: wizards and pending drafts by actor external id; cursors, rendered
/// ids and filters by chat id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    wizards: DashMap<i64, WizardState>,
    cursors: DashMap<i64, ListCursor>,
    rendered: DashMap<(i64, ListView), Vec<i64>>,
    pending_comments: DashMap<i64, i64>,
    pending_broadcasts: DashMap<i64, String>,
    filters: DashMap<i64, IssueFilter>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Wizard

    pub fn wizard(&self, actor: i64) -> Option<WizardState> {
        self.wizards.get(&actor).map(|w| w.clone())
    }

    /// Picking a district (re)starts the category step.
    pub fn choose_district(&self, actor: i64, district: &str) {
        self.wizards.insert(
            actor,
            WizardState {
                district: Some(district.to_string()),
                category: None,
            },
        );
    }

    /// `None` when no district was chosen first; the state is left untouched.
    pub fn choose_category(&self, actor: i64, category: &str) -> Option<WizardState> {
        let mut entry = self.wizards.get_mut(&actor)?;
        entry.district.as_ref()?;
        entry.category = Some(category.to_string());
        Some(entry.clone())
    }

    pub fn clear_wizard(&self, actor: i64) {
        self.wizards.remove(&actor);
    }

    // List cursors

    /// Marks `view` as the chat's current list and stores its page.
    pub fn record_page(&self, chat: i64, view: ListView, page: PageRequest) {
        let mut cursor = self
            .cursors
            .entry(chat)
            .or_insert_with(|| ListCursor::new(view));
        cursor.last_view = view;
        *cursor.page_mut(view) = page;
    }

    /// The list view last opened in this chat and its current page.
    pub fn current_page(&self, chat: i64) -> Option<(ListView, PageRequest)> {
        self.cursors.get(&chat).map(|c| {
            let page = match c.last_view {
                ListView::Own => c.own_page,
                ListView::Admin => c.admin_page,
            };
            (c.last_view, page)
        })
    }

    // Rendered message ids

    /// Removes and returns the ids from the previous render of `view`.
    pub fn take_rendered(&self, chat: i64, view: ListView) -> Vec<i64> {
        self.rendered
            .remove(&(chat, view))
            .map(|(_, ids)| ids)
            .unwrap_or_default()
    }

    pub fn push_rendered(&self, chat: i64, view: ListView, ids: impl IntoIterator<Item = i64>) {
        self.rendered.entry((chat, view)).or_default().extend(ids);
    }

    // Pending comment

    pub fn set_pending_comment(&self, admin: i64, issue_id: i64) {
        self.pending_comments.insert(admin, issue_id);
    }

    pub fn pending_comment(&self, admin: i64) -> Option<i64> {
        self.pending_comments.get(&admin).map(|id| *id)
    }

    pub fn take_pending_comment(&self, admin: i64) -> Option<i64> {
        self.pending_comments.remove(&admin).map(|(_, id)| id)
    }

    // Pending broadcast

    /// Overwrites any unresolved draft from the same admin.
    pub fn set_pending_broadcast(&self, admin: i64, text: String) {
        self.pending_broadcasts.insert(admin, text);
    }

    pub fn take_pending_broadcast(&self, admin: i64) -> Option<String> {
        self.pending_broadcasts.remove(&admin).map(|(_, text)| text)
    }

    // Admin list filter

    pub fn filter(&self, chat: i64) -> IssueFilter {
        self.filters
            .get(&chat)
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    /// First menu step: sets the district and clears the category.
    pub fn set_filter_district(&self, chat: i64, district: Option<String>) {
        self.filters.insert(
            chat,
            IssueFilter {
                district,
                category: None,
            },
        );
    }

    pub fn set_filter_category(&self, chat: i64, category: Option<String>) -> IssueFilter {
        let mut filter = self.filters.entry(chat).or_default();
        filter.category = category;
        filter.clone()
    }

    pub fn reset_filter(&self, chat: i64) {
        self.filters.remove(&chat);
    }
}
