//! # In-memory IssueStore
//!
//! Process-local tables behind one `RwLock`. Every trait method takes the
//! lock once, so compound operations (location attach, status change) are
//! atomic the same way a single SQL statement or transaction is.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use domains::models::{
    Actor, ActorProfile, Attachment, BroadcastRecord, Chat, ChatKind, Comment, ExportRow,
    GeoPoint, Issue, IssueQuery, IssueStatus, NewAttachment, NewIssue, StatusChange,
};
use domains::{IssueStore, StoreError};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    actors: Vec<Actor>,
    chats: Vec<Chat>,
    issues: Vec<Issue>,
    attachments: Vec<Attachment>,
    status_changes: Vec<StatusChange>,
    comments: Vec<Comment>,
    broadcasts: Vec<BroadcastRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn issue_mut(&mut self, id: i64) -> Option<&mut Issue> {
        self.issues.iter_mut().find(|i| i.id == id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryIssueStore {
    tables: RwLock<Tables>,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites an issue's creation time. Fixture support for freshness-window
    /// scenarios; production code never calls it.
    pub async fn backdate_issue(&self, id: i64, created_at: DateTime<Utc>) -> bool {
        let mut tables = self.tables.write().await;
        match tables.issue_mut(id) {
            Some(issue) => {
                issue.created_at = created_at;
                true
            }
            None => false,
        }
    }

    /// Clears an actor's admin flag. Nothing in the chat or HTTP surface
    /// demotes; operators do it in the database.
    pub async fn revoke_admin(&self, external_id: i64) -> bool {
        let mut tables = self.tables.write().await;
        match tables.actors.iter_mut().find(|a| a.external_id == external_id) {
            Some(actor) => {
                actor.is_admin = false;
                true
            }
            None => false,
        }
    }

    /// Recorded broadcast log, oldest first.
    pub async fn broadcasts(&self) -> Vec<BroadcastRecord> {
        self.tables.read().await.broadcasts.clone()
    }
}

/// Newest first; ids break ties between rows created in the same instant.
fn newest_first(issues: &mut [Issue]) {
    issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn matches_query(issue: &Issue, query: &IssueQuery) -> bool {
    query.statuses.contains(&issue.status)
        && query
            .filter
            .district
            .as_ref()
            .is_none_or(|d| issue.district.as_ref() == Some(d))
        && query
            .filter
            .category
            .as_ref()
            .is_none_or(|c| issue.category.as_ref() == Some(c))
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn upsert_actor(&self, profile: &ActorProfile) -> Result<Actor, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(actor) = tables
            .actors
            .iter_mut()
            .find(|a| a.external_id == profile.external_id)
        {
            actor.username = profile.username.clone();
            actor.first_name = profile.first_name.clone();
            actor.last_name = profile.last_name.clone();
            return Ok(actor.clone());
        }

        let actor = Actor {
            id: tables.next_id(),
            external_id: profile.external_id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            is_admin: false,
            created_at: Utc::now(),
        };
        tables.actors.push(actor.clone());
        Ok(actor)
    }

    async fn find_actor(&self, external_id: i64) -> Result<Option<Actor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .actors
            .iter()
            .find(|a| a.external_id == external_id)
            .cloned())
    }

    async fn is_admin(&self, external_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .find_actor(external_id)
            .await?
            .is_some_and(|a| a.is_admin))
    }

    async fn promote_to_admin(&self, external_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let actor = tables
            .actors
            .iter_mut()
            .find(|a| a.external_id == external_id)
            .ok_or(StoreError::NotFound)?;
        actor.is_admin = true;
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Actor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.actors.iter().filter(|a| a.is_admin).cloned().collect())
    }

    async fn upsert_chat(&self, chat: &Chat) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(existing) => *existing = chat.clone(),
            None => tables.chats.push(chat.clone()),
        }
        Ok(())
    }

    async fn list_broadcast_targets(&self) -> Result<Vec<i64>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .chats
            .iter()
            .filter(|c| c.kind != ChatKind::Web)
            .map(|c| c.id)
            .collect())
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<Issue, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.actors.iter().any(|a| a.id == issue.user_id) {
            return Err(StoreError::Conflict(format!(
                "issue owner {} does not exist",
                issue.user_id
            )));
        }
        let now = Utc::now();
        let issue = Issue {
            id: tables.next_id(),
            user_id: issue.user_id,
            chat_id: issue.chat_id,
            text: issue.text,
            location: issue.location,
            status: IssueStatus::New,
            district: issue.district,
            category: issue.category,
            created_at: now,
            updated_at: now,
        };
        tables.issues.push(issue.clone());
        Ok(issue)
    }

    async fn get_issue(&self, id: i64) -> Result<Option<Issue>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.issues.iter().find(|i| i.id == id).cloned())
    }

    async fn list_issues_by_owner(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Issue>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Issue> = tables
            .issues
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(page(rows, limit, offset))
    }

    async fn list_issues(
        &self,
        query: &IssueQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Issue>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Issue> = tables
            .issues
            .iter()
            .filter(|i| matches_query(i, query))
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(page(rows, limit, offset))
    }

    async fn count_issues(
        &self,
        status: IssueStatus,
        created_since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .issues
            .iter()
            .filter(|i| i.status == status)
            .filter(|i| created_since.is_none_or(|since| i.created_at >= since))
            .count();
        Ok(count as i64)
    }

    async fn attach_location(
        &self,
        user_id: i64,
        point: GeoPoint,
        window: TimeDelta,
    ) -> Result<Option<Issue>, StoreError> {
        let mut tables = self.tables.write().await;
        let cutoff = Utc::now() - window;
        let target = tables
            .issues
            .iter()
            .filter(|i| i.user_id == user_id && i.location.is_none() && i.created_at > cutoff)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|i| i.id);

        let Some(id) = target else {
            return Ok(None);
        };
        let issue = tables.issue_mut(id).ok_or(StoreError::NotFound)?;
        issue.location = Some(point);
        issue.updated_at = Utc::now();
        Ok(Some(issue.clone()))
    }

    async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.issues.iter().any(|i| i.id == attachment.issue_id) {
            return Err(StoreError::NotFound);
        }
        let row = Attachment {
            id: tables.next_id(),
            issue_id: attachment.issue_id,
            file_ref: attachment.file_ref,
            kind: attachment.kind,
            locator: attachment.locator,
            created_at: Utc::now(),
        };
        tables.attachments.push(row.clone());
        Ok(row)
    }

    async fn list_attachments(&self, issue_id: i64) -> Result<Vec<Attachment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attachments
            .iter()
            .filter(|a| a.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn record_status_change(
        &self,
        issue_id: i64,
        new_status: IssueStatus,
        changed_by: Option<i64>,
        comment: Option<String>,
    ) -> Result<StatusChange, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let issue = tables.issue_mut(issue_id).ok_or(StoreError::NotFound)?;
        let old_status = issue.status;
        issue.status = new_status;
        issue.updated_at = now;

        let row = StatusChange {
            id: tables.next_id(),
            issue_id,
            old_status: Some(old_status),
            new_status,
            changed_by,
            comment,
            created_at: now,
        };
        tables.status_changes.push(row.clone());
        Ok(row)
    }

    async fn list_status_changes(&self, issue_id: i64) -> Result<Vec<StatusChange>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .status_changes
            .iter()
            .filter(|c| c.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn add_comment(
        &self,
        issue_id: i64,
        admin_user_id: i64,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.issues.iter().any(|i| i.id == issue_id) {
            return Err(StoreError::NotFound);
        }
        let comment = Comment {
            id: tables.next_id(),
            issue_id,
            admin_user_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn latest_comment(&self, issue_id: i64) -> Result<Option<Comment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.issue_id == issue_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn export_issues(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExportRow>, StoreError> {
        let tables = self.tables.read().await;
        let mut issues: Vec<&Issue> = tables
            .issues
            .iter()
            .filter(|i| i.created_at >= from && i.created_at < to)
            .collect();
        issues.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(issues
            .into_iter()
            .map(|i| ExportRow {
                id: i.id,
                created_at: i.created_at,
                status: i.status,
                user_id: i.user_id,
                tg_user_id: tables
                    .actors
                    .iter()
                    .find(|a| a.id == i.user_id)
                    .map(|a| a.external_id)
                    .unwrap_or_default(),
                text: i.text.clone().unwrap_or_default(),
                latitude: i.location.map(|p| p.latitude),
                longitude: i.location.map(|p| p.longitude),
            })
            .collect())
    }

    async fn record_broadcast(&self, record: BroadcastRecord) -> Result<(), StoreError> {
        self.tables.write().await.broadcasts.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::models::IssueFilter;
    use tokio_test::{assert_err, assert_ok};

    async fn store_with_owner() -> (MemoryIssueStore, Actor) {
        let store = MemoryIssueStore::new();
        let owner = store.upsert_actor(&ActorProfile::new(500)).await.unwrap();
        (store, owner)
    }

    fn new_issue(owner: &Actor, district: Option<&str>) -> NewIssue {
        NewIssue {
            user_id: owner.id,
            chat_id: owner.external_id,
            text: Some("Broken lamp".into()),
            district: district.map(str::to_string),
            ..NewIssue::default()
        }
    }

    #[tokio::test]
    async fn upsert_actor_keeps_identity_and_admin_flag() {
        let (store, owner) = store_with_owner().await;
        store.promote_to_admin(500).await.unwrap();

        let mut profile = ActorProfile::new(500);
        profile.username = Some("renamed".into());
        let again = store.upsert_actor(&profile).await.unwrap();

        assert_eq!(again.id, owner.id);
        assert!(again.is_admin);
        assert_eq!(again.username.as_deref(), Some("renamed"));
        assert_eq!(store.promote_to_admin(999).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn status_change_chains_old_and_new() {
        let (store, owner) = store_with_owner().await;
        let issue = store.create_issue(new_issue(&owner, None)).await.unwrap();

        let first = store
            .record_status_change(issue.id, IssueStatus::InProgress, None, None)
            .await
            .unwrap();
        let second = store
            .record_status_change(issue.id, IssueStatus::Done, Some(owner.id), None)
            .await
            .unwrap();

        assert_eq!(first.old_status, Some(IssueStatus::New));
        assert_eq!(second.old_status, Some(first.new_status));
        assert_eq!(store.list_status_changes(issue.id).await.unwrap().len(), 2);
        assert_eq!(
            store
                .record_status_change(4242, IssueStatus::Done, None, None)
                .await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn filtered_listing_respects_status_and_dimensions() {
        let (store, owner) = store_with_owner().await;
        let a = store
            .create_issue(new_issue(&owner, Some("Ленинский")))
            .await
            .unwrap();
        store
            .create_issue(new_issue(&owner, Some("Жовтневый")))
            .await
            .unwrap();
        let done = store
            .create_issue(new_issue(&owner, Some("Ленинский")))
            .await
            .unwrap();
        store
            .record_status_change(done.id, IssueStatus::Done, None, None)
            .await
            .unwrap();

        let query = IssueQuery::active(IssueFilter {
            district: Some("Ленинский".into()),
            category: None,
        });
        let rows = store.list_issues(&query, 10, 0).await.unwrap();
        assert_eq!(rows.iter().map(|i| i.id).collect::<Vec<_>>(), vec![a.id]);
    }

    #[tokio::test]
    async fn location_attaches_only_to_fresh_coordinate_less_issue() {
        let (store, owner) = store_with_owner().await;
        let stale = store.create_issue(new_issue(&owner, None)).await.unwrap();
        store
            .backdate_issue(stale.id, Utc::now() - TimeDelta::minutes(11))
            .await;
        let point = GeoPoint {
            latitude: 48.01,
            longitude: 37.8,
        };

        let none = store
            .attach_location(owner.id, point, TimeDelta::minutes(10))
            .await
            .unwrap();
        assert!(none.is_none());

        let fresh = store.create_issue(new_issue(&owner, None)).await.unwrap();
        let attached = store
            .attach_location(owner.id, point, TimeDelta::minutes(10))
            .await
            .unwrap()
            .expect("fresh issue qualifies");
        assert_eq!(attached.id, fresh.id);
        assert_eq!(attached.location, Some(point));

        let again = store
            .attach_location(owner.id, point, TimeDelta::minutes(10))
            .await
            .unwrap();
        assert!(again.is_none(), "coordinates are never overwritten");
    }

    #[tokio::test]
    async fn broadcast_targets_skip_the_web_endpoint() {
        let store = MemoryIssueStore::new();
        assert_ok!(store.upsert_chat(&Chat::private(10)).await);
        assert_ok!(store.upsert_chat(&Chat::web()).await);
        assert_ok!(store.upsert_chat(&Chat::private(10)).await);

        let targets = assert_ok!(store.list_broadcast_targets().await);
        assert_eq!(targets, vec![10]);
    }

    #[tokio::test]
    async fn comments_need_an_existing_issue() {
        let (store, owner) = store_with_owner().await;
        assert_err!(store.add_comment(4242, owner.id, "lost").await);

        let issue = assert_ok!(store.create_issue(new_issue(&owner, None)).await);
        assert_ok!(store.add_comment(issue.id, owner.id, "first").await);
        assert_ok!(store.add_comment(issue.id, owner.id, "second").await);
        let latest = assert_ok!(store.latest_comment(issue.id).await);
        assert_eq!(latest.map(|c| c.text).as_deref(), Some("second"));
    }
}
