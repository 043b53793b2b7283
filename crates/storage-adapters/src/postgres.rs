//! # PostgreSQL IssueStore
//!
//! Maps the relational model onto the domain types. Statuses are stored
//! as their display labels so the audit table reads the same as the bot.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use domains::models::{
    Actor, ActorProfile, Attachment, AttachmentKind, BroadcastRecord, Chat, Comment, ExportRow,
    GeoPoint, Issue, IssueQuery, IssueStatus, NewAttachment, NewIssue, StatusChange,
};
use domains::{IssueStore, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

const ISSUE_COLUMNS: &str = "id, user_id, chat_id, text, latitude, longitude, status, \
                             district, category, created_at, updated_at";

const ACTOR_COLUMNS: &str = "id, tg_user_id, username, first_name, last_name, is_admin, created_at";

pub struct PgIssueStore {
    pool: PgPool,
}

impl PgIssueStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn status_from_db(label: &str) -> Result<IssueStatus, StoreError> {
    IssueStatus::from_label(label)
        .ok_or_else(|| StoreError::Backend(format!("unknown issue status {label:?}")))
}

fn actor_from_row(row: &PgRow) -> Result<Actor, StoreError> {
    Ok(Actor {
        id: row.try_get("id").map_err(db_err)?,
        external_id: row.try_get("tg_user_id").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        first_name: row.try_get("first_name").map_err(db_err)?,
        last_name: row.try_get("last_name").map_err(db_err)?,
        is_admin: row.try_get("is_admin").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn issue_from_row(row: &PgRow) -> Result<Issue, StoreError> {
    let latitude: Option<f64> = row.try_get("latitude").map_err(db_err)?;
    let longitude: Option<f64> = row.try_get("longitude").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;

    Ok(Issue {
        id: row.try_get("id").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        chat_id: row.try_get("chat_id").map_err(db_err)?,
        text: row.try_get("text").map_err(db_err)?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoPoint {
                latitude,
                longitude,
            }),
        status: status_from_db(&status)?,
        district: row.try_get("district").map_err(db_err)?,
        category: row.try_get("category").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn attachment_from_row(row: &PgRow) -> Result<Attachment, StoreError> {
    let kind: String = row.try_get("file_type").map_err(db_err)?;
    Ok(Attachment {
        id: row.try_get("id").map_err(db_err)?,
        issue_id: row.try_get("issue_id").map_err(db_err)?,
        file_ref: row.try_get("file_id").map_err(db_err)?,
        kind: AttachmentKind::parse(&kind),
        locator: row.try_get("local_path").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, StoreError> {
    Ok(Comment {
        id: row.try_get("id").map_err(db_err)?,
        issue_id: row.try_get("issue_id").map_err(db_err)?,
        admin_user_id: row.try_get("admin_user_id").map_err(db_err)?,
        text: row.try_get("text").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn collect<T>(
    rows: Vec<PgRow>,
    map: fn(&PgRow) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.iter().map(map).collect()
}

#[async_trait]
impl IssueStore for PgIssueStore {
    async fn upsert_actor(&self, profile: &ActorProfile) -> Result<Actor, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (tg_user_id, username, first_name, last_name) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tg_user_id) DO UPDATE SET \
                 username = excluded.username, \
                 first_name = excluded.first_name, \
                 last_name = excluded.last_name \
             RETURNING {ACTOR_COLUMNS}"
        ))
        .bind(profile.external_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        actor_from_row(&row)
    }

    async fn find_actor(&self, external_id: i64) -> Result<Option<Actor>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ACTOR_COLUMNS} FROM users WHERE tg_user_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(actor_from_row).transpose()
    }

    async fn is_admin(&self, external_id: i64) -> Result<bool, StoreError> {
        let flag: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE tg_user_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(flag.unwrap_or(false))
    }

    async fn promote_to_admin(&self, external_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET is_admin = true WHERE tg_user_id = $1")
            .bind(external_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Actor>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACTOR_COLUMNS} FROM users WHERE is_admin = true ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        collect(rows, actor_from_row)
    }

    async fn upsert_chat(&self, chat: &Chat) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chats (chat_id, type, title) VALUES ($1, $2, $3) \
             ON CONFLICT (chat_id) DO UPDATE SET type = excluded.type, title = excluded.title",
        )
        .bind(chat.id)
        .bind(chat.kind.as_str())
        .bind(&chat.title)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_broadcast_targets(&self) -> Result<Vec<i64>, StoreError> {
        sqlx::query_scalar("SELECT chat_id FROM chats WHERE type <> 'web' ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn create_issue(&self, issue: NewIssue) -> Result<Issue, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO issues (user_id, chat_id, text, latitude, longitude, status, district, category) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(issue.user_id)
        .bind(issue.chat_id)
        .bind(&issue.text)
        .bind(issue.location.map(|p| p.latitude))
        .bind(issue.location.map(|p| p.longitude))
        .bind(IssueStatus::New.label())
        .bind(&issue.district)
        .bind(&issue.category)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        issue_from_row(&row)
    }

    async fn get_issue(&self, id: i64) -> Result<Option<Issue>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(issue_from_row).transpose()
    }

    async fn list_issues_by_owner(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Issue>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        collect(rows, issue_from_row)
    }

    async fn list_issues(
        &self,
        query: &IssueQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Issue>, StoreError> {
        let statuses: Vec<&str> = query.statuses.iter().map(|s| s.label()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {ISSUE_COLUMNS} FROM issues \
             WHERE status = ANY($1) \
               AND ($2::text IS NULL OR district = $2) \
               AND ($3::text IS NULL OR category = $3) \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(&statuses)
        .bind(&query.filter.district)
        .bind(&query.filter.category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        collect(rows, issue_from_row)
    }

    async fn count_issues(
        &self,
        status: IssueStatus,
        created_since: Option<DateTime<Utc>>,
    ) -> Result<i64, StoreError> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM issues \
             WHERE status = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)",
        )
        .bind(status.label())
        .bind(created_since)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn attach_location(
        &self,
        user_id: i64,
        point: GeoPoint,
        window: TimeDelta,
    ) -> Result<Option<Issue>, StoreError> {
        // Single statement: the sub-select and the update see the same row.
        let row = sqlx::query(&format!(
            "UPDATE issues SET latitude = $1, longitude = $2, updated_at = now() \
             WHERE id = ( \
                 SELECT id FROM issues \
                 WHERE user_id = $3 \
                   AND latitude IS NULL AND longitude IS NULL \
                   AND created_at > now() - ($4::bigint * interval '1 second') \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT 1 \
                 FOR UPDATE \
             ) \
             RETURNING {ISSUE_COLUMNS}"
        ))
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(user_id)
        .bind(window.num_seconds())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(issue_from_row).transpose()
    }

    async fn add_attachment(&self, attachment: NewAttachment) -> Result<Attachment, StoreError> {
        let row = sqlx::query(
            "INSERT INTO attachments (issue_id, file_id, file_type, local_path) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, issue_id, file_id, file_type, local_path, created_at",
        )
        .bind(attachment.issue_id)
        .bind(&attachment.file_ref)
        .bind(attachment.kind.as_str())
        .bind(&attachment.locator)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        attachment_from_row(&row)
    }

    async fn list_attachments(&self, issue_id: i64) -> Result<Vec<Attachment>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, issue_id, file_id, file_type, local_path, created_at \
             FROM attachments WHERE issue_id = $1 ORDER BY id",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        collect(rows, attachment_from_row)
    }

    /// Read, update and audit in one transaction so a transition never lands
    /// without its audit row.
    async fn record_status_change(
        &self,
        issue_id: i64,
        new_status: IssueStatus,
        changed_by: Option<i64>,
        comment: Option<String>,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let old: Option<String> =
            sqlx::query_scalar("SELECT status FROM issues WHERE id = $1 FOR UPDATE")
                .bind(issue_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let old_status = status_from_db(&old.ok_or(StoreError::NotFound)?)?;

        sqlx::query("UPDATE issues SET status = $2, updated_at = now() WHERE id = $1")
            .bind(issue_id)
            .bind(new_status.label())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let row = sqlx::query(
            "INSERT INTO status_changes (issue_id, old_status, new_status, changed_by, comment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, created_at",
        )
        .bind(issue_id)
        .bind(old_status.label())
        .bind(new_status.label())
        .bind(changed_by)
        .bind(&comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(StatusChange {
            id: row.try_get("id").map_err(db_err)?,
            issue_id,
            old_status: Some(old_status),
            new_status,
            changed_by,
            comment,
            created_at: row.try_get("created_at").map_err(db_err)?,
        })
    }

    async fn list_status_changes(&self, issue_id: i64) -> Result<Vec<StatusChange>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, issue_id, old_status, new_status, changed_by, comment, created_at \
             FROM status_changes WHERE issue_id = $1 ORDER BY id",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let old: Option<String> = row.try_get("old_status").map_err(db_err)?;
                let new: String = row.try_get("new_status").map_err(db_err)?;
                Ok(StatusChange {
                    id: row.try_get("id").map_err(db_err)?,
                    issue_id: row.try_get("issue_id").map_err(db_err)?,
                    old_status: old.as_deref().map(status_from_db).transpose()?,
                    new_status: status_from_db(&new)?,
                    changed_by: row.try_get("changed_by").map_err(db_err)?,
                    comment: row.try_get("comment").map_err(db_err)?,
                    created_at: row.try_get("created_at").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn add_comment(
        &self,
        issue_id: i64,
        admin_user_id: i64,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let row = sqlx::query(
            "INSERT INTO comments (issue_id, admin_user_id, text) VALUES ($1, $2, $3) \
             RETURNING id, issue_id, admin_user_id, text, created_at",
        )
        .bind(issue_id)
        .bind(admin_user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        comment_from_row(&row)
    }

    async fn latest_comment(&self, issue_id: i64) -> Result<Option<Comment>, StoreError> {
        let row = sqlx::query(
            "SELECT id, issue_id, admin_user_id, text, created_at FROM comments \
             WHERE issue_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn export_issues(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExportRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT i.id, i.created_at, i.status, i.user_id, u.tg_user_id, \
                    COALESCE(i.text, '') AS text, i.latitude, i.longitude \
             FROM issues i JOIN users u ON u.id = i.user_id \
             WHERE i.created_at >= $1 AND i.created_at < $2 \
             ORDER BY i.created_at ASC, i.id ASC",
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status").map_err(db_err)?;
                Ok(ExportRow {
                    id: row.try_get("id").map_err(db_err)?,
                    created_at: row.try_get("created_at").map_err(db_err)?,
                    status: status_from_db(&status)?,
                    user_id: row.try_get("user_id").map_err(db_err)?,
                    tg_user_id: row.try_get("tg_user_id").map_err(db_err)?,
                    text: row.try_get("text").map_err(db_err)?,
                    latitude: row.try_get("latitude").map_err(db_err)?,
                    longitude: row.try_get("longitude").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn record_broadcast(&self, record: BroadcastRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO broadcasts (text, created_by, sent_count) VALUES ($1, $2, $3)")
            .bind(&record.text)
            .bind(record.created_by)
            .bind(record.sent_count)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
