use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed page size for every issue listing.
pub const PAGE_SIZE: i64 = 10;

/// Lifecycle status of an issue.
///
/// The Russian labels are user-facing and land in the audit trail, so they
/// are the serialized form as well as the display form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    #[default]
    #[serde(rename = "Новая")]
    New,
    #[serde(rename = "В обработке")]
    InProgress,
    #[serde(rename = "Завершено")]
    Done,
    #[serde(rename = "Отклонено")]
    Rejected,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 4] = [Self::New, Self::InProgress, Self::Done, Self::Rejected];

    /// Statuses shown in the admin moderation view.
    pub const ACTIVE: [IssueStatus; 2] = [Self::New, Self::InProgress];

    /// Targets offered as inline admin controls.
    pub const TRANSITIONS: [IssueStatus; 3] = [Self::InProgress, Self::Done, Self::Rejected];

    pub fn label(self) -> &'static str {
        match self {
            Self::New => "Новая",
            Self::InProgress => "В обработке",
            Self::Done => "Завершено",
            Self::Rejected => "Отклонено",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Short stable code used inside encoded inline actions.
    pub fn code(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "progress",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A latitude/longitude pair. Issues hold both or neither.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A citizen-reported problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,
    /// Owning actor, fixed at creation.
    pub user_id: i64,
    /// Origin conversation endpoint, fixed at creation.
    pub chat_id: i64,
    pub text: Option<String>,
    pub location: Option<GeoPoint>,
    pub status: IssueStatus,
    pub district: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for `Issue`. Status is always `New` on creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    pub user_id: i64,
    pub chat_id: i64,
    pub text: Option<String>,
    pub location: Option<GeoPoint>,
    pub district: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Photo,
    Video,
    Document,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    /// Anything that is not a photo or video is stored as a document.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "photo" => Self::Photo,
            "video" => Self::Video,
            _ => Self::Document,
        }
    }

    /// Maps a MIME type from a web upload onto a type tag.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("image/") {
            Self::Photo
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::Document
        }
    }
}

/// Immutable media reference attached to one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub issue_id: i64,
    /// Transport file reference (re-sendable without re-upload).
    pub file_ref: String,
    pub kind: AttachmentKind,
    /// Where the `MediaStore` put the bytes. Empty when never downloaded.
    pub locator: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttachment {
    pub issue_id: i64,
    pub file_ref: String,
    pub kind: AttachmentKind,
    pub locator: String,
}

/// Append-only audit row, one per transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: i64,
    pub issue_id: i64,
    pub old_status: Option<IssueStatus>,
    pub new_status: IssueStatus,
    /// Internal actor id of the acting admin, when it could be resolved.
    pub changed_by: Option<i64>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: i64,
    pub admin_user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Admin list filter; both dimensions independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFilter {
    pub district: Option<String>,
    pub category: Option<String>,
}

impl IssueFilter {
    pub fn is_empty(&self) -> bool {
        self.district.is_none() && self.category.is_none()
    }
}

/// Status set plus optional filter, the shape of the moderation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub statuses: Vec<IssueStatus>,
    pub filter: IssueFilter,
}

impl IssueQuery {
    pub fn active(filter: IssueFilter) -> Self {
        Self {
            statuses: IssueStatus::ACTIVE.to_vec(),
            filter,
        }
    }
}

/// 1-based page number; anything below 1 clamps to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest(u32);

impl PageRequest {
    pub fn new(number: i64) -> Self {
        Self(number.clamp(1, i64::from(u32::MAX)) as u32)
    }

    pub fn first() -> Self {
        Self(1)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    pub fn limit(self) -> i64 {
        PAGE_SIZE
    }

    pub fn offset(self) -> i64 {
        (i64::from(self.0) - 1) * PAGE_SIZE
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn previous(self) -> Self {
        Self::new(i64::from(self.0) - 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub status: IssueStatus,
    pub user_id: i64,
    pub tg_user_id: i64,
    pub text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Completed fanout, kept for the operator's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub text: String,
    pub created_by: Option<i64>,
    pub sent_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_and_codes_are_bijective() {
        for status in IssueStatus::ALL {
            assert_eq!(IssueStatus::from_label(status.label()), Some(status));
            assert_eq!(IssueStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(IssueStatus::from_label("Closed"), None);
    }

    #[test]
    fn status_serializes_as_display_label() {
        let json = serde_json::to_string(&IssueStatus::InProgress).unwrap();
        assert_eq!(json, "\"В обработке\"");
    }

    #[test]
    fn page_request_clamps_and_offsets() {
        assert_eq!(PageRequest::new(0).number(), 1);
        assert_eq!(PageRequest::new(-4).number(), 1);
        assert_eq!(PageRequest::new(1).offset(), 0);
        assert_eq!(PageRequest::new(3).offset(), 20);
        assert_eq!(PageRequest::first().previous().number(), 1);
        assert_eq!(PageRequest::new(2).next().number(), 3);
    }

    #[test]
    fn attachment_kind_from_mime() {
        assert_eq!(AttachmentKind::from_mime("image/jpeg"), AttachmentKind::Photo);
        assert_eq!(AttachmentKind::from_mime("video/mp4"), AttachmentKind::Video);
        assert_eq!(
            AttachmentKind::from_mime("application/pdf"),
            AttachmentKind::Document
        );
    }
}
