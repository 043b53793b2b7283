//! Inline actions carried by chat buttons.
//!
//! Decoded once at the transport boundary; services only ever see the enum.
//! The wire form has to fit the transport's 64-byte callback payload, so
//! districts and categories travel as catalog indices.

use serde::{Deserialize, Serialize};

use super::IssueStatus;
use crate::catalog::{category_index, district_index, CATEGORIES, DISTRICTS};

/// Which paginated list a chat is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListView {
    /// The requester's own issues.
    Own,
    /// The admin moderation view over active issues.
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterDimension {
    District,
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    ChangeStatus { issue_id: i64, status: IssueStatus },
    AddComment { issue_id: i64 },
    /// `value: None` is the explicit "all" escape.
    SetFilter {
        dimension: FilterDimension,
        value: Option<String>,
    },
    Page { view: ListView, page: u32 },
    BroadcastConfirm,
    BroadcastCancel,
}

const ALL: &str = "all";

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Self::ChangeStatus { issue_id, status } => format!("st:{issue_id}:{}", status.code()),
            Self::AddComment { issue_id } => format!("cm:{issue_id}"),
            Self::SetFilter { dimension, value } => {
                let (prefix, index) = match dimension {
                    FilterDimension::District => ("fd", value.as_deref().and_then(district_index)),
                    FilterDimension::Category => ("fc", value.as_deref().and_then(category_index)),
                };
                match index {
                    Some(i) => format!("{prefix}:{i}"),
                    None => format!("{prefix}:{ALL}"),
                }
            }
            Self::Page { view, page } => {
                let view = match view {
                    ListView::Own => "own",
                    ListView::Admin => "adm",
                };
                format!("pg:{view}:{page}")
            }
            Self::BroadcastConfirm => "bc:ok".to_string(),
            Self::BroadcastCancel => "bc:no".to_string(),
        }
    }

    /// Returns `None` for anything that is not a well-formed action.
    pub fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.split(':');
        let tag = parts.next()?;
        let first = parts.next();
        let second = parts.next();
        if parts.next().is_some() {
            return None;
        }

        match (tag, first, second) {
            ("st", Some(id), Some(code)) => Some(Self::ChangeStatus {
                issue_id: id.parse().ok()?,
                status: IssueStatus::from_code(code)?,
            }),
            ("cm", Some(id), None) => Some(Self::AddComment {
                issue_id: id.parse().ok()?,
            }),
            ("fd", Some(value), None) => Some(Self::SetFilter {
                dimension: FilterDimension::District,
                value: decode_catalog_entry(value, DISTRICTS)?,
            }),
            ("fc", Some(value), None) => Some(Self::SetFilter {
                dimension: FilterDimension::Category,
                value: decode_catalog_entry(value, CATEGORIES)?,
            }),
            ("pg", Some(view), Some(page)) => {
                let view = match view {
                    "own" => ListView::Own,
                    "adm" => ListView::Admin,
                    _ => return None,
                };
                Some(Self::Page {
                    view,
                    page: page.parse().ok()?,
                })
            }
            ("bc", Some("ok"), None) => Some(Self::BroadcastConfirm),
            ("bc", Some("no"), None) => Some(Self::BroadcastCancel),
            _ => None,
        }
    }
}

/// `Some(None)` is the "all" escape; `None` is a malformed entry.
fn decode_catalog_entry(raw: &str, catalog: &[&str]) -> Option<Option<String>> {
    if raw == ALL {
        return Some(None);
    }
    let index: usize = raw.parse().ok()?;
    catalog.get(index).map(|name| Some((*name).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_action_round_trips() {
        let action = Action::ChangeStatus {
            issue_id: 981,
            status: IssueStatus::Done,
        };
        assert_eq!(action.encode(), "st:981:done");
        assert_eq!(Action::decode("st:981:done"), Some(action));
    }

    #[test]
    fn filter_actions_travel_as_indices() {
        let action = Action::SetFilter {
            dimension: FilterDimension::Category,
            value: Some("Безопасность и правопорядок".to_string()),
        };
        let encoded = action.encode();
        assert_eq!(encoded, "fc:4");
        assert!(encoded.len() <= 64);
        assert_eq!(Action::decode(&encoded), Some(action));

        assert_eq!(
            Action::decode("fd:all"),
            Some(Action::SetFilter {
                dimension: FilterDimension::District,
                value: None
            })
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        for raw in [
            "",
            "st:abc:done",
            "st:1:closed",
            "st:1",
            "cm:1:2",
            "fd:99",
            "pg:all:1",
            "bc:maybe",
            "status:1:Новая",
        ] {
            assert_eq!(Action::decode(raw), None, "{raw}");
        }
    }
}
