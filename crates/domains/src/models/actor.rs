use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport identity of the actor owning web-form submissions. Real
/// transport ids are never zero.
pub const WEB_ACTOR_EXTERNAL_ID: i64 = 0;

/// Conversation endpoint id reserved for web-form submissions.
pub const WEB_CHAT_ID: i64 = 0;

/// An end-user or admin, created on first observed interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    /// Stable identity assigned by the chat transport.
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile fields observed on an inbound event; the upsert input for `Actor`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ActorProfile {
    pub fn new(external_id: i64) -> Self {
        Self {
            external_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    /// Reserved endpoint owning issues submitted through the web form.
    Web,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::Channel => "channel",
            Self::Web => "web",
        }
    }

    /// Unknown kinds are treated as group-like so they never reach intake.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "private" => Self::Private,
            "supergroup" => Self::Supergroup,
            "channel" => Self::Channel,
            "web" => Self::Web,
            _ => Self::Group,
        }
    }

    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}

/// A conversation endpoint: a destination for outbound sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
}

impl Chat {
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ChatKind::Private,
            title: None,
        }
    }

    pub fn web() -> Self {
        Self {
            id: WEB_CHAT_ID,
            kind: ChatKind::Web,
            title: Some("Web Issues".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_kind_round_trips_known_labels() {
        for kind in [
            ChatKind::Private,
            ChatKind::Group,
            ChatKind::Supergroup,
            ChatKind::Channel,
            ChatKind::Web,
        ] {
            assert_eq!(ChatKind::parse(kind.as_str()), kind);
        }
        assert_eq!(ChatKind::parse("forum"), ChatKind::Group);
    }
}
