//! Inbound events as the core sees them, already decoded from the transport.

use serde::{Deserialize, Serialize};

use super::{Action, ActorProfile, Chat, GeoPoint};

/// A transport file reference plus the original file name when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub file_ref: String,
    pub file_name: Option<String>,
}

impl MediaFile {
    pub fn new(file_ref: impl Into<String>) -> Self {
        Self {
            file_ref: file_ref.into(),
            file_name: None,
        }
    }
}

/// A message-type event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub from: ActorProfile,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Highest-resolution rendition only.
    pub photo: Option<MediaFile>,
    pub video: Option<MediaFile>,
    pub document: Option<MediaFile>,
    pub location: Option<GeoPoint>,
    /// Audio, voice or animation: content we count but do not store.
    pub has_other_media: bool,
}

impl IncomingMessage {
    /// A bare private text message; the shape most handlers start from.
    pub fn text(chat_id: i64, from: i64, text: impl Into<String>) -> Self {
        Self {
            message_id: 0,
            chat: Chat::private(chat_id),
            from: ActorProfile::new(from),
            text: Some(text.into()),
            caption: None,
            photo: None,
            video: None,
            document: None,
            location: None,
            has_other_media: false,
        }
    }

    /// Trimmed text, empty when absent.
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }

    /// Report body: text first, caption as fallback.
    pub fn body(&self) -> Option<String> {
        [self.text.as_deref(), self.caption.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Whether the message carries anything that can become an issue.
    /// A location on its own does not count.
    pub fn has_issue_content(&self) -> bool {
        self.body().is_some()
            || self.photo.is_some()
            || self.video.is_some()
            || self.document.is_some()
            || self.has_other_media
    }

    /// `/name@bot args` split into (`name`, `args`).
    pub fn command(&self) -> Option<(&str, &str)> {
        let text = self.text.as_deref()?.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or(head);
        if name.is_empty() {
            return None;
        }
        Some((name, args))
    }
}

/// An inline-action event (a pressed button).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingAction {
    /// Transport handle used to acknowledge the press.
    pub callback_id: String,
    pub chat_id: i64,
    pub from: ActorProfile,
    /// `None` when the payload did not decode.
    pub action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundEvent {
    Message(IncomingMessage),
    Action(IncomingAction),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_parsing_strips_bot_mention() {
        let msg = IncomingMessage::text(1, 1, "/broadcast@civic_bot  Hello all ");
        assert_eq!(msg.command(), Some(("broadcast", "Hello all")));
        assert_eq!(IncomingMessage::text(1, 1, "/my").command(), Some(("my", "")));
        assert_eq!(IncomingMessage::text(1, 1, "my").command(), None);
        assert_eq!(IncomingMessage::text(1, 1, "/").command(), None);
    }

    #[test]
    fn location_alone_is_not_issue_content() {
        let mut msg = IncomingMessage::text(1, 1, "   ");
        msg.location = Some(GeoPoint {
            latitude: 48.0,
            longitude: 37.8,
        });
        assert!(!msg.has_issue_content());

        msg.caption = Some("Pothole".into());
        assert!(msg.has_issue_content());
        assert_eq!(msg.body().as_deref(), Some("Pothole"));
    }
}
