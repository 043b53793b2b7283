//! Outbound message shapes handed to the `ChatTransport`.

use bytes::Bytes;

use super::{Action, Attachment};

/// Where the transport should take media bytes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A `MediaStore` locator (uploaded from local storage).
    Stored(String),
    /// A transport file reference (re-sent without upload).
    Remote(String),
    /// In-memory payload, e.g. a generated export.
    Bytes { file_name: String, data: Bytes },
}

impl MediaSource {
    /// Local copy when we have one, otherwise the transport reference.
    pub fn for_attachment(attachment: &Attachment) -> Self {
        if attachment.locator.is_empty() {
            Self::Remote(attachment.file_ref.clone())
        } else {
            Self::Stored(attachment.locator.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: Action,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Persistent reply keyboard; pressing a key sends its label as text.
    Reply(Vec<Vec<String>>),
    /// Buttons attached to one message.
    Inline(Vec<Vec<InlineButton>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        source: MediaSource,
        caption: Option<String>,
        keyboard: Option<Keyboard>,
    },
    Video {
        source: MediaSource,
    },
    Document {
        source: MediaSource,
        caption: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Text {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Plain follow-up for a non-primary attachment.
    pub fn attachment(attachment: &Attachment) -> Self {
        let source = MediaSource::for_attachment(attachment);
        match attachment.kind {
            super::AttachmentKind::Photo => Self::Photo {
                source,
                caption: None,
                keyboard: None,
            },
            super::AttachmentKind::Video => Self::Video { source },
            super::AttachmentKind::Document => Self::Document {
                source,
                caption: None,
            },
        }
    }

    /// Text or caption, whichever this message carries.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Photo { caption, .. } | Self::Document { caption, .. } => caption.as_deref(),
            Self::Video { .. } => None,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Self::Text { keyboard, .. } | Self::Photo { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}
