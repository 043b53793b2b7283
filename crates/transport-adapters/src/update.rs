//! Wire shapes of Telegram updates and their decoding into domain events.
//!
//! Only the fields the bot reads are modelled; everything else in the
//! payload is ignored by serde.

use domains::models::{
    Action, ActorProfile, Chat, ChatKind, GeoPoint, InboundEvent, IncomingAction,
    IncomingMessage, MediaFile,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl From<User> for ActorProfile {
    fn from(user: User) -> Self {
        Self {
            external_id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
}

impl From<TgChat> for Chat {
    fn from(chat: TgChat) -> Self {
        Self {
            id: chat.id,
            kind: ChatKind::parse(&chat.kind),
            title: chat.title,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PhotoSize {
    file_id: String,
    #[serde(default)]
    width: i64,
    #[serde(default)]
    height: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct FileObject {
    file_id: String,
    file_name: Option<String>,
}

impl From<FileObject> for MediaFile {
    fn from(file: FileObject) -> Self {
        Self {
            file_ref: file.file_id,
            file_name: file.file_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct Message {
    message_id: i64,
    from: Option<User>,
    chat: TgChat,
    text: Option<String>,
    caption: Option<String>,
    #[serde(default)]
    photo: Vec<PhotoSize>,
    video: Option<FileObject>,
    document: Option<FileObject>,
    location: Option<Location>,
    audio: Option<Value>,
    voice: Option<Value>,
    animation: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct CallbackMessage {
    chat: TgChat,
}

#[derive(Debug, Clone, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<CallbackMessage>,
    data: Option<String>,
}

/// `None` for updates without a sender (channel posts) and for update
/// kinds the bot does not handle.
pub fn decode_update(update: Update) -> Option<InboundEvent> {
    if let Some(message) = update.message {
        return decode_message(message).map(InboundEvent::Message);
    }
    update
        .callback_query
        .map(|query| InboundEvent::Action(decode_callback(query)))
}

fn decode_message(message: Message) -> Option<IncomingMessage> {
    let from = message.from?;
    // Telegram lists every rendition; keep the largest.
    let photo = message
        .photo
        .into_iter()
        .max_by_key(|size| size.width * size.height)
        .map(|size| MediaFile::new(size.file_id));
    // Animations also carry a `document` twin; they are counted, not stored.
    let is_animation = message.animation.is_some();
    let document = message.document.filter(|_| !is_animation);
    let has_other_media = message.audio.is_some() || message.voice.is_some() || is_animation;

    Some(IncomingMessage {
        message_id: message.message_id,
        chat: message.chat.into(),
        from: from.into(),
        text: message.text,
        caption: message.caption,
        photo,
        video: message.video.map(MediaFile::from),
        document: document.map(MediaFile::from),
        location: message.location.map(|l| GeoPoint {
            latitude: l.latitude,
            longitude: l.longitude,
        }),
        has_other_media,
    })
}

fn decode_callback(query: CallbackQuery) -> IncomingAction {
    // A button on a message we can no longer see answers in the private chat.
    let chat_id = query
        .message
        .map(|m| m.chat.id)
        .unwrap_or(query.from.id);
    IncomingAction {
        callback_id: query.id,
        chat_id,
        action: query.data.as_deref().and_then(Action::decode),
        from: query.from.into(),
    }
}
