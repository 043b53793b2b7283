//! Shared fixtures for the cross-crate scenarios: a recording chat
//! transport with injectable failures, an in-process media store, and a
//! [`Harness`] that wires them to the in-memory issue store and the engine.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use domains::models::{
    Action, ActorProfile, Chat, GeoPoint, InboundEvent, IncomingAction, IncomingMessage, Keyboard,
    MediaFile, OutboundMessage,
};
use domains::{ChatTransport, DeliveryError, EventHandler, MediaStore, StoreError};
use services::{BotEngine, EngineSettings, Ports};
use storage_adapters::MemoryIssueStore;

pub const ADMIN_SECRET: &str = "letmein";

/// One outbound send as the transport saw it.
#[derive(Debug, Clone)]
pub struct Sent {
    pub chat_id: i64,
    pub message_id: i64,
    pub message: OutboundMessage,
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    last_id: AtomicI64,
    sent: Mutex<Vec<Sent>>,
    deleted: Mutex<Vec<(i64, i64)>>,
    answers: Mutex<Vec<(String, String)>>,
    failing_chats: Mutex<HashSet<i64>>,
    files: Mutex<HashMap<String, Bytes>>,
}

impl RecordingTransport {
    /// Every later send to `chat_id` fails.
    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    /// Makes `file_ref` downloadable.
    pub fn register_file(&self, file_ref: &str, data: &'static [u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(file_ref.to_string(), Bytes::from_static(data));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|s| s.chat_id == chat_id)
            .map(|s| s.message)
            .collect()
    }

    /// Text or caption of every message sent to `chat_id`.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent_to(chat_id)
            .iter()
            .filter_map(|m| m.text_content().map(str::to_string))
            .collect()
    }

    pub fn last_text_to(&self, chat_id: i64) -> Option<String> {
        self.texts_to(chat_id).pop()
    }

    pub fn deleted(&self) -> Vec<(i64, i64)> {
        self.deleted.lock().unwrap().clone()
    }

    /// `(callback_id, answer)` pairs, in order.
    pub fn answers(&self) -> Vec<(String, String)> {
        self.answers.lock().unwrap().clone()
    }

    pub fn last_answer(&self) -> Option<String> {
        self.answers().pop().map(|(_, text)| text)
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.deleted.lock().unwrap().clear();
        self.answers.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<i64, DeliveryError> {
        if self.failing_chats.lock().unwrap().contains(&chat_id) {
            return Err(DeliveryError::Rejected("Forbidden: bot was blocked by the user".into()));
        }
        let message_id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            message_id,
            message,
        });
        Ok(message_id)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), DeliveryError> {
        self.deleted.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn answer_action(&self, callback_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn download_file(&self, file_ref: &str) -> Result<Bytes, DeliveryError> {
        self.files
            .lock()
            .unwrap()
            .get(file_ref)
            .cloned()
            .ok_or_else(|| DeliveryError::Rejected("Bad Request: invalid file_id".into()))
    }
}

/// Keeps uploads in memory; locators are `media/<file name>`.
#[derive(Debug, Default)]
pub struct FakeMediaStore {
    saved: Mutex<Vec<(String, Bytes)>>,
}

impl FakeMediaStore {
    pub fn saved_names(&self) -> Vec<String> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn save_upload(&self, data: Bytes, file_name: &str) -> Result<String, StoreError> {
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), data));
        Ok(format!("media/{file_name}"))
    }
}

/// The engine over the in-memory store and recording fixtures.
pub struct Harness {
    pub store: Arc<MemoryIssueStore>,
    pub transport: Arc<RecordingTransport>,
    pub media: Arc<FakeMediaStore>,
    pub engine: Arc<BotEngine>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryIssueStore::new());
        let transport = Arc::new(RecordingTransport::default());
        let media = Arc::new(FakeMediaStore::default());
        let ports = Ports::new(store.clone(), transport.clone(), media.clone());
        let mut settings = EngineSettings::new(ADMIN_SECRET);
        settings.broadcast_delay = Duration::ZERO;
        let engine = Arc::new(BotEngine::new(ports, settings));
        Self {
            store,
            transport,
            media,
            engine,
        }
    }

    /// Private chats share the actor's id.
    pub async fn say(&self, user: i64, text: &str) {
        self.deliver(IncomingMessage::text(user, user, text)).await;
    }

    pub async fn deliver(&self, message: IncomingMessage) {
        self.engine.handle(InboundEvent::Message(message)).await;
    }

    pub async fn send_location(&self, user: i64, latitude: f64, longitude: f64) {
        let mut message = IncomingMessage::text(user, user, "");
        message.text = None;
        message.location = Some(GeoPoint {
            latitude,
            longitude,
        });
        self.deliver(message).await;
    }

    pub async fn send_photo(&self, user: i64, file_ref: &str, caption: &str) {
        let mut message = IncomingMessage::text(user, user, "");
        message.text = None;
        message.caption = Some(caption.to_string());
        message.photo = Some(MediaFile::new(file_ref));
        self.deliver(message).await;
    }

    pub async fn say_in_group(&self, group: i64, user: i64, text: &str) {
        let mut message = IncomingMessage::text(group, user, text);
        message.chat = Chat {
            id: group,
            kind: domains::models::ChatKind::Supergroup,
            title: Some("Городской чат".to_string()),
        };
        self.deliver(message).await;
    }

    pub async fn press(&self, user: i64, action: Action) {
        self.engine
            .handle(InboundEvent::Action(IncomingAction {
                callback_id: format!("cb-{user}"),
                chat_id: user,
                from: ActorProfile::new(user),
                action: Some(action),
            }))
            .await;
    }

    pub async fn promote(&self, user: i64) {
        self.say(user, &format!("/admin {ADMIN_SECRET}")).await;
    }

    /// Runs the wizard and submits `text`; returns the new issue id.
    pub async fn report(&self, user: i64, district: &str, category: &str, text: &str) -> i64 {
        self.say(user, "/add").await;
        self.say(user, district).await;
        self.say(user, category).await;
        self.say(user, text).await;
        self.latest_issue_id(user).await
    }

    pub async fn latest_issue_id(&self, user: i64) -> i64 {
        use domains::IssueStore;
        let owner = self
            .store
            .find_actor(user)
            .await
            .unwrap()
            .expect("actor was observed");
        self.store
            .list_issues_by_owner(owner.id, 1, 0)
            .await
            .unwrap()
            .first()
            .expect("owner has an issue")
            .id
    }

    /// Waits for detached work (broadcast fanout) to send `expected` to
    /// `chat_id`.
    pub async fn wait_for_text(&self, chat_id: i64, expected: &str) -> bool {
        for _ in 0..200 {
            if self.transport.texts_to(chat_id).iter().any(|t| t == expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

/// Inline buttons of a message, flattened.
pub fn inline_actions(message: &OutboundMessage) -> Vec<Action> {
    match message.keyboard() {
        Some(Keyboard::Inline(rows)) => rows
            .iter()
            .flatten()
            .map(|button| button.action.clone())
            .collect(),
        _ => Vec::new(),
    }
}
