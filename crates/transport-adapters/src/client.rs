//! Telegram Bot API client implementing the outbound `ChatTransport`.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use domains::models::{Keyboard, MediaSource, OutboundMessage};
use domains::{ChatTransport, DeliveryError};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::markup::reply_markup;
use crate::update::Update;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Bot API envelope: `{"ok": bool, "result": ..., "description": ...}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

/// The upload payload of a media send, either a reference the API can
/// resolve itself or bytes that go out as multipart.
enum Upload {
    Reference(String),
    File { file_name: String, data: Bytes },
}

pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: SecretString,
    /// Root the `MediaStore` locators are relative to.
    upload_root: PathBuf,
}

impl TelegramClient {
    pub fn new(
        api_base: impl Into<String>,
        token: SecretString,
        upload_root: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            upload_root: upload_root.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{file_path}",
            self.api_base,
            self.token.expose_secret()
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
    ) -> Result<T, DeliveryError> {
        // The token is part of the URL; never let it reach an error message.
        let response = request
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(format!("{method}: {}", err.without_url())))?;
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|err| DeliveryError::Transport(format!("{method}: {}", err.without_url())))?;

        if !envelope.ok {
            return Err(DeliveryError::Rejected(
                envelope
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            ));
        }
        envelope
            .result
            .ok_or_else(|| DeliveryError::Rejected(format!("{method}: empty result")))
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, DeliveryError> {
        let request = self.http.post(self.method_url(method)).json(&body);
        self.call(request, method).await
    }

    /// Long-poll for updates starting at `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, DeliveryError> {
        let request = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(REQUEST_TIMEOUT + Duration::from_secs(timeout_secs))
            .json(&json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }));
        self.call(request, "getUpdates").await
    }

    /// Registers the push endpoint. Telegram echoes `secret` back in the
    /// `X-Telegram-Bot-Api-Secret-Token` header of every delivery.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), DeliveryError> {
        let mut body = json!({
            "url": url,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(secret) = secret {
            body["secret_token"] = json!(secret);
        }
        let _: bool = self.call_json("setWebhook", body).await?;
        Ok(())
    }

    /// Required before polling; Telegram refuses getUpdates while a webhook is set.
    pub async fn delete_webhook(&self) -> Result<(), DeliveryError> {
        let _: bool = self.call_json("deleteWebhook", json!({})).await?;
        Ok(())
    }

    async fn resolve(&self, source: MediaSource) -> Result<Upload, DeliveryError> {
        match source {
            MediaSource::Remote(file_id) => Ok(Upload::Reference(file_id)),
            MediaSource::Bytes { file_name, data } => Ok(Upload::File { file_name, data }),
            MediaSource::Stored(locator) => {
                let relative = Path::new(&locator);
                if !relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
                {
                    return Err(DeliveryError::Rejected(format!(
                        "invalid media locator: {locator}"
                    )));
                }
                let data = tokio::fs::read(self.upload_root.join(relative))
                    .await
                    .map_err(|err| DeliveryError::Transport(format!("read {locator}: {err}")))?;
                let file_name = relative
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("file")
                    .to_string();
                Ok(Upload::File {
                    file_name,
                    data: Bytes::from(data),
                })
            }
        }
    }

    async fn send_media(
        &self,
        method: &str,
        field: &str,
        chat_id: i64,
        source: MediaSource,
        caption: Option<String>,
        keyboard: Option<Keyboard>,
    ) -> Result<i64, DeliveryError> {
        let sent: SentMessage = match self.resolve(source).await? {
            Upload::Reference(file_id) => {
                let mut body = Map::new();
                body.insert("chat_id".into(), json!(chat_id));
                body.insert(field.into(), json!(file_id));
                if let Some(caption) = caption {
                    body.insert("caption".into(), json!(caption));
                }
                if let Some(keyboard) = &keyboard {
                    body.insert("reply_markup".into(), reply_markup(keyboard));
                }
                self.call_json(method, Value::Object(body)).await?
            }
            Upload::File { file_name, data } => {
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .part(field.to_string(), Part::bytes(data.to_vec()).file_name(file_name));
                if let Some(caption) = caption {
                    form = form.text("caption", caption);
                }
                if let Some(keyboard) = &keyboard {
                    form = form.text("reply_markup", reply_markup(keyboard).to_string());
                }
                let request = self.http.post(self.method_url(method)).multipart(form);
                self.call(request, method).await?
            }
        };
        Ok(sent.message_id)
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> Result<i64, DeliveryError> {
        match message {
            OutboundMessage::Text { text, keyboard } => {
                let mut body = json!({
                    "chat_id": chat_id,
                    "text": text,
                    "disable_web_page_preview": true,
                });
                if let Some(keyboard) = &keyboard {
                    body["reply_markup"] = reply_markup(keyboard);
                }
                let sent: SentMessage = self.call_json("sendMessage", body).await?;
                Ok(sent.message_id)
            }
            OutboundMessage::Photo {
                source,
                caption,
                keyboard,
            } => {
                self.send_media("sendPhoto", "photo", chat_id, source, caption, keyboard)
                    .await
            }
            OutboundMessage::Video { source } => {
                self.send_media("sendVideo", "video", chat_id, source, None, None)
                    .await
            }
            OutboundMessage::Document { source, caption } => {
                self.send_media("sendDocument", "document", chat_id, source, caption, None)
                    .await
            }
        }
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), DeliveryError> {
        let _: bool = self
            .call_json(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn answer_action(&self, callback_id: &str, text: &str) -> Result<(), DeliveryError> {
        let mut body = json!({ "callback_query_id": callback_id });
        if !text.is_empty() {
            body["text"] = json!(text);
        }
        let _: bool = self.call_json("answerCallbackQuery", body).await?;
        Ok(())
    }

    async fn download_file(&self, file_ref: &str) -> Result<Bytes, DeliveryError> {
        let info: FileInfo = self
            .call_json("getFile", json!({ "file_id": file_ref }))
            .await?;
        let file_path = info
            .file_path
            .ok_or_else(|| DeliveryError::Rejected(format!("file {file_ref} is not downloadable")))?;

        let response = self
            .http
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(format!("download: {}", err.without_url())))?;
        if !response.status().is_success() {
            return Err(DeliveryError::Rejected(format!(
                "download returned {}",
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map_err(|err| DeliveryError::Transport(format!("download: {}", err.without_url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer, root: &Path) -> TelegramClient {
        TelegramClient::new(server.base_url(), SecretString::from("T0KEN".to_string()), root).unwrap()
    }

    #[tokio::test]
    async fn text_send_returns_message_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botT0KEN/sendMessage")
                .body_includes("\"chat_id\":42")
                .body_includes("inline_keyboard");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"ok":true,"result":{"message_id":777,"chat":{"id":42,"type":"private"}}}"#);
        });

        let keyboard = Keyboard::Inline(vec![vec![domains::models::InlineButton::new(
            "ok",
            domains::models::Action::BroadcastConfirm,
        )]]);
        let id = client(&server, Path::new("."))
            .send(42, OutboundMessage::with_keyboard("hi", keyboard))
            .await
            .unwrap();
        assert_eq!(id, 777);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn api_refusal_becomes_rejected_without_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/botT0KEN/sendMessage");
            then.status(403)
                .header("content-type", "application/json")
                .body(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#);
        });

        let err = client(&server, Path::new("."))
            .send(1, OutboundMessage::text("hi"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected("Forbidden: bot was blocked by the user".into())
        );
        assert!(!err.to_string().contains("T0KEN"));
    }

    #[tokio::test]
    async fn stored_media_is_uploaded_as_multipart() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("ab/cd")).unwrap();
        std::fs::write(root.path().join("ab/cd/abcd.jpg"), b"jpeg-bytes").unwrap();

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botT0KEN/sendPhoto")
                .header_exists("content-type")
                .body_includes("jpeg-bytes");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"ok":true,"result":{"message_id":5}}"#);
        });

        let id = client(&server, root.path())
            .send(
                9,
                OutboundMessage::Photo {
                    source: MediaSource::Stored("ab/cd/abcd.jpg".into()),
                    caption: Some("#1".into()),
                    keyboard: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(id, 5);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn locator_escaping_upload_root_is_refused() {
        let server = MockServer::start();
        let result = client(&server, Path::new("/srv/uploads"))
            .send(
                9,
                OutboundMessage::Document {
                    source: MediaSource::Stored("../../etc/passwd".into()),
                    caption: None,
                },
            )
            .await;
        assert!(matches!(result, Err(DeliveryError::Rejected(_))));
    }

    #[tokio::test]
    async fn download_resolves_file_path_first() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/botT0KEN/getFile")
                .body_includes("\"file_id\":\"AgAD\"");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"ok":true,"result":{"file_id":"AgAD","file_path":"photos/file_1.jpg"}}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/file/botT0KEN/photos/file_1.jpg");
            then.status(200).body("raw");
        });

        let data = client(&server, Path::new("."))
            .download_file("AgAD")
            .await
            .unwrap();
        assert_eq!(&data[..], b"raw");
    }
}
