//! # Intake Workflow
//!
//! District, then category, then free-form content. Content sent without a
//! finished wizard becomes a direct report with no classification.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use domains::catalog::{is_category, is_district};
use domains::models::{
    Actor, ActorProfile, Attachment, AttachmentKind, Chat, GeoPoint, IncomingMessage, Issue,
    MediaFile, NewAttachment, NewIssue, OutboundMessage, WEB_ACTOR_EXTERNAL_ID,
};
use domains::{DomainError, Result};

use crate::digest::DigestService;
use crate::session::SessionRegistry;
use crate::{render, texts, Ports};

/// How long after creation an issue still accepts coordinates.
pub const LOCATION_WINDOW: TimeDelta = TimeDelta::minutes(10);

/// A submission from the public web form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebIssueForm {
    pub name: String,
    pub contact: String,
    pub district: String,
    pub category: String,
    pub description: String,
    pub location: Option<GeoPoint>,
}

impl WebIssueForm {
    /// Name and contact lines, a blank separator, then the description.
    fn compose_text(&self) -> String {
        let mut lines = Vec::new();
        let name = self.name.trim();
        let contact = self.contact.trim();
        if !name.is_empty() {
            lines.push(format!("Имя: {name}"));
        }
        if !contact.is_empty() {
            lines.push(format!("Контакт: {contact}"));
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Описание проблемы:".to_string());
        let description = self.description.trim();
        lines.push(if description.is_empty() {
            "(не заполнено)".to_string()
        } else {
            description.to_string()
        });
        lines.join("\n")
    }
}

/// Outcome of a bare geolocation message.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    Attached(Issue),
    /// The requester has issues, but none qualifies.
    NoEligibleIssue,
    /// The requester never reported anything.
    NoPriorContext,
}

pub struct IntakeService {
    ports: Ports,
    sessions: Arc<SessionRegistry>,
    digest: Arc<DigestService>,
}

impl IntakeService {
    pub fn new(ports: Ports, sessions: Arc<SessionRegistry>, digest: Arc<DigestService>) -> Self {
        Self {
            ports,
            sessions,
            digest,
        }
    }

    /// `/start` and `/add`: forget any wizard progress and ask for a district.
    pub async fn begin(&self, chat_id: i64, actor: i64, greet: bool) {
        self.sessions.clear_wizard(actor);
        let prompt = if greet {
            self.ports.reply(chat_id, texts::greeting()).await;
            texts::START_CHOOSE_DISTRICT
        } else {
            texts::ADD_CHOOSE_DISTRICT
        };
        self.ports
            .send(
                chat_id,
                OutboundMessage::with_keyboard(prompt, render::district_keyboard()),
            )
            .await;
    }

    pub async fn choose_district(&self, chat_id: i64, actor: i64, district: &str) {
        self.sessions.choose_district(actor, district);
        self.ports
            .send(
                chat_id,
                OutboundMessage::with_keyboard(
                    texts::district_chosen(district),
                    render::category_keyboard(),
                ),
            )
            .await;
    }

    /// Fails validation when no district was chosen first.
    pub async fn choose_category(&self, chat_id: i64, actor: i64, category: &str) -> Result<()> {
        let state = self
            .sessions
            .choose_category(actor, category)
            .ok_or_else(|| DomainError::Validation(texts::CATEGORY_BEFORE_DISTRICT.to_string()))?;
        let district = state.district.unwrap_or_default();
        self.ports
            .reply(chat_id, texts::category_chosen(&district, category))
            .await;
        Ok(())
    }

    /// Finalizes a report from `message`, classified when the owner's wizard
    /// is complete. Attachments are stored best-effort after the issue.
    pub async fn submit(&self, message: &IncomingMessage, owner: &Actor) -> Result<Issue> {
        let classification = self
            .sessions
            .wizard(owner.external_id)
            .and_then(|w| w.completed());
        let (district, category) = match classification.clone() {
            Some((d, c)) => (Some(d), Some(c)),
            None => (None, None),
        };

        let issue = self
            .ports
            .store
            .create_issue(NewIssue {
                user_id: owner.id,
                chat_id: message.chat.id,
                text: message.body(),
                location: message.location,
                district,
                category,
            })
            .await?;
        tracing::info!(
            issue_id = issue.id,
            user_id = owner.id,
            classified = classification.is_some(),
            "issue created"
        );

        self.store_message_attachments(&issue, message).await;

        let acknowledgement = if classification.is_some() {
            self.sessions.clear_wizard(owner.external_id);
            texts::acknowledgement(issue.id)
        } else {
            texts::direct_acknowledgement(issue.id)
        };
        self.ports.reply(message.chat.id, acknowledgement).await;

        self.digest.on_issue_submitted().await;
        Ok(issue)
    }

    async fn store_message_attachments(&self, issue: &Issue, message: &IncomingMessage) {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        if let Some(photo) = &message.photo {
            let name = format!("issue_{}_photo_{nanos}.jpg", issue.id);
            self.store_media(issue.id, photo, AttachmentKind::Photo, &name)
                .await;
        }
        if let Some(video) = &message.video {
            let ext = video
                .file_name
                .as_deref()
                .and_then(|n| Path::new(n).extension())
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_else(|| ".mp4".to_string());
            let name = format!("issue_{}_video_{nanos}{ext}", issue.id);
            self.store_media(issue.id, video, AttachmentKind::Video, &name)
                .await;
        }
        if let Some(document) = &message.document {
            let name = document
                .file_name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("issue_{}_doc_{nanos}", issue.id));
            self.store_media(issue.id, document, AttachmentKind::Document, &name)
                .await;
        }
    }

    /// Download, save, record. Any failing step skips this attachment only.
    async fn store_media(&self, issue_id: i64, file: &MediaFile, kind: AttachmentKind, name: &str) {
        let data = match self.ports.transport.download_file(&file.file_ref).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(issue_id, kind = kind.as_str(), error = %err, "attachment download failed");
                return;
            }
        };
        let locator = match self.ports.media.save_upload(data, name).await {
            Ok(locator) => locator,
            Err(err) => {
                tracing::error!(issue_id, kind = kind.as_str(), error = %err, "attachment save failed");
                return;
            }
        };
        let attachment = NewAttachment {
            issue_id,
            file_ref: file.file_ref.clone(),
            kind,
            locator,
        };
        if let Err(err) = self.ports.store.add_attachment(attachment).await {
            tracing::error!(issue_id, kind = kind.as_str(), error = %err, "attachment record failed");
        }
    }

    /// A bare location: coordinates for the owner's latest fresh issue.
    pub async fn attach_location(&self, owner: &Actor, point: GeoPoint) -> Result<LocationOutcome> {
        if let Some(issue) = self
            .ports
            .store
            .attach_location(owner.id, point, LOCATION_WINDOW)
            .await?
        {
            tracing::info!(issue_id = issue.id, "location attached");
            return Ok(LocationOutcome::Attached(issue));
        }

        let history = self
            .ports
            .store
            .list_issues_by_owner(owner.id, 1, 0)
            .await?;
        Ok(if history.is_empty() {
            LocationOutcome::NoPriorContext
        } else {
            LocationOutcome::NoEligibleIssue
        })
    }

    pub async fn submit_web(&self, form: WebIssueForm) -> Result<Issue> {
        if !is_district(&form.district) {
            return Err(DomainError::Validation(format!(
                "unknown district: {}",
                form.district
            )));
        }
        if !is_category(&form.category) {
            return Err(DomainError::Validation(format!(
                "unknown category: {}",
                form.category
            )));
        }

        let owner = self
            .ports
            .store
            .upsert_actor(&ActorProfile {
                external_id: WEB_ACTOR_EXTERNAL_ID,
                username: Some("web_user".to_string()),
                first_name: Some("Web".to_string()),
                last_name: Some("User".to_string()),
            })
            .await?;
        let chat = Chat::web();
        self.ports.store.upsert_chat(&chat).await?;

        let issue = self
            .ports
            .store
            .create_issue(NewIssue {
                user_id: owner.id,
                chat_id: chat.id,
                text: Some(form.compose_text()),
                location: form.location,
                district: Some(form.district),
                category: Some(form.category),
            })
            .await?;
        tracing::info!(issue_id = issue.id, "web issue created");

        self.digest.on_issue_submitted().await;
        Ok(issue)
    }

    /// Stores an uploaded file against an existing issue.
    pub async fn add_web_attachment(
        &self,
        issue_id: i64,
        file_name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<Attachment> {
        self.ports
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| DomainError::issue_not_found(issue_id))?;

        let locator = self.ports.media.save_upload(data, file_name).await?;
        let attachment = self
            .ports
            .store
            .add_attachment(NewAttachment {
                issue_id,
                file_ref: file_name.to_string(),
                kind: AttachmentKind::from_mime(content_type),
                locator,
            })
            .await?;
        Ok(attachment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_text_lines() {
        let form = WebIssueForm {
            name: " Ирина ".into(),
            contact: "".into(),
            description: "Нет света".into(),
            ..WebIssueForm::default()
        };
        assert_eq!(form.compose_text(), "Имя: Ирина\n\nОписание проблемы:\nНет света");

        let empty = WebIssueForm::default();
        assert_eq!(empty.compose_text(), "Описание проблемы:\n(не заполнено)");
    }
}
