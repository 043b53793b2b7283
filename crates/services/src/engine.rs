//! # Inbound Dispatcher
//!
//! `BotEngine` is the single `EventHandler` the transport adapters feed.
//! It records who spoke where, then routes the event to the service that
//! owns it and turns failures into the short inline replies actors see.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use domains::catalog::{is_category, is_district};
use domains::models::{
    Action, Actor, GeoPoint, InboundEvent, IncomingAction, IncomingMessage, MediaSource,
    OutboundMessage, PageRequest,
};
use domains::{DomainError, EventHandler, Result};

use crate::broadcast::{BroadcastService, DEFAULT_SEND_DELAY};
use crate::comments::CommentService;
use crate::digest::DigestService;
use crate::export::{ExportPeriod, ExportService};
use crate::intake::{IntakeService, LocationOutcome};
use crate::moderation::ModerationService;
use crate::session::SessionRegistry;
use crate::status::{Authority, StatusService};
use crate::{texts, Ports};

#[derive(Clone)]
pub struct EngineSettings {
    /// Shared secret accepted by `/admin <secret>`.
    pub admin_secret: String,
    pub broadcast_delay: Duration,
}

impl EngineSettings {
    pub fn new(admin_secret: impl Into<String>) -> Self {
        Self {
            admin_secret: admin_secret.into(),
            broadcast_delay: DEFAULT_SEND_DELAY,
        }
    }
}

pub struct BotEngine {
    ports: Ports,
    sessions: Arc<SessionRegistry>,
    settings: EngineSettings,
    intake: IntakeService,
    moderation: ModerationService,
    status: StatusService,
    comments: CommentService,
    broadcast: BroadcastService,
    export: ExportService,
    digest: Arc<DigestService>,
}

impl BotEngine {
    pub fn new(ports: Ports, settings: EngineSettings) -> Self {
        let sessions = Arc::new(SessionRegistry::new());
        let digest = Arc::new(DigestService::new(ports.clone()));
        Self {
            intake: IntakeService::new(ports.clone(), sessions.clone(), digest.clone()),
            moderation: ModerationService::new(ports.clone(), sessions.clone()),
            status: StatusService::new(ports.clone()),
            comments: CommentService::new(ports.clone(), sessions.clone()),
            broadcast: BroadcastService::new(
                ports.clone(),
                sessions.clone(),
                settings.broadcast_delay,
            ),
            export: ExportService::new(ports.store.clone()),
            digest,
            sessions,
            settings,
            ports,
        }
    }

    // The HTTP surface converges on the same services.

    pub fn intake(&self) -> &IntakeService {
        &self.intake
    }

    pub fn moderation(&self) -> &ModerationService {
        &self.moderation
    }

    pub fn status(&self) -> &StatusService {
        &self.status
    }

    pub fn comments(&self) -> &CommentService {
        &self.comments
    }

    pub fn export(&self) -> &ExportService {
        &self.export
    }

    pub fn digest(&self) -> &DigestService {
        &self.digest
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    async fn on_message(&self, message: IncomingMessage) {
        let chat_id = message.chat.id;
        let actor = match self.ports.store.upsert_actor(&message.from).await {
            Ok(actor) => actor,
            Err(err) => {
                tracing::error!(chat_id, error = %err, "actor upsert failed");
                self.ports.reply(chat_id, texts::GENERIC_FAILURE).await;
                return;
            }
        };
        if let Err(err) = self.ports.store.upsert_chat(&message.chat).await {
            tracing::error!(chat_id, error = %err, "chat upsert failed");
        }

        if let Some((name, args)) = message.command() {
            let result = self.on_command(&message, &actor, name, args).await;
            self.report(chat_id, result).await;
            return;
        }

        // Groups only take commands.
        if !message.chat.kind.is_private() {
            return;
        }

        let result = self.route_private(&message, &actor).await;
        self.report(chat_id, result).await;
    }

    async fn route_private(&self, message: &IncomingMessage, actor: &Actor) -> Result<()> {
        let chat_id = message.chat.id;
        let actor_id = actor.external_id;
        let text = message.trimmed_text();

        match text {
            texts::MENU_MY_ISSUES => {
                return self
                    .moderation
                    .render_own_issues(chat_id, actor_id, PageRequest::first())
                    .await;
            }
            texts::MENU_HELP => {
                self.ports.reply(chat_id, texts::HELP_MENU).await;
                return Ok(());
            }
            texts::MENU_PREVIOUS | texts::MENU_NEXT => {
                let forward = text == texts::MENU_NEXT;
                return self
                    .moderation
                    .turn_page(chat_id, actor_id, forward)
                    .await
                    .map(|_| ());
            }
            _ => {}
        }

        if let Some(point) = message.location.filter(|_| !message.has_issue_content()) {
            return self.on_location(chat_id, actor, point).await;
        }

        if is_district(text) {
            self.intake.choose_district(chat_id, actor_id, text).await;
            return Ok(());
        }
        if is_category(text) {
            return self.intake.choose_category(chat_id, actor_id, text).await;
        }

        if !text.is_empty() && self.sessions.pending_comment(actor_id).is_some() {
            return self
                .comments
                .commit_pending(chat_id, actor_id, text)
                .await
                .map(|_| ());
        }

        if message.has_issue_content() {
            return match self.intake.submit(message, actor).await {
                Ok(_) => Ok(()),
                Err(DomainError::Storage(err)) => {
                    tracing::error!(chat_id, error = %err, "issue creation failed");
                    self.ports.reply(chat_id, texts::ISSUE_CREATE_FAILED).await;
                    Ok(())
                }
                Err(err) => Err(err),
            };
        }
        Ok(())
    }

    async fn on_location(&self, chat_id: i64, actor: &Actor, point: GeoPoint) -> Result<()> {
        let reply = match self.intake.attach_location(actor, point).await? {
            LocationOutcome::Attached(issue) => texts::location_attached(issue.id),
            LocationOutcome::NoEligibleIssue => texts::LOCATION_NO_ELIGIBLE.to_string(),
            LocationOutcome::NoPriorContext => texts::LOCATION_SEND_TEXT_FIRST.to_string(),
        };
        self.ports.reply(chat_id, reply).await;
        Ok(())
    }

    async fn on_command(
        &self,
        message: &IncomingMessage,
        actor: &Actor,
        name: &str,
        args: &str,
    ) -> Result<()> {
        let chat_id = message.chat.id;
        let actor_id = actor.external_id;
        tracing::debug!(chat_id, actor_id, command = name, "command received");

        match name {
            "start" => self.intake.begin(chat_id, actor_id, true).await,
            "add" => self.intake.begin(chat_id, actor_id, false).await,
            "help" => self.ports.reply(chat_id, texts::HELP_COMMAND).await,
            "my" => {
                self.moderation
                    .render_own_issues(chat_id, actor_id, PageRequest::first())
                    .await?
            }
            "admin" => self.promote(chat_id, actor_id, args).await?,
            "issues" => self.moderation.open_admin_list(chat_id, actor_id).await?,
            "issues_filter" => self.moderation.show_filter_menu(chat_id, actor_id).await?,
            "broadcast" => self.broadcast.draft(chat_id, actor_id, args).await?,
            "export" => self.send_export(chat_id, actor_id, args).await?,
            other if other.to_lowercase().contains("faq") => {
                self.ports.reply(chat_id, texts::HELP_COMMAND).await
            }
            _ => {}
        }
        Ok(())
    }

    async fn promote(&self, chat_id: i64, actor_id: i64, secret: &str) -> Result<()> {
        if secret.is_empty() {
            return Err(DomainError::Validation(texts::ADMIN_USAGE.to_string()));
        }
        if secret != self.settings.admin_secret {
            tracing::warn!(actor_id, "admin bootstrap with a wrong secret");
            self.ports.reply(chat_id, texts::ADMIN_WRONG_SECRET).await;
            return Ok(());
        }
        self.ports.store.promote_to_admin(actor_id).await?;
        tracing::info!(actor_id, "actor promoted to admin");
        self.ports.reply(chat_id, texts::ADMIN_GRANTED).await;
        Ok(())
    }

    async fn send_export(&self, chat_id: i64, actor_id: i64, args: &str) -> Result<()> {
        self.ports.require_admin(actor_id).await?;
        let period = ExportPeriod::parse(args)?;
        let csv = self.export.csv(period).await?;
        let (from, to) = period.label();
        let document = OutboundMessage::Document {
            source: MediaSource::Bytes {
                file_name: texts::EXPORT_FILE_NAME.to_string(),
                data: Bytes::from(csv),
            },
            caption: Some(texts::export_done(&from, &to)),
        };
        self.ports.send(chat_id, document).await;
        Ok(())
    }

    async fn on_action(&self, event: IncomingAction) {
        if let Err(err) = self.ports.store.upsert_actor(&event.from).await {
            tracing::error!(error = %err, "actor upsert failed");
        }
        let actor_id = event.from.external_id;
        let chat_id = event.chat_id;

        let answer = match event.action {
            None => {
                tracing::debug!(actor_id, "undecodable inline action");
                String::new()
            }
            Some(action) => self.run_action(chat_id, actor_id, action).await,
        };

        if let Err(err) = self
            .ports
            .transport
            .answer_action(&event.callback_id, &answer)
            .await
        {
            tracing::warn!(chat_id, error = %err, "inline action answer failed");
        }
    }

    /// Executes one inline action and returns the short answer for it.
    async fn run_action(&self, chat_id: i64, actor_id: i64, action: Action) -> String {
        match action {
            Action::Page { view, page } => {
                let page = PageRequest::new(i64::from(page));
                match self.moderation.show_page(chat_id, actor_id, view, page).await {
                    Ok(()) => texts::page_answer(page.number()),
                    Err(err) => action_failure(&err),
                }
            }
            Action::SetFilter { dimension, value } => {
                match self
                    .moderation
                    .set_filter(chat_id, actor_id, dimension, value)
                    .await
                {
                    Ok(answer) => answer.to_string(),
                    Err(err) => action_failure(&err),
                }
            }
            Action::ChangeStatus { issue_id, status } => {
                match self
                    .status
                    .set_status(issue_id, status, Authority::ChatAdmin(actor_id), None)
                    .await
                {
                    Ok(_) => texts::status_answer(issue_id, status),
                    Err(DomainError::PermissionDenied) => texts::ACTION_DENIED.to_string(),
                    Err(err) => {
                        tracing::error!(issue_id, error = %err, "inline status change failed");
                        texts::STATUS_FAILED.to_string()
                    }
                }
            }
            Action::AddComment { issue_id } => match self.comments.request(actor_id, issue_id).await {
                Ok(()) => {
                    let prompt = texts::comment_prompt(issue_id);
                    self.ports.reply(chat_id, prompt.clone()).await;
                    prompt
                }
                Err(err) => action_failure(&err),
            },
            Action::BroadcastConfirm => match self.broadcast.confirm(chat_id, actor_id).await {
                Ok(true) => texts::BROADCAST_STARTED.to_string(),
                Ok(false) => texts::BROADCAST_NO_DRAFT.to_string(),
                Err(err) => action_failure(&err),
            },
            Action::BroadcastCancel => {
                if self.broadcast.cancel(actor_id) {
                    texts::BROADCAST_CANCELLED.to_string()
                } else {
                    texts::BROADCAST_NO_DRAFT.to_string()
                }
            }
        }
    }

    /// Inline reply for a failed message-driven operation.
    async fn report(&self, chat_id: i64, result: Result<()>) {
        let Err(err) = result else {
            return;
        };
        match &err {
            DomainError::Storage(_) | DomainError::Delivery(_) => {
                tracing::error!(chat_id, error = %err, "request failed")
            }
            _ => tracing::debug!(chat_id, error = %err, "request rejected"),
        }
        self.ports.reply(chat_id, texts::for_error(&err)).await;
    }
}

fn action_failure(err: &DomainError) -> String {
    match err {
        DomainError::PermissionDenied => texts::ACTION_DENIED.to_string(),
        DomainError::Storage(_) | DomainError::Delivery(_) => {
            tracing::error!(error = %err, "inline action failed");
            texts::GENERIC_FAILURE.to_string()
        }
        other => texts::for_error(other),
    }
}

#[async_trait]
impl EventHandler for BotEngine {
    async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message(message) => self.on_message(message).await,
            InboundEvent::Action(action) => self.on_action(action).await,
        }
    }
}
