//! Slash commands, buttons, selects and modals for verification and tickets.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};
use warden_platform::{ChatPlatform, Interaction, InteractionKind, InteractionResponse, OutgoingMessage};
use warden_session::{verification_url, SessionStore};
use warden_types::{ChannelId, Clock, RoleId};

use crate::metrics::WardenMetrics;
use crate::panels::{self, TicketCategory};
use crate::tracing_spans::interaction_span;

/// Delay between archiving a closed ticket and deleting it.
pub const TICKET_DELETE_DELAY: Duration = Duration::from_secs(5);

/// Values the interaction flows need from configuration.
#[derive(Clone, Debug)]
pub struct InteractionSettings {
    pub verify_base_url: String,
    pub service_tag: String,
    pub ticket_role: RoleId,
    pub staff_role: RoleId,
}

pub struct InteractionHandler {
    platform: Arc<dyn ChatPlatform>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<WardenMetrics>,
    settings: InteractionSettings,
    delete_delay: Duration,
    pending_deletes: Mutex<JoinSet<()>>,
}

impl InteractionHandler {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<WardenMetrics>,
        settings: InteractionSettings,
    ) -> Self {
        Self {
            platform,
            sessions,
            clock,
            metrics,
            settings,
            delete_delay: TICKET_DELETE_DELAY,
            pending_deletes: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = delay;
        self
    }

    pub async fn handle(&self, interaction: Interaction) {
        let kind = match &interaction.kind {
            InteractionKind::Command { .. } => "command",
            InteractionKind::Button { .. } => "button",
            InteractionKind::Select { .. } => "select",
            InteractionKind::ModalSubmit { .. } => "modal",
        };
        self.metrics.interactions.with_label_values(&[kind]).inc();
        let span = interaction_span(kind, interaction.user.as_str());

        async {
            let response = match &interaction.kind {
                InteractionKind::Command { name } => self.on_command(&interaction, name).await,
                InteractionKind::Button { custom_id } => self.on_button(&interaction, custom_id).await,
                InteractionKind::Select { custom_id, values } => {
                    on_select(custom_id, values)
                }
                InteractionKind::ModalSubmit { custom_id, fields } => {
                    let title = fields.get(panels::TICKET_TITLE_INPUT).map(String::as_str);
                    self.on_ticket_modal(&interaction, custom_id, title).await
                }
            };
            if let Some(response) = response {
                self.respond(&interaction, response).await;
            }
        }
        .instrument(span)
        .await
    }

    async fn respond(&self, interaction: &Interaction, response: InteractionResponse) {
        if let Err(e) = self.platform.respond(&interaction.reference, &response).await {
            warn!(user = %interaction.user, error = %e, "failed to answer interaction");
        }
    }

    async fn on_command(&self, interaction: &Interaction, name: &str) -> Option<InteractionResponse> {
        let message = match name {
            panels::CMD_VERIFY | panels::CMD_TICKET if !interaction.is_admin || interaction.scope.is_none() => {
                panels::refusal("Only administrators can use this command.")
            }
            panels::CMD_VERIFY => panels::verification_panel(),
            panels::CMD_TICKET => panels::ticket_panel(),
            panels::CMD_TICKET_CLOSE => {
                self.close_ticket(interaction).await;
                return None;
            }
            other => {
                debug!(command = other, "ignoring unknown command");
                return None;
            }
        };
        Some(InteractionResponse::Message(message))
    }

    async fn on_button(&self, interaction: &Interaction, custom_id: &str) -> Option<InteractionResponse> {
        let message = match custom_id {
            panels::START_VERIFICATION => self.start_verification(interaction).await,
            panels::CREATE_TICKET => panels::category_picker(),
            other => {
                debug!(custom_id = other, "ignoring unknown button");
                return None;
            }
        };
        Some(InteractionResponse::Message(message))
    }

    async fn start_verification(&self, interaction: &Interaction) -> OutgoingMessage {
        let Some(scope) = interaction.scope.clone() else {
            return panels::refusal("Verification only works inside a server.");
        };
        match self.sessions.create(interaction.user.clone(), scope.clone()).await {
            Ok(session) => {
                self.metrics.sessions_created.inc();
                info!(user = %interaction.user, scope = %scope, "verification session opened");
                let url = verification_url(
                    &self.settings.verify_base_url,
                    &self.settings.service_tag,
                    &session,
                );
                panels::verification_link(&url, self.sessions.ttl_ms() / 1000)
            }
            Err(e) => {
                warn!(user = %interaction.user, error = %e, "could not open verification session");
                panels::refusal("Could not start verification. Please try again.")
            }
        }
    }

    async fn on_ticket_modal(
        &self,
        interaction: &Interaction,
        custom_id: &str,
        title: Option<&str>,
    ) -> Option<InteractionResponse> {
        if !custom_id.starts_with(panels::TICKET_MODAL_PREFIX) {
            debug!(custom_id, "ignoring unknown modal");
            return None;
        }
        let message = self.open_ticket(interaction, custom_id, title).await;
        Some(InteractionResponse::Message(message))
    }

    async fn open_ticket(
        &self,
        interaction: &Interaction,
        custom_id: &str,
        title: Option<&str>,
    ) -> OutgoingMessage {
        let Some(category) = TicketCategory::from_modal_id(custom_id) else {
            return panels::refusal("Unknown ticket category.");
        };
        let title = title.map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return panels::refusal("Please enter a title for your ticket.");
        }
        let Some(scope) = &interaction.scope else {
            return panels::refusal("Tickets can only be opened inside a server.");
        };

        if let Err(e) = self
            .platform
            .add_role(scope, &interaction.user, &self.settings.ticket_role)
            .await
        {
            warn!(user = %interaction.user, role = %self.settings.ticket_role, error = %e, "failed to add ticket role");
        }

        let name = panels::thread_name(category, title);
        let reason = format!("Ticket opened by {}", interaction.user_tag);
        let thread = match self
            .platform
            .create_private_thread(
                &interaction.channel,
                &name,
                panels::THREAD_AUTO_ARCHIVE_MINUTES,
                &reason,
            )
            .await
        {
            Ok(thread) => thread,
            Err(e) => {
                warn!(user = %interaction.user, channel = %interaction.channel, error = %e, "failed to create ticket thread");
                return panels::refusal("Could not create the ticket. Please contact staff.");
            }
        };

        if let Err(e) = self.platform.add_thread_member(&thread, &interaction.user).await {
            warn!(thread = %thread, user = %interaction.user, error = %e, "failed to add member to ticket thread");
        }
        let welcome = panels::ticket_welcome(
            &interaction.user,
            &self.settings.staff_role,
            category,
            title,
            self.clock.now(),
        );
        if let Err(e) = self.platform.send_message(&thread, &welcome).await {
            warn!(thread = %thread, error = %e, "failed to post ticket welcome");
        }

        info!(user = %interaction.user, thread = %thread, category = category.value(), "ticket opened");
        panels::ticket_created(&thread)
    }

    async fn close_ticket(&self, interaction: &Interaction) {
        if !interaction.channel_is_thread {
            let refusal = panels::refusal("This command only works inside a ticket thread.");
            self.respond(interaction, InteractionResponse::Message(refusal)).await;
            return;
        }
        self.respond(interaction, InteractionResponse::Message(panels::closing_ticket()))
            .await;

        let thread = interaction.channel.clone();
        if let Err(e) = self.platform.archive_thread(&thread).await {
            warn!(thread = %thread, error = %e, "failed to archive ticket thread");
        }
        self.schedule_delete(thread);
    }

    fn schedule_delete(&self, thread: ChannelId) {
        let platform = self.platform.clone();
        let delay = self.delete_delay;
        let task = async move {
            tokio::time::sleep(delay).await;
            match platform.delete_channel(&thread).await {
                Ok(()) => info!(thread = %thread, "ticket thread deleted"),
                Err(e) => warn!(thread = %thread, error = %e, "failed to delete ticket thread"),
            }
        };
        match self.pending_deletes.lock() {
            Ok(mut pending) => {
                while pending.try_join_next().is_some() {}
                pending.spawn(task);
            }
            Err(_) => {
                tokio::spawn(task);
            }
        }
    }

    /// Wait for scheduled thread deletions, up to `timeout`.
    pub async fn drain_pending(&self, timeout: Duration) -> bool {
        let mut pending = match self.pending_deletes.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return true,
        };
        tokio::time::timeout(timeout, async {
            while pending.join_next().await.is_some() {}
        })
        .await
        .is_ok()
    }
}

fn on_select(custom_id: &str, values: &[String]) -> Option<InteractionResponse> {
    if custom_id != panels::TICKET_CATEGORY {
        debug!(custom_id, "ignoring unknown select menu");
        return None;
    }
    let response = match values.first().and_then(|v| TicketCategory::from_value(v)) {
        Some(category) => InteractionResponse::Modal(panels::ticket_modal(category)),
        None => InteractionResponse::Message(panels::refusal("Unknown ticket category.")),
    };
    Some(response)
}
