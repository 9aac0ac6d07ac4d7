//! The capabilities the core consumes from the chat platform.

use async_trait::async_trait;
use std::time::Duration;
use warden_types::{ChannelId, RoleId, ScopeId, SubjectId};

use crate::error::PlatformError;
use crate::model::{CommandSpec, InteractionRef, InteractionResponse, Member, MessageRef, OutgoingMessage};

/// Everything warden needs from a chat platform.
///
/// Every call crosses the process boundary and may fail; callers decide
/// whether a failure is fatal (it rarely is).
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Delete a posted message.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), PlatformError>;

    /// Prevent a member from communicating for `duration`, with an audit reason.
    async fn restrict_member(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        duration: Duration,
        reason: &str,
    ) -> Result<(), PlatformError>;

    /// Post a message into a channel or thread.
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError>;

    /// Fetch a member of a community.
    async fn fetch_member(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
    ) -> Result<Member, PlatformError>;

    async fn add_role(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        role: &RoleId,
    ) -> Result<(), PlatformError>;

    async fn remove_role(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        role: &RoleId,
    ) -> Result<(), PlatformError>;

    /// Create a private sub-conversation under `parent` and return its id.
    async fn create_private_thread(
        &self,
        parent: &ChannelId,
        name: &str,
        auto_archive_minutes: u32,
        reason: &str,
    ) -> Result<ChannelId, PlatformError>;

    async fn add_thread_member(
        &self,
        thread: &ChannelId,
        subject: &SubjectId,
    ) -> Result<(), PlatformError>;

    async fn archive_thread(&self, thread: &ChannelId) -> Result<(), PlatformError>;

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), PlatformError>;

    /// Answer a UI interaction with a reply or a modal.
    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError>;

    /// Replace the bot's registered slash commands.
    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), PlatformError>;
}
