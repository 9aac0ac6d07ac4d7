//! Inbound events produced by a platform adapter.

use std::collections::HashMap;
use warden_types::{ChannelId, MessageId, ScopeId, SubjectId};

use crate::model::{InteractionRef, MessageRef};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    /// The adapter is connected and authenticated.
    Ready { bot_user: SubjectId },
    MessageCreated(IncomingMessage),
    Interaction(Interaction),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    /// Declared MIME type, if the platform sniffed one.
    pub content_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    /// `None` for direct messages.
    pub scope: Option<ScopeId>,
    pub author: SubjectId,
    pub author_is_bot: bool,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl IncomingMessage {
    pub fn reference(&self) -> MessageRef {
        MessageRef {
            channel: self.channel.clone(),
            message: self.id.clone(),
        }
    }

    /// Declared content types of all attachments, skipping undeclared ones.
    pub fn attachment_kinds(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter_map(|a| a.content_type.clone())
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Command { name: String },
    Button { custom_id: String },
    Select { custom_id: String, values: Vec<String> },
    ModalSubmit {
        custom_id: String,
        fields: HashMap<String, String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interaction {
    pub reference: InteractionRef,
    /// `None` when invoked outside a community.
    pub scope: Option<ScopeId>,
    pub channel: ChannelId,
    pub channel_is_thread: bool,
    pub user: SubjectId,
    pub user_tag: String,
    /// The invoking member holds the administrator permission.
    pub is_admin: bool,
    pub kind: InteractionKind,
}
