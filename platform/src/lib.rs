//! The chat platform as seen by the core.
//!
//! Moderation and verification never touch a concrete SDK. They talk to a
//! [`ChatPlatform`] (deleting messages, restricting members, granting roles,
//! posting notices) and consume [`ChatEvent`]s produced by an adapter.

pub mod capability;
pub mod error;
pub mod event;
pub mod model;

pub use capability::ChatPlatform;
pub use error::PlatformError;
pub use event::{Attachment, ChatEvent, IncomingMessage, Interaction, InteractionKind};
pub use model::{
    ActionRow, ButtonStyle, CommandSpec, Component, Embed, EmbedField, InteractionRef,
    InteractionResponse, Member, MessageRef, Modal, OutgoingMessage, SelectOption,
};
