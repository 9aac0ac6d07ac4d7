//! Messages, components and modals for the verification and ticket flows.
//!
//! Everything here is a pure builder over the platform model; the
//! interaction handler decides when to send what.

use warden_platform::{
    ActionRow, ButtonStyle, CommandSpec, Component, Embed, Modal, OutgoingMessage, SelectOption,
};
use warden_types::{ChannelId, RoleId, SubjectId, Timestamp};
use warden_utils::format_duration;

pub const CMD_VERIFY: &str = "verify";
pub const CMD_TICKET: &str = "ticket";
pub const CMD_TICKET_CLOSE: &str = "ticket_close";

pub const START_VERIFICATION: &str = "start_verification";
pub const CREATE_TICKET: &str = "create_ticket";
pub const TICKET_CATEGORY: &str = "ticket_category";
pub const TICKET_MODAL_PREFIX: &str = "ticket_modal_";
pub const TICKET_TITLE_INPUT: &str = "ticket_title";

pub const TICKET_TITLE_MAX_LEN: u16 = 100;
/// Thread names are capped by the platform.
pub const THREAD_NAME_MAX_CHARS: usize = 100;
/// One day.
pub const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 1440;

const BLURPLE: u32 = 0x5865F2;
const GREEN: u32 = 0x57F287;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketCategory {
    Wiki,
    Discord,
    Other,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 3] = [Self::Wiki, Self::Discord, Self::Other];

    pub fn value(self) -> &'static str {
        match self {
            Self::Wiki => "wiki",
            Self::Discord => "discord",
            Self::Other => "other",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.value() == value)
    }

    /// Short label used in thread names and the welcome embed.
    pub fn label(self) -> &'static str {
        match self {
            Self::Wiki => "Rec Wiki",
            Self::Discord => "Discord server",
            Self::Other => "Other",
        }
    }

    fn option_label(self) -> &'static str {
        match self {
            Self::Wiki => "Questions about Rec Wiki",
            Self::Discord => "Questions about the Discord server",
            Self::Other => "Other",
        }
    }

    fn emoji(self) -> &'static str {
        match self {
            Self::Wiki => "📚",
            Self::Discord => "💬",
            Self::Other => "❓",
        }
    }

    pub fn modal_id(self) -> String {
        format!("{TICKET_MODAL_PREFIX}{}", self.value())
    }

    /// Inverse of [`TicketCategory::modal_id`].
    pub fn from_modal_id(custom_id: &str) -> Option<Self> {
        custom_id
            .strip_prefix(TICKET_MODAL_PREFIX)
            .and_then(Self::from_value)
    }
}

/// Slash commands registered on startup.
pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: CMD_VERIFY.into(),
            description: "Show the verification panel (administrators only)".into(),
            admin_only: true,
        },
        CommandSpec {
            name: CMD_TICKET.into(),
            description: "Show the ticket panel (administrators only)".into(),
            admin_only: true,
        },
        CommandSpec {
            name: CMD_TICKET_CLOSE.into(),
            description: "Close this ticket".into(),
            admin_only: false,
        },
    ]
}

pub fn verification_panel() -> OutgoingMessage {
    let embed = Embed::new(
        "🔐 Verification",
        "Press the button below to verify.\nOnce verified you can use every part of the server.",
    )
    .color(BLURPLE)
    .field(
        "Notes",
        "• Verification over a VPN is not possible\n• A Cloudflare check is required\n• Each link works once",
        false,
    );
    OutgoingMessage::embed(embed).with_row(ActionRow::single(Component::Button {
        custom_id: START_VERIFICATION.into(),
        label: "Start verification".into(),
        style: ButtonStyle::Primary,
        emoji: Some("✅".into()),
    }))
}

pub fn ticket_panel() -> OutgoingMessage {
    let embed = Embed::new(
        "🎫 Tickets",
        "If you have a question, open a ticket with the button below.",
    )
    .color(GREEN)
    .field(
        "Notes",
        "• Do not open tickets as a prank\n• Violations may be punished",
        false,
    );
    OutgoingMessage::embed(embed).with_row(ActionRow::single(Component::Button {
        custom_id: CREATE_TICKET.into(),
        label: "Open a ticket".into(),
        style: ButtonStyle::Success,
        emoji: Some("📝".into()),
    }))
}

pub fn verification_link(url: &str, ttl_secs: u64) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "🔗 Complete verification using the link below:\n{url}\n\n⚠️ This link is valid for {}.",
        format_duration(ttl_secs)
    ))
    .ephemeral()
}

pub fn category_picker() -> OutgoingMessage {
    let options = TicketCategory::ALL
        .into_iter()
        .map(|c| SelectOption {
            label: c.option_label().into(),
            value: c.value().into(),
            emoji: Some(c.emoji().into()),
        })
        .collect();
    OutgoingMessage::text("Choose what your question is about:")
        .with_row(ActionRow::single(Component::Select {
            custom_id: TICKET_CATEGORY.into(),
            placeholder: "Choose a topic".into(),
            options,
        }))
        .ephemeral()
}

pub fn ticket_modal(category: TicketCategory) -> Modal {
    Modal {
        custom_id: category.modal_id(),
        title: "Open a ticket".into(),
        rows: vec![ActionRow::single(Component::TextInput {
            custom_id: TICKET_TITLE_INPUT.into(),
            label: "Title".into(),
            required: true,
            max_length: Some(TICKET_TITLE_MAX_LEN),
        })],
    }
}

/// `<Category> - <title>`, cut to the platform limit.
pub fn thread_name(category: TicketCategory, title: &str) -> String {
    format!("{} - {}", category.label(), title)
        .chars()
        .take(THREAD_NAME_MAX_CHARS)
        .collect()
}

pub fn ticket_welcome(
    user: &SubjectId,
    staff: &RoleId,
    category: TicketCategory,
    title: &str,
    now: Timestamp,
) -> OutgoingMessage {
    let embed = Embed::new(
        "🎫 Ticket opened",
        format!(
            "Thanks for reaching out, {}.\n{} will be with you shortly.\n\nRepeatedly opening tickets as a prank may be punished.",
            user.mention(),
            staff.mention()
        ),
    )
    .color(GREEN)
    .field("Category", category.label(), true)
    .field("Title", title, true)
    .timestamp(now);
    OutgoingMessage::embed(embed)
}

pub fn ticket_created(thread: &ChannelId) -> OutgoingMessage {
    OutgoingMessage::text(format!("✅ Ticket created: {}", thread.mention())).ephemeral()
}

pub fn closing_ticket() -> OutgoingMessage {
    OutgoingMessage::text("✅ Closing this ticket...")
}

pub fn refusal(text: &str) -> OutgoingMessage {
    OutgoingMessage::text(format!("❌ {text}")).ephemeral()
}
