//! Span constructors for the hot paths, so traces share names and fields.

use tracing::{info_span, Span};

/// One inbound chat message through moderation.
pub fn message_span(subject: &str, channel: &str) -> Span {
    info_span!("message", subject = %subject, channel = %channel)
}

/// One command, button, select or modal interaction.
pub fn interaction_span(kind: &str, user: &str) -> Span {
    info_span!("interaction", kind = %kind, user = %user)
}
