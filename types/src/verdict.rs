//! Classifier output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a message was judged abusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasonKind {
    /// Too many messages inside the rate window.
    Burst,
    /// The same body posted repeatedly inside the rate window.
    Repeat,
    /// The body contains something shaped like a bot credential.
    CredentialLeak,
    /// An attachment is an animated image.
    FlashingMedia,
}

impl ReasonKind {
    pub const ALL: [ReasonKind; 4] = [
        ReasonKind::CredentialLeak,
        ReasonKind::FlashingMedia,
        ReasonKind::Burst,
        ReasonKind::Repeat,
    ];

    /// Stable machine label (metrics, logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Burst => "burst",
            Self::Repeat => "repeat",
            Self::CredentialLeak => "credential_leak",
            Self::FlashingMedia => "flashing_media",
        }
    }

    /// Moderator-facing description, used in the restriction audit reason
    /// and the channel notice.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Burst => "spamming",
            Self::Repeat => "repeated messages",
            Self::CredentialLeak => "posting a token",
            Self::FlashingMedia => "posting a flashing GIF",
        }
    }

    /// Content-based reasons also force deletion of the message.
    pub fn is_content_based(&self) -> bool {
        matches!(self, Self::CredentialLeak | Self::FlashingMedia)
    }
}

impl fmt::Display for ReasonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether and why to enforce against a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    None,
    Enforce {
        reason: ReasonKind,
        delete_message: bool,
    },
}

impl Verdict {
    pub fn is_enforce(&self) -> bool {
        matches!(self, Self::Enforce { .. })
    }

    pub fn reason(&self) -> Option<ReasonKind> {
        match self {
            Self::None => None,
            Self::Enforce { reason, .. } => Some(*reason),
        }
    }
}
