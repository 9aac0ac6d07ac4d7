//! Message classification rules.
//!
//! Rules, in the order their reason is surfaced:
//! 1. credential leak (content; forces deletion)
//! 2. flashing media  (content; forces deletion)
//! 3. burst volume    (window)
//! 4. repetition      (window)
//!
//! Content rules are window-independent and always evaluated, so a message
//! that is both a burst and a token leak is still deleted.

use regex::Regex;
use std::sync::OnceLock;
use warden_types::{ReasonKind, Verdict};

use crate::window::MessageRecord;

/// Three dot-separated URL-safe base64 segments of 24, 6 and 27 characters.
const CREDENTIAL_PATTERN: &str = r"[A-Za-z0-9_-]{24}\.[A-Za-z0-9_-]{6}\.[A-Za-z0-9_-]{27}";

/// Content types treated as animated images.
const ANIMATED_TYPES: [&str; 2] = ["image/gif", "image/apng"];

fn credential_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CREDENTIAL_PATTERN).expect("credential pattern is valid"))
}

/// Whether `body` contains something shaped like a bot token.
pub fn contains_credential(body: &str) -> bool {
    credential_regex().is_match(body)
}

/// Whether a declared content type denotes an animated image.
pub fn is_animated_media(content_type: &str) -> bool {
    let lowered = content_type.trim().to_ascii_lowercase();
    ANIMATED_TYPES.iter().any(|t| lowered.starts_with(t))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Messages in the window at which a burst is declared.
    pub burst_threshold: usize,
    /// Identical bodies in the window at which repetition is declared.
    pub repeat_threshold: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            burst_threshold: 5,
            repeat_threshold: 3,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Every rule `message` satisfies, in priority order.
    ///
    /// `window` is the author's retained sequence and must already contain
    /// `message`.
    pub fn assess(&self, message: &MessageRecord, window: &[MessageRecord]) -> Vec<ReasonKind> {
        let mut reasons = Vec::new();

        if contains_credential(&message.body) {
            reasons.push(ReasonKind::CredentialLeak);
        }
        if message.attachment_kinds.iter().any(|k| is_animated_media(k)) {
            reasons.push(ReasonKind::FlashingMedia);
        }
        if window.len() >= self.config.burst_threshold {
            reasons.push(ReasonKind::Burst);
        }
        if !message.body.is_empty() {
            let same = window.iter().filter(|r| r.body == message.body).count();
            if same >= self.config.repeat_threshold {
                reasons.push(ReasonKind::Repeat);
            }
        }

        reasons
    }

    /// Judge a message: the highest-priority reason wins, and deletion is
    /// requested whenever any content rule matched.
    pub fn classify(&self, message: &MessageRecord, window: &[MessageRecord]) -> Verdict {
        let reasons = self.assess(message, window);
        match reasons.first() {
            None => Verdict::None,
            Some(&reason) => Verdict::Enforce {
                reason,
                delete_message: reasons.iter().any(|r| r.is_content_based()),
            },
        }
    }
}
