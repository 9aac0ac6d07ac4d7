//! Abuse detection over a live stream of chat messages.
//!
//! Pipeline per inbound message:
//! 1. [`RateWindow::record`] appends it to the author's sliding window
//! 2. [`Classifier::classify`] judges it against that window
//! 3. [`EnforcementDispatcher::dispatch`] deletes / restricts / notifies
//!
//! Each message is judged independently; there is no escalation across
//! repeated offenses.

pub mod classifier;
pub mod dispatcher;
pub mod engine;
pub mod window;

pub use classifier::{contains_credential, is_animated_media, Classifier, ClassifierConfig};
pub use dispatcher::{EnforcementDispatcher, EnforcementReport, DEFAULT_RESTRICTION_SECS};
pub use engine::ModerationEngine;
pub use window::{MessageRecord, RateWindow, DEFAULT_MAX_RECORDS, DEFAULT_WINDOW_MS};
