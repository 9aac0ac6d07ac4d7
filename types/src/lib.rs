//! Fundamental types for warden.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! platform identifiers, the verification session token, millisecond timestamps
//! with the injectable clock, and the classifier verdict.

pub mod ids;
pub mod time;
pub mod verdict;

pub use ids::{
    ChannelId, InteractionId, MessageId, RoleId, ScopeId, SessionId, SubjectId,
};
pub use time::{Clock, SystemClock, Timestamp};
pub use verdict::{ReasonKind, Verdict};
