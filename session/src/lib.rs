//! Verification sessions.
//!
//! A member presses "start verification", gets a one-time link, solves a
//! challenge on the external web front end, and the front end calls back
//! with the session token. This crate owns those tokens:
//! - creation with an unguessable id
//! - lazy expiry after the TTL (10 minutes by default)
//! - exactly-once consumption bound to the original user and community

pub mod error;
pub mod store;
pub mod token;

pub use error::SessionError;
pub use store::{
    ConsumeOutcome, PeekOutcome, SessionStore, VerificationSession, DEFAULT_SESSION_TTL_MS,
};
pub use token::{generate_session_id, verification_url};
