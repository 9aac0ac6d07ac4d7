//! Nullable infrastructure for deterministic testing.
//!
//! The external dependencies of warden (wall clock, chat platform) sit
//! behind traits. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod platform;

pub use clock::NullClock;
pub use platform::{NullPlatform, Operation, PlatformCall};
