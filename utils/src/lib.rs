//! Shared utilities for warden.

pub mod stats;
pub mod time;

pub use stats::StatsCounter;
pub use time::format_duration;
