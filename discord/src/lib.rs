//! Discord adapter.
//!
//! - [`DiscordRest`] implements [`warden_platform::ChatPlatform`] over the
//!   HTTP API (v10).
//! - [`GatewayClient`] holds the websocket session and turns dispatches into
//!   [`warden_platform::ChatEvent`]s.

pub mod error;
pub mod events;
pub mod gateway;
pub mod payload;
pub mod rest;

pub use error::DiscordError;
pub use gateway::{GatewayClient, Intents};
pub use rest::DiscordRest;

/// Base URL of the HTTP API.
pub const API_BASE: &str = "https://discord.com/api/v10";

/// Gateway endpoint, JSON encoding.
pub const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
