//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use warden_moderation::ClassifierConfig;

use crate::NodeError;

/// Configuration for a warden node.
///
/// Can be loaded from a TOML file via [`WardenConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Call [`WardenConfig::validate`]
/// before starting a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Bot token used for both the gateway and the HTTP API.
    #[serde(default)]
    pub discord_token: String,

    /// Root of the external verification web front end.
    #[serde(default = "default_verify_base_url")]
    pub verify_base_url: String,

    /// Path segment between the base URL and the session id.
    #[serde(default = "default_service_tag")]
    pub service_tag: String,

    /// Role granted after a successful verification.
    #[serde(default)]
    pub verified_role_id: String,

    /// Role given to members who open a ticket.
    #[serde(default)]
    pub ticket_role_id: String,

    /// Role mentioned in new ticket threads.
    #[serde(default)]
    pub staff_role_id: String,

    /// Port of the verification webhook server.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: usize,

    #[serde(default = "default_repeat_threshold")]
    pub repeat_threshold: usize,

    /// Restriction applied on enforcement, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-member cap on remembered messages.
    #[serde(default = "default_max_window_records")]
    pub max_window_records: usize,

    /// How often idle windows and expired sessions are collected.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Whether to expose Prometheus metrics at `/metrics`.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Whether to connect to the gateway. Off only for webhook-only runs.
    #[serde(default = "default_true")]
    pub enable_gateway: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_verify_base_url() -> String {
    "https://verify.rec877.com".to_string()
}

fn default_service_tag() -> String {
    "rec877dev".to_string()
}

fn default_http_port() -> u16 {
    5000
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_session_ttl_secs() -> u64 {
    600
}

fn default_rate_window_ms() -> u64 {
    warden_moderation::DEFAULT_WINDOW_MS
}

fn default_burst_threshold() -> usize {
    5
}

fn default_repeat_threshold() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    warden_moderation::DEFAULT_RESTRICTION_SECS
}

fn default_max_window_records() -> usize {
    warden_moderation::DEFAULT_MAX_RECORDS
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WardenConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.discord_token.trim().is_empty() {
            return Err(NodeError::Config("discord_token is required".into()));
        }
        for (name, value) in [
            ("verified_role_id", &self.verified_role_id),
            ("ticket_role_id", &self.ticket_role_id),
            ("staff_role_id", &self.staff_role_id),
        ] {
            if value.trim().is_empty() {
                return Err(NodeError::Config(format!("{name} is required")));
            }
        }
        if !(self.verify_base_url.starts_with("http://")
            || self.verify_base_url.starts_with("https://"))
        {
            return Err(NodeError::Config(format!(
                "verify_base_url must be an http(s) URL, got {:?}",
                self.verify_base_url
            )));
        }
        if self.session_ttl_secs == 0 {
            return Err(NodeError::Config("session_ttl_secs must be positive".into()));
        }
        if self.rate_window_ms == 0 {
            return Err(NodeError::Config("rate_window_ms must be positive".into()));
        }
        if self.burst_threshold == 0 {
            return Err(NodeError::Config("burst_threshold must be positive".into()));
        }
        if self.repeat_threshold == 0 {
            return Err(NodeError::Config("repeat_threshold must be positive".into()));
        }
        if self.max_window_records < self.burst_threshold {
            return Err(NodeError::Config(format!(
                "max_window_records ({}) must be at least burst_threshold ({})",
                self.max_window_records, self.burst_threshold
            )));
        }
        Ok(())
    }

    /// Copy with the token masked, for printing.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.discord_token.is_empty() {
            copy.discord_token = "<redacted>".to_string();
        }
        copy
    }

    pub fn session_ttl_ms(&self) -> u64 {
        self.session_ttl_secs.saturating_mul(1000)
    }

    pub fn restriction(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            burst_threshold: self.burst_threshold,
            repeat_threshold: self.repeat_threshold,
        }
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            verify_base_url: default_verify_base_url(),
            service_tag: default_service_tag(),
            verified_role_id: String::new(),
            ticket_role_id: String::new(),
            staff_role_id: String::new(),
            http_port: default_http_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            session_ttl_secs: default_session_ttl_secs(),
            rate_window_ms: default_rate_window_ms(),
            burst_threshold: default_burst_threshold(),
            repeat_threshold: default_repeat_threshold(),
            timeout_secs: default_timeout_secs(),
            max_window_records: default_max_window_records(),
            sweep_interval_secs: default_sweep_interval_secs(),
            enable_metrics: true,
            enable_gateway: true,
        }
    }
}
