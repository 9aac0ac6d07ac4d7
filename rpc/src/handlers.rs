//! Request and response bodies of the webhook endpoints.

use serde::{Deserialize, Serialize};

// ── Callback ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCallbackRequest {
    pub session_id: String,
    pub user_id: String,
    pub guild_id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyCallbackResponse {
    pub success: bool,
    pub message: String,
}

impl VerifyCallbackResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ── Session status ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}

impl SessionStatusResponse {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            user_id: None,
            guild_id: None,
        }
    }
}

// ── Health ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
