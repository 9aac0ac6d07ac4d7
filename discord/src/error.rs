use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed gateway payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gateway protocol error: {0}")]
    Protocol(String),

    /// The gateway refused the token or the requested intents. Not retried.
    #[error("gateway rejected the session (close code {code}): {reason}")]
    Rejected { code: u16, reason: String },

    #[error("invalid bot token: {0}")]
    InvalidToken(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
