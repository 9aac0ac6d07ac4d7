use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed platform response: {0}")]
    Decode(String),
}
