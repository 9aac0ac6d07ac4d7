use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to gather entropy for session token: {0}")]
    Entropy(String),
}
