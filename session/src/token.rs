//! Session token generation and verification links.

use warden_types::SessionId;

use crate::error::SessionError;

/// Bytes of OS randomness per token (128 bits).
pub const TOKEN_BYTES: usize = 16;

/// Generate a fresh, unguessable session id (32 lowercase hex chars).
pub fn generate_session_id() -> Result<SessionId, SessionError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes).map_err(|e| SessionError::Entropy(e.to_string()))?;
    Ok(SessionId::new(hex::encode(bytes)))
}

/// Build the link handed to the member: `{base}/{tag}/{session}`.
pub fn verification_url(base_url: &str, service_tag: &str, session: &SessionId) -> String {
    let base = base_url.trim_end_matches('/');
    let tag = service_tag.trim_matches('/');
    if tag.is_empty() {
        format!("{base}/{session}")
    } else {
        format!("{base}/{tag}/{session}")
    }
}
