//! Keyed, time-bounded registry of verification sessions.
//!
//! Expiry is evaluated lazily against the injected clock on every read;
//! [`SessionStore::purge_expired`] exists for a periodic sweep but is never
//! needed for correctness.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use warden_types::{Clock, ScopeId, SessionId, SubjectId, Timestamp};

use crate::error::SessionError;
use crate::token::generate_session_id;

/// Default session lifetime: 10 minutes.
pub const DEFAULT_SESSION_TTL_MS: u64 = 10 * 60 * 1000;

/// A pending verification handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationSession {
    pub id: SessionId,
    pub subject: SubjectId,
    pub scope: ScopeId,
    pub created_at: Timestamp,
}

impl VerificationSession {
    /// Live while no more than `ttl_ms` has elapsed since creation.
    pub fn is_live(&self, ttl_ms: u64, now: Timestamp) -> bool {
        self.created_at.elapsed_since(now) <= ttl_ms
    }
}

/// Result of a read-only lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeekOutcome {
    Live(VerificationSession),
    NotFound,
    Expired,
}

/// Result of a consumption attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The session matched and is now gone.
    Consumed(VerificationSession),
    /// Unknown, expired, or bound to a different subject/scope.
    Invalid,
}

impl ConsumeOutcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed(_))
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, VerificationSession>>,
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            ttl_ms,
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Open a session for `subject` in `scope` and return its token.
    pub async fn create(
        &self,
        subject: SubjectId,
        scope: ScopeId,
    ) -> Result<SessionId, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let mut id = generate_session_id()?;
        while sessions.contains_key(&id) {
            id = generate_session_id()?;
        }
        let session = VerificationSession {
            id: id.clone(),
            subject,
            scope,
            created_at: self.clock.now(),
        };
        debug!(subject = %session.subject, scope = %session.scope, "verification session created");
        sessions.insert(id.clone(), session);
        Ok(id)
    }

    /// Look a session up without consuming it. An expired entry is dropped.
    pub async fn peek(&self, id: &SessionId) -> PeekOutcome {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        match sessions.get(id) {
            None => PeekOutcome::NotFound,
            Some(session) if session.is_live(self.ttl_ms, now) => {
                PeekOutcome::Live(session.clone())
            }
            Some(_) => {
                sessions.remove(id);
                PeekOutcome::Expired
            }
        }
    }

    /// Consume a live session bound to exactly this `subject` and `scope`.
    ///
    /// The check and the removal happen under one lock, so concurrent
    /// attempts on the same token see at most one `Consumed`. Any mismatch
    /// leaves the store untouched.
    pub async fn consume(
        &self,
        id: &SessionId,
        subject: &SubjectId,
        scope: &ScopeId,
    ) -> ConsumeOutcome {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        let matches = sessions.get(id).is_some_and(|s| {
            s.is_live(self.ttl_ms, now) && &s.subject == subject && &s.scope == scope
        });
        if !matches {
            return ConsumeOutcome::Invalid;
        }
        match sessions.remove(id) {
            Some(session) => ConsumeOutcome::Consumed(session),
            None => ConsumeOutcome::Invalid,
        }
    }

    /// Drop every expired session. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.is_live(self.ttl_ms, now));
        before - sessions.len()
    }

    /// Number of stored sessions, including expired ones not yet collected.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
