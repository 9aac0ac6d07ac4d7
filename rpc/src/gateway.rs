//! Session validation and the verified-role grant.

use prometheus::IntCounterVec;
use std::sync::Arc;
use tracing::{error, info, warn};
use warden_platform::ChatPlatform;
use warden_session::{ConsumeOutcome, PeekOutcome, SessionStore};
use warden_types::{RoleId, ScopeId, SessionId, SubjectId};
use warden_utils::StatsCounter;

const STAT_NAMES: &[&str] = &["status_valid", "status_invalid", "granted", "invalid", "grant_failed"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Invalid,
    Valid { subject: SubjectId, scope: ScopeId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Session consumed and role granted.
    Granted,
    /// Unknown, expired, or mismatched session; nothing changed.
    Invalid,
    /// Session consumed but the platform refused the grant.
    GrantFailed(String),
}

impl CallbackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Invalid => "invalid",
            Self::GrantFailed(_) => "grant_failed",
        }
    }
}

pub struct VerificationGateway {
    sessions: Arc<SessionStore>,
    platform: Arc<dyn ChatPlatform>,
    verified_role: RoleId,
    stats: StatsCounter,
    outcomes: Option<IntCounterVec>,
}

impl VerificationGateway {
    pub fn new(
        sessions: Arc<SessionStore>,
        platform: Arc<dyn ChatPlatform>,
        verified_role: RoleId,
    ) -> Self {
        Self {
            sessions,
            platform,
            verified_role,
            stats: StatsCounter::new(STAT_NAMES),
            outcomes: None,
        }
    }

    /// Count callback outcomes into a Prometheus counter labelled `outcome`.
    pub fn with_outcome_counter(mut self, counter: IntCounterVec) -> Self {
        self.outcomes = Some(counter);
        self
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    /// Read-only status check. Only side effect: lazy expiry of a dead session.
    pub async fn check_status(&self, id: &SessionId) -> SessionStatus {
        match self.sessions.peek(id).await {
            PeekOutcome::Live(session) => {
                self.stats.increment("status_valid");
                SessionStatus::Valid {
                    subject: session.subject,
                    scope: session.scope,
                }
            }
            PeekOutcome::NotFound | PeekOutcome::Expired => {
                self.stats.increment("status_invalid");
                SessionStatus::Invalid
            }
        }
    }

    /// Consume the session and grant the verified role.
    ///
    /// The session is consumed before the grant is attempted: if the
    /// platform call fails the token is already spent and the member must be
    /// verified by hand or start over.
    pub async fn complete_verification(
        &self,
        id: &SessionId,
        subject: &SubjectId,
        scope: &ScopeId,
    ) -> CallbackOutcome {
        let outcome = match self.sessions.consume(id, subject, scope).await {
            ConsumeOutcome::Invalid => {
                warn!(subject = %subject, scope = %scope, "verification callback with invalid session");
                CallbackOutcome::Invalid
            }
            ConsumeOutcome::Consumed(_) => match self.grant(subject, scope).await {
                Ok(()) => {
                    info!(subject = %subject, scope = %scope, "verified role granted");
                    CallbackOutcome::Granted
                }
                Err(reason) => {
                    error!(
                        subject = %subject,
                        scope = %scope,
                        role = %self.verified_role,
                        "session consumed but role grant failed, manual recovery required: {reason}"
                    );
                    CallbackOutcome::GrantFailed(reason)
                }
            },
        };
        self.stats.increment(outcome.label());
        if let Some(counter) = &self.outcomes {
            counter.with_label_values(&[outcome.label()]).inc();
        }
        outcome
    }

    async fn grant(&self, subject: &SubjectId, scope: &ScopeId) -> Result<(), String> {
        let member = self
            .platform
            .fetch_member(scope, subject)
            .await
            .map_err(|e| e.to_string())?;
        if member.has_role(&self.verified_role) {
            return Ok(());
        }
        self.platform
            .add_role(scope, subject, &self.verified_role)
            .await
            .map_err(|e| e.to_string())
    }
}
