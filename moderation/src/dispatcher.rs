//! Applies a verdict through the chat platform.
//!
//! Three independent, best-effort steps: delete the message (content
//! reasons only), restrict the author, and post a notice in the channel.
//! A failing step is logged and never prevents the next one.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use warden_platform::{ChatPlatform, Embed, MessageRef, OutgoingMessage};
use warden_types::{Clock, ReasonKind, ScopeId, SubjectId, Verdict};
use warden_utils::{format_duration, StatsCounter};

/// Default restriction: 5 minutes.
pub const DEFAULT_RESTRICTION_SECS: u64 = 5 * 60;

const NOTICE_COLOR: u32 = 0xED4245;

const STAT_NAMES: &[&str] = &[
    "dispatched",
    "delete_ok",
    "delete_failed",
    "restrict_ok",
    "restrict_failed",
    "notify_ok",
    "notify_failed",
];

/// What happened to each enforcement step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnforcementReport {
    pub reason: ReasonKind,
    /// `None` when deletion was not requested.
    pub deleted: Option<bool>,
    pub restricted: bool,
    pub notified: bool,
}

pub struct EnforcementDispatcher {
    platform: Arc<dyn ChatPlatform>,
    clock: Arc<dyn Clock>,
    restriction: Duration,
    stats: StatsCounter,
}

impl EnforcementDispatcher {
    pub fn new(platform: Arc<dyn ChatPlatform>, clock: Arc<dyn Clock>, restriction: Duration) -> Self {
        Self {
            platform,
            clock,
            restriction,
            stats: StatsCounter::new(STAT_NAMES),
        }
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    /// Enforce `verdict` against `subject` for `message`.
    ///
    /// Returns `None` for [`Verdict::None`]; nothing is sent.
    pub async fn dispatch(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        verdict: Verdict,
        message: &MessageRef,
    ) -> Option<EnforcementReport> {
        let Verdict::Enforce {
            reason,
            delete_message,
        } = verdict
        else {
            return None;
        };
        self.stats.increment("dispatched");

        let deleted = if delete_message {
            Some(self.delete(subject, reason, message).await)
        } else {
            None
        };
        let restricted = self.restrict(scope, subject, reason).await;
        let notified = self.notify(subject, reason, message).await;

        info!(
            subject = %subject,
            scope = %scope,
            reason = %reason,
            ?deleted,
            restricted,
            notified,
            "enforcement applied"
        );

        Some(EnforcementReport {
            reason,
            deleted,
            restricted,
            notified,
        })
    }

    async fn delete(&self, subject: &SubjectId, reason: ReasonKind, message: &MessageRef) -> bool {
        match self.platform.delete_message(message).await {
            Ok(()) => {
                self.stats.increment("delete_ok");
                true
            }
            Err(e) => {
                self.stats.increment("delete_failed");
                warn!(subject = %subject, reason = %reason, message_id = %message.message, "failed to delete message: {e}");
                false
            }
        }
    }

    async fn restrict(&self, scope: &ScopeId, subject: &SubjectId, reason: ReasonKind) -> bool {
        match self
            .platform
            .restrict_member(scope, subject, self.restriction, reason.describe())
            .await
        {
            Ok(()) => {
                self.stats.increment("restrict_ok");
                true
            }
            Err(e) => {
                self.stats.increment("restrict_failed");
                error!(subject = %subject, scope = %scope, reason = %reason, "failed to restrict member: {e}");
                false
            }
        }
    }

    async fn notify(&self, subject: &SubjectId, reason: ReasonKind, message: &MessageRef) -> bool {
        let notice = OutgoingMessage::embed(self.notice(subject, reason));
        match self.platform.send_message(&message.channel, &notice).await {
            Ok(()) => {
                self.stats.increment("notify_ok");
                true
            }
            Err(e) => {
                self.stats.increment("notify_failed");
                warn!(subject = %subject, channel = %message.channel, "failed to post moderation notice: {e}");
                false
            }
        }
    }

    fn notice(&self, subject: &SubjectId, reason: ReasonKind) -> Embed {
        Embed::new(
            "⚠️ Timeout",
            format!(
                "{} was timed out for {} for **{}**.",
                subject.mention(),
                format_duration(self.restriction.as_secs()),
                reason.describe()
            ),
        )
        .color(NOTICE_COLOR)
        .timestamp(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_nullables::{NullClock, NullPlatform, Operation, PlatformCall};
    use warden_types::{ChannelId, MessageId};

    fn setup() -> (Arc<NullPlatform>, EnforcementDispatcher) {
        let platform = Arc::new(NullPlatform::new());
        let dispatcher = EnforcementDispatcher::new(
            platform.clone(),
            Arc::new(NullClock::new(0)),
            Duration::from_secs(DEFAULT_RESTRICTION_SECS),
        );
        (platform, dispatcher)
    }

    fn msg() -> MessageRef {
        MessageRef {
            channel: ChannelId::new("chan"),
            message: MessageId::new("msg"),
        }
    }

    fn ids() -> (ScopeId, SubjectId) {
        (ScopeId::new("g"), SubjectId::new("u"))
    }

    #[tokio::test]
    async fn none_verdict_does_nothing() {
        let (platform, dispatcher) = setup();
        let (g, u) = ids();
        assert!(dispatcher.dispatch(&g, &u, Verdict::None, &msg()).await.is_none());
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn burst_restricts_and_notifies_without_deleting() {
        let (platform, dispatcher) = setup();
        let (g, u) = ids();
        let verdict = Verdict::Enforce {
            reason: ReasonKind::Burst,
            delete_message: false,
        };
        let report = dispatcher.dispatch(&g, &u, verdict, &msg()).await.unwrap();
        assert_eq!(report.deleted, None);
        assert!(report.restricted && report.notified);
        assert_eq!(platform.count(Operation::DeleteMessage), 0);

        match &platform.calls_of(Operation::RestrictMember)[0] {
            PlatformCall::RestrictMember { duration, reason, .. } => {
                assert_eq!(*duration, Duration::from_secs(300));
                assert_eq!(reason, "spamming");
            }
            other => panic!("unexpected call {other:?}"),
        }
        match &platform.calls_of(Operation::SendMessage)[0] {
            PlatformCall::SendMessage { channel, message } => {
                assert_eq!(channel.as_str(), "chan");
                let text = &message.embeds[0].description;
                assert!(text.contains("<@u>"));
                assert!(text.contains("5 minutes"));
                assert!(text.contains("**spamming**"));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn content_reason_deletes_first() {
        let (platform, dispatcher) = setup();
        let (g, u) = ids();
        let verdict = Verdict::Enforce {
            reason: ReasonKind::CredentialLeak,
            delete_message: true,
        };
        let report = dispatcher.dispatch(&g, &u, verdict, &msg()).await.unwrap();
        assert_eq!(report.deleted, Some(true));
        assert_eq!(platform.calls()[0].operation(), Operation::DeleteMessage);
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_steps() {
        let (platform, dispatcher) = setup();
        platform.fail(Operation::DeleteMessage);
        platform.fail(Operation::RestrictMember);
        let (g, u) = ids();
        let verdict = Verdict::Enforce {
            reason: ReasonKind::FlashingMedia,
            delete_message: true,
        };
        let report = dispatcher.dispatch(&g, &u, verdict, &msg()).await.unwrap();
        assert_eq!(report.deleted, Some(false));
        assert!(!report.restricted);
        assert!(report.notified);
        assert_eq!(platform.count(Operation::SendMessage), 1);
        assert_eq!(dispatcher.stats().get("restrict_failed"), 1);
        assert_eq!(dispatcher.stats().get("notify_ok"), 1);
    }
}
