//! Record-then-classify for one inbound message.

use std::sync::Arc;
use tracing::debug;
use warden_types::{Clock, SubjectId, Verdict};

use crate::classifier::Classifier;
use crate::window::RateWindow;

/// Owns the rate window and classifier and evaluates messages against them.
pub struct ModerationEngine {
    window: RateWindow,
    classifier: Classifier,
    clock: Arc<dyn Clock>,
}

impl ModerationEngine {
    pub fn new(window: RateWindow, classifier: Classifier, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            classifier,
            clock,
        }
    }

    pub fn window(&self) -> &RateWindow {
        &self.window
    }

    /// Record a message from `subject` and judge it.
    pub async fn evaluate(
        &self,
        subject: &SubjectId,
        body: &str,
        attachment_kinds: Vec<String>,
    ) -> Verdict {
        let now = self.clock.now();
        let retained = self.window.record(subject, body, attachment_kinds, now).await;
        let Some(current) = retained.last() else {
            return Verdict::None;
        };
        let verdict = self.classifier.classify(current, &retained);
        if verdict.is_enforce() {
            debug!(
                subject = %subject,
                retained = retained.len(),
                matched = ?self.classifier.assess(current, &retained),
                "message matched moderation rules"
            );
        }
        verdict
    }

    /// Drop idle subjects. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        self.window.sweep(self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_nullables::NullClock;
    use warden_types::ReasonKind;

    fn engine() -> (Arc<NullClock>, ModerationEngine) {
        let clock = Arc::new(NullClock::new(0));
        let engine = ModerationEngine::new(RateWindow::default(), Classifier::default(), clock.clone());
        (clock, engine)
    }

    #[tokio::test]
    async fn five_messages_in_four_seconds_is_burst() {
        let (clock, engine) = engine();
        let u = SubjectId::new("u");
        for i in 0..4 {
            let v = engine.evaluate(&u, &format!("msg {i}"), vec![]).await;
            assert_eq!(v, Verdict::None);
            clock.advance(1_000);
        }
        let v = engine.evaluate(&u, "msg 4", vec![]).await;
        assert_eq!(v.reason(), Some(ReasonKind::Burst));
    }

    #[tokio::test]
    async fn slow_sender_never_bursts() {
        let (clock, engine) = engine();
        let u = SubjectId::new("u");
        for i in 0..10 {
            let v = engine.evaluate(&u, &format!("msg {i}"), vec![]).await;
            assert_eq!(v, Verdict::None);
            clock.advance(1_300);
        }
    }

    #[tokio::test]
    async fn same_text_three_times_quickly_is_repeat() {
        let (clock, engine) = engine();
        let u = SubjectId::new("u");
        assert_eq!(engine.evaluate(&u, "hi", vec![]).await, Verdict::None);
        clock.advance(1_000);
        assert_eq!(engine.evaluate(&u, "hi", vec![]).await, Verdict::None);
        clock.advance(1_000);
        let v = engine.evaluate(&u, "hi", vec![]).await;
        assert_eq!(v.reason(), Some(ReasonKind::Repeat));
    }

    #[tokio::test]
    async fn repeats_spread_past_the_window_are_allowed() {
        let (clock, engine) = engine();
        let u = SubjectId::new("u");
        for _ in 0..3 {
            assert_eq!(engine.evaluate(&u, "hi", vec![]).await, Verdict::None);
            clock.advance(3_000);
        }
    }

    #[tokio::test]
    async fn empty_bodies_with_attachments_are_not_repeats() {
        let (clock, engine) = engine();
        let u = SubjectId::new("u");
        for _ in 0..3 {
            let v = engine.evaluate(&u, "", vec!["image/png".to_string()]).await;
            assert_eq!(v, Verdict::None);
            clock.advance(500);
        }
    }

    #[tokio::test]
    async fn sweep_forgets_idle_subjects() {
        let (clock, engine) = engine();
        engine.evaluate(&SubjectId::new("u"), "hi", vec![]).await;
        clock.advance(10_000);
        assert_eq!(engine.sweep().await, 1);
    }
}
