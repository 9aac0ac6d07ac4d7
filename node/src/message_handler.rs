//! Routes inbound guild messages through moderation.

use std::sync::Arc;
use tracing::Instrument;
use warden_moderation::{EnforcementDispatcher, EnforcementReport, ModerationEngine};
use warden_platform::IncomingMessage;

use crate::metrics::WardenMetrics;
use crate::tracing_spans::message_span;

pub struct MessageHandler {
    engine: Arc<ModerationEngine>,
    dispatcher: Arc<EnforcementDispatcher>,
    metrics: Arc<WardenMetrics>,
}

impl MessageHandler {
    pub fn new(
        engine: Arc<ModerationEngine>,
        dispatcher: Arc<EnforcementDispatcher>,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            metrics,
        }
    }

    /// Evaluate one message and enforce the verdict.
    ///
    /// Bot authors and messages outside a guild are ignored and never enter
    /// the rate window.
    pub async fn handle(&self, message: IncomingMessage) -> Option<EnforcementReport> {
        if message.author_is_bot {
            return None;
        }
        let scope = message.scope.clone()?;
        let span = message_span(message.author.as_str(), message.channel.as_str());

        async {
            self.metrics.messages_classified.inc();
            let verdict = self
                .engine
                .evaluate(&message.author, &message.body, message.attachment_kinds())
                .await;
            let report = self
                .dispatcher
                .dispatch(&scope, &message.author, verdict, &message.reference())
                .await?;
            self.metrics
                .enforcements
                .with_label_values(&[report.reason.as_str()])
                .inc();
            Some(report)
        }
        .instrument(span)
        .await
    }
}
