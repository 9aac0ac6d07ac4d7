//! Prometheus metrics for the node.
//!
//! [`WardenMetrics`] owns a dedicated [`Registry`] that the webhook
//! server's `/metrics` endpoint encodes into the text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

pub struct WardenMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Guild messages run through the classifier.
    pub messages_classified: IntCounter,
    /// Enforcements, labelled by `reason`.
    pub enforcements: IntCounterVec,
    /// Verification sessions opened from the panel button.
    pub sessions_created: IntCounter,
    /// Verification callbacks, labelled by `outcome`.
    pub verifications: IntCounterVec,
    /// Interactions handled, labelled by `kind`.
    pub interactions: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Stored sessions after the last sweep.
    pub live_sessions: IntGauge,
    /// Members with a non-empty rate window after the last sweep.
    pub tracked_subjects: IntGauge,
}

impl WardenMetrics {
    /// Create a fresh set of metrics under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let messages_classified = register_int_counter_with_registry!(
            Opts::new(
                "warden_messages_classified_total",
                "Guild messages evaluated by the moderation engine"
            ),
            registry
        )?;

        let enforcements = register_int_counter_vec_with_registry!(
            Opts::new("warden_enforcements_total", "Enforcements applied, by reason"),
            &["reason"],
            registry
        )?;

        let sessions_created = register_int_counter_with_registry!(
            Opts::new(
                "warden_sessions_created_total",
                "Verification sessions created"
            ),
            registry
        )?;

        let verifications = register_int_counter_vec_with_registry!(
            Opts::new(
                "warden_verifications_total",
                "Verification callbacks, by outcome"
            ),
            &["outcome"],
            registry
        )?;

        let interactions = register_int_counter_vec_with_registry!(
            Opts::new("warden_interactions_total", "Interactions handled, by kind"),
            &["kind"],
            registry
        )?;

        let live_sessions = register_int_gauge_with_registry!(
            Opts::new("warden_live_sessions", "Verification sessions currently stored"),
            registry
        )?;

        let tracked_subjects = register_int_gauge_with_registry!(
            Opts::new(
                "warden_tracked_subjects",
                "Members with messages inside the rate window"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            messages_classified,
            enforcements,
            sessions_created,
            verifications,
            interactions,
            live_sessions,
            tracked_subjects,
        })
    }
}
