// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Opts, Registry,
};

use crate::sync::TransportState;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the bridge
// ============================================================================
//
// Provides metrics for:
// - Command application (throughput, latency, failures, duplicates)
// - Acknowledgements and streaming claims
// - Snapshot pushes
// - Transport state, fallbacks and watchdog recoveries
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Command Metrics
    pub commands_applied: IntCounterVec,
    pub commands_failed: IntCounterVec,
    pub command_duration: HistogramVec,
    pub commands_dropped: IntCounter,
    pub duplicates_skipped: IntCounter,

    // Ack / Claim Metrics
    pub ack_failures: IntCounter,
    pub claims_lost: IntCounter,

    // Snapshot Metrics
    pub snapshots_pushed: IntCounter,
    pub snapshots_failed: IntCounter,

    // Transport Metrics
    pub transport_state: IntGauge,
    pub transport_fallbacks: IntCounter,
    pub watchdog_recoveries: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Command Metrics
        let commands_applied = IntCounterVec::new(
            Opts::new("bridge_commands_applied_total", "Commands applied to the host"),
            &["kind"],
        )?;
        registry.register(Box::new(commands_applied.clone()))?;

        let commands_failed = IntCounterVec::new(
            Opts::new("bridge_commands_failed_total", "Commands acknowledged as failed"),
            &["reason"],
        )?;
        registry.register(Box::new(commands_failed.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new("bridge_command_apply_seconds", "Command apply duration")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["kind"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        let commands_dropped = IntCounter::new(
            "bridge_commands_dropped_total",
            "Commands dropped for lacking an id",
        )?;
        registry.register(Box::new(commands_dropped.clone()))?;

        let duplicates_skipped = IntCounter::new(
            "bridge_duplicate_commands_total",
            "Redelivered commands skipped by the dedup cache",
        )?;
        registry.register(Box::new(duplicates_skipped.clone()))?;

        // Ack / Claim Metrics
        let ack_failures = IntCounter::new(
            "bridge_ack_failures_total",
            "Acknowledgements that failed to reach the service",
        )?;
        registry.register(Box::new(ack_failures.clone()))?;

        let claims_lost = IntCounter::new(
            "bridge_claims_lost_total",
            "Streamed commands claimed by another consumer first",
        )?;
        registry.register(Box::new(claims_lost.clone()))?;

        // Snapshot Metrics
        let snapshots_pushed = IntCounter::new(
            "bridge_snapshots_pushed_total",
            "Snapshots accepted by the service",
        )?;
        registry.register(Box::new(snapshots_pushed.clone()))?;

        let snapshots_failed = IntCounter::new(
            "bridge_snapshots_failed_total",
            "Snapshot pushes that failed and were dropped",
        )?;
        registry.register(Box::new(snapshots_failed.clone()))?;

        // Transport Metrics
        let transport_state = IntGauge::new(
            "bridge_transport_state",
            "Transport state (0=Polling, 1=Streaming, 2=Disconnected)",
        )?;
        registry.register(Box::new(transport_state.clone()))?;

        let transport_fallbacks = IntCounter::new(
            "bridge_transport_fallbacks_total",
            "Streaming to polling fallbacks",
        )?;
        registry.register(Box::new(transport_fallbacks.clone()))?;

        let watchdog_recoveries = IntCounter::new(
            "bridge_watchdog_recoveries_total",
            "Recoveries forced by the watchdog",
        )?;
        registry.register(Box::new(watchdog_recoveries.clone()))?;

        Ok(Self {
            registry,
            commands_applied,
            commands_failed,
            command_duration,
            commands_dropped,
            duplicates_skipped,
            ack_failures,
            claims_lost,
            snapshots_pushed,
            snapshots_failed,
            transport_state,
            transport_fallbacks,
            watchdog_recoveries,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record one command outcome; `label` is the kind on
    /// success and the failure category otherwise.
    pub fn record_command(&self, label: &str, duration_secs: f64, success: bool) {
        if success {
            self.commands_applied.with_label_values(&[label]).inc();
        } else {
            self.commands_failed.with_label_values(&[label]).inc();
        }
        self.command_duration.with_label_values(&[label]).observe(duration_secs);
    }

    pub fn record_dropped_command(&self) {
        self.commands_dropped.inc();
    }

    pub fn record_duplicate(&self) {
        self.duplicates_skipped.inc();
    }

    pub fn record_ack_failure(&self) {
        self.ack_failures.inc();
    }

    pub fn record_claim_lost(&self) {
        self.claims_lost.inc();
    }

    pub fn record_snapshot(&self, success: bool) {
        if success {
            self.snapshots_pushed.inc();
        } else {
            self.snapshots_failed.inc();
        }
    }

    /// Helper to update the transport state gauge
    pub fn set_transport_state(&self, state: TransportState) {
        let value = match state {
            TransportState::Polling => 0,
            TransportState::Streaming => 1,
            TransportState::Disconnected => 2,
        };
        self.transport_state.set(value);
    }

    pub fn record_fallback(&self) {
        self.transport_fallbacks.inc();
    }

    pub fn record_watchdog_recovery(&self) {
        self.watchdog_recoveries.inc();
    }
}
