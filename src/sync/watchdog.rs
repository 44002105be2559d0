use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::metrics::Metrics;

use super::health::{ComponentHealth, HealthCheckable, HealthStatus};
use super::session::{BridgeSession, TransportState};
use super::transport::{CommandTransport, PollOutcome};

// ============================================================================
// Health Watchdog - self-healing for stalled transports
// ============================================================================
//
// Runs on its own tick, independent of the transport schedule. When the
// session has seen no transport activity for longer than the staleness
// threshold it forces a recovery: a stalled stream is abandoned for
// polling and a poll runs immediately. While streaming, the threshold is
// never shorter than the stream's own idle budget.
//
// The last check is kept so /health can report it without side effects.
//
// ============================================================================

const COMPONENT: &str = "command_transport";

pub struct HealthWatchdog {
    transport: Arc<CommandTransport>,
    session: Arc<BridgeSession>,
    metrics: Arc<Metrics>,
    tick: Duration,
    threshold: Duration,
    last: Mutex<ComponentHealth>,
}

impl HealthWatchdog {
    pub fn new(
        transport: Arc<CommandTransport>,
        session: Arc<BridgeSession>,
        metrics: Arc<Metrics>,
        tick: Duration,
        threshold: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            metrics,
            tick,
            threshold,
            last: Mutex::new(ComponentHealth::new(COMPONENT, HealthStatus::Healthy)),
        }
    }

    /// A live stream may legitimately go quiet for up to its idle budget,
    /// so streaming is only stale once that budget is spent as well.
    fn threshold_for(&self, state: TransportState) -> Duration {
        match state {
            TransportState::Streaming => self
                .threshold
                .max(self.transport.settings().stream_idle_timeout),
            TransportState::Polling | TransportState::Disconnected => self.threshold,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.tick.as_secs_f64(),
            threshold_secs = self.threshold.as_secs_f64(),
            "🩺 Health watchdog started"
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing can be stale yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let health = self.check().await;
            match health.status {
                HealthStatus::Healthy => tracing::trace!("Transport healthy"),
                HealthStatus::Degraded(ref msg) => tracing::debug!(status = %msg, "Transport degraded"),
                HealthStatus::Unhealthy(ref msg) => tracing::error!(status = %msg, "Transport unhealthy"),
            }
        }
    }

    /// Inspect the transport once, recovering it if stale.
    pub async fn check(&self) -> ComponentHealth {
        let idle = self.session.idle_for();
        let state = self.session.state();
        let threshold = self.threshold_for(state);

        let health = if idle <= threshold {
            let status = if self.session.fell_back() {
                HealthStatus::Degraded("streaming fell back to polling".to_string())
            } else {
                HealthStatus::Healthy
            };
            ComponentHealth::new(COMPONENT, status)
        } else {
            tracing::warn!(
                idle_secs = idle.as_secs(),
                threshold_secs = threshold.as_secs(),
                transport = %state,
                "⏰ Transport stale; forcing recovery"
            );
            self.metrics.record_watchdog_recovery();

            match self.transport.recover("watchdog: transport stale").await {
                PollOutcome::Processed(n) => {
                    tracing::info!(processed = n, "Watchdog recovery poll succeeded");
                    ComponentHealth::new(
                        COMPONENT,
                        HealthStatus::Degraded(format!("recovered after {}s idle", idle.as_secs())),
                    )
                }
                outcome => ComponentHealth::new(
                    COMPONENT,
                    HealthStatus::Unhealthy(format!(
                        "no activity for {}s (recovery: {:?})",
                        idle.as_secs(),
                        outcome
                    )),
                ),
            }
        };

        let health = health.with_details(format!("transport={}", self.session.state()));
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = health.clone();
        health
    }
}

impl HealthCheckable for HealthWatchdog {
    fn check_health(&self) -> ComponentHealth {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn component_name(&self) -> &str {
        COMPONENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportMode;
    use crate::domain::combat::{Combatant, CombatTracker, CommandProcessor};
    use crate::sync::{StateEvents, TransportSettings};
    use crate::test_utils::InMemoryBridge;

    struct Fixture {
        bridge: Arc<InMemoryBridge>,
        session: Arc<BridgeSession>,
        watchdog: HealthWatchdog,
    }

    fn fixture(preferred: TransportMode) -> Fixture {
        let settings = TransportSettings {
            preferred,
            poll_interval: Duration::from_secs(1),
            batch_size: 25,
            stream_idle_timeout: Duration::from_secs(45),
        };
        let tracker = Arc::new(CombatTracker::new("Test World").with_combatant(Combatant::new("t1", "Goblin")));
        let bridge = Arc::new(InMemoryBridge::new());
        let session = Arc::new(BridgeSession::new(settings.initial_state(), 16));
        let metrics = Arc::new(Metrics::new().unwrap());
        let processor = Arc::new(CommandProcessor::new(
            tracker,
            bridge.clone(),
            session.clone(),
            StateEvents::new(16),
            metrics.clone(),
            200,
        ));
        let transport = Arc::new(CommandTransport::new(
            bridge.clone(),
            processor,
            session.clone(),
            metrics.clone(),
            settings,
        ));
        let watchdog = HealthWatchdog::new(
            transport,
            session.clone(),
            metrics,
            Duration::from_secs(2),
            Duration::from_secs(10),
        );
        Fixture { bridge, session, watchdog }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_transport_is_left_alone() {
        let f = fixture(TransportMode::Polling);
        tokio::time::advance(Duration::from_secs(5)).await;

        let health = f.watchdog.check().await;

        assert!(health.status.is_healthy());
        assert_eq!(f.bridge.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_transport_forces_poll_and_touches_activity() {
        let f = fixture(TransportMode::Polling);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(f.session.idle_for() > Duration::from_secs(10));

        let health = f.watchdog.check().await;

        assert_eq!(f.bridge.fetch_count(), 1);
        assert!(f.session.idle_for() < Duration::from_secs(1));
        assert!(health.status.is_degraded());
        assert!(f.watchdog.check_health().status.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_stream_within_idle_budget_is_kept() {
        let f = fixture(TransportMode::Streaming);
        tokio::time::advance(Duration::from_secs(30)).await;

        let health = f.watchdog.check().await;

        assert!(health.status.is_healthy());
        assert_eq!(f.session.state(), TransportState::Streaming);
        assert_eq!(f.bridge.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_stream_falls_back_then_polls() {
        let f = fixture(TransportMode::Streaming);
        tokio::time::advance(Duration::from_secs(46)).await;

        f.watchdog.check().await;

        assert_eq!(f.session.state(), TransportState::Polling);
        assert!(f.session.fell_back());
        assert_eq!(f.bridge.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_recovery_reports_unhealthy() {
        let f = fixture(TransportMode::Polling);
        f.bridge.set_fail_fetch(true);
        tokio::time::advance(Duration::from_secs(11)).await;

        let health = f.watchdog.check().await;

        assert!(health.status.is_unhealthy());
        assert_eq!(f.watchdog.component_name(), "command_transport");
    }
}
