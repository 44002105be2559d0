use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::BridgeConfig;
use crate::domain::combat::{CombatHost, CommandProcessor};
use crate::messaging::BridgeApi;
use crate::metrics::Metrics;

use super::events::StateEvents;
use super::health::HealthCheckable;
use super::session::BridgeSession;
use super::snapshot_publisher::SnapshotPublisher;
use super::transport::{CommandTransport, TransportSettings};
use super::watchdog::HealthWatchdog;

// ============================================================================
// Bridge Coordinator - wires and runs one bridge session
// ============================================================================
//
// Responsibilities:
// - Builds the session context shared by every component
// - Starts the snapshot publisher, command transport and watchdog tasks
// - Announces readiness with an initial snapshot
// - Stops everything on shutdown
//
// Task Layout:
//   BridgeCoordinator
//   ├── SnapshotPublisher   (debounce loop)
//   ├── CommandTransport    (stream, then polling)
//   └── HealthWatchdog      (staleness tick)
//
// ============================================================================

/// Capacity of the state-change bus.
const EVENT_BUS_CAPACITY: usize = 256;

pub struct BridgeCoordinator {
    session: Arc<BridgeSession>,
    events: StateEvents,
    publisher: Arc<SnapshotPublisher>,
    transport: Arc<CommandTransport>,
    watchdog: Arc<HealthWatchdog>,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeCoordinator {
    pub fn new(
        config: &BridgeConfig,
        host: Arc<dyn CombatHost>,
        api: Arc<dyn BridgeApi>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let settings = TransportSettings::from_config(config);
        let session = Arc::new(BridgeSession::new(settings.initial_state(), config.dedup_capacity));
        let events = StateEvents::new(EVENT_BUS_CAPACITY);

        let publisher = Arc::new(SnapshotPublisher::new(
            host.clone(),
            api.clone(),
            events.clone(),
            metrics.clone(),
            config.debounce(),
        ));

        let processor = Arc::new(CommandProcessor::new(
            host,
            api.clone(),
            session.clone(),
            events.clone(),
            metrics.clone(),
            config.error_max_len,
        ));

        let transport = Arc::new(CommandTransport::new(
            api,
            processor,
            session.clone(),
            metrics.clone(),
            settings,
        ));

        let watchdog = Arc::new(HealthWatchdog::new(
            transport.clone(),
            session.clone(),
            metrics,
            config.watchdog_tick(),
            config.stale_threshold(),
        ));

        Self {
            session,
            events,
            publisher,
            transport,
            watchdog,
            tasks: Vec::new(),
        }
    }

    /// Spawn the session tasks. Calling it again is a no-op.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }

        tracing::info!(
            session_id = %self.session.id(),
            transport = %self.session.state(),
            "🎯 Starting bridge session"
        );

        self.tasks.push(self.publisher.clone().spawn());

        let transport = self.transport.clone();
        self.tasks.push(tokio::spawn(async move { transport.run().await }));

        let watchdog = self.watchdog.clone();
        self.tasks.push(tokio::spawn(async move { watchdog.run().await }));

        self.publisher.notify("ready");
        tracing::info!("✅ Bridge session started");
    }

    /// Handle for host observers to report state changes.
    pub fn events(&self) -> StateEvents {
        self.events.clone()
    }

    pub fn session(&self) -> Arc<BridgeSession> {
        self.session.clone()
    }

    pub fn health(&self) -> Arc<dyn HealthCheckable> {
        self.watchdog.clone()
    }

    pub async fn shutdown(self) {
        tracing::info!(session_id = %self.session.id(), "🛑 Stopping bridge session");
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Cancellation is the expected outcome here
            let _ = task.await;
        }
        tracing::info!("🛑 Bridge session stopped");
    }
}
