use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::domain::combat::CombatHost;
use crate::messaging::BridgeApi;
use crate::metrics::Metrics;
use crate::models::Snapshot;

use super::events::{StateChange, StateEvents};

// ============================================================================
// Snapshot Publisher - debounced full-state export
// ============================================================================
//
// Every state change restarts a quiescence window. Once the window passes
// without another change, one snapshot of the *current* host state is
// pushed. A failed push is logged and dropped: snapshots are full-state
// replacements, so the next one supersedes whatever was lost.
//
// ============================================================================

pub struct SnapshotPublisher {
    host: Arc<dyn CombatHost>,
    api: Arc<dyn BridgeApi>,
    events: StateEvents,
    metrics: Arc<Metrics>,
    window: Duration,
}

impl SnapshotPublisher {
    pub fn new(
        host: Arc<dyn CombatHost>,
        api: Arc<dyn BridgeApi>,
        events: StateEvents,
        metrics: Arc<Metrics>,
        window: Duration,
    ) -> Self {
        Self {
            host,
            api,
            events,
            metrics,
            window,
        }
    }

    /// Schedule a publish. Returns immediately.
    pub fn notify(&self, reason: impl Into<String>) {
        self.events.notify(reason);
    }

    /// Start the debounce loop. Subscribes before spawning so no change
    /// sent right after this call is missed.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let rx = self.events.subscribe();
        tokio::spawn(async move { self.run(rx).await })
    }

    async fn run(&self, mut rx: broadcast::Receiver<StateChange>) {
        tracing::info!(window_ms = self.window.as_millis() as u64, "📸 Snapshot publisher started");

        loop {
            let mut reason = match rx.recv().await {
                Ok(change) => change.reason,
                // Overflow only means changes were coalesced early
                Err(RecvError::Lagged(skipped)) => format!("lagged:{skipped}"),
                Err(RecvError::Closed) => return,
            };
            let mut coalesced = 0u32;

            loop {
                match tokio::time::timeout(self.window, rx.recv()).await {
                    Ok(Ok(change)) => {
                        reason = change.reason;
                        coalesced += 1;
                    }
                    Ok(Err(RecvError::Lagged(_))) => coalesced += 1,
                    Ok(Err(RecvError::Closed)) => {
                        self.publish(&reason).await;
                        return;
                    }
                    Err(_) => break,
                }
            }

            tracing::debug!(reason = %reason, coalesced, "Quiescence window elapsed");
            self.publish(&reason).await;
        }
    }

    /// Build a snapshot from the current host state and push it once.
    pub async fn publish(&self, reason: &str) -> bool {
        let export = self.host.export();
        let snapshot = Snapshot::new(export.active, export.payload);

        match self.api.push_snapshot(&snapshot).await {
            Ok(()) => {
                tracing::debug!(reason = %reason, state_active = snapshot.state_active, "Snapshot pushed");
                self.metrics.record_snapshot(true);
                true
            }
            Err(e) => {
                tracing::warn!(reason = %reason, error = %e, "Snapshot push failed; dropping");
                self.metrics.record_snapshot(false);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::combat::{Combatant, CombatTracker, Field, TargetRef};
    use crate::test_utils::InMemoryBridge;

    struct Fixture {
        tracker: Arc<CombatTracker>,
        bridge: Arc<InMemoryBridge>,
        metrics: Arc<Metrics>,
        publisher: Arc<SnapshotPublisher>,
    }

    fn fixture() -> Fixture {
        let tracker = Arc::new(
            CombatTracker::new("Test World").with_combatant(Combatant::new("t1", "Goblin").with_hp(7, 50)),
        );
        let bridge = Arc::new(InMemoryBridge::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let publisher = Arc::new(SnapshotPublisher::new(
            tracker.clone(),
            bridge.clone(),
            StateEvents::new(64),
            metrics.clone(),
            Duration::from_millis(150),
        ));
        Fixture { tracker, bridge, metrics, publisher }
    }

    fn set_hp(tracker: &CombatTracker, hp: f64) {
        tracker.write_field(&TargetRef::new("t1"), Field::Hp, hp).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_inside_window_pushes_final_state_once() {
        let f = fixture();
        f.publisher.clone().spawn();

        set_hp(&f.tracker, 10.0);
        f.publisher.notify("hp");
        tokio::time::sleep(Duration::from_millis(50)).await;
        set_hp(&f.tracker, 20.0);
        f.publisher.notify("hp");
        tokio::time::sleep(Duration::from_millis(100)).await;
        set_hp(&f.tracker, 30.0);
        f.publisher.notify("hp");
        tokio::time::sleep(Duration::from_millis(400)).await;

        let snapshots = f.bridge.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].payload["combatants"][0]["hp"]["value"], 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_push_separately() {
        let f = fixture();
        f.publisher.clone().spawn();

        f.publisher.notify("first");
        tokio::time::sleep(Duration::from_millis(400)).await;
        f.publisher.notify("second");
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(f.bridge.snapshots().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_failure_is_dropped_and_loop_survives() {
        let f = fixture();
        f.publisher.clone().spawn();

        f.bridge.set_fail_snapshots(true);
        f.publisher.notify("lost");
        tokio::time::sleep(Duration::from_millis(400)).await;

        f.bridge.set_fail_snapshots(false);
        f.publisher.notify("recovered");
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(f.bridge.snapshots().len(), 1);
        assert_eq!(f.metrics.snapshots_failed.get(), 1);
        assert_eq!(f.metrics.snapshots_pushed.get(), 1);
    }

    #[tokio::test]
    async fn test_publish_reports_inactive_combat() {
        let f = fixture();
        assert!(f.publisher.publish("manual").await);

        let snapshot = &f.bridge.snapshots()[0];
        assert!(!snapshot.state_active);
        assert_eq!(snapshot.payload["world"], "Test World");
    }
}
