// ============================================================================
// Sync Layer - the bridge protocol core
// ============================================================================
//
// - dedup / session:     per-connection state (no hidden globals)
// - events:              state-change bus feeding the snapshot publisher
// - snapshot_publisher:  debounced full-state export
// - transport:           polling / streaming command delivery with fallback
// - watchdog + health:   staleness detection and health reporting
// - coordinator:         wires the above into running tasks
//
// ============================================================================

mod coordinator;
mod dedup;
mod events;
mod health;
mod session;
mod snapshot_publisher;
mod transport;
mod watchdog;

pub use coordinator::BridgeCoordinator;
pub use dedup::DedupCache;
pub use events::{StateChange, StateEvents};
pub use health::{ComponentHealth, HealthCheckable, HealthStatus};
pub use session::{BridgeSession, PollGuard, TransportState, TransportStatus};
pub use snapshot_publisher::SnapshotPublisher;
pub use transport::{ClaimOutcome, CommandTransport, PollOutcome, TransportSettings};
pub use watchdog::HealthWatchdog;
