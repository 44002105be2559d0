use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use super::dedup::DedupCache;

// ============================================================================
// Bridge Session - state shared by every sync component of one connection
// ============================================================================
//
// Owns:
// - the dedup cache
// - the transport state and last-activity timestamp
// - the transport epoch: bumped whenever the active transport is replaced,
//   so work resumed after an await can tell it has been superseded
// - the poll in-flight flag
//
// Locks are never held across an await.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Polling,
    Streaming,
    /// Transient: entered on stream failure, left immediately for Polling.
    Disconnected,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Polling => "polling",
            TransportState::Streaming => "streaming",
            TransportState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransportStatus {
    pub state: TransportState,
    pub last_activity_at: Instant,
    /// Set once streaming has degraded to polling in this session.
    pub fell_back: bool,
}

pub struct BridgeSession {
    id: Uuid,
    epoch: AtomicU64,
    dedup: Mutex<DedupCache>,
    status: Mutex<TransportStatus>,
    poll_in_flight: AtomicBool,
    preempted: Notify,
}

/// Clears the poll in-flight flag when dropped.
pub struct PollGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl BridgeSession {
    pub fn new(initial: TransportState, dedup_capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch: AtomicU64::new(0),
            dedup: Mutex::new(DedupCache::new(dedup_capacity)),
            status: Mutex::new(TransportStatus {
                state: initial,
                last_activity_at: Instant::now(),
                fell_back: false,
            }),
            poll_in_flight: AtomicBool::new(false),
            preempted: Notify::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ---- transport epoch ----

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Invalidate the active transport and wake anything waiting on it.
    pub fn supersede(&self) -> u64 {
        let next = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        self.preempted.notify_waiters();
        next
    }

    /// Resolves on the next `supersede`.
    pub async fn preempted(&self) {
        self.preempted.notified().await
    }

    // ---- transport status ----

    pub fn status(&self) -> TransportStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TransportState {
        self.status().state
    }

    pub fn set_state(&self, state: TransportState) {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).state = state;
    }

    /// Record that streaming degraded to polling.
    pub fn mark_fell_back(&self) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.state = TransportState::Polling;
        status.fell_back = true;
    }

    pub fn fell_back(&self) -> bool {
        self.status().fell_back
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&self) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.last_activity_at = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.status().last_activity_at.elapsed()
    }

    // ---- dedup ----

    pub fn seen(&self, id: &str) -> bool {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner).seen(id)
    }

    pub fn record(&self, id: &str) {
        self.dedup.lock().unwrap_or_else(PoisonError::into_inner).record(id);
    }

    // ---- poll in-flight flag ----

    /// `None` while another poll tick is still running.
    pub fn try_begin_poll(&self) -> Option<PollGuard<'_>> {
        self.poll_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PollGuard { flag: &self.poll_in_flight })
    }
}
