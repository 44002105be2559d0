//! Foundry bridge: keeps a combat tracker in sync with a remote control
//! service.
//!
//! Snapshots of host state flow out through a debounced publisher; commands
//! flow in over polling or an event stream, are applied at most once per
//! session and acknowledged with a result.

pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
