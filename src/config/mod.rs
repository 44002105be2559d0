//! Bridge configuration
//!
//! Loaded from environment variables with the `FOUNDRY_BRIDGE` prefix, using
//! `__` as the separator (e.g. `FOUNDRY_BRIDGE__POLL_INTERVAL_MS=500`). A
//! `.env` file is honoured during development.

mod error;

pub use error::{ConfigError, ValidationError};

use serde::Deserialize;
use std::time::Duration;

/// Smallest polling interval the bridge will run with.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Preferred way of receiving commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Polling,
    Streaming,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge service root, e.g. `http://127.0.0.1:8787`
    pub base_url: String,
    /// Shared secret; blank means unauthenticated
    pub secret: Option<String>,
    pub transport: TransportMode,
    /// World name reported in snapshots
    pub world: String,
    pub poll_interval_ms: u64,
    /// Commands fetched per poll tick
    pub batch_size: usize,
    pub dedup_capacity: usize,
    /// Snapshot quiescence window
    pub debounce_ms: u64,
    pub stream_idle_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub watchdog_tick_secs: u64,
    pub stale_multiplier: u32,
    pub stale_floor_secs: u64,
    /// Longest failure reason sent in an ack
    pub error_max_len: usize,
    /// Serve `/metrics` and `/health` on this port when set
    pub metrics_port: Option<u16>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            secret: None,
            transport: TransportMode::Polling,
            world: "local".to_string(),
            poll_interval_ms: 1_000,
            batch_size: 25,
            dedup_capacity: 500,
            debounce_ms: 150,
            stream_idle_timeout_secs: 45,
            request_timeout_secs: 3,
            watchdog_tick_secs: 2,
            stale_multiplier: 5,
            stale_floor_secs: 10,
            error_max_len: 200,
            metrics_port: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the environment (and `.env`, if present).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FOUNDRY_BRIDGE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let url = self.base_url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ValidationError::InvalidBaseUrl);
        }

        let positive = [
            ("batch_size", self.batch_size as u64),
            ("dedup_capacity", self.dedup_capacity as u64),
            ("debounce_ms", self.debounce_ms),
            ("stream_idle_timeout_secs", self.stream_idle_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("watchdog_tick_secs", self.watchdog_tick_secs),
            ("stale_multiplier", self.stale_multiplier as u64),
            ("error_max_len", self.error_max_len as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ValidationError::MustBePositive(name));
            }
        }
        Ok(())
    }

    /// Base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn watchdog_tick(&self) -> Duration {
        Duration::from_secs(self.watchdog_tick_secs)
    }

    /// Idle time after which the watchdog forces recovery.
    pub fn stale_threshold(&self) -> Duration {
        (self.poll_interval() * self.stale_multiplier).max(Duration::from_secs(self.stale_floor_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "FOUNDRY_BRIDGE__BASE_URL",
        "FOUNDRY_BRIDGE__TRANSPORT",
        "FOUNDRY_BRIDGE__BATCH_SIZE",
        "FOUNDRY_BRIDGE__SECRET",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("FOUNDRY_BRIDGE__BASE_URL", "http://10.0.0.5:8787/");
        env::set_var("FOUNDRY_BRIDGE__TRANSPORT", "streaming");
        env::set_var("FOUNDRY_BRIDGE__BATCH_SIZE", "10");
        env::set_var("FOUNDRY_BRIDGE__SECRET", "s3cret");
        let result = BridgeConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.base_url(), "http://10.0.0.5:8787");
        assert_eq!(config.transport, TransportMode::Streaming);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.secret(), Some("s3cret"));
        assert_eq!(config.dedup_capacity, 500);
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport, TransportMode::Polling);
        assert_eq!(config.debounce(), Duration::from_millis(150));
    }

    #[test]
    fn test_blank_secret_means_none() {
        let config = BridgeConfig {
            secret: Some("   ".to_string()),
            ..BridgeConfig::default()
        };
        assert_eq!(config.secret(), None);
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let config = BridgeConfig {
            poll_interval_ms: 10,
            ..BridgeConfig::default()
        };
        assert_eq!(config.poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_stale_threshold_uses_floor_then_multiple() {
        let config = BridgeConfig::default();
        assert_eq!(config.stale_threshold(), Duration::from_secs(10));

        let slow = BridgeConfig {
            poll_interval_ms: 4_000,
            ..BridgeConfig::default()
        };
        assert_eq!(slow.stale_threshold(), Duration::from_secs(20));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = BridgeConfig {
            base_url: "ftp://example.com".to_string(),
            ..BridgeConfig::default()
        };
        assert_eq!(bad_url.validate(), Err(ValidationError::InvalidBaseUrl));

        let zero_batch = BridgeConfig {
            batch_size: 0,
            ..BridgeConfig::default()
        };
        assert_eq!(
            zero_batch.validate(),
            Err(ValidationError::MustBePositive("batch_size"))
        );
    }
}
