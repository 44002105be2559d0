use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use foundry_bridge::config::BridgeConfig;
use foundry_bridge::domain::combat::CombatTracker;
use foundry_bridge::messaging::HttpBridgeClient;
use foundry_bridge::metrics::{self, Metrics};
use foundry_bridge::sync::BridgeCoordinator;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,foundry_bridge=debug"))
        )
        .init();

    tracing::info!("🚀 Starting Foundry bridge v{}", env!("CARGO_PKG_VERSION"));

    // === 1. Load configuration ===
    let config = BridgeConfig::load()?;
    config.validate()?;
    tracing::info!(
        base_url = %config.base_url(),
        transport = ?config.transport,
        authenticated = config.secret().is_some(),
        poll_interval_ms = config.poll_interval().as_millis() as u64,
        "Configuration loaded"
    );

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Host adapter and bridge client ===
    let tracker = Arc::new(CombatTracker::new(config.world.clone()));
    let client = Arc::new(HttpBridgeClient::new(&config)?);

    // === 4. Start the bridge session ===
    let mut coordinator = BridgeCoordinator::new(&config, tracker, client, metrics.clone());
    coordinator.start();

    // Metrics server runs on its own thread with an actix system
    if let Some(port) = config.metrics_port {
        let registry = metrics.registry().clone();
        let health = coordinator.health();
        std::thread::spawn(move || {
            let system = actix_web::rt::System::new();
            if let Err(e) = system.block_on(metrics::start_metrics_server(registry, health, port)) {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    // === 5. Run until interrupted ===
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");
    coordinator.shutdown().await;

    tracing::info!("👋 Bridge stopped");
    Ok(())
}
