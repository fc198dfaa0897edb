//! Slot Cache demo
//!
//! Runs a synthetic workload against a byte cache and a value cache while the
//! background sweeper keeps both within budget. Stops on Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slot_cache::{ByteCache, Config, Registry, SlotCache, Sweeper, SweeperConfig};

/// Delay between two synthetic writes
const WORKLOAD_TICK: Duration = Duration::from_millis(50);

/// Largest synthetic byte payload
const MAX_PAYLOAD: usize = 256 * 1024;

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Create the registry and two caches
/// 4. Start the background sweeper
/// 5. Run the workload until a shutdown signal arrives
/// 6. Stop the sweeper and log final statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slot_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Slot Cache demo");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: sweep_interval={}s, cache_slots={}, cache_budget_mb={}",
        config.sweep_interval, config.cache_slots, config.cache_budget_mb
    );

    let registry = Registry::new();
    let blobs = ByteCache::bytes_builder()
        .slots(config.cache_slots)
        .budget_megabytes(config.cache_budget_mb)
        .label("blobs")
        .build(&registry);
    let names: Arc<SlotCache<String>> = SlotCache::builder(name_size)
        .slots(config.cache_slots)
        .budget_megabytes(config.cache_budget_mb)
        .label("names")
        .build(&registry);
    info!("{} caches registered", registry.len());

    let sweeper = Sweeper::new(registry.clone(), SweeperConfig::from(&config));
    sweeper.start().context("failed to start sweeper")?;
    info!("Background sweeper started");

    let (stop_workload, workload_stopped) = watch::channel(false);
    let workload = tokio::spawn(run_workload(
        Arc::clone(&blobs),
        Arc::clone(&names),
        workload_stopped,
    ));

    shutdown_signal().await;

    let _ = stop_workload.send(true);
    workload.await.context("workload task failed")?;
    sweeper.stop().await.context("failed to stop sweeper")?;

    for cache_stats in [blobs.stats(), names.stats()] {
        info!("Final stats: {}", serde_json::to_string(&cache_stats)?);
    }

    blobs.close();
    names.close();
    info!("Shutdown complete");
    Ok(())
}

/// Writes pseudo-random payloads into both caches until told to stop.
async fn run_workload(
    blobs: Arc<ByteCache>,
    names: Arc<SlotCache<String>>,
    mut stop: watch::Receiver<bool>,
) {
    let slots = blobs.capacity().max(1);
    let mut tick: usize = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(WORKLOAD_TICK) => {}
            _ = stop.changed() => break,
        }

        let index = tick.wrapping_mul(7919) % slots;
        let size = tick.wrapping_mul(104_729) % MAX_PAYLOAD;

        if blobs.get(index).is_none() {
            blobs.store(index, vec![(tick % 251) as u8; size]);
        } else if tick % 3 == 0 {
            blobs.replace(index, vec![0; size / 2]);
        }

        names.replace(index, format!("payload-{}", tick));

        tick = tick.wrapping_add(1);
    }
}

/// Charges a name for its heap buffer.
#[allow(clippy::ptr_arg)]
fn name_size(name: &String) -> u64 {
    name.capacity() as u64
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
