//! Memory Sweeper Task
//!
//! Background task that periodically checks every registered cache against its
//! budget and evicts idle entries in graduated stages until the cache fits.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{system_clock, Clock};
use crate::config::SweeperConfig;
use crate::error::{CacheError, Result};
use crate::registry::{Evictable, Registry};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

// == Purge Stage ==
/// One step of a graduated purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PurgeStage {
    /// Evict entries idle for longer than this many seconds
    IdleFor(i64),
    /// Evict every entry
    Everything,
}

impl PurgeStage {
    /// Last-access cutoff for this stage at `now`.
    pub fn threshold(self, now: i64) -> i64 {
        match self {
            PurgeStage::IdleFor(secs) => now - secs,
            // Past any plausible last access, including small clock skew
            PurgeStage::Everything => now + HOUR,
        }
    }
}

/// Stages applied to an over-budget cache, least aggressive first.
pub const GRADUATED_STAGES: [PurgeStage; 5] = [
    PurgeStage::IdleFor(5 * DAY),
    PurgeStage::IdleFor(DAY),
    PurgeStage::IdleFor(HOUR),
    PurgeStage::IdleFor(10 * MINUTE),
    PurgeStage::Everything,
];

// == Reports ==
/// Result of a graduated purge on one cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeOutcome {
    pub label: String,
    pub memory_before: u64,
    pub memory_after: u64,
    /// Number of stages that ran
    pub stages_applied: usize,
    pub entries_purged: usize,
    /// Whether the cache ended within its budget
    pub within_budget: bool,
}

/// Result of one sweep across a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub caches_scanned: usize,
    pub caches_over_budget: usize,
    pub entries_purged: usize,
    /// One outcome per over-budget cache
    pub outcomes: Vec<PurgeOutcome>,
}

// == Graduated Purge ==
/// Applies `GRADUATED_STAGES` to `cache`, stopping as soon as it is within
/// budget. A cache already within budget is left untouched.
pub fn purge_graduated(cache: &dyn Evictable, now: i64) -> PurgeOutcome {
    let memory_before = cache.memory();
    let mut stages_applied = 0;
    let mut entries_purged = 0;

    for stage in GRADUATED_STAGES {
        if !cache.is_over_budget() {
            break;
        }
        let removed = cache.purge(stage.threshold(now));
        stages_applied += 1;
        entries_purged += removed;
        debug!(
            "Purge stage {:?} on {}: removed {} entries, {} of {} bytes used",
            stage,
            cache.label(),
            removed,
            cache.memory(),
            cache.budget()
        );
    }

    PurgeOutcome {
        label: cache.label().to_string(),
        memory_before,
        memory_after: cache.memory(),
        stages_applied,
        entries_purged,
        within_budget: !cache.is_over_budget(),
    }
}

// == Sweep ==
/// Runs one sweep over a snapshot of `registry` at time `now`.
pub fn sweep_once(registry: &Registry, now: i64) -> SweepReport {
    let caches = registry.snapshot();
    let mut report = SweepReport {
        caches_scanned: caches.len(),
        ..SweepReport::default()
    };

    for cache in caches {
        if !cache.is_over_budget() {
            continue;
        }
        let outcome = purge_graduated(cache.as_ref(), now);
        report.caches_over_budget += 1;
        report.entries_purged += outcome.entries_purged;
        report.outcomes.push(outcome);
    }

    report
}

/// Spawns a background task that sweeps `registry` every `interval` until
/// `shutdown` changes or its sender is dropped.
///
/// Each sweep runs on the blocking pool, since purging walks every slot
/// under its lock. A sweep that panics is logged and the next tick runs as
/// usual.
///
/// # Arguments
/// * `registry` - Caches to keep within budget
/// * `interval` - Time between sweeps
/// * `clock` - Source of "now" for purge thresholds
/// * `shutdown` - Receiver signalled when the task should exit
///
/// # Returns
/// A JoinHandle that completes once the task has observed shutdown.
pub fn spawn_sweep_task(
    registry: Registry,
    interval: Duration,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting sweep task with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }

            let now = clock.now();
            let sweep_registry = registry.clone();
            let report =
                match tokio::task::spawn_blocking(move || sweep_once(&sweep_registry, now)).await {
                    Ok(report) => report,
                    Err(e) => {
                        warn!("Sweep failed: {}", e);
                        continue;
                    }
                };

            if report.entries_purged > 0 {
                info!(
                    "Sweep: purged {} entries from {} of {} caches",
                    report.entries_purged, report.caches_over_budget, report.caches_scanned
                );
            } else {
                debug!(
                    "Sweep: {} caches scanned, nothing to purge",
                    report.caches_scanned
                );
            }
        }

        info!("Sweep task stopped");
    })
}

struct RunningSweep {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

// == Sweeper ==
/// Owns the background sweep task for one registry.
///
/// Nothing runs until `start` is called; `stop` signals the task and waits
/// for it to exit.
pub struct Sweeper {
    registry: Registry,
    config: SweeperConfig,
    clock: Arc<dyn Clock>,
    running: Mutex<Option<RunningSweep>>,
}

impl Sweeper {
    pub fn new(registry: Registry, config: SweeperConfig) -> Self {
        Self {
            registry,
            config,
            clock: system_clock(),
            running: Mutex::new(None),
        }
    }

    /// Replaces the clock used to compute purge thresholds.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    /// Spawns the sweep task on the current Tokio runtime.
    ///
    /// A task that ended without `stop` (aborted, or its runtime shut down)
    /// no longer counts as running and is replaced.
    pub fn start(&self) -> Result<()> {
        self.config.validate()?;
        Handle::try_current().map_err(|e| CacheError::NoRuntime(e.to_string()))?;

        let mut running = self.running.lock();
        if let Some(previous) = running.as_ref() {
            if !previous.handle.is_finished() {
                return Err(CacheError::SweeperRunning);
            }
            warn!("Sweep task ended without stop, restarting");
            *running = None;
        }

        let (shutdown, receiver) = watch::channel(false);
        let handle = spawn_sweep_task(
            self.registry.clone(),
            self.config.interval,
            Arc::clone(&self.clock),
            receiver,
        );
        *running = Some(RunningSweep { shutdown, handle });
        Ok(())
    }

    /// Signals the sweep task and waits for it to finish.
    pub async fn stop(&self) -> Result<()> {
        let running = self.take_running().ok_or(CacheError::SweeperNotRunning)?;
        let _ = running.shutdown.send(true);
        running
            .handle
            .await
            .map_err(|e| CacheError::TaskFailed(e.to_string()))
    }

    fn take_running(&self) -> Option<RunningSweep> {
        self.running.lock().take()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Runs a sweep immediately on the calling thread.
    pub fn sweep_now(&self) -> SweepReport {
        sweep_once(&self.registry, self.clock.now())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown.send(true);
            running.handle.abort();
        }
    }
}
