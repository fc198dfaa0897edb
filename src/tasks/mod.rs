//! Background Tasks Module
//!
//! Contains the background task that keeps registered caches within budget.
//!
//! # Tasks
//! - Memory Sweep: graduated age-based eviction at a configured interval

mod sweeper;

pub use sweeper::{
    purge_graduated, spawn_sweep_task, sweep_once, PurgeOutcome, PurgeStage, SweepReport,
    Sweeper, GRADUATED_STAGES,
};
