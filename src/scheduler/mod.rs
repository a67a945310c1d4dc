//! Scheduler module
//!
//! Handles the periodic retraining job:
//! - Wall-clock cadence (daily or weekly, any IANA timezone)
//! - One immediate run at start, then one run per tick

mod cadence;
mod retrain;

pub use cadence::{duration_until_next_run, next_run_after};
pub use retrain::{RetrainScheduler, RunOutcome, SchedulerPhase};
