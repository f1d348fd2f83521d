//! Staircase Kernel: adaptive up/down psychophysics procedures.
//!
//! This crate implements the decision core of a staircase experiment:
//! - A per-staircase state machine with reversal tracking and clamping
//! - Backtracking that rebuilds state by replaying the trial history
//! - A scheduler interleaving several staircases under a swap policy
//! - A turn-based runner driven by an external judgment source

pub mod config;
pub mod judgment;
pub mod runner;
pub mod scheduler;
pub mod staircase;
pub mod trial;

pub use config::{ConfigError, ExperimentConfig, StaircaseSettings, SwapPolicy};
pub use judgment::{Choice, Judgment, JudgmentRequest, JudgmentSource, Presentation, PresentationOrder};
pub use runner::{ExperimentOutcome, ExperimentReport, ExperimentRunner, Turn};
pub use scheduler::Scheduler;
pub use staircase::{BacktrackOutcome, Staircase, StaircaseId, StaircaseState};
pub use trial::{Direction, TrialOutcome, TrialRecord};
