//! The staircase state machine.
//!
//! A staircase holds one adaptive up/down procedure. Each judgment may move
//! the test sample toward the reference (harder) or away from it (easier);
//! a change of travel direction is a reversal, and the staircase finishes once
//! it has seen the configured number of reversals.
//!
//! Fresh trials and backtrack replays go through the same [`StepRule::advance`]
//! so the two paths cannot drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::StaircaseSettings;
use crate::judgment::{Presentation, PresentationOrder};
use crate::trial::{Direction, TrialOutcome, TrialRecord};

/// Stable handle for a staircase, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StaircaseId(usize);

impl StaircaseId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position in the experiment's staircase arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StaircaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Mutable state of a staircase, separate from its history so it can be
/// rebuilt by replaying the history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaircaseState {
    /// The value the next trial will present
    pub current_sample: f64,
    /// The value presented on the most recent trial
    pub last_sample: Option<f64>,
    pub direction: Direction,
    pub consecutive_correct: u32,
    pub trial_count: usize,
    pub reversal_count: u32,
    /// Every correct answer tightens until the first error
    pub first_error_pending: bool,
    pub finished: bool,
}

/// Result of one application of the step rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// The sample the judgment was made against
    pub judged_sample: f64,
    pub reversal: bool,
    pub sample_changed: bool,
}

/// The sample adjustment policy of one staircase.
///
/// Step signs are normalized at construction so that adding `harder_step`
/// always moves toward the reference and subtracting `easier_step` always
/// moves away from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRule {
    reference: f64,
    start: f64,
    harder_step: f64,
    easier_step: f64,
    reversals_to_step_change: u32,
    reversals_to_finish: u32,
    require_first_error: bool,
}

impl StepRule {
    pub fn new(settings: &StaircaseSettings) -> Self {
        let sign = if settings.reference < settings.start_value {
            -1.0
        } else {
            1.0
        };
        Self {
            reference: settings.reference,
            start: settings.start_value,
            harder_step: settings.step_up.abs() * sign,
            easier_step: settings.step_down.abs() * sign,
            reversals_to_step_change: settings.reversals_to_step_change,
            reversals_to_finish: settings.reversals_to_finish,
            require_first_error: settings.require_first_error,
        }
    }

    /// State before any trial.
    pub fn initial_state(&self) -> StaircaseState {
        StaircaseState {
            current_sample: self.start,
            last_sample: None,
            direction: Direction::Undetermined,
            consecutive_correct: 0,
            trial_count: 0,
            reversal_count: 0,
            first_error_pending: self.require_first_error,
            finished: false,
        }
    }

    /// Apply one judgment to `state`.
    pub fn advance(&self, state: &mut StaircaseState, correct: bool) -> Step {
        let judged_sample = state.current_sample;

        let attempted = if correct {
            state.consecutive_correct += 1;
            if state.first_error_pending && state.reversal_count == 0 {
                Some(Direction::TowardReference)
            } else if state.consecutive_correct == self.reversals_to_step_change {
                state.consecutive_correct = 0;
                Some(Direction::TowardReference)
            } else {
                None
            }
        } else {
            state.consecutive_correct = 0;
            if state.trial_count == 0 {
                state.first_error_pending = false;
            }
            Some(Direction::AwayFromReference)
        };

        let mut reversal = false;
        let mut sample_changed = false;
        if let Some(direction) = attempted {
            let (next, changed) = self.adjust(judged_sample, direction);
            state.current_sample = next;
            sample_changed = changed;
            if changed {
                if state.direction.is_established() && state.direction != direction {
                    reversal = true;
                    state.reversal_count += 1;
                }
                state.direction = direction;
            }
        }

        state.last_sample = Some(judged_sample);
        state.trial_count += 1;
        // Counts only grow by one, so this first holds exactly when the target is hit.
        state.finished = state.reversal_count >= self.reversals_to_finish;

        Step {
            judged_sample,
            reversal,
            sample_changed,
        }
    }

    /// Move `sample` one step in `direction`, clamped so that it never reaches
    /// the reference and never retreats past the start value. Returns the new
    /// value and whether it differs from `sample`.
    pub fn adjust(&self, sample: f64, direction: Direction) -> (f64, bool) {
        let mut next = match direction {
            Direction::TowardReference => sample + self.harder_step,
            Direction::AwayFromReference => sample - self.easier_step,
            Direction::Undetermined => return (sample, false),
        };

        let (start, target) = (self.start, self.reference);
        if start < target && next >= target {
            next = target - self.harder_step.abs();
        } else if start > target && next <= target {
            next = target + self.harder_step.abs();
        }
        // A step larger than the start-to-reference gap lands the target clamp
        // behind the start value.
        if (start < target && next < start) || (start > target && next > start) {
            next = start;
        }

        (next, next != sample)
    }
}

/// Result of a backtrack request.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktrackOutcome {
    /// No trial has been recorded yet
    NoTrial,
    /// The new answer matches the recorded one
    Unchanged,
    /// The tail record was replaced
    Revised {
        replaced: TrialRecord,
        outcome: TrialOutcome,
    },
}

/// One adaptive procedure with its full history.
#[derive(Debug, Clone, Serialize)]
pub struct Staircase {
    id: StaircaseId,
    settings: StaircaseSettings,
    #[serde(skip)]
    rule: StepRule,
    state: StaircaseState,
    records: Vec<TrialRecord>,
}

impl Staircase {
    /// Create a staircase at its start value.
    pub fn new(id: StaircaseId, settings: StaircaseSettings) -> Self {
        let rule = StepRule::new(&settings);
        Self {
            id,
            state: rule.initial_state(),
            rule,
            settings,
            records: Vec::new(),
        }
    }

    pub fn id(&self) -> StaircaseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &StaircaseSettings {
        &self.settings
    }

    pub fn state(&self) -> &StaircaseState {
        &self.state
    }

    /// Trial history, ordered by trial index.
    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn current_sample(&self) -> f64 {
        self.state.current_sample
    }

    pub fn last_sample(&self) -> Option<f64> {
        self.state.last_sample
    }

    pub fn direction(&self) -> Direction {
        self.state.direction
    }

    pub fn consecutive_correct(&self) -> u32 {
        self.state.consecutive_correct
    }

    pub fn trial_count(&self) -> usize {
        self.state.trial_count
    }

    pub fn reversal_count(&self) -> u32 {
        self.state.reversal_count
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    /// The pairing for the next trial.
    pub fn presentation(&self, order: PresentationOrder) -> Presentation {
        Presentation::new(self.settings.reference, self.state.current_sample, order)
    }

    /// The pairing of the most recent trial, as it was shown.
    pub fn last_presentation(&self) -> Option<Presentation> {
        self.records.last().map(TrialRecord::presentation)
    }

    /// Pre-trial sample of every recorded trial followed by the current sample.
    pub fn trajectory(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.test_sample)
            .chain(std::iter::once(self.state.current_sample))
            .collect()
    }

    /// Record the operator's judgment for the current sample.
    pub fn submit_judgment(&mut self, correct: bool, order: PresentationOrder) -> TrialOutcome {
        let trial_index = self.state.trial_count;
        let step = self.rule.advance(&mut self.state, correct);

        self.records.push(TrialRecord {
            reference: self.settings.reference,
            test_sample: step.judged_sample,
            order,
            trial_index,
            correct,
            reversal: step.reversal,
            sample_changed: step.sample_changed,
            direction: self.state.direction,
        });

        debug!(
            staircase = %self.settings.name,
            trial = trial_index,
            sample = step.judged_sample,
            correct,
            next_sample = self.state.current_sample,
            "Trial recorded"
        );
        if step.reversal {
            info!(
                staircase = %self.settings.name,
                reversals = self.state.reversal_count,
                "Reversal"
            );
        }
        if self.state.finished {
            info!(staircase = %self.settings.name, trials = self.state.trial_count, "Staircase finished");
        }

        TrialOutcome {
            reversal: step.reversal,
            sample_changed: step.sample_changed,
            finished: self.state.finished,
        }
    }

    /// Re-answer the most recent trial.
    ///
    /// When the answer differs from the recorded one, the tail record is
    /// dropped, the state is rebuilt by replaying the surviving records from
    /// the start value, and the corrected judgment is applied at the same
    /// trial index with the same presentation order.
    pub fn backtrack(&mut self, correct: bool) -> BacktrackOutcome {
        let Some(last) = self.records.last() else {
            return BacktrackOutcome::NoTrial;
        };
        if last.correct == correct {
            debug!(staircase = %self.settings.name, "Backtrack answer unchanged");
            return BacktrackOutcome::Unchanged;
        }

        let Some(replaced) = self.records.pop() else {
            return BacktrackOutcome::NoTrial;
        };
        self.state = self.replay();
        let outcome = self.submit_judgment(correct, replaced.order);

        info!(
            staircase = %self.settings.name,
            trial = replaced.trial_index,
            correct,
            reversals = self.state.reversal_count,
            "Trial revised"
        );

        BacktrackOutcome::Revised { replaced, outcome }
    }

    /// Rebuild the state from the recorded history.
    fn replay(&self) -> StaircaseState {
        let mut state = self.rule.initial_state();
        for record in &self.records {
            self.rule.advance(&mut state, record.correct);
        }
        state
    }
}
