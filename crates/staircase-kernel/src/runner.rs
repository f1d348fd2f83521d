//! Experiment runner: the turn-based loop over all staircases.
//!
//! Each turn:
//! 1. Ask the scheduler for the next staircase
//! 2. Ask the judgment source about its current pairing
//! 3. Record the answer, revise the previous trial, or stop

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ExperimentConfig, StaircaseSettings, SwapPolicy};
use crate::judgment::{Judgment, JudgmentRequest, JudgmentSource, PresentationOrder};
use crate::scheduler::Scheduler;
use crate::staircase::{BacktrackOutcome, Staircase, StaircaseId};
use crate::trial::TrialOutcome;

/// How an experiment ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentOutcome {
    /// Every staircase reached its reversal target
    Completed,
    /// The operator stopped early
    Cancelled,
}

/// What happened during one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// A judgment was recorded
    Trial {
        staircase: StaircaseId,
        outcome: TrialOutcome,
    },
    /// The most recent trial was re-answered
    Backtracked {
        staircase: StaircaseId,
        outcome: BacktrackOutcome,
    },
    /// The re-ask was cancelled; nothing changed
    BacktrackAbandoned { staircase: StaircaseId },
    /// Backtrack requested before any trial was recorded
    BacktrackUnavailable,
    /// The operator stopped the experiment
    Cancelled,
    /// No open staircases remain
    Finished,
}

/// Results of a run, handed to the result sink.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub outcome: ExperimentOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Staircases still open when the experiment was cancelled
    pub abandoned: Vec<StaircaseId>,
    /// Every staircase, finished or not, in creation order
    pub staircases: Vec<Staircase>,
}

impl ExperimentReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == ExperimentOutcome::Completed
    }

    pub fn total_trials(&self) -> usize {
        self.staircases.iter().map(Staircase::trial_count).sum()
    }
}

/// Drives staircases through the judgment loop.
pub struct ExperimentRunner {
    staircases: Vec<Staircase>,
    scheduler: Scheduler,
    rng: Box<dyn RngCore>,
    /// Staircase served on the previous turn
    current: Option<StaircaseId>,
    /// Staircase that recorded the most recent trial (the backtrack target)
    last_recorded: Option<StaircaseId>,
    /// Staircase whose request was interrupted by a backtrack
    interrupted: Option<StaircaseId>,
    abandoned: Vec<StaircaseId>,
}

impl ExperimentRunner {
    /// Create a runner with one staircase per settings entry, all open.
    pub fn new(settings: Vec<StaircaseSettings>, policy: SwapPolicy, seed: Option<u64>) -> Self {
        let staircases: Vec<Staircase> = settings
            .into_iter()
            .enumerate()
            .map(|(i, s)| Staircase::new(StaircaseId::new(i), s))
            .collect();
        let open = staircases.iter().map(Staircase::id).collect();
        let rng: Box<dyn RngCore> = match seed {
            // Decorrelate presentation order from scheduling
            Some(seed) => Box::new(StdRng::seed_from_u64(seed.wrapping_add(1))),
            None => Box::new(rand::rng()),
        };

        Self {
            staircases,
            scheduler: Scheduler::new(policy, open, seed),
            rng,
            current: None,
            last_recorded: None,
            interrupted: None,
            abandoned: Vec::new(),
        }
    }

    /// Create a runner from a validated configuration.
    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(
            config.all_staircase_settings(),
            config.experiment.swap_policy,
            config.experiment.seed,
        )
    }

    pub fn staircases(&self) -> &[Staircase] {
        &self.staircases
    }

    pub fn staircase(&self, id: StaircaseId) -> &Staircase {
        &self.staircases[id.index()]
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run until every staircase finishes or the operator cancels.
    pub fn run(mut self, source: &mut dyn JudgmentSource) -> Result<ExperimentReport> {
        let started_at = Utc::now();
        info!(
            staircases = self.staircases.len(),
            policy = %self.scheduler.policy(),
            "Starting experiment"
        );

        let outcome = loop {
            match self.step(source)? {
                Turn::Finished => break ExperimentOutcome::Completed,
                Turn::Cancelled => break ExperimentOutcome::Cancelled,
                _ => {}
            }
        };

        let report = ExperimentReport {
            outcome,
            started_at,
            ended_at: Utc::now(),
            abandoned: self.abandoned,
            staircases: self.staircases,
        };
        info!(
            outcome = ?report.outcome,
            trials = report.total_trials(),
            "Experiment ended"
        );
        Ok(report)
    }

    /// Play a single turn.
    pub fn step(&mut self, source: &mut dyn JudgmentSource) -> Result<Turn> {
        let Some(id) = self.next_staircase() else {
            return Ok(Turn::Finished);
        };
        self.current = Some(id);

        let order = PresentationOrder::random(&mut self.rng);
        let staircase = &self.staircases[id.index()];
        let request = JudgmentRequest {
            staircase: staircase.name().to_string(),
            trial_number: staircase.trial_count() + 1,
            presentation: staircase.presentation(order),
            units: staircase.settings().units.clone(),
            comparison: staircase.settings().comparison.clone(),
            is_backtrack: false,
            allow_backtrack: self.last_recorded.is_some(),
        };

        let judgment = source
            .judge(&request)
            .with_context(|| format!("failed to obtain judgment for {}", request.staircase))?;

        match judgment {
            Judgment::Selected(choice) => {
                let correct = request.presentation.is_correct(choice);
                let staircase = &mut self.staircases[id.index()];
                let outcome = staircase.submit_judgment(correct, order);
                self.last_recorded = Some(id);
                if outcome.finished {
                    self.scheduler.close(id);
                }
                Ok(Turn::Trial {
                    staircase: id,
                    outcome,
                })
            }
            Judgment::Backtrack => {
                self.interrupted = Some(id);
                match self.last_recorded {
                    Some(target) => self.backtrack(target, source),
                    None => {
                        debug!("Backtrack requested before any trial");
                        Ok(Turn::BacktrackUnavailable)
                    }
                }
            }
            Judgment::Cancel => {
                self.abandoned = self.scheduler.close_all();
                warn!(open = self.abandoned.len(), "Experiment cancelled");
                Ok(Turn::Cancelled)
            }
        }
    }

    /// The interrupted staircase if it is still open, otherwise the scheduler's pick.
    fn next_staircase(&mut self) -> Option<StaircaseId> {
        if let Some(id) = self.interrupted.take() {
            if self.scheduler.is_open(id) {
                return Some(id);
            }
        }
        let staircases = &self.staircases;
        let current = self.current.map(|id| &staircases[id.index()]);
        self.scheduler.next(current)
    }

    /// Re-ask the tail trial of `target` and apply the answer.
    fn backtrack(&mut self, target: StaircaseId, source: &mut dyn JudgmentSource) -> Result<Turn> {
        let staircase = &self.staircases[target.index()];
        let Some(presentation) = staircase.last_presentation() else {
            return Ok(Turn::BacktrackUnavailable);
        };
        let request = JudgmentRequest {
            staircase: staircase.name().to_string(),
            trial_number: staircase.trial_count(),
            presentation,
            units: staircase.settings().units.clone(),
            comparison: staircase.settings().comparison.clone(),
            is_backtrack: true,
            allow_backtrack: false,
        };

        let judgment = source
            .judge(&request)
            .with_context(|| format!("failed to obtain backtrack judgment for {}", request.staircase))?;
        let Judgment::Selected(choice) = judgment else {
            info!(staircase = %request.staircase, "Backtrack abandoned");
            return Ok(Turn::BacktrackAbandoned { staircase: target });
        };

        let correct = presentation.is_correct(choice);
        let staircase = &mut self.staircases[target.index()];
        let outcome = staircase.backtrack(correct);
        if staircase.is_finished() {
            self.scheduler.close(target);
        } else {
            self.scheduler.reopen(target);
        }

        Ok(Turn::Backtracked {
            staircase: target,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::{ScriptedAnswer, ScriptedJudgments};

    fn settings(name: &str, start: f64, to_step: u32, to_finish: u32) -> StaircaseSettings {
        StaircaseSettings {
            name: name.to_string(),
            units: "gram".to_string(),
            comparison: "heavier".to_string(),
            reference: 50.0,
            start_value: start,
            step_up: 5.0,
            step_down: 2.0,
            reversals_to_step_change: to_step,
            reversals_to_finish: to_finish,
            require_first_error: false,
        }
    }

    #[test]
    fn test_single_staircase_completes() {
        let runner = ExperimentRunner::new(
            vec![settings("Staircase 1", 10.0, 2, 2)],
            SwapPolicy::Serial,
            Some(3),
        );
        let mut source = ScriptedJudgments::from_correctness([true, true, false, true, true]);

        let report = runner.run(&mut source).unwrap();

        assert!(report.is_complete());
        assert!(report.abandoned.is_empty());
        assert_eq!(report.total_trials(), 5);
        assert_eq!(
            report.staircases[0].trajectory(),
            vec![10.0, 10.0, 15.0, 13.0, 13.0, 18.0]
        );
        assert_eq!(source.remaining(), 0);
        assert!(report.started_at <= report.ended_at);
    }

    #[test]
    fn test_cancel_keeps_partial_results() {
        let runner = ExperimentRunner::new(
            vec![
                settings("Staircase 1", 10.0, 1, 3),
                settings("Staircase 2", 20.0, 1, 3),
            ],
            SwapPolicy::Alternate,
            Some(3),
        );
        let mut source = ScriptedJudgments::new([
            ScriptedAnswer::Correct(true),
            ScriptedAnswer::Correct(true),
            ScriptedAnswer::Raw(Judgment::Cancel),
        ]);

        let report = runner.run(&mut source).unwrap();

        assert_eq!(report.outcome, ExperimentOutcome::Cancelled);
        assert_eq!(report.abandoned.len(), 2);
        assert_eq!(report.staircases[0].trial_count(), 1);
        assert_eq!(report.staircases[1].trial_count(), 1);
        assert!(!report.staircases[0].is_finished());
    }

    #[test]
    fn test_first_request_does_not_offer_backtrack() {
        let mut runner = ExperimentRunner::new(
            vec![settings("Staircase 1", 10.0, 1, 3)],
            SwapPolicy::Serial,
            Some(3),
        );
        let mut source = ScriptedJudgments::new([
            ScriptedAnswer::Raw(Judgment::Backtrack),
            ScriptedAnswer::Correct(true),
        ]);

        assert_eq!(runner.step(&mut source).unwrap(), Turn::BacktrackUnavailable);
        assert!(!source.requests()[0].allow_backtrack);

        // Nothing recorded yet, so the re-asked trial still cannot backtrack
        runner.step(&mut source).unwrap();
        assert!(!source.requests()[1].allow_backtrack);
        assert_eq!(runner.staircases()[0].trial_count(), 1);
    }

    #[test]
    fn test_backtrack_reasks_interrupted_trial() {
        let mut runner = ExperimentRunner::new(
            vec![settings("Staircase 1", 10.0, 1, 4)],
            SwapPolicy::Serial,
            Some(3),
        );
        let mut source = ScriptedJudgments::new([
            ScriptedAnswer::Correct(true),
            ScriptedAnswer::Correct(false),
            ScriptedAnswer::Raw(Judgment::Backtrack),
            ScriptedAnswer::Correct(true),
            ScriptedAnswer::Correct(true),
        ]);

        runner.step(&mut source).unwrap();
        runner.step(&mut source).unwrap();
        assert_eq!(runner.staircases()[0].reversal_count(), 1);

        let turn = runner.step(&mut source).unwrap();
        assert!(matches!(turn, Turn::Backtracked { .. }));
        let staircase = &runner.staircases()[0];
        assert_eq!(staircase.reversal_count(), 0);
        assert_eq!(staircase.current_sample(), 20.0);

        let requests = source.requests();
        assert!(requests[3].is_backtrack);
        assert_eq!(requests[3].trial_number, 2);
        assert_eq!(requests[3].presentation.test_sample, 15.0);

        runner.step(&mut source).unwrap();
        let requests = source.requests();
        assert_eq!(requests[4].trial_number, 3);
        assert_eq!(runner.staircases()[0].current_sample(), 25.0);
    }

    #[test]
    fn test_cancel_during_backtrack_abandons_it() {
        let mut runner = ExperimentRunner::new(
            vec![settings("Staircase 1", 10.0, 1, 4)],
            SwapPolicy::Serial,
            Some(3),
        );
        let mut source = ScriptedJudgments::new([
            ScriptedAnswer::Correct(true),
            ScriptedAnswer::Raw(Judgment::Backtrack),
            ScriptedAnswer::Raw(Judgment::Cancel),
        ]);

        runner.step(&mut source).unwrap();
        let before = runner.staircases()[0].clone();

        let turn = runner.step(&mut source).unwrap();
        assert!(matches!(turn, Turn::BacktrackAbandoned { .. }));
        assert_eq!(runner.staircases()[0].records(), before.records());
        assert_eq!(runner.staircases()[0].state(), before.state());
        assert!(runner.scheduler().has_open());
    }
}
