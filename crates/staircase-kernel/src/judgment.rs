//! The judgment collaborator: how a trial is shown and how the operator answers.
//!
//! The kernel never talks to a terminal. It builds a [`JudgmentRequest`] and
//! hands it to a [`JudgmentSource`], which answers with a [`Judgment`].

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Which of the two values was presented first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationOrder {
    ReferenceFirst,
    TestFirst,
}

impl PresentationOrder {
    /// Pick an order uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Self::ReferenceFirst
        } else {
            Self::TestFirst
        }
    }
}

/// One of the two presented options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    First,
    Second,
}

/// The operator's answer to a judgment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    /// The subject selected one of the two options
    Selected(Choice),
    /// Re-answer the most recent trial
    Backtrack,
    /// Stop the experiment
    Cancel,
}

/// A reference/test pairing in presentation order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    pub reference: f64,
    pub test_sample: f64,
    pub order: PresentationOrder,
}

impl Presentation {
    pub fn new(reference: f64, test_sample: f64, order: PresentationOrder) -> Self {
        Self {
            reference,
            test_sample,
            order,
        }
    }

    /// Value shown first.
    pub fn first(&self) -> f64 {
        match self.order {
            PresentationOrder::ReferenceFirst => self.reference,
            PresentationOrder::TestFirst => self.test_sample,
        }
    }

    /// Value shown second.
    pub fn second(&self) -> f64 {
        match self.order {
            PresentationOrder::ReferenceFirst => self.test_sample,
            PresentationOrder::TestFirst => self.reference,
        }
    }

    pub fn value_of(&self, choice: Choice) -> f64 {
        match choice {
            Choice::First => self.first(),
            Choice::Second => self.second(),
        }
    }

    /// The subject is asked which value was greater; the answer is correct
    /// when the chosen value is strictly larger than the other one.
    pub fn is_correct(&self, choice: Choice) -> bool {
        let (chosen, other) = match choice {
            Choice::First => (self.first(), self.second()),
            Choice::Second => (self.second(), self.first()),
        };
        chosen > other
    }
}

/// Everything a judgment source needs to ask the operator about one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgmentRequest {
    /// Staircase display name
    pub staircase: String,
    /// 1-based trial number within the staircase
    pub trial_number: usize,
    pub presentation: Presentation,
    pub units: String,
    /// Wording for the greater value (e.g. "heavier")
    pub comparison: String,
    /// This is a re-ask of an already recorded trial
    pub is_backtrack: bool,
    /// A backtrack request is permitted in answer to this request
    pub allow_backtrack: bool,
}

/// Supplies operator judgments.
///
/// Implementations are expected to deal with unrecognized input themselves
/// (re-asking) and only return recognized judgments. Returning
/// [`Judgment::Backtrack`] when `allow_backtrack` is false is treated as a
/// no-op by the runner.
pub trait JudgmentSource {
    fn judge(&mut self, request: &JudgmentRequest) -> anyhow::Result<Judgment>;
}

/// A judgment source that answers from a fixed script.
///
/// Correctness-based entries are resolved against each request's
/// presentation, so scripts stay valid whatever order was drawn.
#[derive(Debug, Clone, Default)]
pub struct ScriptedJudgments {
    script: VecDeque<ScriptedAnswer>,
    requests: Vec<JudgmentRequest>,
}

/// One scripted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedAnswer {
    /// Answer correctly (`true`) or incorrectly (`false`)
    Correct(bool),
    /// Pass a raw judgment through
    Raw(Judgment),
}

impl ScriptedJudgments {
    pub fn new(script: impl IntoIterator<Item = ScriptedAnswer>) -> Self {
        Self {
            script: script.into_iter().collect(),
            requests: Vec::new(),
        }
    }

    /// Script made only of correctness answers.
    pub fn from_correctness(answers: impl IntoIterator<Item = bool>) -> Self {
        Self::new(answers.into_iter().map(ScriptedAnswer::Correct))
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> &[JudgmentRequest] {
        &self.requests
    }

    /// Answers not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl JudgmentSource for ScriptedJudgments {
    /// An exhausted script cancels.
    fn judge(&mut self, request: &JudgmentRequest) -> anyhow::Result<Judgment> {
        self.requests.push(request.clone());
        let judgment = match self.script.pop_front() {
            Some(ScriptedAnswer::Correct(correct)) => {
                let presentation = &request.presentation;
                let choice = if presentation.is_correct(Choice::First) == correct {
                    Choice::First
                } else {
                    Choice::Second
                };
                Judgment::Selected(choice)
            }
            Some(ScriptedAnswer::Raw(judgment)) => judgment,
            None => Judgment::Cancel,
        };
        Ok(judgment)
    }
}
