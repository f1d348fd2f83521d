//! Staircase scheduling: which open staircase runs the next trial.

use rand::prelude::*;
use tracing::debug;

use crate::config::SwapPolicy;
use crate::staircase::{Staircase, StaircaseId};

/// Chooses the next staircase among the open (unfinished) ones.
///
/// The scheduler only holds handles; the staircases themselves live in the
/// runner's arena.
pub struct Scheduler {
    policy: SwapPolicy,
    open: Vec<StaircaseId>,
    rng: Box<dyn RngCore>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("policy", &self.policy)
            .field("open", &self.open)
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler with every given staircase open, in insertion order.
    pub fn new(policy: SwapPolicy, open: Vec<StaircaseId>, seed: Option<u64>) -> Self {
        let rng: Box<dyn RngCore> = match seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        };
        Self { policy, open, rng }
    }

    pub fn policy(&self) -> SwapPolicy {
        self.policy
    }

    /// Open staircases in order.
    pub fn open(&self) -> &[StaircaseId] {
        &self.open
    }

    pub fn has_open(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn is_open(&self, id: StaircaseId) -> bool {
        self.open.contains(&id)
    }

    /// Remove a staircase from the open set. Returns whether it was open.
    pub fn close(&mut self, id: StaircaseId) -> bool {
        let before = self.open.len();
        self.open.retain(|open| *open != id);
        before != self.open.len()
    }

    /// Put a staircase back at the end of the open set, if not already there.
    pub fn reopen(&mut self, id: StaircaseId) {
        if !self.is_open(id) {
            self.open.push(id);
        }
    }

    /// Close every open staircase, returning them in order.
    pub fn close_all(&mut self) -> Vec<StaircaseId> {
        std::mem::take(&mut self.open)
    }

    /// Choose the staircase for the next trial given the one that ran last.
    ///
    /// Returns `None` only when no staircase is open; callers are expected to
    /// check [`Scheduler::has_open`] and stop before that happens.
    pub fn next(&mut self, current: Option<&Staircase>) -> Option<StaircaseId> {
        let first = *self.open.first()?;
        let Some(current) = current else {
            return Some(first);
        };

        let chosen = match self.policy {
            SwapPolicy::Serial => {
                if current.is_finished() {
                    first
                } else {
                    current.id()
                }
            }
            SwapPolicy::Alternate => match self.open.iter().position(|id| *id == current.id()) {
                Some(pos) => self.open[(pos + 1) % self.open.len()],
                None => first,
            },
            SwapPolicy::Random => self.open[self.rng.random_range(0..self.open.len())],
        };

        debug!(policy = %self.policy, from = %current.id(), to = %chosen, "Next staircase");
        Some(chosen)
    }
}
