//! Trial records: the per-judgment history a staircase accumulates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::judgment::{Presentation, PresentationOrder};

/// Direction of travel of the test sample relative to the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// No move has been made yet
    #[default]
    Undetermined,
    /// Tightening: the sample moved closer to the reference
    TowardReference,
    /// Loosening: the sample moved further from the reference
    AwayFromReference,
}

impl Direction {
    /// Whether a direction has been established.
    pub fn is_established(&self) -> bool {
        !matches!(self, Self::Undetermined)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Undetermined => "undetermined",
            Self::TowardReference => "toward",
            Self::AwayFromReference => "away",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Record of a single trial. Never mutated once created; a backtrack replaces
/// the tail record instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// The reference value
    pub reference: f64,
    /// The adaptive value the operator judged against
    pub test_sample: f64,
    /// Which of the two values was presented first
    pub order: PresentationOrder,
    /// 0-based position in the staircase's own sequence
    pub trial_index: usize,
    /// Whether the subject answered correctly
    pub correct: bool,
    /// Whether this trial changed the established direction
    pub reversal: bool,
    /// Whether the sample value moved as a result of this trial
    pub sample_changed: bool,
    /// The staircase direction after this trial
    pub direction: Direction,
}

impl TrialRecord {
    /// The pairing shown to the subject for this trial.
    pub fn presentation(&self) -> Presentation {
        Presentation::new(self.reference, self.test_sample, self.order)
    }

    /// Whether the reference was shown first.
    pub fn reference_first(&self) -> bool {
        self.order == PresentationOrder::ReferenceFirst
    }
}

impl fmt::Display for TrialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}: {}",
            format_value(self.reference),
            format_value(self.test_sample),
            self.correct
        )
    }
}

/// Outcome of submitting a judgment, for display and plotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialOutcome {
    /// The trial was a reversal
    pub reversal: bool,
    /// The sample value moved
    pub sample_changed: bool,
    /// The staircase reached its reversal target on this trial
    pub finished: bool,
}

/// Format a stimulus value for display: integral values without decimals,
/// everything else with two.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(100.0), "100");
        assert_eq!(format_value(-5.0), "-5");
        assert_eq!(format_value(12.5), "12.50");
        assert_eq!(format_value(0.333), "0.33");
    }

    #[test]
    fn test_record_presentation_keeps_order() {
        let record = TrialRecord {
            reference: 100.0,
            test_sample: 80.0,
            order: PresentationOrder::TestFirst,
            trial_index: 3,
            correct: true,
            reversal: false,
            sample_changed: true,
            direction: Direction::TowardReference,
        };

        let presentation = record.presentation();
        assert_eq!(presentation.first(), 80.0);
        assert_eq!(presentation.second(), 100.0);
        assert!(!record.reference_first());
        assert_eq!(record.to_string(), "100 to 80: true");
    }

    #[test]
    fn test_direction_established() {
        assert!(!Direction::Undetermined.is_established());
        assert!(Direction::TowardReference.is_established());
        assert!(Direction::AwayFromReference.is_established());
    }
}
