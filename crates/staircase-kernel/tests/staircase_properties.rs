//! Property tests for the staircase state machine.
//!
//! Covers:
//! - Sample bounds under the clamp rules
//! - Reversal count agreeing with the recorded directions
//! - Backtrack idempotence and agreement with a fresh replay

use proptest::prelude::*;

use staircase_kernel::config::StaircaseSettings;
use staircase_kernel::judgment::PresentationOrder;
use staircase_kernel::staircase::{BacktrackOutcome, Staircase, StaircaseId};

fn settings_strategy() -> impl Strategy<Value = StaircaseSettings> {
    (
        -100.0f64..100.0,
        1.0f64..100.0,
        any::<bool>(),
        0.5f64..30.0,
        0.5f64..30.0,
        1u32..4,
        1u32..6,
        any::<bool>(),
    )
        .prop_map(
            |(reference, gap, above, step_up, step_down, to_step, to_finish, first_error)| {
                let start_value = if above { reference + gap } else { reference - gap };
                StaircaseSettings {
                    name: "Staircase 1".to_string(),
                    units: "unit".to_string(),
                    comparison: "greater".to_string(),
                    reference,
                    start_value,
                    step_up,
                    step_down,
                    reversals_to_step_change: to_step,
                    reversals_to_finish: to_finish,
                    require_first_error: first_error,
                }
            },
        )
}

fn feed(settings: &StaircaseSettings, answers: &[bool]) -> Staircase {
    let mut staircase = Staircase::new(StaircaseId::new(0), settings.clone());
    for &correct in answers {
        staircase.submit_judgment(correct, PresentationOrder::ReferenceFirst);
    }
    staircase
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The sample stays between start and reference, never on the reference
    #[test]
    fn prop_sample_within_bounds(
        settings in settings_strategy(),
        answers in prop::collection::vec(any::<bool>(), 0..60),
    ) {
        let lo = settings.start_value.min(settings.reference);
        let hi = settings.start_value.max(settings.reference);
        let mut staircase = Staircase::new(StaircaseId::new(0), settings.clone());

        for correct in answers {
            staircase.submit_judgment(correct, PresentationOrder::TestFirst);
            let sample = staircase.current_sample();
            prop_assert!(sample >= lo && sample <= hi, "sample {} outside [{}, {}]", sample, lo, hi);
            prop_assert!(sample != settings.reference);
        }
    }

    /// Reversals are exactly the changes between established directions
    #[test]
    fn prop_reversals_match_direction_changes(
        settings in settings_strategy(),
        answers in prop::collection::vec(any::<bool>(), 0..60),
    ) {
        let staircase = feed(&settings, &answers);
        let records = staircase.records();

        let changes = records
            .windows(2)
            .filter(|pair| {
                pair[0].direction.is_established()
                    && pair[1].direction.is_established()
                    && pair[0].direction != pair[1].direction
            })
            .count();
        let flagged = records.iter().filter(|r| r.reversal).count();

        prop_assert_eq!(staircase.reversal_count() as usize, changes);
        prop_assert_eq!(flagged, changes);
        prop_assert_eq!(
            staircase.is_finished(),
            staircase.reversal_count() >= settings.reversals_to_finish
        );
    }

    /// Re-answering with the recorded answer changes nothing
    #[test]
    fn prop_backtrack_same_answer_is_idempotent(
        settings in settings_strategy(),
        answers in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let mut staircase = feed(&settings, &answers);
        let state = *staircase.state();
        let records = staircase.records().to_vec();

        let last = *answers.last().unwrap();
        prop_assert_eq!(staircase.backtrack(last), BacktrackOutcome::Unchanged);
        prop_assert_eq!(*staircase.state(), state);
        prop_assert_eq!(staircase.records(), records.as_slice());
    }

    /// A revised staircase matches one that got the revised answers directly
    #[test]
    fn prop_backtrack_matches_fresh_history(
        settings in settings_strategy(),
        answers in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let mut revised = feed(&settings, &answers);
        let last = *answers.last().unwrap();
        let outcome = revised.backtrack(!last);
        let is_revision = matches!(outcome, BacktrackOutcome::Revised { .. });
        prop_assert!(is_revision);

        let mut corrected = answers.clone();
        *corrected.last_mut().unwrap() = !last;
        let fresh = feed(&settings, &corrected);

        prop_assert_eq!(revised.state(), fresh.state());
        prop_assert_eq!(revised.records(), fresh.records());

        // And revising back restores the original
        revised.backtrack(last);
        let original = feed(&settings, &answers);
        prop_assert_eq!(revised.state(), original.state());
        prop_assert_eq!(revised.records(), original.records());
    }
}
