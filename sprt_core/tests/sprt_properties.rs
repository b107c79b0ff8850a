//! Property-based tests for the SPRT engine.

use proptest::prelude::*;
use sprt_core::config::ConfigError;
use sprt_core::outcome::Outcome;
use sprt_core::sprt::{
    SprtCalculator, SprtMode, SprtParameters, SprtStatus, trinomial_llr,
};

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![Just(Outcome::Loss), Just(Outcome::Draw), Just(Outcome::Win)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_bounds_straddle_zero(alpha in 1e-9f64..0.999, beta in 1e-9f64..0.999) {
        let params = SprtParameters::new(0.0, 50.0, alpha, beta);
        match SprtCalculator::new(params) {
            Ok(sprt) => {
                let bounds = sprt.bounds();
                prop_assert!(bounds.lower.is_finite() && bounds.upper.is_finite());
                prop_assert!(bounds.lower < 0.0);
                prop_assert!(bounds.upper > 0.0);
            }
            Err(err) => {
                prop_assert!(alpha + beta >= 1.0);
                prop_assert_eq!(err, ConfigError::ErrorRatesTooLarge { alpha, beta });
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_loss_to_win_increases_llr(
        wins in 0u64..2_000,
        draws in 0u64..2_000,
        losses in 1u64..2_000,
        elo0 in -100.0f64..100.0,
        gap in 1.0f64..100.0,
    ) {
        let params = SprtParameters::new(elo0, elo0 + gap, 0.05, 0.05);
        let before = trinomial_llr(&params, [losses, draws, wins]);
        let after = trinomial_llr(&params, [losses - 1, draws, wins + 1]);
        prop_assert!(after > before, "before {} after {}", before, after);
    }

    #[test]
    fn prop_loss_to_win_is_neutral_for_equal_elos(
        wins in 0u64..2_000,
        draws in 0u64..2_000,
        losses in 1u64..2_000,
        elo in -100.0f64..100.0,
    ) {
        let params = SprtParameters::new(elo, elo, 0.05, 0.05);
        prop_assert_eq!(trinomial_llr(&params, [losses, draws, wins]), 0.0);
        prop_assert_eq!(trinomial_llr(&params, [losses - 1, draws, wins + 1]), 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_same_sequence_same_trajectory(
        outcomes in prop::collection::vec(outcome_strategy(), 0..2_000),
        pentanomial in any::<bool>(),
    ) {
        let mode = if pentanomial { SprtMode::Pentanomial } else { SprtMode::Trinomial };
        let params = SprtParameters::new(0.0, 50.0, 0.0001, 0.0001).with_mode(mode);
        let mut a = SprtCalculator::new(params).unwrap();
        let mut b = SprtCalculator::new(params).unwrap();

        for outcome in outcomes {
            a.record(outcome);
            b.record(outcome);
            prop_assert_eq!(a.llr().to_bits(), b.llr().to_bits());
            prop_assert_eq!(a.status(), b.status());
        }
    }

    #[test]
    fn prop_status_never_reverts(
        outcomes in prop::collection::vec(outcome_strategy(), 0..3_000),
    ) {
        let params = SprtParameters::new(0.0, 50.0, 0.05, 0.05);
        let mut sprt = SprtCalculator::new(params).unwrap();
        let mut decided: Option<SprtStatus> = None;

        for outcome in outcomes {
            let status = sprt.record(outcome);
            if let Some(first) = decided {
                prop_assert_eq!(status, first);
            } else if status.is_terminal() {
                decided = Some(status);
            } else {
                let bounds = sprt.bounds();
                prop_assert!(sprt.llr() > bounds.lower && sprt.llr() < bounds.upper);
            }
        }
    }

    #[test]
    fn prop_all_draws_stay_neutral(len in 0usize..20_000, pentanomial in any::<bool>()) {
        let mode = if pentanomial { SprtMode::Pentanomial } else { SprtMode::Trinomial };
        let params = SprtParameters::new(0.0, 50.0, 0.0001, 0.0001).with_mode(mode);
        let mut sprt = SprtCalculator::new(params).unwrap();
        for _ in 0..len {
            let status = sprt.record(Outcome::Draw);
            prop_assert_eq!(status, SprtStatus::Continue);
            prop_assert_eq!(sprt.llr(), 0.0);
        }
    }
}
