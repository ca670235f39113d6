//! Property tests for categorization and confidence scoring.

use govfix_domain::scoring::{BUILD_FAILURE_CAP, INCOMPLETE_RESCAN_CAP, recommendation_for};
use govfix_domain::{ConfidenceScorer, ScoreInputs, category_for};
use govfix_types::validation::{BuildStatus, Recommendation, TestState, TestStatus};
use govfix_types::violation::EngineId;
use proptest::prelude::*;

fn arb_build() -> impl Strategy<Value = BuildStatus> {
    prop_oneof![
        Just(BuildStatus::Passed),
        Just(BuildStatus::Failed),
        Just(BuildStatus::TimedOut),
        Just(BuildStatus::NotDetected),
    ]
}

fn arb_tests() -> impl Strategy<Value = TestStatus> {
    prop_oneof![
        Just(TestStatus::not_run()),
        (0u64..50, 0u64..50).prop_map(|(p, f)| TestStatus {
            state: if f == 0 { TestState::Passed } else { TestState::Failed },
            passed: Some(p),
            failed: Some(f),
        }),
    ]
}

proptest! {
    #[test]
    fn category_lookup_is_deterministic(rule in "[a-zA-Z-]{1,30}") {
        prop_assert_eq!(category_for(&rule), category_for(&rule));
    }

    #[test]
    fn score_in_range_and_band_consistent(
        build in arb_build(),
        tests in arb_tests(),
        before in 0u64..100,
        after in 0u64..100,
        lost_engine in any::<bool>(),
    ) {
        let missing_engines = if lost_engine { vec![EngineId::Architecture] } else { vec![] };
        let s = ConfidenceScorer::new().score(&ScoreInputs { build, tests, before, after, missing_engines });
        prop_assert!(s.value <= 100);
        if lost_engine {
            prop_assert!(u32::from(s.value) <= INCOMPLETE_RESCAN_CAP);
            prop_assert!(!s.recommendation.is_committable());
        }
        prop_assert_eq!(s.recommendation, recommendation_for(s.value));
        if build.is_failure() {
            prop_assert!(u32::from(s.value) <= BUILD_FAILURE_CAP);
            prop_assert_eq!(s.recommendation, Recommendation::Fix);
        }
    }

    #[test]
    fn fixing_more_never_lowers_the_score(
        tests in arb_tests(),
        before in 1u64..100,
        fixed_a in 0u64..100,
        fixed_b in 0u64..100,
    ) {
        let (lo, hi) = (fixed_a.min(fixed_b).min(before), fixed_a.max(fixed_b).min(before));
        let scorer = ConfidenceScorer::new();
        let worse = scorer.score(&ScoreInputs {
            build: BuildStatus::Passed,
            tests: tests.clone(),
            before,
            after: before - lo,
            missing_engines: vec![],
        });
        let better = scorer.score(&ScoreInputs {
            build: BuildStatus::Passed,
            tests,
            before,
            after: before - hi,
            missing_engines: vec![],
        });
        prop_assert!(better.value >= worse.value);
    }
}
