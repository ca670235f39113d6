//! Confidence scoring for a validation run.
//!
//! Weights: build 40, tests 30, governance delta 30. A failed build caps the
//! score below the lowest non-FIX band. A rescan that lost engines caps it
//! at the top of REVIEW.

use govfix_types::validation::{BuildStatus, ConfidenceLabel, Recommendation, TestStatus};
use govfix_types::violation::EngineId;

pub const BUILD_POINTS: u32 = 40;
pub const TEST_POINTS: u32 = 30;
pub const GOVERNANCE_POINTS: u32 = 30;

/// Highest score a failed build can reach.
pub const BUILD_FAILURE_CAP: u32 = 39;

/// Highest score when baseline engines are missing from the rescan.
pub const INCOMPLETE_RESCAN_CAP: u32 = 69;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreInputs {
    pub build: BuildStatus,
    pub tests: TestStatus,
    pub before: u64,
    pub after: u64,
    /// Baseline engines the rescan did not hear from.
    pub missing_engines: Vec<EngineId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub value: u8,
    pub recommendation: Recommendation,
    pub label: ConfidenceLabel,
    pub build_points: u32,
    pub test_points: u32,
    pub governance_points: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, inputs: &ScoreInputs) -> Score {
        let build_points = if inputs.build.is_failure() { 0 } else { BUILD_POINTS };
        let test_points = test_points(&inputs.tests);
        let governance_points = governance_points(inputs.before, inputs.after);

        let mut total = build_points + test_points + governance_points;
        if inputs.build.is_failure() {
            total = total.min(BUILD_FAILURE_CAP);
        }
        if !inputs.missing_engines.is_empty() {
            total = total.min(INCOMPLETE_RESCAN_CAP);
        }
        let value = total.min(100) as u8;

        Score {
            value,
            recommendation: recommendation_for(value),
            label: label_for(value),
            build_points,
            test_points,
            governance_points,
        }
    }
}

fn test_points(tests: &TestStatus) -> u32 {
    let (passed, total) = tests.pass_ratio();
    if total == 0 {
        return 0;
    }
    let passed = passed.min(total);
    ((TEST_POINTS as u64 * passed + total / 2) / total) as u32
}

fn governance_points(before: u64, after: u64) -> u32 {
    if after > before {
        return 0;
    }
    if before == 0 {
        return GOVERNANCE_POINTS;
    }
    let half = GOVERNANCE_POINTS / 2;
    let fixed = before - after;
    half + ((half as u64 * fixed + before / 2) / before) as u32
}

pub fn recommendation_for(score: u8) -> Recommendation {
    match score {
        90.. => Recommendation::Commit,
        70..=89 => Recommendation::CommitAfterReview,
        40..=69 => Recommendation::Review,
        _ => Recommendation::Fix,
    }
}

pub fn label_for(score: u8) -> ConfidenceLabel {
    match score {
        90.. => ConfidenceLabel::High,
        70..=89 => ConfidenceLabel::MediumHigh,
        40..=69 => ConfidenceLabel::Medium,
        _ => ConfidenceLabel::Low,
    }
}

/// Human next-step hints for a scored run.
pub fn next_steps(inputs: &ScoreInputs, score: &Score) -> Vec<String> {
    let mut steps = Vec::new();
    match inputs.build {
        BuildStatus::Failed => steps.push("Build failed: fix compilation errors or roll back the applied fixes".to_string()),
        BuildStatus::TimedOut => steps.push("Build timed out: raise the build timeout or check for hung tasks".to_string()),
        BuildStatus::NotDetected => steps.push("No build system detected: configure validation.build_command".to_string()),
        BuildStatus::Passed => {}
    }
    let (passed, total) = inputs.tests.pass_ratio();
    if !inputs.build.is_failure() && passed < total {
        steps.push("Some tests failed: review the test output before committing".to_string());
    }
    if !inputs.missing_engines.is_empty() {
        let names: Vec<&str> = inputs.missing_engines.iter().map(|e| e.as_str()).collect();
        steps.push(format!(
            "Rescan incomplete ({} did not run): their violations were not compared; rerun validate once they are available",
            names.join(", ")
        ));
    }
    if inputs.after > inputs.before {
        steps.push(format!(
            "{} new violation(s) introduced: rescan and inspect the diff",
            inputs.after - inputs.before
        ));
    }
    steps.push(match score.recommendation {
        Recommendation::Commit => "Changes are safe to commit".to_string(),
        Recommendation::CommitAfterReview => "Review the diff, then commit".to_string(),
        Recommendation::Review => "Manual review required before committing".to_string(),
        Recommendation::Fix => "Do not commit: fix the issues above or roll back".to_string(),
    });
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use govfix_types::validation::TestState;

    fn passed_tests() -> TestStatus {
        TestStatus {
            state: TestState::Passed,
            passed: Some(10),
            failed: Some(0),
        }
    }

    fn inputs(build: BuildStatus, tests: TestStatus, before: u64, after: u64) -> ScoreInputs {
        ScoreInputs {
            build,
            tests,
            before,
            after,
            missing_engines: vec![],
        }
    }

    #[test]
    fn perfect_run_scores_100_and_commits() {
        let s = ConfidenceScorer::new().score(&inputs(BuildStatus::Passed, passed_tests(), 5, 0));
        assert_eq!(s.value, 100);
        assert_eq!(s.recommendation, Recommendation::Commit);
        assert_eq!(s.label, ConfidenceLabel::High);
    }

    #[test]
    fn partial_fix_lands_in_review_bands() {
        // 40 + 30 + (15 + round(15 * 1/4) = 19) = 89
        let s = ConfidenceScorer::new().score(&inputs(BuildStatus::Passed, passed_tests(), 4, 3));
        assert_eq!(s.governance_points, 19);
        assert_eq!(s.value, 89);
        assert_eq!(s.recommendation, Recommendation::CommitAfterReview);
    }

    #[test]
    fn regressions_get_no_governance_points() {
        let s = ConfidenceScorer::new().score(&inputs(BuildStatus::Passed, passed_tests(), 2, 3));
        assert_eq!(s.governance_points, 0);
        assert_eq!(s.value, 70);
    }

    #[test]
    fn failed_tests_scale_test_points() {
        let tests = TestStatus {
            state: TestState::Failed,
            passed: Some(1),
            failed: Some(1),
        };
        let s = ConfidenceScorer::new().score(&inputs(BuildStatus::Passed, tests, 0, 0));
        assert_eq!(s.test_points, 15);
        assert_eq!(s.value, 85);
    }

    #[test]
    fn build_failure_forces_fix() {
        for build in [BuildStatus::Failed, BuildStatus::TimedOut, BuildStatus::NotDetected] {
            let s = ConfidenceScorer::new().score(&inputs(build, passed_tests(), 10, 0));
            assert!(s.value <= 39);
            assert_eq!(s.recommendation, Recommendation::Fix);
        }
    }

    #[test]
    fn band_edges() {
        assert_eq!(recommendation_for(100), Recommendation::Commit);
        assert_eq!(recommendation_for(90), Recommendation::Commit);
        assert_eq!(recommendation_for(89), Recommendation::CommitAfterReview);
        assert_eq!(recommendation_for(70), Recommendation::CommitAfterReview);
        assert_eq!(recommendation_for(69), Recommendation::Review);
        assert_eq!(recommendation_for(40), Recommendation::Review);
        assert_eq!(recommendation_for(39), Recommendation::Fix);
        assert_eq!(recommendation_for(0), Recommendation::Fix);
    }

    #[test]
    fn next_steps_mention_build_failure() {
        let i = inputs(BuildStatus::Failed, TestStatus::not_run(), 1, 1);
        let s = ConfidenceScorer::new().score(&i);
        let steps = next_steps(&i, &s);
        assert!(steps[0].starts_with("Build failed"));
        assert!(steps.last().unwrap().starts_with("Do not commit"));
    }

    #[test]
    fn incomplete_rescan_caps_at_review() {
        let mut i = inputs(BuildStatus::Passed, passed_tests(), 10, 0);
        i.missing_engines = vec![EngineId::SchemaLint];
        let s = ConfidenceScorer::new().score(&i);
        assert_eq!(s.value, 69);
        assert_eq!(s.recommendation, Recommendation::Review);
        let steps = next_steps(&i, &s);
        assert!(steps.iter().any(|m| m.starts_with("Rescan incomplete (schema-lint")));
    }
}
