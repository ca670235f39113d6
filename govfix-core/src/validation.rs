//! Post-fix validation: build, test, rescan, diff, score.

use crate::context::RunContext;
use crate::orchestrator::ScanOrchestrator;
use crate::settings::ValidationSettings;
use camino::Utf8Path;
use chrono::Utc;
use govfix_domain::scoring::next_steps;
use govfix_domain::{ConfidenceScorer, ScoreInputs};
use govfix_engines::process::{ProcessError, run_command, tail};
use govfix_types::scan::ScanResult;
use govfix_types::schema;
use govfix_types::session::Selector;
use govfix_types::validation::{
    BaselineSource, BuildStatus, BuildSystem, CountPair, PhaseRun, TestState, TestStatus,
    ValidationReport, ViolationDelta,
};
use govfix_types::violation::{EngineId, Violation};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{Instrument, debug, info, warn};

const MAVEN_SKIP_FLAGS: [&str; 4] = [
    "-Dspotbugs.skip=true",
    "-Dpmd.skip=true",
    "-Dcheckstyle.skip=true",
    "-Ddependency-check.skip=true",
];

/// Commands chosen for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub system: BuildSystem,
    pub build: Vec<String>,
    pub test: Option<Vec<String>>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Detect the build system at `root` and its default commands.
pub fn detect_build_system(root: &Utf8Path) -> Option<BuildPlan> {
    let has = |name: &str| root.join(name).is_file();

    if has("build.gradle") || has("build.gradle.kts") {
        let bin = if has("gradlew") { "./gradlew" } else { "gradle" };
        return Some(BuildPlan {
            system: BuildSystem::Gradle,
            build: argv(&[bin, "build", "-x", "test", "--no-daemon", "--console=plain"]),
            test: Some(argv(&[bin, "test", "--no-daemon", "--console=plain"])),
        });
    }
    if has("pom.xml") {
        let bin = if has("mvnw") { "./mvnw" } else { "mvn" };
        let mut build = argv(&[bin, "compile", "-B"]);
        build.extend(MAVEN_SKIP_FLAGS.iter().map(|s| s.to_string()));
        let mut test = argv(&[bin, "test", "-B"]);
        test.extend(MAVEN_SKIP_FLAGS.iter().map(|s| s.to_string()));
        return Some(BuildPlan {
            system: BuildSystem::Maven,
            build,
            test: Some(test),
        });
    }
    if has("Cargo.toml") {
        return Some(BuildPlan {
            system: BuildSystem::Cargo,
            build: argv(&["cargo", "build"]),
            test: Some(argv(&["cargo", "test"])),
        });
    }
    if has("package.json") {
        return Some(BuildPlan {
            system: BuildSystem::Npm,
            build: argv(&["npm", "run", "build", "--if-present"]),
            test: Some(argv(&["npm", "test"])),
        });
    }
    if has("pyproject.toml") || has("requirements.txt") {
        return Some(BuildPlan {
            system: BuildSystem::Python,
            build: argv(&["python", "-m", "compileall", "-q", "."]),
            test: Some(argv(&["pytest"])),
        });
    }
    None
}

/// Detected plan with configured overrides applied.
pub fn resolve_build_plan(root: &Utf8Path, settings: &ValidationSettings) -> Option<BuildPlan> {
    let detected = detect_build_system(root);
    match (&settings.build_command, detected) {
        (Some(build), detected) => Some(BuildPlan {
            system: BuildSystem::Custom,
            build: build.clone(),
            test: settings
                .test_command
                .clone()
                .or_else(|| detected.and_then(|d| d.test)),
        }),
        (None, Some(mut d)) => {
            if let Some(test) = &settings.test_command {
                d.test = Some(test.clone());
            }
            Some(d)
        }
        (None, None) => None,
    }
}

static GRADLE_COUNTS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+) tests? completed(?:, (\d+) failed)?(?:, (\d+) skipped)?").ok());
static MAVEN_COUNTS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"Tests run: (\d+), Failures: (\d+), Errors: (\d+)(?:, Skipped: (\d+))?").ok()
});
static PYTEST_PASSED: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(\d+) passed").ok());
static PYTEST_FAILED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+) (?:failed|errors?)\b").ok());
static CARGO_RESULT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed;").ok());

fn num(c: &regex::Captures<'_>, i: usize) -> u64 {
    c.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0)
}

fn gradle_counts(out: &str) -> Option<(u64, u64)> {
    let re = GRADLE_COUNTS.as_ref()?;
    let c = re.captures_iter(out).last()?;
    let (total, failed, skipped) = (num(&c, 1), num(&c, 2), num(&c, 3));
    Some((total.saturating_sub(failed + skipped), failed))
}

fn maven_counts(out: &str) -> Option<(u64, u64)> {
    // The last line is the reactor-wide total.
    let re = MAVEN_COUNTS.as_ref()?;
    let c = re.captures_iter(out).last()?;
    let (run, failures, errors, skipped) = (num(&c, 1), num(&c, 2), num(&c, 3), num(&c, 4));
    Some((run.saturating_sub(failures + errors + skipped), failures + errors))
}

fn pytest_counts(out: &str) -> Option<(u64, u64)> {
    let summary = out.lines().rev().find(|l| l.contains(" passed") || l.contains(" failed"))?;
    let passed = PYTEST_PASSED
        .as_ref()?
        .captures(summary)
        .map(|c| num(&c, 1))
        .unwrap_or(0);
    let failed: u64 = PYTEST_FAILED
        .as_ref()?
        .captures_iter(summary)
        .map(|c| num(&c, 1))
        .sum();
    (passed + failed > 0).then_some((passed, failed))
}

fn cargo_counts(out: &str) -> Option<(u64, u64)> {
    let re = CARGO_RESULT.as_ref()?;
    let mut seen = false;
    let (mut passed, mut failed) = (0, 0);
    for c in re.captures_iter(out) {
        seen = true;
        passed += num(&c, 1);
        failed += num(&c, 2);
    }
    seen.then_some((passed, failed))
}

/// `(passed, failed)` parsed from a test run's combined output.
pub fn parse_test_counts(system: BuildSystem, output: &str) -> Option<(u64, u64)> {
    match system {
        BuildSystem::Gradle => gradle_counts(output),
        BuildSystem::Maven => maven_counts(output),
        BuildSystem::Cargo => cargo_counts(output),
        BuildSystem::Python => pytest_counts(output),
        BuildSystem::Npm | BuildSystem::Custom => cargo_counts(output)
            .or_else(|| maven_counts(output))
            .or_else(|| gradle_counts(output))
            .or_else(|| pytest_counts(output)),
    }
}

/// Baseline engines that also ran in the rescan, and those that did not.
pub fn comparable_engines(before: &ScanResult, after: &ScanResult) -> (Vec<EngineId>, Vec<EngineId>) {
    before
        .engines_run
        .iter()
        .copied()
        .partition(|e| after.engines_run.contains(e))
}

fn restrict(scan: &ScanResult, keep: impl Fn(&Violation) -> bool) -> ScanResult {
    ScanResult {
        project: scan.project.clone(),
        scanned_at: scan.scanned_at,
        engines_run: scan.engines_run.clone(),
        engines_skipped: scan.engines_skipped.clone(),
        violations: scan.violations.iter().filter(|v| keep(v)).cloned().collect(),
    }
}

/// Before/after counts, overall and per rule and category.
///
/// Only engines that ran in both scans are counted, so an engine lost in the
/// rescan never reads as fixed. `scope` narrows both sides further.
pub fn compute_delta(before: &ScanResult, after: &ScanResult, scope: Option<&Selector>) -> ViolationDelta {
    let (compared, missing) = comparable_engines(before, after);
    let keep = |v: &Violation| {
        compared.contains(&v.engine) && scope.is_none_or(|s| s.matches_violation(v))
    };
    let before = &restrict(before, keep);
    let after = &restrict(after, keep);
    let (b, a) = (before.total() as u64, after.total() as u64);

    let mut by_rule: BTreeMap<String, CountPair> = BTreeMap::new();
    for (rule, n) in before.counts_by_rule() {
        by_rule.entry(rule).or_default().before = n;
    }
    for (rule, n) in after.counts_by_rule() {
        by_rule.entry(rule).or_default().after = n;
    }

    let mut by_category: BTreeMap<String, CountPair> = BTreeMap::new();
    let after_cats = after.counts_by_category();
    for (cat, n) in before.counts_by_category() {
        let pair = CountPair {
            before: n,
            after: after_cats.get(&cat).copied().unwrap_or(0),
        };
        if pair.before > 0 || pair.after > 0 {
            by_category.insert(cat.wire_name().to_string(), pair);
        }
    }

    ViolationDelta {
        before: b,
        after: a,
        fixed: b.saturating_sub(a),
        new: a.saturating_sub(b),
        by_rule,
        by_category,
        compared_engines: compared,
        missing_engines: missing,
    }
}

enum PhaseResult {
    Finished { success: bool, output: String },
    TimedOut,
    Failed,
}

async fn run_phase(
    command: &[String],
    cwd: &Utf8Path,
    timeout: Duration,
    tail_lines: usize,
) -> (PhaseResult, PhaseRun) {
    let started = std::time::Instant::now();
    let mut run = PhaseRun {
        command: command.to_vec(),
        exit_code: None,
        duration_ms: 0,
        timed_out: false,
        output_tail: String::new(),
    };
    let result = match run_command(command, cwd, timeout).await {
        Ok(out) => {
            let output = out.combined();
            run.exit_code = out.exit_code;
            run.output_tail = tail(&output, tail_lines);
            PhaseResult::Finished {
                success: out.success(),
                output,
            }
        }
        Err(ProcessError::Timeout { .. }) => {
            run.timed_out = true;
            PhaseResult::TimedOut
        }
        Err(e) => {
            warn!("{e}");
            run.output_tail = e.to_string();
            PhaseResult::Failed
        }
    };
    run.duration_ms = started.elapsed().as_millis() as u64;
    (result, run)
}

/// Build, test, rescan, then score against the baseline.
///
/// Dropping the returned future kills whichever build or test process is
/// running.
#[derive(Debug)]
pub struct ValidationPipeline<'a> {
    orchestrator: &'a ScanOrchestrator,
    scorer: ConfidenceScorer,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(orchestrator: &'a ScanOrchestrator) -> Self {
        Self {
            orchestrator,
            scorer: ConfidenceScorer::new(),
        }
    }

    /// Validate against `baseline`, counting only violations `scope` selects.
    pub async fn validate(
        &self,
        ctx: &RunContext,
        baseline: &ScanResult,
        source: BaselineSource,
        scope: Option<&Selector>,
    ) -> ValidationReport {
        self.validate_inner(ctx, baseline, source, scope)
            .instrument(ctx.span.clone())
            .await
    }

    async fn validate_inner(
        &self,
        ctx: &RunContext,
        baseline: &ScanResult,
        source: BaselineSource,
        scope: Option<&Selector>,
    ) -> ValidationReport {
        let started_at = Utc::now();
        let project = ctx.project();
        let vs = &ctx.settings.validation;
        let plan = resolve_build_plan(project, vs);

        let (build_status, build_run) = match &plan {
            None => {
                warn!("no build system detected");
                (BuildStatus::NotDetected, None)
            }
            Some(plan) => {
                info!(system = plan.system.as_str(), "running build");
                let (result, run) =
                    run_phase(&plan.build, project, vs.build_timeout, vs.output_tail_lines).await;
                let status = match result {
                    PhaseResult::Finished { success: true, .. } => BuildStatus::Passed,
                    PhaseResult::Finished { success: false, .. } | PhaseResult::Failed => {
                        BuildStatus::Failed
                    }
                    PhaseResult::TimedOut => BuildStatus::TimedOut,
                };
                (status, Some(run))
            }
        };
        debug!(status = build_status.as_str(), "build finished");

        let (test_status, test_run) = match plan.as_ref().and_then(|p| p.test.as_ref().map(|t| (p.system, t))) {
            Some((system, test)) if !build_status.is_failure() => {
                info!("running tests");
                let (result, run) =
                    run_phase(test, project, vs.test_timeout, vs.output_tail_lines).await;
                let status = match result {
                    PhaseResult::Finished { success, output } => {
                        let counts = parse_test_counts(system, &output);
                        TestStatus {
                            state: if success { TestState::Passed } else { TestState::Failed },
                            passed: counts.map(|c| c.0),
                            failed: counts.map(|c| c.1),
                        }
                    }
                    PhaseResult::TimedOut => TestStatus {
                        state: TestState::TimedOut,
                        passed: None,
                        failed: None,
                    },
                    PhaseResult::Failed => TestStatus {
                        state: TestState::Failed,
                        passed: None,
                        failed: None,
                    },
                };
                (status, Some(run))
            }
            _ => (TestStatus::not_run(), None),
        };
        debug!(state = test_status.state.as_str(), "tests finished");

        let rescan = self.orchestrator.scan(ctx, None).await;
        let delta = compute_delta(baseline, &rescan, scope);
        if !delta.rescan_complete() {
            warn!(missing = ?delta.missing_engines, "rescan lost baseline engines; their violations are not compared");
        }

        let inputs = ScoreInputs {
            build: build_status,
            tests: test_status.clone(),
            before: delta.before,
            after: delta.after,
            missing_engines: delta.missing_engines.clone(),
        };
        let score = self.scorer.score(&inputs);
        let steps = next_steps(&inputs, &score);
        info!(
            score = score.value,
            recommendation = %score.recommendation,
            fixed = delta.fixed,
            new = delta.new,
            "validation complete"
        );

        ValidationReport {
            schema: schema::GOVFIX_VALIDATION_V1.to_string(),
            project: project.to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            build_system: plan.map(|p| p.system),
            build_status,
            build_run,
            test_status,
            test_run,
            scope: scope.cloned(),
            baseline: source,
            rescan,
            delta,
            confidence_score: score.value,
            confidence: score.label,
            recommendation: score.recommendation,
            next_steps: steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use async_trait::async_trait;
    use camino::Utf8PathBuf;
    use govfix_domain::category_for;
    use govfix_engines::{EngineAdapter, EngineError, ParseError, RawOutput};
    use govfix_types::validation::Recommendation;
    use govfix_types::violation::{Category, Severity};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn project() -> (TempDir, Utf8PathBuf) {
        let td = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
        (td, root)
    }

    fn violation(rule: &str, category: Category) -> Violation {
        Violation {
            rule_id: rule.to_string(),
            severity: Severity::Warning,
            message: "m".to_string(),
            file: "openapi.yaml".to_string(),
            line: Some(1),
            path: None,
            category,
            engine: EngineId::SchemaLint,
        }
    }

    fn scan(violations: Vec<Violation>) -> ScanResult {
        ScanResult {
            project: Utf8PathBuf::from("."),
            scanned_at: Utc::now(),
            engines_run: vec![EngineId::SchemaLint],
            engines_skipped: vec![],
            violations,
        }
    }

    /// A schema linter that reports a fixed list after `delay`.
    struct FixedLinter {
        violations: Vec<Violation>,
        delay: Duration,
    }

    #[async_trait]
    impl EngineAdapter for FixedLinter {
        fn id(&self) -> EngineId {
            EngineId::SchemaLint
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn run(&self, _target: &Utf8Path) -> Result<RawOutput, EngineError> {
            tokio::time::sleep(self.delay).await;
            Ok(RawOutput {
                engine: EngineId::SchemaLint,
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                document: None,
            })
        }

        fn normalize(&self, _target: &Utf8Path, _raw: &RawOutput) -> Result<Vec<Violation>, ParseError> {
            Ok(self.violations.clone())
        }
    }

    fn linter(violations: Vec<Violation>) -> ScanOrchestrator {
        ScanOrchestrator::new(vec![Arc::new(FixedLinter {
            violations,
            delay: Duration::ZERO,
        })])
    }

    fn categorized(rule: &str) -> Violation {
        violation(rule, category_for(rule))
    }

    #[test]
    fn detection_follows_precedence() {
        let (_td, root) = project();
        assert_eq!(detect_build_system(&root), None);

        std::fs::write(root.join("package.json"), "{}").unwrap();
        assert_eq!(detect_build_system(&root).unwrap().system, BuildSystem::Npm);

        std::fs::write(root.join("pom.xml"), "<project/>").unwrap();
        std::fs::write(root.join("mvnw"), "").unwrap();
        let plan = detect_build_system(&root).unwrap();
        assert_eq!(plan.system, BuildSystem::Maven);
        assert_eq!(plan.build[..3], argv(&["./mvnw", "compile", "-B"])[..]);
        assert!(plan.build.contains(&"-Dpmd.skip=true".to_string()));

        std::fs::write(root.join("build.gradle.kts"), "").unwrap();
        let plan = detect_build_system(&root).unwrap();
        assert_eq!(plan.system, BuildSystem::Gradle);
        assert_eq!(plan.build[0], "gradle");
    }

    #[test]
    fn build_override_is_custom() {
        let (_td, root) = project();
        std::fs::write(root.join("Cargo.toml"), "").unwrap();
        let vs = ValidationSettings {
            build_command: Some(argv(&["make"])),
            ..ValidationSettings::default()
        };
        let plan = resolve_build_plan(&root, &vs).unwrap();
        assert_eq!(plan.system, BuildSystem::Custom);
        assert_eq!(plan.test, Some(argv(&["cargo", "test"])));
    }

    #[test]
    fn parses_test_summaries() {
        let cargo = "test result: ok. 3 passed; 0 failed; 0 ignored\n\
                     test result: FAILED. 2 passed; 1 failed; 0 ignored\n";
        assert_eq!(parse_test_counts(BuildSystem::Cargo, cargo), Some((5, 1)));

        let maven = "Tests run: 2, Failures: 0, Errors: 0, Skipped: 0\n\
                     Tests run: 10, Failures: 1, Errors: 1, Skipped: 2\n";
        assert_eq!(parse_test_counts(BuildSystem::Maven, maven), Some((6, 2)));

        let pytest = "===== 7 passed, 2 failed, 1 error in 0.52s =====";
        assert_eq!(parse_test_counts(BuildSystem::Python, pytest), Some((7, 3)));

        let gradle = "12 tests completed, 3 failed";
        assert_eq!(parse_test_counts(BuildSystem::Gradle, gradle), Some((9, 3)));

        assert_eq!(parse_test_counts(BuildSystem::Cargo, "nothing here"), None);
    }

    #[test]
    fn delta_counts_fixed_and_new_per_rule() {
        let before = scan(vec![
            violation("plural-resources", Category::ResourceNaming),
            violation("plural-resources", Category::ResourceNaming),
            violation("no-sysout", Category::CodeQuality),
        ]);
        let after = scan(vec![
            violation("no-sysout", Category::CodeQuality),
            violation("missing-description", Category::Documentation),
        ]);
        let d = compute_delta(&before, &after, None);
        assert_eq!((d.before, d.after, d.fixed, d.new), (3, 2, 1, 0));
        assert_eq!(d.by_rule["plural-resources"], CountPair { before: 2, after: 0 });
        assert_eq!(d.by_rule["missing-description"], CountPair { before: 0, after: 1 });
        assert_eq!(d.by_category["RESOURCE_NAMING"], CountPair { before: 2, after: 0 });
        assert!(!d.by_category.contains_key("SECURITY"));
        assert_eq!(d.compared_engines, vec![EngineId::SchemaLint]);
        assert!(d.rescan_complete());
    }

    #[test]
    fn engine_missing_from_rescan_is_not_counted_as_fixed() {
        let before = scan(vec![
            violation("plural-resources", Category::ResourceNaming),
            violation("no-sysout", Category::CodeQuality),
        ]);
        let mut after = scan(vec![]);
        after.engines_run.clear();
        let d = compute_delta(&before, &after, None);
        assert_eq!((d.before, d.after, d.fixed), (0, 0, 0));
        assert_eq!(d.missing_engines, vec![EngineId::SchemaLint]);
        assert!(!d.rescan_complete());
    }

    #[test]
    fn scope_restricts_both_sides() {
        let before = scan(vec![
            violation("plural-resources", Category::ResourceNaming),
            violation("plural-resources", Category::ResourceNaming),
            violation("no-sysout", Category::CodeQuality),
        ]);
        let after = scan(vec![violation("no-sysout", Category::CodeQuality)]);
        let scope = Selector::Category(Category::ResourceNaming);
        let d = compute_delta(&before, &after, Some(&scope));
        assert_eq!((d.before, d.after, d.fixed), (2, 0, 2));
        assert!(!d.by_rule.contains_key("no-sysout"));

        let d = compute_delta(&before, &after, Some(&Selector::Rule("no-sysout".into())));
        assert_eq!((d.before, d.after, d.fixed), (1, 1, 0));
    }

    fn ctx_with(root: &Utf8Path, build: &[&str], test: Option<&[&str]>) -> RunContext {
        let mut settings = Settings::for_project(root.to_path_buf());
        settings.validation.build_command = Some(argv(build));
        settings.validation.test_command = test.map(argv);
        settings.validation.build_timeout = Duration::from_secs(10);
        settings.validation.test_timeout = Duration::from_millis(300);
        RunContext::new(settings)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_build_skips_tests_and_forces_fix() {
        let (_td, root) = project();
        let ctx = ctx_with(&root, &["sh", "-c", "echo boom; exit 1"], Some(&["sh", "-c", "exit 0"]));
        let orchestrator = linter(vec![]);
        let report = ValidationPipeline::new(&orchestrator)
            .validate(&ctx, &scan(vec![categorized("r")]), BaselineSource::Report, None)
            .await;
        assert_eq!(report.build_status, BuildStatus::Failed);
        assert_eq!(report.test_status.state, TestState::NotRun);
        assert_eq!(report.recommendation, Recommendation::Fix);
        assert!(report.confidence_score <= 39);
        assert_eq!(report.build_run.unwrap().output_tail, "boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_run_with_all_fixed_commits() {
        let (_td, root) = project();
        let ctx = ctx_with(
            &root,
            &["sh", "-c", "exit 0"],
            Some(&["sh", "-c", "echo 'test result: ok. 4 passed; 0 failed; 0 ignored'"]),
        );
        let orchestrator = linter(vec![]);
        let report = ValidationPipeline::new(&orchestrator)
            .validate(&ctx, &scan(vec![categorized("r")]), BaselineSource::Report, None)
            .await;
        assert_eq!(report.schema, "govfix.validation.v1");
        assert_eq!(report.test_status.passed, Some(4));
        assert_eq!(report.delta.fixed, 1);
        assert_eq!(report.confidence_score, 100);
        assert_eq!(report.recommendation, Recommendation::Commit);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let (_td, root) = project();
        let ctx = ctx_with(&root, &["sh", "-c", "exit 0"], Some(&["sh", "-c", "sleep 30"]));
        let orchestrator = linter(vec![]);
        let report = ValidationPipeline::new(&orchestrator)
            .validate(&ctx, &scan(vec![]), BaselineSource::Report, None)
            .await;
        assert_eq!(report.test_status.state, TestState::TimedOut);
        assert!(report.test_run.unwrap().timed_out);
        // 40 build + 0 tests + 30 governance
        assert_eq!(report.confidence_score, 70);
    }

    #[tokio::test]
    async fn undetected_build_is_a_failure() {
        let (_td, root) = project();
        let ctx = RunContext::new(Settings::for_project(root.clone()));
        let orchestrator = linter(vec![]);
        let report = ValidationPipeline::new(&orchestrator)
            .validate(&ctx, &scan(vec![]), BaselineSource::Report, None)
            .await;
        assert_eq!(report.build_status, BuildStatus::NotDetected);
        assert_eq!(report.build_system, None);
        assert_eq!(report.recommendation, Recommendation::Fix);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rescan_that_lost_an_engine_cannot_commit() {
        let (_td, root) = project();
        let ctx = ctx_with(
            &root,
            &["sh", "-c", "exit 0"],
            Some(&["sh", "-c", "echo 'test result: ok. 4 passed; 0 failed; 0 ignored'"]),
        );
        let stalled = ScanOrchestrator::new(vec![Arc::new(FixedLinter {
            violations: vec![],
            delay: Duration::from_secs(30),
        })]);
        let baseline = scan((0..10).map(|_| categorized("plural-resources")).collect());

        let report = ValidationPipeline::new(&stalled)
            .validate(&ctx, &baseline, BaselineSource::Report, None)
            .await;
        assert_eq!(report.rescan.skipped_ids(), vec![EngineId::SchemaLint]);
        assert_eq!((report.delta.before, report.delta.after), (0, 0));
        assert_eq!(report.delta.missing_engines, vec![EngineId::SchemaLint]);
        assert!(report.confidence_score <= 69);
        assert_eq!(report.recommendation, Recommendation::Review);
        assert!(report.next_steps.iter().any(|s| s.starts_with("Rescan incomplete")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn scoped_validation_ignores_other_categories() {
        let (_td, root) = project();
        let ctx = ctx_with(
            &root,
            &["sh", "-c", "exit 0"],
            Some(&["sh", "-c", "echo 'test result: ok. 4 passed; 0 failed; 0 ignored'"]),
        );
        let baseline = scan(vec![
            categorized("plural-resources"),
            categorized("plural-resources"),
            categorized("coding-no-std-streams"),
        ]);
        let orchestrator = linter(vec![categorized("coding-no-std-streams")]);
        let scope = Selector::Category(Category::ResourceNaming);

        let report = ValidationPipeline::new(&orchestrator)
            .validate(&ctx, &baseline, BaselineSource::Session, Some(&scope))
            .await;
        assert_eq!(report.scope, Some(scope));
        assert_eq!(report.baseline, BaselineSource::Session);
        assert_eq!((report.delta.before, report.delta.after, report.delta.fixed), (2, 0, 2));
        assert_eq!(report.confidence_score, 100);

        let whole = ValidationPipeline::new(&orchestrator)
            .validate(&ctx, &baseline, BaselineSource::Session, None)
            .await;
        assert_eq!((whole.delta.before, whole.delta.after), (3, 1));
        assert!(whole.confidence_score < 100);
    }
}
