use camino::Utf8PathBuf;
use chrono::{TimeZone, Utc};
use govfix_render::{
    render_categories_md, render_preview_md, render_review_report_md, render_validation_md,
};
use govfix_types::fix::{FixOrigin, FixStatus, OutcomeError, ProposedFix};
use govfix_types::scan::ScanResult;
use govfix_types::schema;
use govfix_types::session::{
    BaselineRef, FixEntry, ReviewDecision, ReviewSummary, Selector, SessionRecord, SessionState,
    SessionSummary,
};
use govfix_types::validation::{
    BaselineSource, BuildStatus, BuildSystem, ConfidenceLabel, CountPair, PhaseRun,
    Recommendation, TestState, TestStatus, ValidationReport, ViolationDelta,
};
use govfix_types::violation::{Category, EngineId, Severity};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use uuid::Uuid;

fn entry(status: FixStatus) -> FixEntry {
    FixEntry {
        fix: ProposedFix {
            fix_id: "fix-0001-strategy".to_string(),
            rule_id: "plural-resources".to_string(),
            category: Category::ResourceNaming,
            severity: Severity::Warning,
            file_path: "openapi.yaml".to_string(),
            line_number: Some(3),
            original_content: "paths:\n  /api/user:\n".to_string(),
            original_sha256: String::new(),
            proposed_content: "paths:\n  /api/users:\n".to_string(),
            explanation: "Collection resources use plural nouns.".to_string(),
            auxiliary: vec![],
            origin: FixOrigin::Strategy,
            violations: 1,
        },
        status,
        decision: ReviewDecision::Pending,
        comments: vec![],
        last_error: None,
        checkpoint_id: None,
        updated_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
    }
}

fn session(fixes: Vec<FixEntry>) -> SessionRecord {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    SessionRecord {
        schema: schema::GOVFIX_SESSION_V1.to_string(),
        session_id: Uuid::nil(),
        project: Utf8PathBuf::from("/work/demo"),
        created_at: at,
        state: SessionState::Active,
        selector: Selector::Category(Category::ResourceNaming),
        baseline: BaselineRef {
            scanned_at: at,
            total: 3,
        },
        fixes,
        checkpoints: vec![],
        summary: SessionSummary::default(),
        review: ReviewSummary::default(),
    }
}

#[test]
fn preview_contains_diff_block() {
    let e = entry(FixStatus::Previewed);
    let s = session(vec![e.clone()]);
    let md = render_preview_md(&s, &[&e]);
    assert!(md.contains("## fix-0001-strategy"));
    assert!(md.contains("- Location: `openapi.yaml:3`"));
    assert!(md.contains("- Changes: +1 -1"));
    assert!(md.contains("```diff\ndiff --git a/openapi.yaml b/openapi.yaml\n"));
    assert!(md.contains("-  /api/user:\n+  /api/users:\n"));
}

#[test]
fn empty_preview_says_so() {
    let s = session(vec![]);
    assert!(render_preview_md(&s, &[]).contains("_No fixes to preview._"));
}

#[test]
fn review_report_lists_errors() {
    let mut e = entry(FixStatus::Proposed);
    e.last_error = Some(OutcomeError {
        code: "stale".to_string(),
        message: "openapi.yaml changed".to_string(),
    });
    let md = render_review_report_md(&session(vec![e]));
    assert!(md.contains("| fix-0001-strategy | `plural-resources` | `openapi.yaml:3` | PROPOSED | PENDING |"));
    assert!(md.contains("- Last error (`stale`): openapi.yaml changed"));
}

#[test]
fn categories_table_has_all_tiers() {
    let mut counts = BTreeMap::new();
    counts.insert("SECURITY".to_string(), 4);
    let md = render_categories_md(Some(&counts));
    assert_eq!(md.lines().count(), 12);
    assert!(md.contains("| P4 | SECURITY | Security | High | 4 |"));
    assert!(md.contains("| P10 | OTHER | Other | Varies | - |"));
}

#[test]
fn validation_report_headline() {
    let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let mut by_rule = BTreeMap::new();
    by_rule.insert("plural-resources".to_string(), CountPair { before: 2, after: 0 });
    let report = ValidationReport {
        schema: schema::GOVFIX_VALIDATION_V1.to_string(),
        project: Utf8PathBuf::from("/work/demo"),
        started_at: at,
        finished_at: at,
        build_system: Some(BuildSystem::Gradle),
        build_status: BuildStatus::Passed,
        build_run: Some(PhaseRun {
            command: vec!["./gradlew".into(), "build".into(), "-x".into(), "test".into()],
            exit_code: Some(0),
            duration_ms: 1200,
            timed_out: false,
            output_tail: "BUILD SUCCESSFUL".to_string(),
        }),
        test_status: TestStatus {
            state: TestState::Passed,
            passed: Some(12),
            failed: Some(0),
        },
        test_run: None,
        scope: Some(Selector::Category(Category::ResourceNaming)),
        baseline: BaselineSource::Session,
        rescan: ScanResult {
            project: Utf8PathBuf::from("/work/demo"),
            scanned_at: at,
            engines_run: vec![],
            engines_skipped: vec![],
            violations: vec![],
        },
        delta: ViolationDelta {
            before: 2,
            after: 0,
            fixed: 2,
            new: 0,
            by_rule,
            by_category: BTreeMap::new(),
            compared_engines: vec![EngineId::SchemaLint],
            missing_engines: vec![EngineId::Architecture],
        },
        confidence_score: 100,
        confidence: ConfidenceLabel::High,
        recommendation: Recommendation::Commit,
        next_steps: vec!["Changes are safe to commit".to_string()],
    };
    let md = render_validation_md(&report);
    assert!(md.contains("**Recommendation: COMMIT** (confidence 100 / 100, HIGH)"));
    assert!(md.contains("- Tests: passed (12 passed, 0 failed)"));
    assert!(md.contains("| `plural-resources` | 2 | 0 |"));
    assert!(md.contains("- Baseline: session\n- Scope: `RESOURCE_NAMING`\n"));
    assert!(md.contains("- Not compared (missing from rescan): architecture\n"));
    assert!(md.contains("- Command: `./gradlew build -x test`"));
    assert!(md.contains("```text\nBUILD SUCCESSFUL\n```"));
}
