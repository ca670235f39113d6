//! Scan → propose → apply → commit → rescan against a stub engine.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use govfix_core::adapters::FsWritePort;
use govfix_core::pipeline::{load_baseline, run_propose, run_scan};
use govfix_core::{CoreError, FixApplier, FixProposalEngine, FixSession, RunContext, ScanOrchestrator, Settings};
use govfix_engines::{EngineAdapter, EngineError, ParseError, RawOutput};
use govfix_types::fix::FixStatus;
use govfix_types::session::{Selector, SessionState};
use govfix_types::violation::{Category, EngineId, Severity, Violation};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const SPEC: &str = "openapi: 3.0.0\npaths:\n  /api/user/{id}:\n    get: {}\n";

/// Flags singular `/user` path keys in `openapi.yaml`.
struct PluralLinter;

#[async_trait]
impl EngineAdapter for PluralLinter {
    fn id(&self) -> EngineId {
        EngineId::SchemaLint
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn run(&self, target: &Utf8Path) -> Result<RawOutput, EngineError> {
        let stdout = std::fs::read_to_string(target.join("openapi.yaml")).map_err(|e| {
            EngineError::Unavailable {
                engine: EngineId::SchemaLint,
                detail: e.to_string(),
            }
        })?;
        Ok(RawOutput {
            engine: EngineId::SchemaLint,
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
            document: Some(Utf8PathBuf::from("openapi.yaml")),
        })
    }

    fn normalize(&self, _target: &Utf8Path, raw: &RawOutput) -> Result<Vec<Violation>, ParseError> {
        Ok(raw
            .stdout
            .lines()
            .enumerate()
            .filter(|(_, l)| l.contains("/user/") || l.trim_end().ends_with("/user:"))
            .map(|(i, _)| Violation {
                rule_id: "plural-resources".to_string(),
                severity: Severity::Warning,
                message: "Use `users` instead of `user`".to_string(),
                file: "openapi.yaml".to_string(),
                line: Some(i as u32 + 1),
                path: None,
                category: Category::Other,
                engine: EngineId::SchemaLint,
            })
            .collect())
    }
}

fn project() -> (TempDir, RunContext) {
    let td = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
    std::fs::write(root.join("openapi.yaml"), SPEC).unwrap();
    (td, RunContext::new(Settings::for_project(root)))
}

fn orchestrator() -> ScanOrchestrator {
    ScanOrchestrator::new(vec![Arc::new(PluralLinter)])
}

#[tokio::test]
async fn plural_fix_clears_the_rule_on_rescan() {
    let (_td, ctx) = project();
    let orch = orchestrator();

    let scan = run_scan(&ctx, &orch, None, &FsWritePort).await.unwrap();
    assert!(scan.blocking);
    assert_eq!(scan.scan.violations.len(), 1);
    assert_eq!(scan.scan.violations[0].category, Category::ResourceNaming);
    assert!(ctx.out_dir().join("governance-report.json").exists());
    assert!(ctx.out_dir().join("schema-lint-violations.json").exists());

    let selector = Selector::parse("RESOURCE_NAMING").unwrap();
    let proposed = run_propose(&ctx, &FixProposalEngine::new(None), selector, &FsWritePort)
        .await
        .unwrap();
    let mut session = proposed.session.unwrap();
    assert_eq!(session.record().fixes.len(), 1);
    assert!(session.record().fixes[0].fix.proposed_content.contains("/api/users/{id}:"));
    assert!(session.dir().join("fix-preview.md").exists());

    let applier = FixApplier::from_settings(&ctx.settings);
    let outcomes = applier.apply_all(&mut session, &Selector::All).await.unwrap();
    assert!(outcomes.iter().all(|o| o.status == FixStatus::Applied));
    let checkpoints = applier.commit(&mut session, &Selector::All).unwrap();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(session.record().state, SessionState::Closed);

    let rescan = orch.scan(&ctx, None).await;
    assert_eq!(
        rescan.violations.iter().filter(|v| v.rule_id == "plural-resources").count(),
        0
    );
}

#[tokio::test]
async fn unchanged_project_scans_identically() {
    let (_td, ctx) = project();
    let orch = orchestrator();
    let a = orch.scan(&ctx, None).await;
    let b = orch.scan(&ctx, None).await;
    assert_eq!(a.violations, b.violations);
    assert_eq!(a.engines_skipped, b.engines_skipped);
}

#[tokio::test]
async fn propose_requires_a_baseline_and_a_free_lock() {
    let (_td, ctx) = project();
    assert!(matches!(load_baseline(&ctx), Err(CoreError::NoBaseline)));

    run_scan(&ctx, &orchestrator(), None, &FsWritePort).await.unwrap();
    let first = run_propose(&ctx, &FixProposalEngine::new(None), Selector::All, &FsWritePort)
        .await
        .unwrap();
    assert!(first.session.is_some());

    let err = run_propose(&ctx, &FixProposalEngine::new(None), Selector::All, &FsWritePort)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::SessionConflict { .. }));
    assert_eq!(err.exit_code(), 2);

    let resumed = FixSession::resume(&ctx.settings).unwrap();
    assert_eq!(resumed.id(), first.session.unwrap().id());
}
