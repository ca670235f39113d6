//! Artifact layout under the governance output directory.

use crate::ports::WritePort;
use anyhow::Context;
use camino::Utf8Path;
use fs_err as fs;
use govfix_domain::categories::{recommended_order, summarize};
use govfix_domain::violations::count_by_severity;
use govfix_render::{render_preview_md, render_summary_md, render_validation_md};
use govfix_types::report::{EngineViolations, GovernanceReport};
use govfix_types::scan::ScanResult;
use govfix_types::schema;
use govfix_types::session::{FixEntry, SessionRecord};
use govfix_types::validation::ValidationReport;
use govfix_types::violation::EngineId;
use std::io::ErrorKind;
use tracing::debug;

pub const REPORT_FILE: &str = "governance-report.json";
pub const SUMMARY_FILE: &str = "governance-summary.md";
pub const PREVIEW_FILE: &str = "fix-preview.md";
pub const VALIDATION_JSON: &str = "validation-report.json";
pub const VALIDATION_MD: &str = "validation-report.md";

/// `<engine>-violations.json`.
pub fn engine_file_name(engine: EngineId) -> String {
    format!("{}-violations.json", engine.as_str())
}

/// The aggregate report for a scan.
pub fn build_report(scan: &ScanResult) -> GovernanceReport {
    let by_category = scan
        .counts_by_category()
        .into_iter()
        .map(|(c, n)| (c.wire_name().to_string(), n))
        .collect();
    let by_severity = count_by_severity(&scan.violations)
        .into_iter()
        .map(|(s, n)| (s.as_str().to_string(), n))
        .collect();

    GovernanceReport {
        schema: schema::GOVFIX_REPORT_V1.to_string(),
        scanned_at: scan.scanned_at,
        project: scan.project.clone(),
        total: scan.total() as u64,
        by_category,
        by_severity,
        engines_run: scan.engines_run.clone(),
        engines_skipped: scan.engines_skipped.clone(),
        categories: summarize(scan),
        recommended_order: recommended_order(scan),
        violations: scan.violations.clone(),
    }
}

/// Write the aggregate report, one file per engine that ran, and the summary.
///
/// Per-engine files left by an earlier scan for engines that did not run
/// this time are removed.
pub fn write_scan_artifacts(
    scan: &ScanResult,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<GovernanceReport> {
    writer.create_dir_all(out_dir)?;

    let report = build_report(scan);
    let json = serde_json::to_string_pretty(&report).context("serialize report")?;
    writer.write_file(&out_dir.join(REPORT_FILE), json.as_bytes())?;

    for engine in &scan.engines_run {
        let violations: Vec<_> = scan.violations_for_engine(*engine).into_iter().cloned().collect();
        let per_engine = EngineViolations {
            engine: *engine,
            scanned_at: scan.scanned_at,
            total: violations.len() as u64,
            violations,
        };
        let json = serde_json::to_string_pretty(&per_engine)
            .with_context(|| format!("serialize {engine} violations"))?;
        writer.write_file(&out_dir.join(engine_file_name(*engine)), json.as_bytes())?;
    }
    for engine in EngineId::ALL.iter().filter(|e| !scan.engines_run.contains(e)) {
        writer.remove_file(&out_dir.join(engine_file_name(*engine)))?;
    }

    writer.write_file(&out_dir.join(SUMMARY_FILE), render_summary_md(&report).as_bytes())?;
    debug!(out_dir = %out_dir, total = report.total, "scan artifacts written");
    Ok(report)
}

/// The last persisted report, if a scan has run.
pub fn read_report(out_dir: &Utf8Path) -> anyhow::Result<Option<GovernanceReport>> {
    let path = out_dir.join(REPORT_FILE);
    match fs::read_to_string(&path) {
        Ok(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("parse {path}"))?,
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {path}")),
    }
}

pub fn write_preview(
    session: &SessionRecord,
    entries: &[&FixEntry],
    session_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    writer.create_dir_all(session_dir)?;
    let md = render_preview_md(session, entries);
    writer.write_file(&session_dir.join(PREVIEW_FILE), md.as_bytes())
}

pub fn write_validation_artifacts(
    report: &ValidationReport,
    out_dir: &Utf8Path,
    writer: &dyn WritePort,
) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;
    let json = serde_json::to_string_pretty(report).context("serialize validation report")?;
    writer.write_file(&out_dir.join(VALIDATION_JSON), json.as_bytes())?;
    writer.write_file(&out_dir.join(VALIDATION_MD), render_validation_md(report).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FsWritePort, InMemoryWritePort};
    use camino::Utf8PathBuf;
    use chrono::Utc;
    use govfix_types::scan::{SkipReason, SkippedEngine};
    use govfix_types::violation::{Category, Severity, Violation};
    use pretty_assertions::assert_eq;

    fn violation(rule: &str, category: Category, engine: EngineId, severity: Severity) -> Violation {
        Violation {
            rule_id: rule.to_string(),
            severity,
            message: "m".to_string(),
            file: "openapi.yaml".to_string(),
            line: Some(3),
            path: None,
            category,
            engine,
        }
    }

    fn scan() -> ScanResult {
        ScanResult {
            project: Utf8PathBuf::from("/work/demo"),
            scanned_at: Utc::now(),
            engines_run: vec![EngineId::SchemaLint, EngineId::Architecture],
            engines_skipped: vec![],
            violations: vec![
                violation("plural-resources", Category::ResourceNaming, EngineId::SchemaLint, Severity::Warning),
                violation("no-cycles", Category::Architecture, EngineId::Architecture, Severity::Critical),
            ],
        }
    }

    #[test]
    fn report_has_every_category_and_priority_order() {
        let r = build_report(&scan());
        assert_eq!(r.schema, "govfix.report.v1");
        assert_eq!(r.by_category.len(), 10);
        assert_eq!(r.by_category["RESOURCE_NAMING"], 1);
        assert_eq!(r.by_category["SECURITY"], 0);
        assert_eq!(r.by_severity["critical"], 1);
        assert_eq!(
            r.recommended_order,
            vec![Category::ResourceNaming, Category::Architecture]
        );
    }

    #[test]
    fn scan_artifacts_cover_every_engine_that_ran() {
        let w = InMemoryWritePort::new();
        let out = Utf8Path::new("/out");
        write_scan_artifacts(&scan(), out, &w).unwrap();
        let paths: Vec<String> = w.paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "/out/architecture-violations.json",
                "/out/governance-report.json",
                "/out/governance-summary.md",
                "/out/schema-lint-violations.json",
            ]
        );
        let lint: EngineViolations =
            serde_json::from_str(&w.read(&out.join("schema-lint-violations.json")).unwrap()).unwrap();
        assert_eq!(lint.total, 1);
    }

    #[test]
    fn report_round_trips_through_disk() {
        let td = tempfile::TempDir::new().unwrap();
        let out = Utf8PathBuf::from_path_buf(td.path().join("gov")).unwrap();
        assert!(read_report(&out).unwrap().is_none());
        let written = write_scan_artifacts(&scan(), &out, &FsWritePort).unwrap();
        let read = read_report(&out).unwrap().unwrap();
        assert_eq!(read, written);
        assert!(read.to_scan().same_findings(&scan()));
    }

    #[test]
    fn engines_that_did_not_run_lose_their_old_file() {
        let td = tempfile::TempDir::new().unwrap();
        let out = Utf8PathBuf::from_path_buf(td.path().join("gov")).unwrap();
        write_scan_artifacts(&scan(), &out, &FsWritePort).unwrap();
        assert!(out.join("architecture-violations.json").exists());

        let mut rescan = scan();
        rescan.engines_run = vec![EngineId::SchemaLint];
        rescan.engines_skipped = vec![SkippedEngine {
            engine: EngineId::Architecture,
            reason: SkipReason::Timeout,
            detail: None,
        }];
        rescan.violations.retain(|v| v.engine == EngineId::SchemaLint);
        write_scan_artifacts(&rescan, &out, &FsWritePort).unwrap();

        assert!(!out.join("architecture-violations.json").exists());
        assert!(out.join("schema-lint-violations.json").exists());
    }
}
