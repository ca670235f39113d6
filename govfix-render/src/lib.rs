//! Rendering helpers (markdown) for human-readable artifacts.

use govfix_edit::{line_stats, render_diff};
use govfix_types::fix::AuxiliaryChange;
use govfix_types::report::GovernanceReport;
use govfix_types::session::{FixEntry, SessionRecord};
use govfix_types::validation::{PhaseRun, ValidationReport};
use govfix_types::violation::Category;
use std::collections::BTreeMap;

pub fn render_summary_md(report: &GovernanceReport) -> String {
    let mut out = String::new();
    out.push_str("# Governance summary\n\n");
    out.push_str(&format!("- Project: `{}`\n", report.project));
    out.push_str(&format!("- Scanned at: {}\n", report.scanned_at.to_rfc3339()));
    out.push_str(&format!("- Total violations: {}\n", report.total));
    for (sev, n) in &report.by_severity {
        out.push_str(&format!("  - {sev}: {n}\n"));
    }
    let engines: Vec<&str> = report.engines_run.iter().map(|e| e.as_str()).collect();
    out.push_str(&format!(
        "- Engines run: {}\n",
        if engines.is_empty() { "none".to_string() } else { engines.join(", ") }
    ));

    if !report.engines_skipped.is_empty() {
        out.push_str("\n## Skipped engines\n\n");
        for s in &report.engines_skipped {
            out.push_str(&format!("- `{}`: {}", s.engine, s.reason.as_str()));
            if let Some(d) = &s.detail {
                out.push_str(&format!(" ({d})"));
            }
            out.push('\n');
        }
    }

    out.push_str("\n## Categories\n\n");
    if report.categories.is_empty() {
        out.push_str("_No violations found._\n");
        return out;
    }
    out.push_str("| Tier | Category | Violations | Effort |\n|---|---|---|---|\n");
    for c in &report.categories {
        out.push_str(&format!(
            "| P{} | {} | {} | {} |\n",
            c.tier,
            c.display_name,
            c.count,
            c.estimated_effort.as_str()
        ));
    }

    out.push_str("\n## Recommended order\n\n");
    for (i, c) in report.recommended_order.iter().enumerate() {
        out.push_str(&format!("{}. {} (`{}`)\n", i + 1, c.display_name(), c.wire_name()));
    }

    for c in &report.categories {
        out.push_str(&format!("\n### P{} {}\n\n{}\n\n", c.tier, c.display_name, c.description));
        for (rule, n) in &c.rules {
            out.push_str(&format!("- `{rule}`: {n}\n"));
        }
    }
    out
}

/// The fixed category table, with counts when a report exists.
pub fn render_categories_md(counts: Option<&BTreeMap<String, u64>>) -> String {
    let mut out = String::new();
    out.push_str("| Tier | Wire name | Category | Effort | Violations |\n|---|---|---|---|---|\n");
    for c in Category::ALL {
        let n = counts
            .and_then(|m| m.get(c.wire_name()))
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| P{} | {} | {} | {} | {} |\n",
            c.tier(),
            c.wire_name(),
            c.display_name(),
            c.effort().as_str(),
            n
        ));
    }
    out
}

fn aux_line(a: &AuxiliaryChange) -> String {
    match a {
        AuxiliaryChange::AddImport { name } => format!("add import `{name}`"),
        AuxiliaryChange::RemoveImport { name } => format!("remove import `{name}`"),
        AuxiliaryChange::RelatedFile { path } => format!("related file `{path}`"),
    }
}

fn location(entry: &FixEntry) -> String {
    match entry.fix.line_number {
        Some(l) => format!("{}:{}", entry.fix.file_path, l),
        None => entry.fix.file_path.clone(),
    }
}

/// Unified diffs and explanations for the given fixes.
pub fn render_preview_md(session: &SessionRecord, entries: &[&FixEntry]) -> String {
    let mut out = String::new();
    out.push_str("# Fix preview\n\n");
    out.push_str(&format!("- Session: `{}`\n", session.session_id));
    out.push_str(&format!("- Selector: `{}`\n", session.selector));
    out.push_str(&format!("- Fixes: {}\n\n", entries.len()));

    if entries.is_empty() {
        out.push_str("_No fixes to preview._\n");
        return out;
    }

    for e in entries {
        let f = &e.fix;
        let (added, removed) = line_stats(&f.original_content, &f.proposed_content);
        out.push_str(&format!("## {}\n\n", f.fix_id));
        out.push_str(&format!("- Rule: `{}` ({})\n", f.rule_id, f.category.display_name()));
        out.push_str(&format!("- Location: `{}`\n", location(e)));
        out.push_str(&format!("- Source: {}\n", f.origin.as_str()));
        out.push_str(&format!("- Status: `{}`\n", e.status));
        out.push_str(&format!("- Review: `{}`\n", e.decision.as_str()));
        out.push_str(&format!("- Changes: +{added} -{removed}\n"));
        if !f.auxiliary.is_empty() {
            out.push_str("- Related changes:\n");
            for a in &f.auxiliary {
                out.push_str(&format!("  - {}\n", aux_line(a)));
            }
        }
        out.push_str(&format!("\n{}\n\n", f.explanation));
        let diff = render_diff(&f.file_path, &f.original_content, &f.proposed_content);
        if diff.is_empty() {
            out.push_str("_No content change._\n\n");
        } else {
            out.push_str("```diff\n");
            out.push_str(&diff);
            out.push_str("```\n\n");
        }
    }
    out
}

pub fn render_review_report_md(session: &SessionRecord) -> String {
    let mut out = String::new();
    out.push_str("# Fix review report\n\n");
    out.push_str(&format!("- Session: `{}`\n", session.session_id));
    out.push_str(&format!("- Project: `{}`\n", session.project));
    out.push_str(&format!("- Selector: `{}`\n", session.selector));
    out.push_str(&format!(
        "- Baseline: {} violation(s) at {}\n\n",
        session.baseline.total,
        session.baseline.scanned_at.to_rfc3339()
    ));

    let s = &session.summary;
    out.push_str("## Status\n\n");
    out.push_str(&format!(
        "- Total: {}\n- Proposed: {}\n- Previewed: {}\n- Applied: {}\n- Committed: {}\n- Rolled back: {}\n\n",
        s.total, s.proposed, s.previewed, s.applied, s.committed, s.rolled_back
    ));
    let r = &session.review;
    out.push_str(&format!(
        "Review: {} approved, {} rejected, {} skipped, {} pending\n\n",
        r.approved, r.rejected, r.skipped, r.pending
    ));

    out.push_str("## Fixes\n\n");
    if session.fixes.is_empty() {
        out.push_str("_No fixes in this session._\n");
    } else {
        out.push_str("| Fix | Rule | Location | Status | Review |\n|---|---|---|---|---|\n");
        for e in &session.fixes {
            out.push_str(&format!(
                "| {} | `{}` | `{}` | {} | {} |\n",
                e.fix.fix_id,
                e.fix.rule_id,
                location(e),
                e.status,
                e.decision.as_str()
            ));
        }
        for e in session.fixes.iter().filter(|e| !e.comments.is_empty() || e.last_error.is_some()) {
            out.push_str(&format!("\n### {}\n\n", e.fix.fix_id));
            if let Some(err) = &e.last_error {
                out.push_str(&format!("- Last error (`{}`): {}\n", err.code, err.message));
            }
            for c in &e.comments {
                out.push_str(&format!("- {}: {}\n", c.timestamp.to_rfc3339(), c.comment));
            }
        }
    }

    if !session.checkpoints.is_empty() {
        out.push_str("\n## Checkpoints\n\n");
        for c in &session.checkpoints {
            out.push_str(&format!(
                "- `{}` rule `{}`: {} fix(es)",
                c.id,
                c.rule_id,
                c.fix_ids.len()
            ));
            if let Some(r) = &c.commit_ref {
                out.push_str(&format!(", commit `{r}`"));
            }
            if let Some(of) = &c.reverts {
                out.push_str(&format!(", reverts `{of}`"));
            }
            if c.reverted {
                out.push_str(" (reverted)");
            }
            out.push('\n');
        }
    }
    out
}

fn phase_md(out: &mut String, title: &str, run: Option<&PhaseRun>) {
    let Some(run) = run else { return };
    out.push_str(&format!("\n### {title} output\n\n"));
    out.push_str(&format!("- Command: `{}`\n", run.command.join(" ")));
    out.push_str(&format!(
        "- Exit code: {}\n- Duration: {} ms\n",
        run.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        run.duration_ms
    ));
    if run.timed_out {
        out.push_str("- Timed out\n");
    }
    if !run.output_tail.is_empty() {
        out.push_str("\n```text\n");
        out.push_str(&run.output_tail);
        if !run.output_tail.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("```\n");
    }
}

pub fn render_validation_md(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str("# Validation report\n\n");
    out.push_str(&format!(
        "**Recommendation: {}** (confidence {} / 100, {})\n\n",
        report.recommendation,
        report.confidence_score,
        report.confidence.as_str()
    ));
    out.push_str(&format!("- Project: `{}`\n", report.project));
    out.push_str(&format!(
        "- Build system: {}\n",
        report.build_system.map(|b| b.as_str()).unwrap_or("none detected")
    ));
    out.push_str(&format!("- Build: {}\n", report.build_status.as_str()));
    let t = &report.test_status;
    match (t.passed, t.failed) {
        (Some(p), Some(f)) => out.push_str(&format!(
            "- Tests: {} ({p} passed, {f} failed)\n",
            t.state.as_str()
        )),
        _ => out.push_str(&format!("- Tests: {}\n", t.state.as_str())),
    }

    let d = &report.delta;
    out.push_str("\n## Violations\n\n");
    out.push_str(&format!("- Baseline: {}\n", report.baseline.as_str()));
    if let Some(scope) = &report.scope {
        out.push_str(&format!("- Scope: `{scope}`\n"));
    }
    out.push_str(&format!(
        "- Before: {}\n- After: {}\n- Fixed: {}\n- New: {}\n",
        d.before, d.after, d.fixed, d.new
    ));
    if !d.missing_engines.is_empty() {
        let names: Vec<&str> = d.missing_engines.iter().map(|e| e.as_str()).collect();
        out.push_str(&format!("- Not compared (missing from rescan): {}\n", names.join(", ")));
    }
    let changed: Vec<_> = d.by_rule.iter().filter(|(_, c)| c.before != c.after).collect();
    if !changed.is_empty() {
        out.push_str("\n| Rule | Before | After |\n|---|---|---|\n");
        for (rule, c) in changed {
            out.push_str(&format!("| `{rule}` | {} | {} |\n", c.before, c.after));
        }
    }

    out.push_str("\n## Next steps\n\n");
    for s in &report.next_steps {
        out.push_str(&format!("- {s}\n"));
    }

    phase_md(&mut out, "Build", report.build_run.as_ref());
    phase_md(&mut out, "Test", report.test_run.as_ref());
    out
}
