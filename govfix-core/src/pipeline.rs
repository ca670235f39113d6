//! End-to-end entry points, extracted from the CLI.
//!
//! Artifact writes go through [`WritePort`]; the session owns its own state
//! files under `fix-session/`.

use crate::artifacts::{read_report, write_preview, write_scan_artifacts, write_validation_artifacts};
use crate::context::RunContext;
use crate::error::{CoreError, CoreResult};
use crate::orchestrator::ScanOrchestrator;
use crate::ports::WritePort;
use crate::proposer::FixProposalEngine;
use crate::session::{FixSession, SessionLock};
use crate::settings::Settings;
use crate::validation::ValidationPipeline;
use govfix_engines::{HttpModel, ModelError, SemanticModel};
use govfix_types::fix::{FixStatus, ProposalFailure};
use govfix_types::report::GovernanceReport;
use govfix_types::scan::ScanResult;
use govfix_types::session::{FixEntry, Selector};
use govfix_types::validation::{BaselineSource, ValidationReport};
use govfix_types::violation::EngineId;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The HTTP model, when an endpoint is configured.
pub fn build_model(settings: &Settings) -> anyhow::Result<Option<Arc<dyn SemanticModel>>> {
    match HttpModel::new(&settings.model) {
        Ok(m) => Ok(Some(Arc::new(m))),
        Err(ModelError::NotConfigured) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context("configure semantic model")),
    }
}

/// Outcome of `run_scan`.
#[derive(Debug)]
pub struct ScanOutcome {
    pub scan: ScanResult,
    pub report: GovernanceReport,
    /// Any critical or warning violation was found.
    pub blocking: bool,
}

/// Scan, then write the report artifacts.
pub async fn run_scan(
    ctx: &RunContext,
    orchestrator: &ScanOrchestrator,
    filter: Option<&[EngineId]>,
    writer: &dyn WritePort,
) -> CoreResult<ScanOutcome> {
    let scan = orchestrator.scan(ctx, filter).await;
    let report = write_scan_artifacts(&scan, &ctx.out_dir(), writer)?;
    let blocking = scan.violations.iter().any(|v| v.severity.is_blocking());
    Ok(ScanOutcome {
        scan,
        report,
        blocking,
    })
}

/// The baseline scan persisted by the last `run_scan`.
pub fn load_baseline(ctx: &RunContext) -> CoreResult<ScanResult> {
    match read_report(&ctx.out_dir())? {
        Some(report) => Ok(report.to_scan()),
        None => Err(CoreError::NoBaseline),
    }
}

/// Outcome of `run_propose`.
#[derive(Debug)]
pub struct ProposeOutcome {
    /// `None` when nothing could be proposed; no session is left open then.
    pub session: Option<FixSession>,
    pub failures: Vec<ProposalFailure>,
}

/// Take the session lock, propose fixes against the baseline and open a session.
///
/// The lock is taken before any proposal work, so a concurrent session is
/// rejected up front.
pub async fn run_propose(
    ctx: &RunContext,
    proposer: &FixProposalEngine,
    selector: Selector,
    writer: &dyn WritePort,
) -> CoreResult<ProposeOutcome> {
    let baseline = load_baseline(ctx)?;
    let lock = SessionLock::acquire(&ctx.settings.lock_path(), Uuid::new_v4())?;

    let batch = match proposer.propose(ctx, &ctx.repo(), &baseline, &selector).await {
        Ok(b) => b,
        Err(e) => {
            if let Err(release) = lock.release() {
                warn!("release session lock: {release:#}");
            }
            return Err(e);
        }
    };
    if batch.fixes.is_empty() {
        info!(failures = batch.failures.len(), "no fixes proposed");
        lock.release()?;
        return Ok(ProposeOutcome {
            session: None,
            failures: batch.failures,
        });
    }

    let session = FixSession::start(&ctx.settings, lock, selector, &baseline, batch.fixes)?;
    preview_artifact(&session, writer)?;
    Ok(ProposeOutcome {
        session: Some(session),
        failures: batch.failures,
    })
}

/// Rewrite `fix-preview.md` with every fix still pending apply.
pub fn preview_artifact(session: &FixSession, writer: &dyn WritePort) -> CoreResult<()> {
    let entries: Vec<&FixEntry> = session
        .record()
        .fixes
        .iter()
        .filter(|e| matches!(e.status, FixStatus::Proposed | FixStatus::Previewed))
        .collect();
    write_preview(session.record(), &entries, session.dir(), writer)?;
    Ok(())
}

/// The "before" side of a validation.
///
/// The snapshot the last fix session was proposed against wins over
/// `governance-report.json`, which any later `scan` overwrites. `from_report`
/// forces the report.
pub fn load_validation_baseline(
    ctx: &RunContext,
    from_report: bool,
) -> CoreResult<(ScanResult, BaselineSource)> {
    if !from_report {
        if let Some(snapshot) = FixSession::load_baseline(&ctx.settings)? {
            return Ok((snapshot, BaselineSource::Session));
        }
    }
    Ok((load_baseline(ctx)?, BaselineSource::Report))
}

/// What `run_validate` compares.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Count only violations this selector matches, on both sides.
    pub scope: Option<Selector>,
    /// Compare against `governance-report.json` even when a session snapshot exists.
    pub from_report: bool,
}

/// Build, test and rescan, then write the validation report.
pub async fn run_validate(
    ctx: &RunContext,
    orchestrator: &ScanOrchestrator,
    options: &ValidateOptions,
    writer: &dyn WritePort,
) -> CoreResult<ValidationReport> {
    let (baseline, source) = load_validation_baseline(ctx, options.from_report)?;
    info!(
        baseline = source.as_str(),
        scope = ?options.scope.as_ref().map(ToString::to_string),
        "validating"
    );
    let report = ValidationPipeline::new(orchestrator)
        .validate(ctx, &baseline, source, options.scope.as_ref())
        .await;
    write_validation_artifacts(&report, &ctx.out_dir(), writer)?;
    Ok(report)
}
