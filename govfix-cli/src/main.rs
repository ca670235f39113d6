mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use config::{CliOverrides, ConfigMerger};
use govfix_core::adapters::FsWritePort;
use govfix_core::artifacts::read_report;
use govfix_core::pipeline::{
    ValidateOptions, build_model, preview_artifact, run_propose, run_scan, run_validate,
};
use govfix_core::session::Abandonment;
use govfix_core::{CoreError, FixApplier, FixProposalEngine, FixSession, RunContext, ScanOrchestrator};
use govfix_render::render_categories_md;
use govfix_types::fix::FixOutcome;
use govfix_types::session::Selector;
use govfix_types::violation::EngineId;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "govfix",
    version,
    about = "Multi-engine governance scanner with staged fixes, rollback and validation."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Project root (default: current directory).
    #[arg(long, global = true, default_value = ".")]
    project: Utf8PathBuf,

    /// Artifact directory (default: <project>/build/governance).
    #[arg(long, global = true)]
    out_dir: Option<Utf8PathBuf>,

    /// Specification document for the schema linter (default: discovered).
    #[arg(long, global = true)]
    spec: Option<Utf8PathBuf>,

    /// Semantic model endpoint (Ollama-compatible).
    #[arg(long, global = true, env = "GOVFIX_MODEL_ENDPOINT")]
    model_endpoint: Option<String>,

    /// Create a git commit per checkpoint.
    #[arg(long, global = true, default_value_t = false)]
    git_commits: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every detection engine and write the governance report.
    Scan(ScanArgs),
    /// Propose fixes for a category, rule id or `all` and open a fix session.
    ProposeFixes(SelectorArg),
    /// Show the diff for one fix, or for every fix not yet applied.
    Preview(OptionalFix),
    /// Apply the session's fixes matching a selector.
    ApplyFixes(SelectorArg),
    /// Build, test, rescan and score the applied fixes.
    Validate(ValidateArgs),
    /// Checkpoint applied fixes, one per rule id.
    Commit(OptionalSelector),
    /// Roll back one uncommitted fix, or every one.
    Rollback(OptionalFix),
    /// Explicitly reverse a committed checkpoint.
    RevertCheckpoint(CheckpointArg),
    /// Release the session lock, leaving files as they are.
    Abandon(AbandonArgs),
    /// Record review decisions.
    #[command(subcommand)]
    Review(ReviewCommand),
    /// Show the category priority table.
    Categories,
}

#[derive(Debug, Args)]
struct ScanArgs {
    /// Only run these engines (repeatable).
    #[arg(long = "engine", value_parser = parse_engine)]
    engines: Vec<EngineId>,
}

#[derive(Debug, Args)]
struct SelectorArg {
    /// Category (wire name, kebab name, display name or P<n>), rule id, or `all`.
    selector: String,
}

#[derive(Debug, Args)]
struct OptionalSelector {
    /// Category, rule id, or `all` (default: all).
    selector: Option<String>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Count only violations of this category or rule id (default: all).
    selector: Option<String>,

    /// Compare against governance-report.json instead of the session's baseline.
    #[arg(long)]
    from_report: bool,
}

#[derive(Debug, Args)]
struct AbandonArgs {
    /// Clear the lock even if the process that took it is still running.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct OptionalFix {
    fix_id: Option<String>,
}

#[derive(Debug, Args)]
struct CheckpointArg {
    checkpoint_id: String,
}

#[derive(Debug, Args)]
struct DecisionArgs {
    fix_id: String,
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ReviewCommand {
    Approve(DecisionArgs),
    Reject(DecisionArgs),
    Skip(DecisionArgs),
    /// Add a comment without deciding.
    Comment { fix_id: String, text: String },
    /// Approve every pending fix.
    ApproveAll,
    /// Approve pending fixes that change content.
    ApproveSafe,
    /// Reject every pending fix.
    RejectAll,
}

fn parse_engine(s: &str) -> Result<EngineId, String> {
    EngineId::parse(s).ok_or_else(|| {
        let known: Vec<&str> = EngineId::ALL.iter().map(|e| e.as_str()).collect();
        format!("unknown engine '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_selector(s: &str) -> Result<Selector, CoreError> {
    Selector::parse(s).ok_or_else(|| CoreError::InvalidSelector(s.to_string()))
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(e) => {
            let code = e.downcast_ref::<CoreError>().map(CoreError::exit_code).unwrap_or(1);
            error!("{:?}", e);
            eprintln!("error: {e:#}");
            ExitCode::from(code)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(run(cli))
}

fn context(global: &GlobalArgs) -> anyhow::Result<RunContext> {
    let file_config = config::load_or_default(&global.project).context("load govfix.toml config")?;
    let cli = CliOverrides {
        out_dir: global.out_dir.clone(),
        spec: global.spec.clone(),
        model_endpoint: global.model_endpoint.clone(),
        git_commits: global.git_commits,
    };
    let settings = ConfigMerger::new(file_config).merge(global.project.clone(), &cli, |var| {
        std::env::var(var).ok()
    })?;
    Ok(RunContext::new(settings))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let ctx = context(&cli.global)?;
    match cli.cmd {
        Command::Scan(args) => cmd_scan(&ctx, args).await,
        Command::ProposeFixes(args) => cmd_propose(&ctx, args).await,
        Command::Preview(args) => cmd_preview(&ctx, args),
        Command::ApplyFixes(args) => cmd_apply(&ctx, args).await,
        Command::Validate(args) => cmd_validate(&ctx, args).await,
        Command::Commit(args) => cmd_commit(&ctx, args),
        Command::Rollback(args) => cmd_rollback(&ctx, args).await,
        Command::RevertCheckpoint(args) => cmd_revert(&ctx, args).await,
        Command::Abandon(args) => cmd_abandon(&ctx, args),
        Command::Review(cmd) => cmd_review(&ctx, cmd),
        Command::Categories => cmd_categories(&ctx),
    }
}

fn orchestrator(ctx: &RunContext) -> anyhow::Result<ScanOrchestrator> {
    Ok(ScanOrchestrator::from_settings(&ctx.settings, build_model(&ctx.settings)?))
}

async fn cmd_scan(ctx: &RunContext, args: ScanArgs) -> anyhow::Result<ExitCode> {
    let orch = orchestrator(ctx)?;
    let filter = (!args.engines.is_empty()).then_some(args.engines.as_slice());
    let outcome = run_scan(ctx, &orch, filter, &FsWritePort).await?;

    let report = &outcome.report;
    println!("{} violation(s)", report.total);
    for c in &report.categories {
        println!("  P{:<2} {:<20} {}", c.tier, c.display_name, c.count);
    }
    for s in &report.engines_skipped {
        println!("skipped {}: {}", s.engine, s.reason.as_str());
    }
    info!("wrote scan artifacts to {}", ctx.out_dir());
    Ok(if outcome.blocking { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

async fn cmd_propose(ctx: &RunContext, args: SelectorArg) -> anyhow::Result<ExitCode> {
    let selector = parse_selector(&args.selector)?;
    let proposer = FixProposalEngine::new(build_model(&ctx.settings)?)
        .with_request_timeout(ctx.settings.model.timeout);
    let outcome = run_propose(ctx, &proposer, selector, &FsWritePort).await?;

    for f in &outcome.failures {
        println!("no fix for {} in {}: {}", f.rule_id, f.file, f.reason);
    }
    let Some(session) = outcome.session else {
        println!("No fixes proposed.");
        return Ok(if outcome.failures.is_empty() { ExitCode::SUCCESS } else { ExitCode::from(1) });
    };
    for e in &session.record().fixes {
        println!("{}  {}  {}", e.fix.fix_id, e.fix.rule_id, e.fix.file_path);
    }
    println!(
        "Session {} opened with {} fix(es); preview in {}",
        session.id(),
        session.record().fixes.len(),
        session.dir()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_preview(ctx: &RunContext, args: OptionalFix) -> anyhow::Result<ExitCode> {
    let mut session = FixSession::resume(&ctx.settings)?;
    let applier = FixApplier::from_settings(&ctx.settings);
    let ids = match args.fix_id {
        Some(id) => vec![id],
        None => applier.preview_pending(&mut session)?,
    };
    for id in &ids {
        print!("{}", applier.preview(&mut session, id)?);
    }
    preview_artifact(&session, &FsWritePort)?;
    Ok(ExitCode::SUCCESS)
}

fn print_outcomes(outcomes: &[FixOutcome]) -> bool {
    let mut all_ok = true;
    for o in outcomes {
        match &o.error {
            None => println!("{}  {}", o.fix_id, o.status),
            Some(e) => {
                all_ok = false;
                println!("{}  {}  {}: {}", o.fix_id, o.status, e.code, e.message);
            }
        }
    }
    all_ok
}

async fn cmd_apply(ctx: &RunContext, args: SelectorArg) -> anyhow::Result<ExitCode> {
    let selector = parse_selector(&args.selector)?;
    let mut session = FixSession::resume(&ctx.settings)?;
    let applier = FixApplier::from_settings(&ctx.settings);
    let outcomes = applier.apply_all(&mut session, &selector).await?;
    if outcomes.is_empty() {
        println!("No fixes matched `{selector}`.");
    }
    Ok(if print_outcomes(&outcomes) { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

async fn cmd_validate(ctx: &RunContext, args: ValidateArgs) -> anyhow::Result<ExitCode> {
    let options = ValidateOptions {
        scope: args.selector.as_deref().map(parse_selector).transpose()?,
        from_report: args.from_report,
    };
    let orch = orchestrator(ctx)?;
    // Dropping the pipeline on Ctrl-C kills the running build or test.
    let report = tokio::select! {
        r = run_validate(ctx, &orch, &options, &FsWritePort) => r?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("validation cancelled"),
    };

    if let Some(scope) = &report.scope {
        println!("scope: {scope}");
    }
    println!("baseline: {}", report.baseline.as_str());
    println!("build: {}", report.build_status.as_str());
    println!("tests: {}", report.test_status.state.as_str());
    println!(
        "violations: {} -> {} (fixed {}, new {})",
        report.delta.before, report.delta.after, report.delta.fixed, report.delta.new
    );
    println!(
        "confidence: {} ({}) -> {}",
        report.confidence_score,
        report.confidence.as_str(),
        report.recommendation
    );
    for step in &report.next_steps {
        println!("  - {step}");
    }
    Ok(if report.recommendation.is_committable() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn cmd_commit(ctx: &RunContext, args: OptionalSelector) -> anyhow::Result<ExitCode> {
    let selector = match args.selector {
        Some(s) => parse_selector(&s)?,
        None => Selector::All,
    };
    let mut session = FixSession::resume(&ctx.settings)?;
    let applier = FixApplier::from_settings(&ctx.settings);
    let checkpoints = applier.commit(&mut session, &selector)?;
    if checkpoints.is_empty() {
        println!("Nothing applied to commit.");
    }
    for cp in &checkpoints {
        println!(
            "{}  {}  {} fix(es){}",
            cp.id,
            cp.rule_id,
            cp.fix_ids.len(),
            cp.commit_ref.as_deref().map(|r| format!("  {r}")).unwrap_or_default()
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_rollback(ctx: &RunContext, args: OptionalFix) -> anyhow::Result<ExitCode> {
    let mut session = FixSession::resume(&ctx.settings)?;
    let applier = FixApplier::from_settings(&ctx.settings);
    let outcomes = match args.fix_id {
        Some(id) => vec![applier.rollback(&mut session, &id).await?],
        None => applier.rollback_all(&mut session).await?,
    };
    Ok(if print_outcomes(&outcomes) { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

async fn cmd_revert(ctx: &RunContext, args: CheckpointArg) -> anyhow::Result<ExitCode> {
    let mut session = FixSession::reopen(&ctx.settings)?;
    let applier = FixApplier::from_settings(&ctx.settings);
    let revert = applier.revert_checkpoint(&mut session, &args.checkpoint_id).await?;
    println!("{} reverts {}", revert.id, args.checkpoint_id);
    Ok(ExitCode::SUCCESS)
}

fn cmd_abandon(ctx: &RunContext, args: AbandonArgs) -> anyhow::Result<ExitCode> {
    match FixSession::abandon_project(&ctx.settings, args.force)? {
        Abandonment::Session { session_id, applied } => {
            for id in &applied {
                println!("warning: {id} is still applied on disk");
            }
            println!("Session {session_id} abandoned.");
        }
        Abandonment::OrphanedLock { holder } => {
            println!("Cleared stale session lock left by session {holder}.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_review(ctx: &RunContext, cmd: ReviewCommand) -> anyhow::Result<ExitCode> {
    let mut session = FixSession::resume(&ctx.settings)?;
    match cmd {
        ReviewCommand::Approve(a) => session.approve(&a.fix_id, a.comment.as_deref())?,
        ReviewCommand::Reject(a) => session.reject(&a.fix_id, a.comment.as_deref())?,
        ReviewCommand::Skip(a) => session.skip(&a.fix_id, a.comment.as_deref())?,
        ReviewCommand::Comment { fix_id, text } => session.comment(&fix_id, &text)?,
        ReviewCommand::ApproveAll => println!("approved {}", session.approve_all()?),
        ReviewCommand::ApproveSafe => println!("approved {}", session.approve_safe_only()?),
        ReviewCommand::RejectAll => println!("rejected {}", session.reject_all()?),
    }
    let r = &session.record().review;
    debug!(?r, "review summary");
    println!(
        "total {}  approved {}  rejected {}  pending {}  skipped {}",
        r.total, r.approved, r.rejected, r.pending, r.skipped
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_categories(ctx: &RunContext) -> anyhow::Result<ExitCode> {
    let report = read_report(&ctx.out_dir())?;
    print!("{}", render_categories_md(report.as_ref().map(|r| &r.by_category)));
    Ok(ExitCode::SUCCESS)
}
