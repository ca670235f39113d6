//! Embeddable core library for govfix.
//!
//! Provides a clap-free, I/O-abstracted entry point suitable for linking
//! into a CI driver or other host process. Every operation takes an explicit
//! [`RunContext`] (settings, category table, tracing span).
//!
//! # Port traits
//!
//! Side effects the pipelines do not own are abstracted in [`ports`]:
//! - [`WritePort`](ports::WritePort): write report artifacts
//! - [`Checkpointer`](ports::Checkpointer): finalize a rule's applied fixes
//!
//! The [`adapters`] module provides filesystem and git implementations.
//!
//! # Entry points
//!
//! - [`run_scan`](pipeline::run_scan): scan every engine and write the report
//! - [`run_propose`](pipeline::run_propose): open a fix session for a selector
//! - [`FixApplier`]: preview, apply, commit, roll back and revert fixes
//! - [`run_validate`](pipeline::run_validate): build, test, rescan and score

pub mod adapters;
pub mod applier;
pub mod artifacts;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod ports;
pub mod proposer;
pub mod session;
pub mod settings;
pub mod validation;

pub use applier::FixApplier;
pub use context::RunContext;
pub use error::{CoreError, CoreResult};
pub use orchestrator::ScanOrchestrator;
pub use proposer::FixProposalEngine;
pub use session::{FixSession, SessionLock};
pub use settings::{Settings, ValidationSettings};
pub use validation::ValidationPipeline;

// Re-export the domain's RepoView so callers don't need govfix-domain directly.
pub use govfix_domain::RepoView;
