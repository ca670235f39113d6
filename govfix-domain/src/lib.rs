//! Domain logic: categorize violations, pick fix strategies, score validation runs.
//!
//! Everything here is pure and synchronous. Engines, subprocesses and disk
//! writes live in `govfix-engines`, `govfix-edit` and `govfix-core`.

pub mod categories;
mod ports;
pub mod scoring;
pub mod strategies;
pub mod violations;

pub use categories::{CategoryTable, category_for};
pub use ports::{FsRepoView, RepoView};
pub use scoring::{ConfidenceScorer, Score, ScoreInputs};
pub use strategies::{FixStrategy, StrategyEdit, builtin_strategies, strategy_for};

/// File value for findings no engine could place in the project.
pub const UNKNOWN_LOCATION: &str = "Unknown location";
