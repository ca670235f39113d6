//! Detection engines.
//!
//! Each engine wraps one external tool or service behind [`EngineAdapter`].
//! `run` does the I/O under a time box; `normalize` maps the tool's output
//! shape into canonical [`Violation`](govfix_types::violation::Violation)s.

mod adapter;
mod discover;
mod error;
pub mod model;
pub mod normalize;
pub mod process;

pub use adapter::{
    ArchitectureConfig, Engine, EngineAdapter, PROJECT_PLACEHOLDER, RawOutput, SchemaLintConfig,
    SemanticEngine, analysis_prompt, document_paths,
};
pub use discover::{discover_spec, resolve_spec};
pub use error::{EngineError, ModelError, ParseError};
pub use model::{HttpModel, ModelConfig, SemanticModel, strip_code_fences};
