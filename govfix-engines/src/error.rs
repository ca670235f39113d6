use govfix_types::scan::SkipReason;
use govfix_types::violation::EngineId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("{engine} unavailable: {detail}")]
    Unavailable { engine: EngineId, detail: String },

    #[error("{engine} timed out after {}s", after.as_secs())]
    Timeout { engine: EngineId, after: Duration },

    #[error("{engine} failed: {detail}")]
    Failed { engine: EngineId, detail: String },
}

impl EngineError {
    pub fn engine(&self) -> EngineId {
        match self {
            EngineError::Unavailable { engine, .. }
            | EngineError::Timeout { engine, .. }
            | EngineError::Failed { engine, .. } => *engine,
        }
    }

    pub fn skip_reason(&self) -> SkipReason {
        match self {
            EngineError::Unavailable { .. } => SkipReason::Unavailable,
            EngineError::Timeout { .. } => SkipReason::Timeout,
            EngineError::Failed { .. } => SkipReason::Failed,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            EngineError::Unavailable { detail, .. } | EngineError::Failed { detail, .. } => {
                detail.clone()
            }
            EngineError::Timeout { after, .. } => format!("no result within {}s", after.as_secs()),
        }
    }
}

/// Engine output that could not be normalized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{engine} output could not be parsed: {detail}")]
pub struct ParseError {
    pub engine: EngineId,
    pub detail: String,
}

impl ParseError {
    pub fn new(engine: EngineId, detail: impl Into<String>) -> Self {
        Self {
            engine,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("semantic model endpoint is not configured")]
    NotConfigured,

    #[error("semantic model unavailable: {0}")]
    Unavailable(String),

    #[error("semantic model returned HTTP {0}")]
    Status(u16),

    #[error("semantic model returned an invalid response: {0}")]
    InvalidResponse(String),
}
