use crate::violation::{Category, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A side change a fix depends on. Informational: `proposed_content`
/// already includes any import edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuxiliaryChange {
    AddImport { name: String },
    RemoveImport { name: String },
    RelatedFile { path: String },
}

/// Which collaborator produced the replacement content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOrigin {
    Strategy,
    Model,
}

impl FixOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixOrigin::Strategy => "strategy",
            FixOrigin::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedFix {
    pub fix_id: String,
    pub rule_id: String,
    pub category: Category,
    /// Most severe violation the fix addresses.
    #[serde(default = "warning")]
    pub severity: Severity,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub original_content: String,
    pub original_sha256: String,
    pub proposed_content: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary: Vec<AuxiliaryChange>,
    pub origin: FixOrigin,
    /// Number of violations this fix addresses.
    #[serde(default = "one")]
    pub violations: u32,
}

fn one() -> u32 {
    1
}

fn warning() -> Severity {
    Severity::Warning
}

impl ProposedFix {
    pub fn changes_content(&self) -> bool {
        self.original_content != self.proposed_content
    }
}

/// A violation group the proposal engine could not turn into a fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalFailure {
    pub rule_id: String,
    pub file: String,
    pub reason: String,
}

/// Result of one `propose` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalBatch {
    #[serde(default)]
    pub fixes: Vec<ProposedFix>,
    #[serde(default)]
    pub failures: Vec<ProposalFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixStatus {
    Proposed,
    Previewed,
    Applied,
    Committed,
    RolledBack,
}

impl FixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixStatus::Proposed => "PROPOSED",
            FixStatus::Previewed => "PREVIEWED",
            FixStatus::Applied => "APPLIED",
            FixStatus::Committed => "COMMITTED",
            FixStatus::RolledBack => "ROLLED_BACK",
        }
    }

    /// Committed and rolled-back fixes take no further transitions
    /// (except an explicit checkpoint reversal).
    pub fn is_terminal(&self) -> bool {
        matches!(self, FixStatus::Committed | FixStatus::RolledBack)
    }
}

impl fmt::Display for FixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable failure attached to a per-fix outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub code: String,
    pub message: String,
}

/// Result of one fix inside a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOutcome {
    pub fix_id: String,
    pub status: FixStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl FixOutcome {
    pub fn ok(fix_id: impl Into<String>, status: FixStatus) -> Self {
        Self {
            fix_id: fix_id.into(),
            status,
            error: None,
        }
    }

    pub fn failed(
        fix_id: impl Into<String>,
        status: FixStatus,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            fix_id: fix_id.into(),
            status,
            error: Some(OutcomeError {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
