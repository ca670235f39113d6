use govfix_types::fix::{FixStatus, ProposalFailure};
use uuid::Uuid;

/// Terminal failures of a core operation.
///
/// Per-engine and per-fix failures never show up here; they are carried as
/// skipped-engine records and per-fix outcomes instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("a fix session is already active for this project (session {holder})")]
    SessionConflict { holder: Uuid },

    #[error("no active fix session; run propose-fixes first")]
    NoActiveSession,

    #[error("no baseline scan found; run scan first")]
    NoBaseline,

    #[error("unknown fix id `{0}`")]
    UnknownFix(String),

    #[error("unknown checkpoint `{0}`")]
    UnknownCheckpoint(String),

    #[error("cannot {op} {fix_id}: fix is {from}")]
    InvalidTransition {
        fix_id: String,
        from: FixStatus,
        op: &'static str,
    },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("semantic model unavailable: {detail}")]
    CollaboratorUnavailable {
        detail: String,
        failures: Vec<ProposalFailure>,
    },

    #[error("cannot revert {checkpoint_id}: {path} changed since it was committed")]
    StaleCheckpoint { checkpoint_id: String, path: String },

    #[error("revert of {checkpoint_id} stopped at {path}: {detail}")]
    RevertFailed {
        checkpoint_id: String,
        path: String,
        detail: String,
    },

    #[error("checkpoint for rule `{rule_id}` failed ({detail}); already committed: {committed_so_far:?}")]
    Checkpoint {
        rule_id: String,
        committed_so_far: Vec<String>,
        detail: String,
    },

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Stable snake_case code recorded in logs and artifacts.
    pub fn reason_code(&self) -> &'static str {
        match self {
            CoreError::SessionConflict { .. } => "session_conflict",
            CoreError::NoActiveSession => "no_active_session",
            CoreError::NoBaseline => "no_baseline",
            CoreError::UnknownFix(_) => "unknown_fix",
            CoreError::UnknownCheckpoint(_) => "unknown_checkpoint",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::InvalidSelector(_) => "invalid_selector",
            CoreError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
            CoreError::StaleCheckpoint { .. } => "stale_checkpoint",
            CoreError::RevertFailed { .. } => "revert_failed",
            CoreError::Checkpoint { .. } => "checkpoint_failed",
            CoreError::Internal(_) => "internal",
        }
    }

    /// 2 for invalid invocations, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            CoreError::SessionConflict { .. }
            | CoreError::NoActiveSession
            | CoreError::NoBaseline
            | CoreError::UnknownFix(_)
            | CoreError::UnknownCheckpoint(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::InvalidSelector(_) => 2,
            CoreError::CollaboratorUnavailable { .. }
            | CoreError::StaleCheckpoint { .. }
            | CoreError::RevertFailed { .. }
            | CoreError::Checkpoint { .. }
            | CoreError::Internal(_) => 1,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_errors_exit_two() {
        assert_eq!(CoreError::NoActiveSession.exit_code(), 2);
        assert_eq!(CoreError::NoBaseline.exit_code(), 2);
        assert_eq!(
            CoreError::SessionConflict { holder: Uuid::nil() }.exit_code(),
            2
        );
        assert_eq!(
            CoreError::InvalidTransition {
                fix_id: "fix-0001-strategy".into(),
                from: FixStatus::Committed,
                op: "apply",
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn pipeline_failures_exit_one() {
        let e = CoreError::CollaboratorUnavailable {
            detail: "connection refused".into(),
            failures: vec![],
        };
        assert_eq!(e.exit_code(), 1);
        assert_eq!(e.reason_code(), "collaborator_unavailable");
        assert_eq!(CoreError::Internal(anyhow::anyhow!("boom")).exit_code(), 1);
    }

    #[test]
    fn transition_message_names_state_and_op() {
        let e = CoreError::InvalidTransition {
            fix_id: "fix-0002-model".into(),
            from: FixStatus::Proposed,
            op: "commit",
        };
        assert_eq!(e.to_string(), "cannot commit fix-0002-model: fix is PROPOSED");
    }
}
