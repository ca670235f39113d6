//! Error types for govfix-edit.
//!
//! A stale or missing file is a per-fix rejection the caller records and moves
//! past. I/O and verification failures leave the original content in place.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    /// Live content no longer matches the fingerprint the edit was based on.
    #[error("{path} changed since the fix was proposed (expected sha256 {expected}, found {actual})")]
    Stale {
        path: Utf8PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{path} does not exist")]
    Missing { path: Utf8PathBuf },

    #[error("write {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content read back after the write did not match; the original was restored.
    #[error("{path} did not verify after write; original content restored")]
    Verify { path: Utf8PathBuf },
}

impl EditError {
    pub fn is_stale(&self) -> bool {
        matches!(self, EditError::Stale { .. } | EditError::Missing { .. })
    }

    /// Stable code recorded in fix outcomes.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EditError::Stale { .. } => "stale",
            EditError::Missing { .. } => "missing",
            EditError::Io { .. } => "io",
            EditError::Verify { .. } => "verify",
        }
    }
}

pub type EditResult<T> = Result<T, EditError>;

#[cfg(test)]
mod tests {
    use super::EditError;

    #[test]
    fn stale_and_missing_are_rejections() {
        let stale = EditError::Stale {
            path: "a.yaml".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(stale.is_stale());
        assert_eq!(stale.reason_code(), "stale");
        assert!(stale.to_string().contains("changed since the fix was proposed"));

        let missing = EditError::Missing { path: "b".into() };
        assert!(missing.is_stale());
        assert_eq!(missing.reason_code(), "missing");
    }

    #[test]
    fn io_is_not_stale() {
        let err = EditError::Io {
            path: "c".into(),
            source: std::io::Error::other("disk full"),
        };
        assert!(!err.is_stale());
        assert_eq!(err.reason_code(), "io");
        assert!(err.to_string().contains("disk full"));
    }
}
