//! Port traits abstracting artifact writes and checkpoints away from the pipelines.

use camino::Utf8Path;

/// File-system write operations for artifacts.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
    /// Remove `path`; a missing file is not an error.
    fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// What one checkpoint finalizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRequest<'a> {
    pub rule_id: &'a str,
    /// Subject line followed by a body.
    pub message: String,
    /// Project-relative files touched by the checkpoint.
    pub files: &'a [String],
}

/// Finalizes applied fixes, one call per rule id.
pub trait Checkpointer: Send + Sync {
    /// Returns the commit ref, when the implementation creates one.
    fn checkpoint(
        &self,
        repo_root: &Utf8Path,
        request: &CheckpointRequest<'_>,
    ) -> anyhow::Result<Option<String>>;
}
