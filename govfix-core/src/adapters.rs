//! Default port implementations.

use crate::ports::{CheckpointRequest, Checkpointer, WritePort};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Mutex;
use tracing::debug;

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }

    fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path)),
        }
    }
}

/// Collects writes in memory, for embedding and testing.
#[derive(Debug, Default)]
pub struct InMemoryWritePort {
    files: Mutex<BTreeMap<Utf8PathBuf, Vec<u8>>>,
}

impl InMemoryWritePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<Utf8PathBuf> {
        match self.files.lock() {
            Ok(m) => m.keys().cloned().collect(),
            Err(p) => p.into_inner().keys().cloned().collect(),
        }
    }

    pub fn read(&self, path: &Utf8Path) -> Option<String> {
        let map = match self.files.lock() {
            Ok(m) => m,
            Err(p) => p.into_inner(),
        };
        map.get(path).map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl WritePort for InMemoryWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        let mut map = match self.files.lock() {
            Ok(m) => m,
            Err(p) => p.into_inner(),
        };
        map.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn create_dir_all(&self, _path: &Utf8Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn remove_file(&self, path: &Utf8Path) -> anyhow::Result<()> {
        let mut map = match self.files.lock() {
            Ok(m) => m,
            Err(p) => p.into_inner(),
        };
        map.remove(path);
        Ok(())
    }
}

/// Checkpoints that are only recorded in the session.
#[derive(Debug, Clone, Default)]
pub struct RecordCheckpointer;

impl Checkpointer for RecordCheckpointer {
    fn checkpoint(
        &self,
        _repo_root: &Utf8Path,
        request: &CheckpointRequest<'_>,
    ) -> anyhow::Result<Option<String>> {
        debug!(rule = request.rule_id, files = request.files.len(), "recorded checkpoint");
        Ok(None)
    }
}

/// One git commit per checkpoint, via the `git` binary.
#[derive(Debug, Clone, Default)]
pub struct GitCheckpointer;

fn git(repo_root: &Utf8Path, args: &[&str]) -> anyhow::Result<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| format!("run git {}", args.join(" ")))?;
    if !out.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

impl Checkpointer for GitCheckpointer {
    fn checkpoint(
        &self,
        repo_root: &Utf8Path,
        request: &CheckpointRequest<'_>,
    ) -> anyhow::Result<Option<String>> {
        let mut add = vec!["add", "--"];
        add.extend(request.files.iter().map(String::as_str));
        git(repo_root, &add)?;
        // Commit only the checkpoint's files, not whatever else is staged.
        let mut commit = vec!["commit", "-m", request.message.as_str(), "--"];
        commit.extend(request.files.iter().map(String::as_str));
        git(repo_root, &commit)?;
        let sha = git(repo_root, &["rev-parse", "HEAD"])?;
        debug!(rule = request.rule_id, commit = %sha, "created checkpoint commit");
        Ok(Some(sha))
    }
}
