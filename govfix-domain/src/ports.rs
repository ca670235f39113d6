use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;

/// Read-only project access.
///
/// Proposal and file resolution go through this so they never hold a write
/// handle on the project.
pub trait RepoView: Send + Sync {
    fn root(&self) -> &Utf8Path;

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String>;

    fn exists(&self, rel: &Utf8Path) -> bool;

    /// Project-relative path of the first file named `name` under `dir`, in
    /// sorted traversal order.
    fn find_file(&self, dir: &Utf8Path, name: &str) -> Option<Utf8PathBuf>;
}

/// File-system backed `RepoView`.
#[derive(Debug, Clone)]
pub struct FsRepoView {
    root: Utf8PathBuf,
}

impl FsRepoView {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn abs(&self, rel: &Utf8Path) -> Utf8PathBuf {
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.root.join(rel)
        }
    }
}

impl RepoView for FsRepoView {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String> {
        let abs = self.abs(rel);
        fs::read_to_string(&abs).with_context(|| format!("read {}", abs))
    }

    fn exists(&self, rel: &Utf8Path) -> bool {
        self.abs(rel).exists()
    }

    fn find_file(&self, dir: &Utf8Path, name: &str) -> Option<Utf8PathBuf> {
        let start = self.abs(dir);
        let found = find_in(&start, name, 0)?;
        match found.strip_prefix(&self.root) {
            Ok(rel) => Some(rel.to_path_buf()),
            Err(_) => Some(found),
        }
    }
}

const MAX_DEPTH: usize = 32;

fn find_in(dir: &Utf8Path, name: &str, depth: usize) -> Option<Utf8PathBuf> {
    if depth > MAX_DEPTH || !dir.is_dir() {
        return None;
    }
    let mut entries: Vec<Utf8PathBuf> = dir
        .read_dir_utf8()
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .collect();
    entries.sort();

    for path in &entries {
        if path.is_file() && path.file_name() == Some(name) {
            return Some(path.clone());
        }
    }
    for path in &entries {
        if path.is_dir()
            && let Some(found) = find_in(path, name, depth + 1)
        {
            return Some(found);
        }
    }
    None
}
