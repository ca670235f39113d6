//! File edit primitives for govfix fix sessions.
//!
//! Responsibilities:
//! - Fingerprint file content (sha256) so stale edits are refused.
//! - Replace file content atomically, restoring the original on failure.
//! - Serialize writes per path.
//! - Render unified diff previews.

mod error;
mod locks;

pub use error::{EditError, EditResult};
pub use locks::FileLocks;

use camino::{Utf8Path, Utf8PathBuf};
use diffy::PatchFormatter;
use fs_err as fs;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn abs_path(repo_root: &Utf8Path, rel: &Utf8Path) -> Utf8PathBuf {
    if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        repo_root.join(rel)
    }
}

/// A completed content replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: Utf8PathBuf,
    pub before_sha256: String,
    pub after_sha256: String,
}

/// Read `rel` and fail unless its sha256 is `expected_sha`.
pub fn check_fresh(repo_root: &Utf8Path, rel: &Utf8Path, expected_sha: &str) -> EditResult<String> {
    let abs = abs_path(repo_root, rel);
    let bytes = match fs::read(&abs) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EditError::Missing {
                path: rel.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(EditError::Io {
                path: rel.to_path_buf(),
                source: e,
            });
        }
    };
    let actual = sha256_hex(&bytes);
    if actual != expected_sha {
        return Err(EditError::Stale {
            path: rel.to_path_buf(),
            expected: expected_sha.to_string(),
            actual,
        });
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Replace the content of `rel` with `new`, provided it currently equals `current`.
///
/// The write goes through a sibling temp file and a rename. If the result does
/// not read back as `new`, `current` is written back and `Verify` is returned.
pub fn replace_content(
    repo_root: &Utf8Path,
    rel: &Utf8Path,
    current: &str,
    new: &str,
) -> EditResult<FileWrite> {
    let before_sha256 = sha256_hex(current.as_bytes());
    check_fresh(repo_root, rel, &before_sha256)?;

    let abs = abs_path(repo_root, rel);
    write_atomic(&abs, new).map_err(|source| EditError::Io {
        path: rel.to_path_buf(),
        source,
    })?;

    let after_sha256 = sha256_hex(new.as_bytes());
    let readback = fs::read(&abs).map(|b| sha256_hex(&b)).ok();
    if readback.as_deref() != Some(after_sha256.as_str()) {
        warn!(path = %rel, "write did not verify; restoring original");
        write_atomic(&abs, current).map_err(|source| EditError::Io {
            path: rel.to_path_buf(),
            source,
        })?;
        return Err(EditError::Verify {
            path: rel.to_path_buf(),
        });
    }

    debug!(path = %rel, before = %before_sha256, after = %after_sha256, "content replaced");
    Ok(FileWrite {
        path: rel.to_path_buf(),
        before_sha256,
        after_sha256,
    })
}

fn temp_sibling(abs: &Utf8Path) -> Utf8PathBuf {
    let name = abs.file_name().unwrap_or("file");
    abs.with_file_name(format!(".{name}.govfix-tmp"))
}

/// Write through a sibling temp file and rename over `abs`.
pub fn write_atomic(abs: &Utf8Path, contents: &str) -> std::io::Result<()> {
    let tmp = temp_sibling(abs);
    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, abs) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// `(lines added, lines removed)` between two versions.
pub fn line_stats(old: &str, new: &str) -> (usize, usize) {
    let patch = diffy::create_patch(old, new);
    let mut added = 0;
    let mut removed = 0;
    for hunk in patch.hunks() {
        for line in hunk.lines() {
            match line {
                diffy::Line::Insert(_) => added += 1,
                diffy::Line::Delete(_) => removed += 1,
                diffy::Line::Context(_) => {}
            }
        }
    }
    (added, removed)
}

/// Unified diff of one file, with git-style headers. Empty when unchanged.
pub fn render_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    let mut out = String::new();
    out.push_str(&format!("diff --git a/{0} b/{0}\n", path));
    out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", path));

    let formatter = PatchFormatter::new();
    let patch = diffy::create_patch(old, new);
    let body = formatter.fmt_patch(&patch).to_string();
    // diffy repeats the ---/+++ header; keep only the hunks.
    let hunks = body.find("@@").map(|i| &body[i..]).unwrap_or("");
    out.push_str(hunks);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn repo() -> (TempDir, Utf8PathBuf) {
        let td = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).unwrap();
        (td, root)
    }

    #[test]
    fn sha_is_stable() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn replace_checks_current_content() {
        let (_td, root) = repo();
        fs::write(root.join("a.yaml"), "old\n").unwrap();

        let w = replace_content(&root, Utf8Path::new("a.yaml"), "old\n", "new\n").unwrap();
        assert_eq!(w.before_sha256, sha256_hex(b"old\n"));
        assert_eq!(fs::read_to_string(root.join("a.yaml")).unwrap(), "new\n");
        assert!(!root.join(".a.yaml.govfix-tmp").exists());

        let err = replace_content(&root, Utf8Path::new("a.yaml"), "old\n", "newer\n").unwrap_err();
        assert!(matches!(err, EditError::Stale { .. }));
        assert_eq!(fs::read_to_string(root.join("a.yaml")).unwrap(), "new\n");
    }

    #[test]
    fn missing_file_is_reported() {
        let (_td, root) = repo();
        let err = check_fresh(&root, Utf8Path::new("nope.java"), "00").unwrap_err();
        assert!(matches!(err, EditError::Missing { .. }));
    }

    #[test]
    fn diff_has_git_headers_and_single_file_header() {
        let d = render_diff("src/A.java", "a\nb\nc\n", "a\nB\nc\n");
        assert!(d.starts_with("diff --git a/src/A.java b/src/A.java\n--- a/src/A.java\n+++ b/src/A.java\n@@"));
        assert_eq!(d.matches("+++ ").count(), 1);
        assert!(d.contains("-b\n+B\n"));
        assert_eq!(render_diff("x", "same", "same"), "");
    }

    #[test]
    fn line_stats_count_changes() {
        assert_eq!(line_stats("a\nb\n", "a\nc\nd\n"), (2, 1));
        assert_eq!(line_stats("a\n", "a\n"), (0, 0));
    }
}
