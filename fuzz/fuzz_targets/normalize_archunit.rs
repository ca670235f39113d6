#![no_main]

//! Fuzz target for architecture-rule text normalization.

use camino::{Utf8Path, Utf8PathBuf};
use govfix_domain::RepoView;
use libfuzzer_sys::fuzz_target;

/// A project with no files, so every class lookup misses.
struct EmptyRepo(Utf8PathBuf);

impl RepoView for EmptyRepo {
    fn root(&self) -> &Utf8Path {
        &self.0
    }

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String> {
        anyhow::bail!("no such file: {rel}")
    }

    fn exists(&self, _rel: &Utf8Path) -> bool {
        false
    }

    fn find_file(&self, _dir: &Utf8Path, _name: &str) -> Option<Utf8PathBuf> {
        None
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let repo = EmptyRepo(Utf8PathBuf::from("/project"));
    let _ = govfix_engines::normalize::archunit::normalize(s, &repo);
    let _ = govfix_engines::normalize::archunit::locate(s, &repo);
});
