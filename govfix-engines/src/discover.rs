use camino::{Utf8Path, Utf8PathBuf};
use govfix_domain::RepoView;

const SPEC_DIRS: &[&str] = &["", "src/main/resources", "api"];
const SPEC_NAMES: &[&str] = &[
    "openapi.yaml",
    "openapi.yml",
    "openapi.json",
    "swagger.yaml",
    "swagger.yml",
    "swagger.json",
];

/// First OpenAPI document in the usual places, project-relative.
pub fn discover_spec(repo: &dyn RepoView) -> Option<Utf8PathBuf> {
    SPEC_DIRS.iter().find_map(|dir| {
        SPEC_NAMES.iter().find_map(|name| {
            let rel = if dir.is_empty() {
                Utf8PathBuf::from(*name)
            } else {
                Utf8Path::new(dir).join(name)
            };
            repo.exists(&rel).then_some(rel)
        })
    })
}

/// `configured` when given, otherwise discovery.
pub fn resolve_spec(repo: &dyn RepoView, configured: Option<&Utf8Path>) -> Option<Utf8PathBuf> {
    match configured {
        Some(p) => {
            let rel = p.strip_prefix(repo.root()).unwrap_or(p).to_path_buf();
            repo.exists(&rel).then_some(rel)
        }
        None => discover_spec(repo),
    }
}
