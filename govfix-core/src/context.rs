use crate::settings::Settings;
use camino::Utf8PathBuf;
use govfix_domain::{CategoryTable, FsRepoView};
use tracing::{Span, info_span};

/// Everything one invocation needs, passed explicitly through every
/// operation: settings, the category table and the span logs attach to.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub settings: Settings,
    pub categories: &'static CategoryTable,
    pub span: Span,
}

impl RunContext {
    pub fn new(settings: Settings) -> Self {
        let span = info_span!("govfix", project = %settings.project);
        Self {
            settings,
            categories: CategoryTable::builtin(),
            span,
        }
    }

    pub fn project(&self) -> &camino::Utf8Path {
        &self.settings.project
    }

    pub fn out_dir(&self) -> Utf8PathBuf {
        self.settings.out_dir()
    }

    pub fn repo(&self) -> FsRepoView {
        FsRepoView::new(self.settings.project.clone())
    }
}
