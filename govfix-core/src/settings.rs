//! Clap-free settings for scan, fix-session and validation pipelines.

use camino::{Utf8Path, Utf8PathBuf};
use govfix_engines::{ArchitectureConfig, ModelConfig, SchemaLintConfig};
use govfix_types::violation::EngineId;
use std::time::Duration;

pub const DEFAULT_OUT_DIR: &str = "build/governance";
pub const SESSION_DIR: &str = "fix-session";
pub const LOCK_FILE: &str = ".session.lock";

/// Build and test phase settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    /// Overrides the detected build command.
    pub build_command: Option<Vec<String>>,
    /// Overrides the detected test command.
    pub test_command: Option<Vec<String>>,
    pub build_timeout: Duration,
    pub test_timeout: Duration,
    /// Lines of combined output kept per phase in the report.
    pub output_tail_lines: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            build_command: None,
            test_command: None,
            build_timeout: Duration::from_secs(600),
            test_timeout: Duration::from_secs(600),
            output_tail_lines: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub project: Utf8PathBuf,
    /// Artifact directory, relative to `project` unless absolute.
    pub out_dir: Utf8PathBuf,

    // Engines, in merge order.
    pub engines: Vec<EngineId>,
    pub schema_lint: SchemaLintConfig,
    pub architecture: ArchitectureConfig,
    pub semantic_timeout: Duration,
    pub model: ModelConfig,

    pub validation: ValidationSettings,

    /// Create a git commit per checkpoint. Otherwise checkpoints are record-only.
    pub git_commits: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: Utf8PathBuf::from("."),
            out_dir: Utf8PathBuf::from(DEFAULT_OUT_DIR),
            engines: EngineId::ALL.to_vec(),
            schema_lint: SchemaLintConfig::default(),
            architecture: ArchitectureConfig::default(),
            semantic_timeout: Duration::from_secs(180),
            model: ModelConfig::default(),
            validation: ValidationSettings::default(),
            git_commits: false,
        }
    }
}

impl Settings {
    pub fn for_project(project: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// Absolute (or project-joined) artifact directory.
    pub fn out_dir(&self) -> Utf8PathBuf {
        resolve(&self.project, &self.out_dir)
    }

    pub fn session_dir(&self) -> Utf8PathBuf {
        self.out_dir().join(SESSION_DIR)
    }

    pub fn lock_path(&self) -> Utf8PathBuf {
        self.out_dir().join(LOCK_FILE)
    }
}

fn resolve(root: &Utf8Path, p: &Utf8Path) -> Utf8PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
