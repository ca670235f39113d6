//! Configuration file loading for govfix.
//!
//! Discovers and loads `govfix.toml` from the project root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use govfix_core::Settings;
use govfix_types::violation::EngineId;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "govfix.toml";

/// Top-level configuration from govfix.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GovfixConfig {
    pub engines: EnginesConfig,
    pub model: ModelSection,
    pub validation: ValidationSection,
    pub output: OutputSection,
    pub commit: CommitSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    /// Engines to run, in merge order. Empty means all.
    pub enabled: Vec<String>,
    pub schema_lint: SchemaLintSection,
    pub architecture: ArchitectureSection,
    pub semantic: SemanticSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaLintSection {
    pub bin: Option<String>,
    pub ruleset: Option<Utf8PathBuf>,
    /// Spec document; discovered when unset.
    pub spec: Option<Utf8PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchitectureSection {
    /// Command line; `{project}` is replaced with the project path.
    pub command: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SemanticSection {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Environment variable holding the bearer token.
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    pub build_command: Option<Vec<String>>,
    pub test_command: Option<Vec<String>>,
    pub build_timeout_secs: Option<u64>,
    pub test_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommitSection {
    /// Create a git commit per checkpoint.
    pub git: bool,
}

/// Discover the govfix.toml config file.
///
/// Returns `None` if no config file is found at the project root.
pub fn discover_config(project: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a govfix.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<GovfixConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<GovfixConfig> {
    let config: GovfixConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project root, or return default if not found.
pub fn load_or_default(project: &Utf8Path) -> anyhow::Result<GovfixConfig> {
    match discover_config(project) {
        Some(path) => load_config(&path),
        None => Ok(GovfixConfig::default()),
    }
}

/// CLI values that override the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub out_dir: Option<Utf8PathBuf>,
    pub spec: Option<Utf8PathBuf>,
    pub model_endpoint: Option<String>,
    pub git_commits: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: GovfixConfig,
}

fn secs(v: Option<u64>, default: Duration) -> Duration {
    v.map(Duration::from_secs).unwrap_or(default)
}

impl ConfigMerger {
    pub fn new(config: GovfixConfig) -> Self {
        Self { config }
    }

    /// Produce core settings for `project`.
    ///
    /// `api_key` resolves the model's `api_key_env` variable.
    pub fn merge(
        self,
        project: Utf8PathBuf,
        cli: &CliOverrides,
        api_key: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Settings> {
        let c = self.config;
        let mut s = Settings::for_project(project);

        if !c.engines.enabled.is_empty() {
            s.engines = c
                .engines
                .enabled
                .iter()
                .map(|name| {
                    EngineId::parse(name)
                        .ok_or_else(|| anyhow::anyhow!("unknown engine '{}' in [engines].enabled", name))
                })
                .collect::<anyhow::Result<_>>()?;
        }

        let lint = c.engines.schema_lint;
        if let Some(bin) = lint.bin {
            s.schema_lint.bin = bin;
        }
        s.schema_lint.ruleset = lint.ruleset;
        s.schema_lint.spec = cli.spec.clone().or(lint.spec);
        s.schema_lint.timeout = secs(lint.timeout_secs, s.schema_lint.timeout);

        if let Some(command) = c.engines.architecture.command {
            s.architecture.command = command;
        }
        s.architecture.timeout = secs(c.engines.architecture.timeout_secs, s.architecture.timeout);
        s.semantic_timeout = secs(c.engines.semantic.timeout_secs, s.semantic_timeout);

        s.model.endpoint = cli.model_endpoint.clone().or(c.model.endpoint);
        if let Some(model) = c.model.model {
            s.model.model = model;
        }
        s.model.timeout = secs(c.model.timeout_secs, s.model.timeout);
        s.model.api_key = c.model.api_key_env.as_deref().and_then(&api_key);

        s.validation.build_command = c.validation.build_command;
        s.validation.test_command = c.validation.test_command;
        s.validation.build_timeout = secs(c.validation.build_timeout_secs, s.validation.build_timeout);
        s.validation.test_timeout = secs(c.validation.test_timeout_secs, s.validation.test_timeout);

        if let Some(dir) = cli.out_dir.clone().or(c.output.dir) {
            s.out_dir = dir;
        }
        // CLI flag overrides config when set to true
        s.git_commits = cli.git_commits || c.commit.git;

        debug!(engines = ?s.engines, out_dir = %s.out_dir, git = s.git_commits, "merged config");
        Ok(s)
    }
}
