use crate::discover::resolve_spec;
use crate::error::{EngineError, ModelError, ParseError};
use crate::model::SemanticModel;
use crate::normalize::{archunit, semantic, spectral};
use crate::process::{ProcessError, run_command};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use govfix_domain::{FsRepoView, RepoView};
use govfix_types::violation::{EngineId, Violation};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What an engine produced before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub engine: EngineId,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Project-relative document the engine analyzed, if it analyzed one.
    pub document: Option<Utf8PathBuf>,
}

/// One detection engine.
///
/// `run` performs the engine's I/O. `normalize` is pure and turns its output
/// into canonical violations.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    fn id(&self) -> EngineId;

    fn timeout(&self) -> Duration;

    async fn run(&self, target: &Utf8Path) -> Result<RawOutput, EngineError>;

    fn normalize(&self, target: &Utf8Path, raw: &RawOutput) -> Result<Vec<Violation>, ParseError>;
}

pub const PROJECT_PLACEHOLDER: &str = "{project}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLintConfig {
    pub bin: String,
    pub ruleset: Option<Utf8PathBuf>,
    pub spec: Option<Utf8PathBuf>,
    pub timeout: Duration,
}

impl Default for SchemaLintConfig {
    fn default() -> Self {
        Self {
            bin: "spectral".to_string(),
            ruleset: None,
            spec: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureConfig {
    /// Command line; `{project}` is replaced with the project path.
    pub command: Vec<String>,
    pub timeout: Duration,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            command: ["java", "-jar", "archunit-runner.jar", PROJECT_PLACEHOLDER]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Clone)]
pub struct SemanticEngine {
    pub model: Option<Arc<dyn SemanticModel>>,
    pub spec: Option<Utf8PathBuf>,
    pub timeout: Duration,
}

impl fmt::Debug for SemanticEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticEngine")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("spec", &self.spec)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SemanticEngine {
    fn default() -> Self {
        Self {
            model: None,
            spec: None,
            timeout: Duration::from_secs(180),
        }
    }
}

/// The closed set of detection engines.
#[derive(Debug, Clone)]
pub enum Engine {
    SchemaLint(SchemaLintConfig),
    Architecture(ArchitectureConfig),
    Semantic(SemanticEngine),
}

fn map_process_error(engine: EngineId, err: ProcessError) -> EngineError {
    match err {
        ProcessError::NotFound { program } => EngineError::Unavailable {
            engine,
            detail: format!("{program} not found on PATH"),
        },
        ProcessError::Timeout { after, .. } => EngineError::Timeout { engine, after },
        other => EngineError::Failed {
            engine,
            detail: other.to_string(),
        },
    }
}

fn map_model_error(engine: EngineId, err: ModelError) -> EngineError {
    match err {
        ModelError::NotConfigured | ModelError::Unavailable(_) => EngineError::Unavailable {
            engine,
            detail: err.to_string(),
        },
        ModelError::Status(_) | ModelError::InvalidResponse(_) => EngineError::Failed {
            engine,
            detail: err.to_string(),
        },
    }
}

fn no_document(engine: EngineId) -> EngineError {
    EngineError::Unavailable {
        engine,
        detail: "no OpenAPI document found".to_string(),
    }
}

impl Engine {
    async fn run_schema_lint(
        cfg: &SchemaLintConfig,
        target: &Utf8Path,
    ) -> Result<RawOutput, EngineError> {
        let engine = EngineId::SchemaLint;
        let repo = FsRepoView::new(target.to_path_buf());
        let spec = resolve_spec(&repo, cfg.spec.as_deref()).ok_or_else(|| no_document(engine))?;

        let mut argv = vec![
            cfg.bin.clone(),
            "lint".to_string(),
            target.join(&spec).to_string(),
        ];
        if let Some(ruleset) = &cfg.ruleset {
            argv.push("--ruleset".to_string());
            argv.push(ruleset.to_string());
        }
        argv.push("--format".to_string());
        argv.push("json".to_string());

        let out = run_command(&argv, target, cfg.timeout)
            .await
            .map_err(|e| map_process_error(engine, e))?;
        Ok(RawOutput {
            engine,
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            document: Some(spec),
        })
    }

    async fn run_architecture(
        cfg: &ArchitectureConfig,
        target: &Utf8Path,
    ) -> Result<RawOutput, EngineError> {
        let engine = EngineId::Architecture;
        let argv: Vec<String> = cfg
            .command
            .iter()
            .map(|a| a.replace(PROJECT_PLACEHOLDER, target.as_str()))
            .collect();
        let out = run_command(&argv, target, cfg.timeout)
            .await
            .map_err(|e| map_process_error(engine, e))?;
        Ok(RawOutput {
            engine,
            exit_code: out.exit_code,
            stdout: out.stdout,
            stderr: out.stderr,
            document: None,
        })
    }

    async fn run_semantic(cfg: &SemanticEngine, target: &Utf8Path) -> Result<RawOutput, EngineError> {
        let engine = EngineId::Semantic;
        let model = cfg
            .model
            .as_ref()
            .ok_or_else(|| map_model_error(engine, ModelError::NotConfigured))?;
        let repo = FsRepoView::new(target.to_path_buf());
        let spec = resolve_spec(&repo, cfg.spec.as_deref()).ok_or_else(|| no_document(engine))?;
        let content = repo.read_to_string(&spec).map_err(|e| EngineError::Failed {
            engine,
            detail: format!("{e:#}"),
        })?;

        let prompt = analysis_prompt(&spec, &content);
        let reply = tokio::time::timeout(cfg.timeout, model.generate(&prompt))
            .await
            .map_err(|_| EngineError::Timeout {
                engine,
                after: cfg.timeout,
            })?
            .map_err(|e| map_model_error(engine, e))?;
        Ok(RawOutput {
            engine,
            exit_code: None,
            stdout: reply,
            stderr: String::new(),
            document: Some(spec),
        })
    }
}

#[async_trait]
impl EngineAdapter for Engine {
    fn id(&self) -> EngineId {
        match self {
            Engine::SchemaLint(_) => EngineId::SchemaLint,
            Engine::Architecture(_) => EngineId::Architecture,
            Engine::Semantic(_) => EngineId::Semantic,
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            Engine::SchemaLint(c) => c.timeout,
            Engine::Architecture(c) => c.timeout,
            Engine::Semantic(c) => c.timeout,
        }
    }

    async fn run(&self, target: &Utf8Path) -> Result<RawOutput, EngineError> {
        info!(engine = %self.id(), target = %target, "running engine");
        let out = match self {
            Engine::SchemaLint(c) => Self::run_schema_lint(c, target).await,
            Engine::Architecture(c) => Self::run_architecture(c, target).await,
            Engine::Semantic(c) => Self::run_semantic(c, target).await,
        }?;
        debug!(engine = %self.id(), exit_code = ?out.exit_code, stdout_len = out.stdout.len(), "engine finished");
        Ok(out)
    }

    fn normalize(&self, target: &Utf8Path, raw: &RawOutput) -> Result<Vec<Violation>, ParseError> {
        let fallback = Utf8PathBuf::from("openapi.yaml");
        let document = raw.document.as_ref().unwrap_or(&fallback);
        match self {
            Engine::SchemaLint(_) => spectral::normalize(&raw.stdout, target, document),
            Engine::Architecture(_) => {
                archunit::normalize(&raw.stdout, &FsRepoView::new(target.to_path_buf()))
            }
            Engine::Semantic(_) => semantic::normalize(&raw.stdout, document),
        }
    }
}

const MAX_PROMPT_DOCUMENT: usize = 16_000;

const SEMANTIC_RULES: &[&str] = &[
    "no-verbs-in-url",
    "plural-resources",
    "kebab-case-paths",
    "uuid-resource-ids",
    "response-envelope",
    "nested-resources-depth",
    "operation-description-required",
];

/// Path keys of an OpenAPI document. YAML parsing covers JSON documents too.
pub fn document_paths(content: &str) -> Vec<String> {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(content) else {
        return Vec::new();
    };
    value
        .get("paths")
        .and_then(|p| p.as_mapping())
        .map(|m| {
            m.keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

pub fn analysis_prompt(document: &Utf8Path, content: &str) -> String {
    let paths = document_paths(content);
    let mut prompt = String::new();
    prompt.push_str("You review REST API designs for governance problems.\n");
    prompt.push_str(&format!("Document: {document}\n"));
    if !paths.is_empty() {
        prompt.push_str("Paths:\n");
        for p in &paths {
            prompt.push_str(&format!("- {p}\n"));
        }
    }
    prompt.push_str(&format!("Check these rules: {}.\n", SEMANTIC_RULES.join(", ")));
    prompt.push_str(
        "Reply with only a JSON array of objects {\"rule\", \"message\", \"severity\", \"path\", \"line\"}. \
         severity is one of critical, warning, info. Reply [] when nothing is wrong.\n\n",
    );
    prompt.push_str(truncate_chars(content, MAX_PROMPT_DOCUMENT));
    prompt
}
