//! BDD harness (cucumber-rs).
//!
//! Stub engines shared by the scenarios. They stand in for external linters
//! so acceptance runs never depend on tools installed on the host.

use async_trait::async_trait;
use camino::Utf8Path;
use fs_err as fs;
use govfix_engines::{EngineAdapter, EngineError, ParseError, RawOutput};
use govfix_types::violation::{Category, EngineId, Severity, Violation};
use std::time::Duration;

/// Flags singular `/user` path keys in every top-level `*.yaml` file.
#[derive(Debug, Clone)]
pub struct PluralPathLinter {
    pub timeout: Duration,
}

impl Default for PluralPathLinter {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

fn yaml_files(target: &Utf8Path) -> Result<Vec<String>, EngineError> {
    let unavailable = |e: std::io::Error| EngineError::Unavailable {
        engine: EngineId::SchemaLint,
        detail: e.to_string(),
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(target).map_err(unavailable)? {
        let name = entry.map_err(unavailable)?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".yaml") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl EngineAdapter for PluralPathLinter {
    fn id(&self) -> EngineId {
        EngineId::SchemaLint
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One stdout line per hit: `file:line`.
    async fn run(&self, target: &Utf8Path) -> Result<RawOutput, EngineError> {
        let mut stdout = String::new();
        for name in yaml_files(target)? {
            let text = fs::read_to_string(target.join(&name)).map_err(|e| EngineError::Failed {
                engine: EngineId::SchemaLint,
                detail: e.to_string(),
            })?;
            for (i, line) in text.lines().enumerate() {
                if line.contains("/user/") || line.trim_end().ends_with("/user:") {
                    stdout.push_str(&format!("{}:{}\n", name, i + 1));
                }
            }
        }
        Ok(RawOutput {
            engine: EngineId::SchemaLint,
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
            document: None,
        })
    }

    fn normalize(&self, _target: &Utf8Path, raw: &RawOutput) -> Result<Vec<Violation>, ParseError> {
        raw.stdout
            .lines()
            .map(|l| {
                let (file, line) = l
                    .rsplit_once(':')
                    .ok_or_else(|| ParseError::new(EngineId::SchemaLint, format!("bad line {l:?}")))?;
                let line = line
                    .parse::<u32>()
                    .map_err(|e| ParseError::new(EngineId::SchemaLint, e.to_string()))?;
                Ok(Violation {
                    rule_id: "plural-resources".to_string(),
                    severity: Severity::Warning,
                    message: "Use `users` instead of `user`".to_string(),
                    file: file.to_string(),
                    line: Some(line),
                    path: None,
                    category: Category::Other,
                    engine: EngineId::SchemaLint,
                })
            })
            .collect()
    }
}

/// An architecture engine that never answers within its timeout.
#[derive(Debug, Clone)]
pub struct StalledEngine {
    pub timeout: Duration,
}

#[async_trait]
impl EngineAdapter for StalledEngine {
    fn id(&self) -> EngineId {
        EngineId::Architecture
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, _target: &Utf8Path) -> Result<RawOutput, EngineError> {
        tokio::time::sleep(self.timeout * 20).await;
        Ok(RawOutput {
            engine: EngineId::Architecture,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            document: None,
        })
    }

    fn normalize(&self, _target: &Utf8Path, _raw: &RawOutput) -> Result<Vec<Violation>, ParseError> {
        Ok(Vec::new())
    }
}
