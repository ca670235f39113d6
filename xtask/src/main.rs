use anyhow::Context;
use clap::{Parser, Subcommand};
use fs_err as fs;
use govfix_types::report::GovernanceReport;
use govfix_types::schema;
use govfix_types::session::SessionRecord;
use govfix_types::validation::ValidationReport;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Workspace helper tasks")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print schema identifiers used by govfix.
    PrintSchemas,
    /// Write a commented govfix.toml template.
    InitConfig {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Check that govfix artifacts parse and carry the expected schema ids.
    CheckArtifacts {
        #[arg(long, default_value = "build/governance")]
        dir: PathBuf,
    },
}

const CONFIG_TEMPLATE: &str = r#"# govfix configuration. Every key is optional.

[engines]
# Merge order of the engines to run. Empty means all of them.
enabled = ["schema-lint", "architecture", "semantic"]

[engines.schema_lint]
bin = "spectral"
# ruleset = ".spectral.yaml"
# spec = "openapi.yaml"
timeout_secs = 120

[engines.architecture]
# `{project}` is replaced with the project path.
command = ["java", "-jar", "archunit-runner.jar", "{project}"]
timeout_secs = 300

[engines.semantic]
timeout_secs = 180

[model]
# endpoint = "http://localhost:11434"
model = "llama3"
timeout_secs = 60
# api_key_env = "GOVFIX_MODEL_TOKEN"

[validation]
# build_command = ["make", "build"]
# test_command = ["make", "test"]
build_timeout_secs = 600
test_timeout_secs = 600

[output]
dir = "build/governance"

[commit]
git = false
"#;

fn init_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    let path = dir.join("govfix.toml");
    if path.exists() && !force {
        anyhow::bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    fs::create_dir_all(dir)?;
    fs::write(&path, CONFIG_TEMPLATE)?;
    Ok(path)
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let value = serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

fn expect_schema(path: &Path, found: &str, expected: &str) -> anyhow::Result<()> {
    if found != expected {
        anyhow::bail!("{}: schema is {found:?}, expected {expected:?}", path.display());
    }
    Ok(())
}

/// Returns the number of artifacts checked.
fn check_artifacts(dir: &Path) -> anyhow::Result<usize> {
    let mut checked = 0;

    let report_path = dir.join("governance-report.json");
    if let Some(r) = read_artifact::<GovernanceReport>(&report_path)? {
        expect_schema(&report_path, &r.schema, schema::GOVFIX_REPORT_V1)?;
        let by_category: u64 = r.categories.iter().map(|c| c.count).sum();
        if by_category != r.total {
            anyhow::bail!(
                "{}: categories sum to {by_category}, total is {}",
                report_path.display(),
                r.total
            );
        }
        checked += 1;
    }

    let session_path = dir.join("fix-session").join("review-state.json");
    if let Some(s) = read_artifact::<SessionRecord>(&session_path)? {
        expect_schema(&session_path, &s.schema, schema::GOVFIX_SESSION_V1)?;
        checked += 1;
    }

    let validation_path = dir.join("validation-report.json");
    if let Some(v) = read_artifact::<ValidationReport>(&validation_path)? {
        expect_schema(&validation_path, &v.schema, schema::GOVFIX_VALIDATION_V1)?;
        if v.confidence_score > 100 {
            anyhow::bail!("{}: score {} out of range", validation_path.display(), v.confidence_score);
        }
        checked += 1;
    }

    Ok(checked)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::PrintSchemas => {
            println!("{}", schema::GOVFIX_REPORT_V1);
            println!("{}", schema::GOVFIX_SESSION_V1);
            println!("{}", schema::GOVFIX_VALIDATION_V1);
        }
        Command::InitConfig { dir, force } => {
            let path = init_config(&dir, force)?;
            println!("wrote {}", path.display());
        }
        Command::CheckArtifacts { dir } => {
            let n = check_artifacts(&dir)?;
            if n == 0 {
                anyhow::bail!("no govfix artifacts under {}", dir.display());
            }
            println!("{n} artifact(s) ok");
        }
    }
    Ok(())
}
