use super::{FixStrategy, StrategyEdit};
use govfix_types::fix::AuxiliaryChange;
use govfix_types::violation::Violation;
use regex::{Captures, Regex};
use std::sync::LazyLock;

const SLF4J_LOGGER: &str = "org.slf4j.Logger";
const SLF4J_FACTORY: &str = "org.slf4j.LoggerFactory";
const JUL_LOGGER: &str = "java.util.logging.Logger";
const JUL_LEVEL: &str = "java.util.logging.Level";

static STD_OUT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"System\.out\.print(?:ln)?\(").ok());
static STD_ERR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"System\.err\.print(?:ln)?\(").ok());
static LOGGER_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bLogger\s+(\w+)\s*=").ok());
static CLASS_DECL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:public\s+)?(?:final\s+|abstract\s+)*class\s+(\w+)[^{]*\{").ok()
});
static JUL_GET_LOGGER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"Logger\.getLogger\(\s*(\w+)\.class(?:\.getName\(\))?\s*\)").ok()
});
static JUL_LEVEL_CALLS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\.severe\(", ".error("),
        (r"\.warning\(", ".warn("),
        (r"\.fine\(", ".debug("),
        (r"\.finer\(", ".trace("),
        (r"\.finest\(", ".trace("),
    ]
    .into_iter()
    .filter_map(|(pat, rep)| Regex::new(pat).ok().map(|re| (re, rep)))
    .collect()
});

fn has_import(content: &str, name: &str) -> bool {
    content.contains(&format!("import {name};"))
}

/// Insert `import name;` after the last import, or after the package line.
fn ensure_import(content: &str, name: &str) -> Option<String> {
    if has_import(content, name) {
        return None;
    }
    let line = format!("import {name};\n");
    let anchor = content
        .match_indices("\nimport ")
        .last()
        .map(|(i, _)| i + 1)
        .or_else(|| content.starts_with("import ").then_some(0))
        .or_else(|| content.find("package ").filter(|i| *i == 0 || content[..*i].ends_with('\n')));
    let mut out = String::with_capacity(content.len() + line.len());
    match anchor {
        Some(start) => {
            let end = content[start..]
                .find('\n')
                .map(|i| start + i + 1)
                .unwrap_or(content.len());
            out.push_str(&content[..end]);
            if !out.ends_with('\n') {
                out.push('\n');
            }
            if content[start..].starts_with("package ") {
                out.push('\n');
            }
            out.push_str(&line);
            out.push_str(&content[end..]);
        }
        None => {
            out.push_str(&line);
            out.push_str(content);
        }
    }
    Some(out)
}

fn remove_import(content: &str, name: &str) -> Option<String> {
    let line = format!("import {name};\n");
    content.contains(&line).then(|| content.replacen(&line, "", 1))
}

fn add_slf4j_imports(mut content: String, aux: &mut Vec<AuxiliaryChange>) -> String {
    for name in [SLF4J_LOGGER, SLF4J_FACTORY] {
        if let Some(next) = ensure_import(&content, name) {
            content = next;
            aux.push(AuxiliaryChange::AddImport {
                name: name.to_string(),
            });
        }
    }
    content
}

/// `System.out` / `System.err` printing replaced by an SLF4J logger.
pub struct StdStreamsToLogger;

impl FixStrategy for StdStreamsToLogger {
    fn key(&self) -> &'static str {
        "std-streams-to-logger"
    }

    fn rules(&self) -> &'static [&'static str] {
        &["coding-no-std-streams", "no-sysout"]
    }

    fn rewrite(&self, content: &str, _violations: &[&Violation]) -> Option<StrategyEdit> {
        let (out_re, err_re) = (STD_OUT.as_ref()?, STD_ERR.as_ref()?);
        if !out_re.is_match(content) && !err_re.is_match(content) {
            return None;
        }

        let existing = LOGGER_FIELD
            .as_ref()
            .and_then(|re| re.captures(content))
            .map(|c| c[1].to_string());
        let logger = existing.clone().unwrap_or_else(|| "log".to_string());

        let mut out = out_re
            .replace_all(content, format!("{logger}.info(").as_str())
            .into_owned();
        out = err_re
            .replace_all(&out, format!("{logger}.error(").as_str())
            .into_owned();

        if existing.is_none() {
            let decl = CLASS_DECL.as_ref()?;
            out = decl
                .replacen(&out, 1, |c: &Captures| {
                    format!(
                        "{}\n    private static final Logger {logger} = LoggerFactory.getLogger({}.class);\n",
                        &c[0], &c[1]
                    )
                })
                .into_owned();
        }

        let mut auxiliary = Vec::new();
        out = add_slf4j_imports(out, &mut auxiliary);

        Some(StrategyEdit {
            content: out,
            explanation: format!(
                "Console output replaced with the SLF4J logger `{logger}`: stdout maps to info, stderr to error."
            ),
            auxiliary,
        })
    }
}

/// `java.util.logging` replaced by SLF4J, including level method names.
pub struct JulToSlf4j;

impl FixStrategy for JulToSlf4j {
    fn key(&self) -> &'static str {
        "jul-to-slf4j"
    }

    fn rules(&self) -> &'static [&'static str] {
        &["coding-no-java-util-logging", "no-java-util-logging"]
    }

    fn rewrite(&self, content: &str, _violations: &[&Violation]) -> Option<StrategyEdit> {
        if !has_import(content, JUL_LOGGER) {
            return None;
        }
        let mut auxiliary = Vec::new();
        let mut out = content.to_string();
        for name in [JUL_LOGGER, JUL_LEVEL] {
            if let Some(next) = remove_import(&out, name) {
                out = next;
                auxiliary.push(AuxiliaryChange::RemoveImport {
                    name: name.to_string(),
                });
            }
        }
        if let Some(re) = JUL_GET_LOGGER.as_ref() {
            out = re
                .replace_all(&out, "LoggerFactory.getLogger($1.class)")
                .into_owned();
        }
        for (re, rep) in JUL_LEVEL_CALLS.iter() {
            out = re.replace_all(&out, *rep).into_owned();
        }
        out = add_slf4j_imports(out, &mut auxiliary);

        Some(StrategyEdit {
            content: out,
            explanation: "java.util.logging replaced with SLF4J; severe/warning/fine map to error/warn/debug."
                .to_string(),
            auxiliary,
        })
    }
}
