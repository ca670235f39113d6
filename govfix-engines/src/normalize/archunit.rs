use super::{build_violation, scalar_string};
use crate::error::ParseError;
use camino::Utf8Path;
use govfix_domain::{RepoView, UNKNOWN_LOCATION};
use govfix_types::violation::{EngineId, Severity, Violation};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub const JSON_START: &str = "---JSON-START---";
pub const JSON_END: &str = "---JSON-END---";

const SOURCE_DIRS: &[&str] = &["src/main/java", "src/test/java", "src"];

/// Location patterns, most specific first.
static LOCATIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"in \(([^/\\:()]+\.java):(\d+)\)",
        r"\(([^/\\:()]+\.java):(\d+)\)",
        r"([^/\\:\s()]+\.java):(\d+)",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});
static FQCN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<([^>]+)>").ok());

/// Normalize architecture analyzer output delimited by JSON markers.
pub fn normalize(stdout: &str, repo: &dyn RepoView) -> Result<Vec<Violation>, ParseError> {
    let engine = EngineId::Architecture;
    let json = between_markers(stdout)
        .ok_or_else(|| ParseError::new(engine, "missing ---JSON-START---/---JSON-END--- markers"))?;
    let value: Value = serde_json::from_str(json.trim())
        .map_err(|e| ParseError::new(engine, format!("invalid json: {e}")))?;
    let Value::Array(items) = value else {
        return Err(ParseError::new(engine, "expected a JSON array"));
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            return Err(ParseError::new(engine, format!("entry {idx} is not an object")));
        };
        let rule_id = scalar_string(obj.get("rule")).unwrap_or_else(|| "unknown".to_string());
        let message = scalar_string(obj.get("message")).unwrap_or_default();
        let severity = match obj.get("severity") {
            Some(Value::Number(n)) if n.as_i64() == Some(0) => Severity::Critical,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("critical") || s == "0" => {
                Severity::Critical
            }
            _ => Severity::Warning,
        };
        let (file, line) = locate(&message, repo);
        out.push(build_violation(engine, rule_id, severity, message, file, line, None));
    }
    Ok(out)
}

fn between_markers(stdout: &str) -> Option<&str> {
    let start = stdout.find(JSON_START)? + JSON_START.len();
    let end = stdout[start..].find(JSON_END)? + start;
    Some(&stdout[start..end])
}

/// `(file, line)` for a violation message.
pub fn locate(message: &str, repo: &dyn RepoView) -> (String, Option<u32>) {
    for re in LOCATIONS.iter() {
        if let Some(c) = re.captures(message) {
            let line = c[2].parse().ok();
            return (resolve(&c[1], repo), line);
        }
    }
    if let Some(name) = FQCN
        .as_ref()
        .and_then(|re| re.captures(message))
        .and_then(|c| class_file(&c[1]))
    {
        return (resolve(&name, repo), None);
    }
    (UNKNOWN_LOCATION.to_string(), None)
}

/// `com.x.Foo`, `com.x.Foo$Inner` or `com.x.Foo.bar()` to `Foo.java`.
fn class_file(fqcn: &str) -> Option<String> {
    let head = fqcn.split('(').next().unwrap_or(fqcn);
    head.split('.')
        .map(|seg| seg.split('$').next().unwrap_or(seg))
        .rev()
        .find(|seg| seg.chars().next().is_some_and(|c| c.is_ascii_uppercase()))
        .map(|class| format!("{class}.java"))
}

fn resolve(file_name: &str, repo: &dyn RepoView) -> String {
    SOURCE_DIRS
        .iter()
        .find_map(|dir| repo.find_file(Utf8Path::new(dir), file_name))
        .map(|p| p.to_string())
        .unwrap_or_else(|| file_name.to_string())
}
