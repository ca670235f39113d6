use super::{build_violation, line_from_value, scalar_string, severity_from_value};
use crate::error::ParseError;
use camino::Utf8Path;
use govfix_types::violation::{EngineId, Violation};
use serde_json::Value;

/// Normalize `spectral lint --format json` output.
///
/// `spec_rel` is the linted document, used when a diagnostic has no source.
pub fn normalize(
    stdout: &str,
    project: &Utf8Path,
    spec_rel: &Utf8Path,
) -> Result<Vec<Violation>, ParseError> {
    let engine = EngineId::SchemaLint;
    let trimmed = stdout.trim();
    // Spectral prints nothing at all for a clean document on some versions.
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ParseError::new(engine, format!("invalid json: {e}")))?;
    let Value::Array(items) = value else {
        return Err(ParseError::new(engine, "expected a JSON array of diagnostics"));
    };

    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            return Err(ParseError::new(engine, format!("diagnostic {idx} is not an object")));
        };
        let rule_id = scalar_string(obj.get("code")).unwrap_or_else(|| "unknown".to_string());
        let message = scalar_string(obj.get("message")).unwrap_or_default();
        let path = obj
            .get("path")
            .and_then(Value::as_array)
            .map(|segs| {
                segs.iter()
                    .filter_map(|s| scalar_string(Some(s)))
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .filter(|p| !p.is_empty());
        let line = line_from_value(
            obj.get("range")
                .and_then(|r| r.get("start"))
                .and_then(|s| s.get("line")),
        );
        let file = obj
            .get("source")
            .and_then(Value::as_str)
            .map(|src| relative_source(src, project))
            .unwrap_or_else(|| spec_rel.to_string());

        out.push(build_violation(
            engine,
            rule_id,
            severity_from_value(obj.get("severity")),
            message,
            file,
            line,
            path,
        ));
    }
    Ok(out)
}

fn relative_source(src: &str, project: &Utf8Path) -> String {
    let p = Utf8Path::new(src);
    p.strip_prefix(project)
        .map(|r| r.to_string())
        .unwrap_or_else(|_| src.to_string())
}
