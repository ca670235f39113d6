//! Per-engine normalizers: raw engine output in, canonical violations out.

pub mod archunit;
pub mod semantic;
pub mod spectral;

use govfix_domain::category_for;
use govfix_types::violation::{EngineId, Severity, Violation};
use serde_json::Value;

pub(crate) fn build_violation(
    engine: EngineId,
    rule_id: String,
    severity: Severity,
    message: String,
    file: String,
    line: Option<u32>,
    path: Option<String>,
) -> Violation {
    Violation {
        category: category_for(&rule_id),
        rule_id,
        severity,
        message,
        file,
        line,
        path,
        engine,
    }
}

/// Severity from a JSON value: a lint-style number or a word.
pub(crate) fn severity_from_value(v: Option<&Value>) -> Severity {
    match v {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Severity::Critical,
            Some(1) => Severity::Warning,
            Some(2) | Some(3) => Severity::Info,
            _ => Severity::Warning,
        },
        Some(Value::String(s)) => severity_from_word(s),
        _ => Severity::Warning,
    }
}

pub(crate) fn severity_from_word(s: &str) -> Severity {
    match s.trim().to_ascii_lowercase().as_str() {
        "critical" | "error" | "high" | "blocker" | "0" => Severity::Critical,
        "info" | "information" | "hint" | "low" | "2" | "3" => Severity::Info,
        _ => Severity::Warning,
    }
}

/// A JSON scalar as a string; `None` for null, arrays and objects.
pub(crate) fn scalar_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn line_from_value(v: Option<&Value>) -> Option<u32> {
    match v? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_word_severities() {
        assert_eq!(severity_from_value(Some(&json!(0))), Severity::Critical);
        assert_eq!(severity_from_value(Some(&json!(1))), Severity::Warning);
        assert_eq!(severity_from_value(Some(&json!(3))), Severity::Info);
        assert_eq!(severity_from_value(None), Severity::Warning);
        assert_eq!(severity_from_value(Some(&json!("ERROR"))), Severity::Critical);
        assert_eq!(severity_from_value(Some(&json!("hint"))), Severity::Info);
    }

    #[test]
    fn lines_accept_numbers_and_strings() {
        assert_eq!(line_from_value(Some(&json!(12))), Some(12));
        assert_eq!(line_from_value(Some(&json!("7"))), Some(7));
        assert_eq!(line_from_value(Some(&json!(-1))), None);
        assert_eq!(line_from_value(None), None);
    }
}
