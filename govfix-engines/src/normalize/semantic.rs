use super::{build_violation, line_from_value, scalar_string, severity_from_value};
use crate::error::ParseError;
use camino::Utf8Path;
use govfix_types::violation::{EngineId, Violation};
use serde_json::Value;

/// First JSON array embedded in free text.
pub fn first_json_array(text: &str) -> Option<Vec<Value>> {
    text.match_indices('[').find_map(|(i, _)| {
        let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Array(items))) => Some(items),
            _ => None,
        }
    })
}

/// Normalize a semantic model reply. Findings without a file are attributed
/// to the analyzed document.
pub fn normalize(reply: &str, spec_rel: &Utf8Path) -> Result<Vec<Violation>, ParseError> {
    let engine = EngineId::Semantic;
    let items = first_json_array(reply)
        .ok_or_else(|| ParseError::new(engine, "reply contains no JSON array"))?;

    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        let Value::Object(obj) = item else { continue };
        let Some(rule_id) = scalar_string(obj.get("rule").or_else(|| obj.get("rule_id"))) else {
            continue;
        };
        let message = scalar_string(obj.get("message")).unwrap_or_default();
        let file = scalar_string(obj.get("file")).unwrap_or_else(|| spec_rel.to_string());
        out.push(build_violation(
            engine,
            rule_id,
            severity_from_value(obj.get("severity")),
            message,
            file,
            line_from_value(obj.get("line")),
            scalar_string(obj.get("path")),
        ));
    }
    Ok(out)
}
