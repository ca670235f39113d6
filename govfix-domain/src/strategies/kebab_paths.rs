use super::{FixStrategy, StrategyEdit};
use govfix_types::violation::Violation;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static YAML_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^(\s*)(/[^\s:]*)(\s*:)").ok());
static JSON_KEY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""(/[^"\s]*)"(\s*:)"#).ok());
static JAVA_MAPPING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(@(?:Get|Post|Put|Delete|Patch|Request)Mapping\(\s*(?:(?:value|path)\s*=\s*)?")([^"]*)(")"#,
    )
    .ok()
});

/// Lower-case each literal segment, splitting camelCase and snake_case with
/// hyphens. `{param}` segments are left as they are.
pub fn kebab_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.starts_with('{') {
                return seg.to_string();
            }
            let mut out = String::with_capacity(seg.len() + 4);
            let mut prev: Option<char> = None;
            for c in seg.chars() {
                if c.is_ascii_uppercase()
                    && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
                {
                    out.push('-');
                }
                out.push(if c == '_' { '-' } else { c.to_ascii_lowercase() });
                prev = Some(c);
            }
            out
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub struct KebabCasePaths;

impl FixStrategy for KebabCasePaths {
    fn key(&self) -> &'static str {
        "kebab-case-paths"
    }

    fn rules(&self) -> &'static [&'static str] {
        &["kebab-case-paths", "requestMappingsKebabCase"]
    }

    fn rewrite(&self, content: &str, _violations: &[&Violation]) -> Option<StrategyEdit> {
        let mut out = content.to_string();
        if let Some(re) = YAML_KEY.as_ref() {
            out = re
                .replace_all(&out, |c: &Captures| {
                    format!("{}{}{}", &c[1], kebab_path(&c[2]), &c[3])
                })
                .into_owned();
        }
        if let Some(re) = JSON_KEY.as_ref() {
            out = re
                .replace_all(&out, |c: &Captures| format!("\"{}\"{}", kebab_path(&c[1]), &c[2]))
                .into_owned();
        }
        if let Some(re) = JAVA_MAPPING.as_ref() {
            out = re
                .replace_all(&out, |c: &Captures| {
                    format!("{}{}{}", &c[1], kebab_path(&c[2]), &c[3])
                })
                .into_owned();
        }

        if out == content {
            return None;
        }
        Some(StrategyEdit {
            content: out,
            explanation: "URL path segments use lower-case kebab-case; path parameters are unchanged."
                .to_string(),
            auxiliary: vec![],
        })
    }
}
