use super::{FixStrategy, StrategyEdit};
use govfix_types::violation::Violation;
use regex::Regex;
use std::sync::LazyLock;

const PLURALS: &[(&str, &str)] = &[
    ("user", "users"),
    ("product", "products"),
    ("order", "orders"),
    ("customer", "customers"),
    ("item", "items"),
    ("category", "categories"),
    ("company", "companies"),
    ("account", "accounts"),
    ("employee", "employees"),
];

/// `/user` followed by a segment boundary, a parameter, or the end of a key.
static PATTERNS: LazyLock<Vec<(Regex, &'static str, &'static str)>> = LazyLock::new(|| {
    PLURALS
        .iter()
        .filter_map(|(singular, plural)| {
            Regex::new(&format!(r#"/{singular}(/|\{{|:|"|'|\s|$)"#))
                .ok()
                .map(|re| (re, *singular, *plural))
        })
        .collect()
});

pub struct PluralResources;

impl PluralResources {
    fn pluralize_paths(content: &str) -> (String, Vec<(&'static str, &'static str)>) {
        let mut out = content.to_string();
        let mut renamed = Vec::new();
        for (re, singular, plural) in PATTERNS.iter() {
            let replacement = format!("/{plural}$1");
            // Adjacent matches share a slash, so repeat until stable.
            while re.is_match(&out) {
                out = re.replace_all(&out, replacement.as_str()).into_owned();
                if !renamed.iter().any(|(s, _)| s == singular) {
                    renamed.push((*singular, *plural));
                }
            }
        }
        (out, renamed)
    }
}

impl FixStrategy for PluralResources {
    fn key(&self) -> &'static str {
        "plural-resources"
    }

    fn rules(&self) -> &'static [&'static str] {
        &["plural-resources", "pluralResourceNaming"]
    }

    fn rewrite(&self, content: &str, _violations: &[&Violation]) -> Option<StrategyEdit> {
        let (new_content, renamed) = Self::pluralize_paths(content);
        if new_content == content {
            return None;
        }
        let pairs: Vec<String> = renamed.iter().map(|(s, p)| format!("`{s}` → `{p}`")).collect();
        Some(StrategyEdit {
            content: new_content,
            explanation: format!(
                "Collection resources use plural nouns. Renamed path segments: {}.",
                pairs.join(", ")
            ),
            auxiliary: vec![],
        })
    }
}
