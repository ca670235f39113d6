use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical violation severity.
///
/// Variant order is most severe first, so the derived `Ord` sorts critical
/// findings ahead of warnings and info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Severities that make `scan` exit non-zero.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Warning)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative effort estimate attached to each category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effort {
    Low,
    Medium,
    High,
    Varies,
}

impl Effort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "Low",
            Effort::Medium => "Medium",
            Effort::High => "High",
            Effort::Varies => "Varies",
        }
    }
}

/// One of the ten fixed priority tiers, P1 (highest) through P10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    ResourceNaming,
    Architecture,
    CodeQuality,
    Security,
    DataTypes,
    HttpSemantics,
    Pagination,
    ResponseStructure,
    Documentation,
    Other,
}

impl Category {
    /// All categories in priority order.
    pub const ALL: [Category; 10] = [
        Category::ResourceNaming,
        Category::Architecture,
        Category::CodeQuality,
        Category::Security,
        Category::DataTypes,
        Category::HttpSemantics,
        Category::Pagination,
        Category::ResponseStructure,
        Category::Documentation,
        Category::Other,
    ];

    /// Priority tier, 1 is fixed first.
    pub fn tier(&self) -> u8 {
        match self {
            Category::ResourceNaming => 1,
            Category::Architecture => 2,
            Category::CodeQuality => 3,
            Category::Security => 4,
            Category::DataTypes => 5,
            Category::HttpSemantics => 6,
            Category::Pagination => 7,
            Category::ResponseStructure => 8,
            Category::Documentation => 9,
            Category::Other => 10,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Category::ResourceNaming => "RESOURCE_NAMING",
            Category::Architecture => "ARCHITECTURE",
            Category::CodeQuality => "CODE_QUALITY",
            Category::Security => "SECURITY",
            Category::DataTypes => "DATA_TYPES",
            Category::HttpSemantics => "HTTP_SEMANTICS",
            Category::Pagination => "PAGINATION",
            Category::ResponseStructure => "RESPONSE_STRUCTURE",
            Category::Documentation => "DOCUMENTATION",
            Category::Other => "OTHER",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::ResourceNaming => "Resource Naming",
            Category::Architecture => "Architecture",
            Category::CodeQuality => "Code Quality",
            Category::Security => "Security",
            Category::DataTypes => "Data Types",
            Category::HttpSemantics => "HTTP Semantics",
            Category::Pagination => "Pagination",
            Category::ResponseStructure => "Response Structure",
            Category::Documentation => "Documentation",
            Category::Other => "Other",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::ResourceNaming => "REST resource naming: plural nouns, kebab-case paths, no verbs",
            Category::Architecture => "Layering, dependency direction and package structure",
            Category::CodeQuality => "Logging, exception handling and injection style",
            Category::Security => "Authentication, credentials and security definitions",
            Category::DataTypes => "Identifier formats, field casing and standard value formats",
            Category::HttpSemantics => "Status codes and request bodies per HTTP method",
            Category::Pagination => "Pagination parameters and paged response shape",
            Category::ResponseStructure => "Response envelopes, array naming and nesting depth",
            Category::Documentation => "Descriptions for operations, schemas, parameters and tags",
            Category::Other => "Rules without a dedicated category",
        }
    }

    pub fn effort(&self) -> Effort {
        match self {
            Category::ResourceNaming => Effort::Low,
            Category::Architecture => Effort::High,
            Category::CodeQuality => Effort::Medium,
            Category::Security => Effort::High,
            Category::DataTypes => Effort::Medium,
            Category::HttpSemantics => Effort::Low,
            Category::Pagination => Effort::Medium,
            Category::ResponseStructure => Effort::Medium,
            Category::Documentation => Effort::Low,
            Category::Other => Effort::Varies,
        }
    }

    /// Parse a category from its wire name, kebab name, display name or `P<n>`.
    pub fn parse(s: &str) -> Option<Category> {
        let s = s.trim();
        if let Some(n) = s.strip_prefix(['P', 'p'])
            && let Ok(tier) = n.parse::<u8>()
        {
            return Category::ALL.into_iter().find(|c| c.tier() == tier);
        }
        let norm: String = s
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        Category::ALL.into_iter().find(|c| c.wire_name() == norm)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Identifier of a detection engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineId {
    SchemaLint,
    Architecture,
    Semantic,
}

impl EngineId {
    pub const ALL: [EngineId; 3] = [EngineId::SchemaLint, EngineId::Architecture, EngineId::Semantic];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::SchemaLint => "schema-lint",
            EngineId::Architecture => "architecture",
            EngineId::Semantic => "semantic",
        }
    }

    pub fn parse(s: &str) -> Option<EngineId> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schema-lint" | "schema_lint" | "spectral" => Some(EngineId::SchemaLint),
            "architecture" | "archunit" => Some(EngineId::Architecture),
            "semantic" | "llm" => Some(EngineId::Semantic),
            _ => None,
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized finding.
///
/// `line` and `path` are always serialized (as `null` when absent) so the
/// persisted record keeps a fixed shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub path: Option<String>,
    pub category: Category,
    pub engine: EngineId,
}

impl Violation {
    /// Sort key used for every persisted violation list.
    #[allow(clippy::type_complexity)]
    pub fn sort_key(
        &self,
    ) -> (u8, Severity, &str, Option<u32>, &str, &str, Option<&str>, EngineId) {
        (
            self.category.tier(),
            self.severity,
            self.file.as_str(),
            self.line,
            self.rule_id.as_str(),
            self.message.as_str(),
            self.path.as_deref(),
            self.engine,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_accepts_all_spellings() {
        assert_eq!(Category::parse("RESOURCE_NAMING"), Some(Category::ResourceNaming));
        assert_eq!(Category::parse("resource-naming"), Some(Category::ResourceNaming));
        assert_eq!(Category::parse("Resource Naming"), Some(Category::ResourceNaming));
        assert_eq!(Category::parse("p6"), Some(Category::HttpSemantics));
        assert_eq!(Category::parse("P10"), Some(Category::Other));
        assert_eq!(Category::parse("P11"), None);
        assert_eq!(Category::parse("plural-resources"), None);
    }

    #[test]
    fn tiers_are_one_through_ten_in_order() {
        let tiers: Vec<u8> = Category::ALL.iter().map(|c| c.tier()).collect();
        assert_eq!(tiers, (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn severity_orders_most_severe_first() {
        let mut v = vec![Severity::Info, Severity::Critical, Severity::Warning];
        v.sort();
        assert_eq!(v, vec![Severity::Critical, Severity::Warning, Severity::Info]);
    }

    #[test]
    fn violation_record_keeps_null_line_and_path() {
        let v = Violation {
            rule_id: "plural-resources".into(),
            severity: Severity::Warning,
            message: "use plural".into(),
            file: "openapi.yaml".into(),
            line: None,
            path: None,
            category: Category::ResourceNaming,
            engine: EngineId::SchemaLint,
        };
        let json = serde_json::to_value(&v).unwrap();
        assert!(json["line"].is_null());
        assert!(json["path"].is_null());
        assert_eq!(json["category"], "RESOURCE_NAMING");
        assert_eq!(json["engine"], "schema-lint");
        assert_eq!(json["severity"], "warning");
    }

    #[test]
    fn engine_id_parses_aliases() {
        assert_eq!(EngineId::parse("spectral"), Some(EngineId::SchemaLint));
        assert_eq!(EngineId::parse("ArchUnit"), Some(EngineId::Architecture));
        assert_eq!(EngineId::parse("nope"), None);
    }
}
