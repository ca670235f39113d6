//! The fixed rule-id → priority-tier table.
//!
//! The table is immutable and built once on first use. Lookup is total:
//! exact rule ids first, then a fixed list of rule-id prefixes, then
//! [`Category::Other`].

use govfix_types::report::{CategoryProgress, CategorySummary};
use govfix_types::scan::ScanResult;
use govfix_types::violation::Category;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use Category::*;

const RULES: &[(&str, Category)] = &[
    // P1
    ("plural-resources", ResourceNaming),
    ("kebab-case-paths", ResourceNaming),
    ("no-verbs-in-url", ResourceNaming),
    ("pluralResourceNaming", ResourceNaming),
    ("noVerbsInMapping", ResourceNaming),
    ("requestMappingsKebabCase", ResourceNaming),
    // P2
    ("architecture-layered", Architecture),
    ("architecture-persistence-no-web", Architecture),
    ("dependency-controller-no-repository", Architecture),
    ("dependency-domain-independence", Architecture),
    ("dependency-no-upper-packages", Architecture),
    ("naming-service-package", Architecture),
    ("arch-layered-architecture", Architecture),
    ("arch-no-cycles", Architecture),
    ("arch-naming-convention", Architecture),
    ("controllersInCorrectPackage", Architecture),
    ("controllerNamingConvention", Architecture),
    ("classLevelRequestMapping", Architecture),
    ("repositoryAccessThroughService", Architecture),
    ("domainLayerIndependence", Architecture),
    // P3
    ("coding-no-std-streams", CodeQuality),
    ("coding-no-generic-exceptions", CodeQuality),
    ("coding-no-field-injection", CodeQuality),
    ("coding-no-java-util-logging", CodeQuality),
    ("no-sysout", CodeQuality),
    ("no-generic-exceptions", CodeQuality),
    ("proper-logging", CodeQuality),
    ("no-empty-catch", CodeQuality),
    ("no-java-util-logging", CodeQuality),
    ("constructor-injection-over-field", CodeQuality),
    // P4
    ("no-api-keys-in-url", Security),
    ("require-authentication", Security),
    ("security-definitions-required", Security),
    ("no-hardcoded-credentials", Security),
    // P5
    ("uuid-resource-ids", DataTypes),
    ("request-fields-camelcase", DataTypes),
    ("response-fields-camelcase", DataTypes),
    ("datetime-iso8601", DataTypes),
    ("currency-code-iso4217", DataTypes),
    ("pathVariablesShouldBeUUID", DataTypes),
    ("requestParamsCamelCase", DataTypes),
    // P6
    ("post-create-returns-201", HttpSemantics),
    ("put-returns-200-or-204", HttpSemantics),
    ("delete-returns-204-or-200", HttpSemantics),
    ("get-no-request-body", HttpSemantics),
    ("delete-no-request-body", HttpSemantics),
    ("postMethodsShouldReturn201", HttpSemantics),
    ("getMethodsNoRequestBody", HttpSemantics),
    // P7
    ("pagination-parameter-naming", Pagination),
    ("pagination-response-structure", Pagination),
    ("paginatedEndpointsUsePageable", Pagination),
    ("pagination-response-check", Pagination),
    // P8
    ("response-envelope", ResponseStructure),
    ("array-fields-plural", ResponseStructure),
    ("nested-resources-depth", ResponseStructure),
    ("controllerMethodsReturnProperTypes", ResponseStructure),
    // P9
    ("operation-description-required", Documentation),
    ("schema-description-required", Documentation),
    ("parameter-description-required", Documentation),
    ("tag-description-required", Documentation),
];

/// Checked in order; the first match wins.
const PREFIXES: &[(&str, Category)] = &[
    ("architecture-", Architecture),
    ("arch-", Architecture),
    ("dependency-", Architecture),
    ("coding-", CodeQuality),
    ("security-", Security),
    ("pagination-", Pagination),
    ("http-", HttpSemantics),
    ("documentation-", Documentation),
];

static BUILTIN: LazyLock<CategoryTable> = LazyLock::new(CategoryTable::build);

#[derive(Debug)]
pub struct CategoryTable {
    exact: HashMap<&'static str, Category>,
}

impl CategoryTable {
    fn build() -> Self {
        Self {
            exact: RULES.iter().copied().collect(),
        }
    }

    /// The process-wide table.
    pub fn builtin() -> &'static CategoryTable {
        &BUILTIN
    }

    pub fn category_for(&self, rule_id: &str) -> Category {
        if let Some(c) = self.exact.get(rule_id) {
            return *c;
        }
        PREFIXES
            .iter()
            .find(|(prefix, _)| rule_id.starts_with(prefix))
            .map(|(_, c)| *c)
            .unwrap_or(Other)
    }

    /// Rule ids explicitly listed for `category`, in table order.
    pub fn rules_in(&self, category: Category) -> Vec<&'static str> {
        RULES
            .iter()
            .filter(|(_, c)| *c == category)
            .map(|(r, _)| *r)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// Category of `rule_id` under the builtin table.
pub fn category_for(rule_id: &str) -> Category {
    CategoryTable::builtin().category_for(rule_id)
}

/// Non-empty categories of a scan, in priority order.
pub fn summarize(scan: &ScanResult) -> Vec<CategorySummary> {
    let mut rules: BTreeMap<Category, BTreeMap<String, u64>> = BTreeMap::new();
    for v in &scan.violations {
        *rules
            .entry(v.category)
            .or_default()
            .entry(v.rule_id.clone())
            .or_default() += 1;
    }

    rules
        .into_iter()
        .map(|(category, rules)| CategorySummary {
            category,
            tier: category.tier(),
            display_name: category.display_name().to_string(),
            description: category.description().to_string(),
            estimated_effort: category.effort(),
            count: rules.values().sum(),
            rules,
        })
        .collect()
}

/// Order in which categories should be worked through.
pub fn recommended_order(scan: &ScanResult) -> Vec<Category> {
    summarize(scan).into_iter().map(|s| s.category).collect()
}

/// Highest-priority category that still has violations.
pub fn next_category(scan: &ScanResult) -> Option<Category> {
    recommended_order(scan).into_iter().next()
}

/// Progress on one category between a baseline and a later scan.
pub fn progress(before: &ScanResult, after: &ScanResult, category: Category) -> CategoryProgress {
    let count = |s: &ScanResult| s.violations.iter().filter(|v| v.category == category).count() as u64;
    let total = count(before);
    let remaining = count(after);
    let fixed = total.saturating_sub(remaining);
    let percentage = if total == 0 {
        100.0
    } else {
        (fixed as f64 / total as f64 * 1000.0).round() / 10.0
    };
    CategoryProgress {
        category,
        total,
        fixed,
        remaining,
        percentage,
    }
}
