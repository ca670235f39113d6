use crate::scan::{ScanResult, SkippedEngine};
use crate::violation::{Category, EngineId, Violation};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-category rollup used in the aggregate report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub tier: u8,
    pub display_name: String,
    pub description: String,
    pub estimated_effort: crate::violation::Effort,
    pub count: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, u64>,
}

/// `governance-report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceReport {
    pub schema: String,
    pub scanned_at: DateTime<Utc>,
    pub project: Utf8PathBuf,
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_severity: BTreeMap<String, u64>,
    #[serde(default)]
    pub engines_run: Vec<EngineId>,
    #[serde(default)]
    pub engines_skipped: Vec<SkippedEngine>,
    /// Non-empty categories in priority order.
    #[serde(default)]
    pub categories: Vec<CategorySummary>,
    #[serde(default)]
    pub recommended_order: Vec<Category>,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl GovernanceReport {
    /// Rebuild the scan this report was written from.
    pub fn to_scan(&self) -> ScanResult {
        ScanResult {
            project: self.project.clone(),
            scanned_at: self.scanned_at,
            engines_run: self.engines_run.clone(),
            engines_skipped: self.engines_skipped.clone(),
            violations: self.violations.clone(),
        }
    }
}

/// `<engine>-violations.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineViolations {
    pub engine: EngineId,
    pub scanned_at: DateTime<Utc>,
    pub total: u64,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

/// Fix progress for one category between two scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProgress {
    pub category: Category,
    pub total: u64,
    pub fixed: u64,
    pub remaining: u64,
    pub percentage: f64,
}
