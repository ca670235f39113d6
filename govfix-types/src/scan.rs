use crate::violation::{Category, EngineId, Violation};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why an engine contributed nothing to a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unavailable,
    Timeout,
    Failed,
    ParseError,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unavailable => "unavailable",
            SkipReason::Timeout => "timeout",
            SkipReason::Failed => "failed",
            SkipReason::ParseError => "parse_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEngine {
    pub engine: EngineId,
    pub reason: SkipReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Output of one orchestration run. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub project: Utf8PathBuf,
    pub scanned_at: DateTime<Utc>,
    #[serde(default)]
    pub engines_run: Vec<EngineId>,
    #[serde(default)]
    pub engines_skipped: Vec<SkippedEngine>,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl ScanResult {
    pub fn total(&self) -> usize {
        self.violations.len()
    }

    pub fn skipped_ids(&self) -> Vec<EngineId> {
        self.engines_skipped.iter().map(|s| s.engine).collect()
    }

    /// Per-category counts with every category present.
    pub fn counts_by_category(&self) -> BTreeMap<Category, u64> {
        let mut out: BTreeMap<Category, u64> = Category::ALL.iter().map(|c| (*c, 0)).collect();
        for v in &self.violations {
            *out.entry(v.category).or_default() += 1;
        }
        out
    }

    pub fn counts_by_rule(&self) -> BTreeMap<String, u64> {
        let mut out = BTreeMap::new();
        for v in &self.violations {
            *out.entry(v.rule_id.clone()).or_default() += 1;
        }
        out
    }

    pub fn violations_for_engine(&self, engine: EngineId) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.engine == engine).collect()
    }

    /// True when the two results hold the same violations, in any order.
    pub fn same_findings(&self, other: &ScanResult) -> bool {
        let mut a: Vec<&Violation> = self.violations.iter().collect();
        let mut b: Vec<&Violation> = other.violations.iter().collect();
        a.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
        b.sort_by(|x, y| x.sort_key().cmp(&y.sort_key()));
        a == b
    }
}
