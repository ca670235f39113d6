use crate::scan::ScanResult;
use crate::session::Selector;
use crate::violation::EngineId;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSystem {
    Gradle,
    Maven,
    Cargo,
    Npm,
    Python,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Passed,
    Failed,
    TimedOut,
    NotDetected,
}

impl BuildSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSystem::Gradle => "gradle",
            BuildSystem::Maven => "maven",
            BuildSystem::Cargo => "cargo",
            BuildSystem::Npm => "npm",
            BuildSystem::Python => "python",
            BuildSystem::Custom => "custom",
        }
    }
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Passed => "passed",
            BuildStatus::Failed => "failed",
            BuildStatus::TimedOut => "timed_out",
            BuildStatus::NotDetected => "not_detected",
        }
    }

    /// Everything except a clean pass gates the recommendation to FIX.
    pub fn is_failure(&self) -> bool {
        !matches!(self, BuildStatus::Passed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestState {
    Passed,
    Failed,
    TimedOut,
    NotRun,
}

impl TestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestState::Passed => "passed",
            TestState::Failed => "failed",
            TestState::TimedOut => "timed_out",
            TestState::NotRun => "not_run",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStatus {
    pub state: TestState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
}

impl TestStatus {
    pub fn not_run() -> Self {
        Self {
            state: TestState::NotRun,
            passed: None,
            failed: None,
        }
    }

    /// Fraction of tests that passed, as `(passed, total)`.
    ///
    /// Without parsed counts a passing run is `(1, 1)` and anything else is
    /// `(0, 1)`.
    pub fn pass_ratio(&self) -> (u64, u64) {
        match self.state {
            TestState::NotRun | TestState::TimedOut => (0, 1),
            TestState::Passed | TestState::Failed => match (self.passed, self.failed) {
                (Some(p), Some(f)) if p + f > 0 => (p, p + f),
                (Some(p), None) if p > 0 => (p, p),
                _ if self.state == TestState::Passed => (1, 1),
                _ => (0, 1),
            },
        }
    }
}

/// One external build or test invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRun {
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub timed_out: bool,
    /// Last lines of combined output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_tail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDelta {
    pub before: u64,
    pub after: u64,
    pub fixed: u64,
    pub new: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_rule: BTreeMap<String, CountPair>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_category: BTreeMap<String, CountPair>,
    /// Engines that ran in both scans; only their findings are counted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compared_engines: Vec<EngineId>,
    /// Baseline engines that produced nothing in the rescan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_engines: Vec<EngineId>,
}

impl ViolationDelta {
    pub fn rescan_complete(&self) -> bool {
        self.missing_engines.is_empty()
    }
}

/// Where the "before" side of a validation came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// The snapshot taken when the fix session was opened.
    Session,
    /// `governance-report.json` from the last scan.
    #[default]
    Report,
}

impl BaselineSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineSource::Session => "session",
            BaselineSource::Report => "report",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPair {
    pub before: u64,
    pub after: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Fix,
    Review,
    CommitAfterReview,
    Commit,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Commit => "COMMIT",
            Recommendation::CommitAfterReview => "COMMIT_AFTER_REVIEW",
            Recommendation::Review => "REVIEW",
            Recommendation::Fix => "FIX",
        }
    }

    pub fn is_committable(&self) -> bool {
        matches!(self, Recommendation::Commit | Recommendation::CommitAfterReview)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLabel {
    High,
    #[serde(rename = "MEDIUM-HIGH")]
    MediumHigh,
    Medium,
    Low,
}

impl ConfidenceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLabel::High => "HIGH",
            ConfidenceLabel::MediumHigh => "MEDIUM-HIGH",
            ConfidenceLabel::Medium => "MEDIUM",
            ConfidenceLabel::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema: String,
    pub project: Utf8PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_system: Option<BuildSystem>,
    pub build_status: BuildStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_run: Option<PhaseRun>,
    pub test_status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_run: Option<PhaseRun>,
    /// Selector both sides of the delta were restricted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Selector>,
    #[serde(default)]
    pub baseline: BaselineSource,
    pub rescan: ScanResult,
    pub delta: ViolationDelta,
    pub confidence_score: u8,
    pub confidence: ConfidenceLabel,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub next_steps: Vec<String>,
}
