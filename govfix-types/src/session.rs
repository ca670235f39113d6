//! Durable fix-session records (`review-state.json`).

use crate::fix::{FixStatus, OutcomeError, ProposedFix};
use crate::violation::{Category, Violation};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Targets proposals, applies and commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Selector {
    All,
    Category(Category),
    Rule(String),
}

impl Selector {
    /// `all`, a category spelling, or otherwise a rule id.
    pub fn parse(s: &str) -> Option<Selector> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if s.eq_ignore_ascii_case("all") {
            return Some(Selector::All);
        }
        if let Some(c) = Category::parse(s) {
            return Some(Selector::Category(c));
        }
        Some(Selector::Rule(s.to_string()))
    }

    pub fn matches(&self, rule_id: &str, category: Category) -> bool {
        match self {
            Selector::All => true,
            Selector::Category(c) => *c == category,
            Selector::Rule(r) => r == rule_id,
        }
    }

    pub fn matches_violation(&self, v: &Violation) -> bool {
        self.matches(&v.rule_id, v.category)
    }

    pub fn matches_fix(&self, fix: &ProposedFix) -> bool {
        self.matches(&fix.rule_id, fix.category)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("all"),
            Selector::Category(c) => write!(f, "{}", c.wire_name()),
            Selector::Rule(r) => f.write_str(r),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    #[default]
    Pending,
    Approved,
    Rejected,
    Skipped,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Pending => "PENDING",
            ReviewDecision::Approved => "APPROVED",
            ReviewDecision::Rejected => "REJECTED",
            ReviewDecision::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// A fix plus its lifecycle state inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixEntry {
    pub fix: ProposedFix,
    pub status: FixStatus,
    #[serde(default)]
    pub decision: ReviewDecision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<ReviewComment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<OutcomeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One finalized rule-level commit (or its reversal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub rule_id: String,
    pub fix_ids: Vec<String>,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reverted: bool,
    /// Set on the checkpoint that reverses another one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total: u64,
    pub proposed: u64,
    pub previewed: u64,
    pub applied: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
    pub pending: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Closed,
    Abandoned,
}

/// Baseline the session was proposed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRef {
    pub scanned_at: DateTime<Utc>,
    pub total: u64,
}

/// The persisted shape of a fix session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub schema: String,
    pub session_id: Uuid,
    pub project: Utf8PathBuf,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
    pub selector: Selector,
    pub baseline: BaselineRef,
    #[serde(default)]
    pub fixes: Vec<FixEntry>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    #[serde(default)]
    pub summary: SessionSummary,
    #[serde(default)]
    pub review: ReviewSummary,
}

/// Contents of the exclusive session lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub session_id: Uuid,
    pub pid: u32,
    pub created_at: DateTime<Utc>,
}
