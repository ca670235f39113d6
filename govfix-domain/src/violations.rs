//! Helpers over violation lists.

use govfix_types::violation::{Severity, Violation};
use std::collections::BTreeMap;

/// Sort into the canonical report order (tier, severity, file, line, rule, message).
pub fn sort_canonical(violations: &mut [Violation]) {
    violations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

pub fn count_by_severity(violations: &[Violation]) -> BTreeMap<Severity, u64> {
    let mut out = BTreeMap::new();
    for v in violations {
        *out.entry(v.severity).or_default() += 1;
    }
    out
}

fn file_rank(file: &str) -> u8 {
    let lower = file.to_ascii_lowercase();
    if lower.ends_with(".java") {
        0
    } else if lower.ends_with(".yaml") || lower.ends_with(".yml") || lower.ends_with(".json") {
        1
    } else {
        2
    }
}

/// Order in which fixes are attempted: source files, then spec documents,
/// then everything else. Stable within each group.
pub fn prioritize(violations: &[Violation]) -> Vec<&Violation> {
    let mut out: Vec<&Violation> = violations.iter().collect();
    out.sort_by_key(|v| file_rank(&v.file));
    out
}

/// True when the file names a concrete project file.
pub fn has_location(v: &Violation) -> bool {
    !v.file.is_empty() && v.file != crate::UNKNOWN_LOCATION
}
