//! Shared DTOs (schemas-as-code) for the govfix workspace.
//!
//! # Design constraints
//! - These types are serialized to disk under the governance output directory.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod fix;
pub mod report;
pub mod scan;
pub mod session;
pub mod validation;
pub mod violation;

/// Schema identifiers.
pub mod schema {
    pub const GOVFIX_REPORT_V1: &str = "govfix.report.v1";
    pub const GOVFIX_SESSION_V1: &str = "govfix.session.v1";
    pub const GOVFIX_VALIDATION_V1: &str = "govfix.validation.v1";
}
