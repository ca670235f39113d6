//! Deterministic rewrite strategies, consulted before the semantic model.

use govfix_types::fix::AuxiliaryChange;
use govfix_types::violation::Violation;

mod java_logging;
mod kebab_paths;
mod plural_resources;

/// Replacement content produced by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyEdit {
    pub content: String,
    pub explanation: String,
    pub auxiliary: Vec<AuxiliaryChange>,
}

pub trait FixStrategy: Send + Sync {
    fn key(&self) -> &'static str;

    /// Rule ids this strategy handles.
    fn rules(&self) -> &'static [&'static str];

    /// Rewrite `content` to resolve `violations`. `None` when nothing changes.
    fn rewrite(&self, content: &str, violations: &[&Violation]) -> Option<StrategyEdit>;
}

pub fn builtin_strategies() -> Vec<Box<dyn FixStrategy>> {
    vec![
        Box::new(plural_resources::PluralResources),
        Box::new(kebab_paths::KebabCasePaths),
        Box::new(java_logging::StdStreamsToLogger),
        Box::new(java_logging::JulToSlf4j),
    ]
}

/// The builtin strategy for `rule_id`, if any.
pub fn strategy_for(rule_id: &str) -> Option<Box<dyn FixStrategy>> {
    builtin_strategies()
        .into_iter()
        .find(|s| s.rules().contains(&rule_id))
}
