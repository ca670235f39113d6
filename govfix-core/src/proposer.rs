//! Fix proposals: deterministic strategies first, the semantic model as fallback.
//!
//! Proposing never writes to the project. Violations are grouped per
//! `(file, rule_id)` and each group becomes at most one fix. Fixes for the
//! same file chain: a later fix starts from the previous fix's proposed
//! content, so applying them in session order never self-stales.

use crate::context::RunContext;
use crate::error::{CoreError, CoreResult};
use camino::Utf8Path;
use govfix_domain::violations::{has_location, prioritize};
use govfix_domain::{FixStrategy, RepoView, builtin_strategies};
use govfix_edit::sha256_hex;
use govfix_engines::{ModelError, SemanticModel, strip_code_fences};
use govfix_types::fix::{AuxiliaryChange, FixOrigin, ProposalBatch, ProposalFailure, ProposedFix};
use govfix_types::scan::ScanResult;
use govfix_types::session::Selector;
use govfix_types::violation::{Category, Severity, Violation};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, warn};

/// Model requests in flight at once.
pub const MAX_MODEL_REQUESTS: usize = 3;

const MAX_PROMPT_FILE: usize = 24_000;

pub struct FixProposalEngine {
    strategies: Arc<Vec<Box<dyn FixStrategy>>>,
    model: Option<Arc<dyn SemanticModel>>,
    request_timeout: Duration,
    max_in_flight: usize,
}

impl std::fmt::Debug for FixProposalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixProposalEngine")
            .field("strategies", &self.strategies.iter().map(|s| s.key()).collect::<Vec<_>>())
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Group {
    rule_id: String,
    violations: Vec<Violation>,
}

#[derive(Debug)]
struct Draft {
    rule_id: String,
    category: Category,
    severity: Severity,
    line: Option<u32>,
    original: String,
    proposed: String,
    explanation: String,
    auxiliary: Vec<AuxiliaryChange>,
    origin: FixOrigin,
    count: u32,
}

#[derive(Debug)]
enum GroupResult {
    Fix(Draft),
    Failed { reason: String, unavailable: bool },
}

impl FixProposalEngine {
    pub fn new(model: Option<Arc<dyn SemanticModel>>) -> Self {
        Self {
            strategies: Arc::new(builtin_strategies()),
            model,
            request_timeout: Duration::from_secs(60),
            max_in_flight: MAX_MODEL_REQUESTS,
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<Box<dyn FixStrategy>>) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Propose fixes for every baseline violation matching `selector`.
    ///
    /// Groups that cannot be fixed come back as `failures`. The call fails
    /// only when nothing was produced and every model request was unavailable.
    pub async fn propose(
        &self,
        ctx: &RunContext,
        repo: &dyn RepoView,
        baseline: &ScanResult,
        selector: &Selector,
    ) -> CoreResult<ProposalBatch> {
        async {
            let targeted: Vec<Violation> = baseline
                .violations
                .iter()
                .filter(|v| selector.matches_violation(v))
                .cloned()
                .collect();
            info!(selector = %selector, violations = targeted.len(), "proposing fixes");

            let mut failures = Vec::new();
            let files = group_by_file(&targeted, &mut failures);

            let semaphore = Arc::new(Semaphore::new(self.max_in_flight.max(1)));
            let mut tasks = Vec::with_capacity(files.len());
            for (file, groups) in files {
                let content = match repo.read_to_string(Utf8Path::new(&file)) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(file = %file, "cannot read file for proposal: {e:#}");
                        for g in groups {
                            failures.push(ProposalFailure {
                                rule_id: g.rule_id,
                                file: file.clone(),
                                reason: format!("cannot read file: {e:#}"),
                            });
                        }
                        continue;
                    }
                };
                let strategies = Arc::clone(&self.strategies);
                let model = self.model.clone();
                let semaphore = Arc::clone(&semaphore);
                let timeout = self.request_timeout;
                let span = tracing::debug_span!("propose_file", file = %file);
                let handle = tokio::spawn(
                    {
                        let file = file.clone();
                        let groups = groups.clone();
                        async move {
                            propose_file(&file, content, &groups, &strategies, model, &semaphore, timeout)
                                .await
                        }
                    }
                    .instrument(span),
                );
                tasks.push((file, groups, handle));
            }

            let mut fixes = Vec::new();
            let mut unavailable = 0usize;
            let mut usable_replies = 0usize;
            let mut last_unavailable = String::new();
            for (file, groups, handle) in tasks {
                let results = match handle.await {
                    Ok(r) => r,
                    Err(join) => groups
                        .iter()
                        .map(|_| GroupResult::Failed {
                            reason: format!("proposal task aborted: {join}"),
                            unavailable: false,
                        })
                        .collect(),
                };
                for (group, result) in groups.iter().zip(results) {
                    match result {
                        GroupResult::Fix(d) => {
                            let fix_id = format!("fix-{:04}-{}", fixes.len() + 1, d.origin.as_str());
                            debug!(fix_id = %fix_id, rule = %d.rule_id, file = %file, "proposed fix");
                            fixes.push(ProposedFix {
                                fix_id,
                                rule_id: d.rule_id,
                                category: d.category,
                                severity: d.severity,
                                file_path: file.clone(),
                                line_number: d.line,
                                original_sha256: sha256_hex(d.original.as_bytes()),
                                original_content: d.original,
                                proposed_content: d.proposed,
                                explanation: d.explanation,
                                auxiliary: d.auxiliary,
                                origin: d.origin,
                                violations: d.count,
                            });
                        }
                        GroupResult::Failed {
                            reason,
                            unavailable: was_unavailable,
                        } => {
                            if was_unavailable {
                                unavailable += 1;
                                last_unavailable = reason.clone();
                            } else {
                                usable_replies += 1;
                            }
                            failures.push(ProposalFailure {
                                rule_id: group.rule_id.clone(),
                                file: file.clone(),
                                reason,
                            });
                        }
                    }
                }
            }

            if fixes.is_empty() && unavailable > 0 && usable_replies == 0 {
                warn!(failed = failures.len(), "semantic model unavailable for every request");
                return Err(CoreError::CollaboratorUnavailable {
                    detail: last_unavailable,
                    failures,
                });
            }

            info!(fixes = fixes.len(), failures = failures.len(), "proposal batch ready");
            Ok(ProposalBatch { fixes, failures })
        }
        .instrument(ctx.span.clone())
        .await
    }
}

/// `(file, groups)` in attempt order: source files first, then spec
/// documents, each in first-appearance order. Unlocated groups go straight
/// to `failures`.
fn group_by_file(
    targeted: &[Violation],
    failures: &mut Vec<ProposalFailure>,
) -> Vec<(String, Vec<Group>)> {
    let mut files: Vec<(String, Vec<Group>)> = Vec::new();
    let mut file_index: HashMap<String, usize> = HashMap::new();
    let mut unlocated: Vec<Group> = Vec::new();

    for v in prioritize(targeted) {
        if !has_location(v) {
            match unlocated.iter_mut().find(|g| g.rule_id == v.rule_id) {
                Some(g) => g.violations.push(v.clone()),
                None => unlocated.push(Group {
                    rule_id: v.rule_id.clone(),
                    violations: vec![v.clone()],
                }),
            }
            continue;
        }
        let idx = *file_index.entry(v.file.clone()).or_insert_with(|| {
            files.push((v.file.clone(), Vec::new()));
            files.len() - 1
        });
        let groups = &mut files[idx].1;
        match groups.iter_mut().find(|g| g.rule_id == v.rule_id) {
            Some(g) => g.violations.push(v.clone()),
            None => groups.push(Group {
                rule_id: v.rule_id.clone(),
                violations: vec![v.clone()],
            }),
        }
    }

    for g in unlocated {
        let file = g.violations.first().map(|v| v.file.clone()).unwrap_or_default();
        failures.push(ProposalFailure {
            rule_id: g.rule_id,
            file,
            reason: "violation has no concrete file location".to_string(),
        });
    }
    files
}

async fn propose_file(
    file: &str,
    content: String,
    groups: &[Group],
    strategies: &[Box<dyn FixStrategy>],
    model: Option<Arc<dyn SemanticModel>>,
    semaphore: &Semaphore,
    timeout: Duration,
) -> Vec<GroupResult> {
    let mut current = content;
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        let result = propose_group(file, &current, group, strategies, model.as_deref(), semaphore, timeout).await;
        if let GroupResult::Fix(d) = &result {
            current = d.proposed.clone();
        }
        out.push(result);
    }
    out
}

async fn propose_group(
    file: &str,
    current: &str,
    group: &Group,
    strategies: &[Box<dyn FixStrategy>],
    model: Option<&dyn SemanticModel>,
    semaphore: &Semaphore,
    timeout: Duration,
) -> GroupResult {
    let refs: Vec<&Violation> = group.violations.iter().collect();
    let first = &group.violations[0];
    let draft = |proposed: String, explanation: String, auxiliary, origin| Draft {
        rule_id: group.rule_id.clone(),
        category: first.category,
        severity: group.violations.iter().map(|v| v.severity).min().unwrap_or(first.severity),
        line: group.violations.iter().filter_map(|v| v.line).min(),
        original: current.to_string(),
        proposed,
        explanation,
        auxiliary,
        origin,
        count: group.violations.len() as u32,
    };

    if let Some(strategy) = strategies.iter().find(|s| s.rules().contains(&group.rule_id.as_str()))
        && let Some(edit) = strategy.rewrite(current, &refs)
        && edit.content != current
    {
        debug!(strategy = strategy.key(), rule = %group.rule_id, "strategy produced a fix");
        return GroupResult::Fix(draft(edit.content, edit.explanation, edit.auxiliary, FixOrigin::Strategy));
    }

    let Some(model) = model else {
        return GroupResult::Failed {
            reason: "no deterministic strategy and no semantic model configured".to_string(),
            unavailable: true,
        };
    };

    let prompt = fix_prompt(file, current, group);
    let reply = {
        let _permit = match semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => {
                return GroupResult::Failed {
                    reason: "proposal cancelled".to_string(),
                    unavailable: true,
                };
            }
        };
        tokio::time::timeout(timeout, model.generate(&prompt)).await
    };

    let text = match reply {
        Err(_) => {
            return GroupResult::Failed {
                reason: format!("semantic model timed out after {}s", timeout.as_secs()),
                unavailable: true,
            };
        }
        Ok(Err(e)) => {
            let unavailable = matches!(e, ModelError::Unavailable(_) | ModelError::NotConfigured);
            return GroupResult::Failed {
                reason: e.to_string(),
                unavailable,
            };
        }
        Ok(Ok(t)) => t,
    };

    let mut proposed = strip_code_fences(&text);
    if current.ends_with('\n') && !proposed.ends_with('\n') {
        proposed.push('\n');
    }
    if proposed.trim().is_empty() || proposed == current {
        return GroupResult::Failed {
            reason: "semantic model suggestion was empty or unchanged".to_string(),
            unavailable: false,
        };
    }

    let explanation = format!(
        "Suggested by the semantic model ({}) for {} `{}` violation(s): {}",
        model.name(),
        group.violations.len(),
        group.rule_id,
        first.message
    );
    GroupResult::Fix(draft(proposed, explanation, Vec::new(), FixOrigin::Model))
}

fn fix_prompt(file: &str, content: &str, group: &Group) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are fixing API governance violations.\n");
    prompt.push_str(&format!("File: {file}\nRule: {}\nViolations:\n", group.rule_id));
    for v in &group.violations {
        match v.line {
            Some(l) => prompt.push_str(&format!("- line {l}: {}\n", v.message)),
            None => prompt.push_str(&format!("- {}\n", v.message)),
        }
    }
    prompt.push_str(
        "\nReturn the complete corrected file content and nothing else. \
         Change only what the violations require.\n\n",
    );
    let body: String = content.chars().take(MAX_PROMPT_FILE).collect();
    prompt.push_str("```\n");
    prompt.push_str(&body);
    if !body.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("```\n");
    prompt
}
