//! Concurrent multi-engine scans.

use crate::context::RunContext;
use crate::settings::Settings;
use camino::Utf8PathBuf;
use chrono::Utc;
use govfix_domain::violations::sort_canonical;
use govfix_engines::{Engine, EngineAdapter, EngineError, SemanticEngine, SemanticModel};
use govfix_types::scan::{ScanResult, SkipReason, SkippedEngine};
use govfix_types::violation::{EngineId, Violation};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, warn};

/// Fans a scan out to every configured engine and merges the results.
#[derive(Clone)]
pub struct ScanOrchestrator {
    adapters: Vec<Arc<dyn EngineAdapter>>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("engines", &self.engine_ids())
            .finish()
    }
}

enum EngineOutcome {
    Ran(Vec<Violation>),
    Skipped(SkippedEngine),
}

struct Finished {
    index: usize,
    at: Instant,
    outcome: EngineOutcome,
}

fn skipped(engine: EngineId, reason: SkipReason, detail: impl Into<String>) -> EngineOutcome {
    EngineOutcome::Skipped(SkippedEngine {
        engine,
        reason,
        detail: Some(detail.into()),
    })
}

async fn run_engine(adapter: Arc<dyn EngineAdapter>, target: Utf8PathBuf) -> EngineOutcome {
    let id = adapter.id();
    let limit = adapter.timeout();

    // Dropping the run future on timeout kills the engine's process group.
    let raw = match tokio::time::timeout(limit, adapter.run(&target)).await {
        Err(_) => {
            let err = EngineError::Timeout {
                engine: id,
                after: limit,
            };
            warn!(engine = %id, "{err}");
            return skipped(id, err.skip_reason(), err.detail());
        }
        Ok(Err(err)) => {
            warn!(engine = %id, reason = err.skip_reason().as_str(), "{err}");
            return skipped(id, err.skip_reason(), err.detail());
        }
        Ok(Ok(raw)) => raw,
    };

    match adapter.normalize(&target, &raw) {
        Ok(violations) => {
            debug!(engine = %id, count = violations.len(), "engine normalized");
            EngineOutcome::Ran(violations)
        }
        Err(err) => {
            warn!(engine = %id, detail = %err.detail, "dropping unparseable engine output");
            skipped(id, SkipReason::ParseError, err.detail)
        }
    }
}

impl ScanOrchestrator {
    pub fn new(adapters: Vec<Arc<dyn EngineAdapter>>) -> Self {
        Self { adapters }
    }

    /// The configured engines, in settings order.
    pub fn from_settings(settings: &Settings, model: Option<Arc<dyn SemanticModel>>) -> Self {
        let adapters = settings
            .engines
            .iter()
            .map(|id| -> Arc<dyn EngineAdapter> {
                match id {
                    EngineId::SchemaLint => Arc::new(Engine::SchemaLint(settings.schema_lint.clone())),
                    EngineId::Architecture => {
                        Arc::new(Engine::Architecture(settings.architecture.clone()))
                    }
                    EngineId::Semantic => Arc::new(Engine::Semantic(SemanticEngine {
                        model: model.clone(),
                        spec: settings.schema_lint.spec.clone(),
                        timeout: settings.semantic_timeout,
                    })),
                }
            })
            .collect();
        Self { adapters }
    }

    pub fn engine_ids(&self) -> Vec<EngineId> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    /// Run every configured engine (restricted to `filter` when given) concurrently.
    ///
    /// Engine failures become `engines_skipped` entries; they never fail the scan.
    pub async fn scan(&self, ctx: &RunContext, filter: Option<&[EngineId]>) -> ScanResult {
        let target = ctx.project().to_path_buf();
        let selected: Vec<Arc<dyn EngineAdapter>> = self
            .adapters
            .iter()
            .filter(|a| filter.is_none_or(|f| f.contains(&a.id())))
            .cloned()
            .collect();

        async {
            info!(engines = selected.len(), "scan started");
            let started = Instant::now();

            let handles: Vec<_> = selected
                .iter()
                .enumerate()
                .map(|(index, adapter)| {
                    let adapter = Arc::clone(adapter);
                    let target = target.clone();
                    let span = tracing::info_span!("engine", engine = %adapter.id());
                    tokio::spawn(
                        async move {
                            let outcome = run_engine(adapter, target).await;
                            Finished {
                                index,
                                at: Instant::now(),
                                outcome,
                            }
                        }
                        .instrument(span),
                    )
                })
                .collect();

            let mut finished = Vec::with_capacity(handles.len());
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(f) => finished.push(f),
                    Err(join) => {
                        let id = selected[index].id();
                        warn!(engine = %id, "engine task aborted: {join}");
                        finished.push(Finished {
                            index,
                            at: Instant::now(),
                            outcome: skipped(id, SkipReason::Failed, join.to_string()),
                        });
                    }
                }
            }

            let mut engines_run = Vec::new();
            let mut violations = Vec::new();
            let mut skips: Vec<(Instant, SkippedEngine)> = Vec::new();
            // `finished` is in configured order, so merging keeps that order.
            for f in finished {
                match f.outcome {
                    EngineOutcome::Ran(vs) => {
                        engines_run.push(selected[f.index].id());
                        violations.extend(vs);
                    }
                    EngineOutcome::Skipped(s) => skips.push((f.at, s)),
                }
            }
            skips.sort_by_key(|(at, _)| *at);

            for v in &mut violations {
                v.category = ctx.categories.category_for(&v.rule_id);
            }
            sort_canonical(&mut violations);

            let result = ScanResult {
                project: target.clone(),
                scanned_at: Utc::now(),
                engines_run,
                engines_skipped: skips.into_iter().map(|(_, s)| s).collect(),
                violations,
            };
            info!(
                total = result.total(),
                skipped = result.engines_skipped.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "scan finished"
            );
            result
        }
        .instrument(ctx.span.clone())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use camino::Utf8Path;
    use govfix_engines::{ParseError, RawOutput};
    use govfix_types::violation::{Category, Severity};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Stub {
        id: EngineId,
        delay: Duration,
        timeout: Duration,
        result: Result<Vec<Violation>, EngineError>,
        parse_fails: bool,
    }

    fn violation(engine: EngineId, rule: &str, file: &str, line: u32) -> Violation {
        Violation {
            rule_id: rule.to_string(),
            severity: Severity::Warning,
            message: format!("{rule} at {line}"),
            file: file.to_string(),
            line: Some(line),
            path: None,
            category: Category::Other,
            engine,
        }
    }

    fn stub(id: EngineId, violations: Vec<Violation>) -> Stub {
        Stub {
            id,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            result: Ok(violations),
            parse_fails: false,
        }
    }

    #[async_trait]
    impl EngineAdapter for Stub {
        fn id(&self) -> EngineId {
            self.id
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        async fn run(&self, _target: &Utf8Path) -> Result<RawOutput, EngineError> {
            tokio::time::sleep(self.delay).await;
            self.result.clone().map(|vs| RawOutput {
                engine: self.id,
                exit_code: Some(0),
                stdout: serde_json::to_string(&vs).unwrap(),
                stderr: String::new(),
                document: None,
            })
        }

        fn normalize(&self, _target: &Utf8Path, raw: &RawOutput) -> Result<Vec<Violation>, ParseError> {
            if self.parse_fails {
                return Err(ParseError::new(self.id, "not json"));
            }
            Ok(serde_json::from_str(&raw.stdout).unwrap())
        }
    }

    fn ctx() -> RunContext {
        RunContext::new(Settings::for_project("/work/demo"))
    }

    #[tokio::test]
    async fn merges_and_recategorizes_in_canonical_order() {
        let orch = ScanOrchestrator::new(vec![
            Arc::new(stub(
                EngineId::Architecture,
                vec![violation(EngineId::Architecture, "coding-no-std-streams", "A.java", 3)],
            )),
            Arc::new(stub(
                EngineId::SchemaLint,
                vec![
                    violation(EngineId::SchemaLint, "operation-description-required", "openapi.yaml", 9),
                    violation(EngineId::SchemaLint, "plural-resources", "openapi.yaml", 2),
                ],
            )),
        ]);
        let result = orch.scan(&ctx(), None).await;

        let rules: Vec<&str> = result.violations.iter().map(|v| v.rule_id.as_str()).collect();
        assert_eq!(
            rules,
            vec!["plural-resources", "coding-no-std-streams", "operation-description-required"]
        );
        assert_eq!(result.violations[0].category, Category::ResourceNaming);
        assert_eq!(result.engines_run, vec![EngineId::Architecture, EngineId::SchemaLint]);
        assert!(result.engines_skipped.is_empty());
    }

    #[tokio::test]
    async fn slow_engine_is_skipped_and_others_survive() {
        let slow = Stub {
            delay: Duration::from_secs(30),
            timeout: Duration::from_millis(50),
            ..stub(EngineId::Semantic, vec![violation(EngineId::Semantic, "x", "openapi.yaml", 1)])
        };
        let orch = ScanOrchestrator::new(vec![
            Arc::new(stub(
                EngineId::SchemaLint,
                vec![violation(EngineId::SchemaLint, "plural-resources", "openapi.yaml", 2)],
            )),
            Arc::new(slow),
        ]);
        let result = orch.scan(&ctx(), None).await;
        assert_eq!(result.total(), 1);
        assert_eq!(result.skipped_ids(), vec![EngineId::Semantic]);
        assert_eq!(result.engines_skipped[0].reason, SkipReason::Timeout);
    }

    #[tokio::test]
    async fn unavailable_and_unparseable_engines_are_recorded() {
        let missing = Stub {
            result: Err(EngineError::Unavailable {
                engine: EngineId::SchemaLint,
                detail: "spectral not found on PATH".into(),
            }),
            ..stub(EngineId::SchemaLint, vec![])
        };
        let garbled = Stub {
            parse_fails: true,
            ..stub(EngineId::Architecture, vec![violation(EngineId::Architecture, "r", "A.java", 1)])
        };
        let orch = ScanOrchestrator::new(vec![Arc::new(missing), Arc::new(garbled)]);
        let result = orch.scan(&ctx(), None).await;
        assert!(result.violations.is_empty());
        assert!(result.engines_run.is_empty());
        let reasons: Vec<SkipReason> = result.engines_skipped.iter().map(|s| s.reason).collect();
        assert_eq!(reasons.len(), 2);
        assert!(reasons.contains(&SkipReason::Unavailable));
        assert!(reasons.contains(&SkipReason::ParseError));
    }

    #[tokio::test]
    async fn filter_restricts_engines() {
        let orch = ScanOrchestrator::new(vec![
            Arc::new(stub(EngineId::SchemaLint, vec![violation(EngineId::SchemaLint, "a", "f", 1)])),
            Arc::new(stub(EngineId::Architecture, vec![violation(EngineId::Architecture, "b", "g", 1)])),
        ]);
        let result = orch.scan(&ctx(), Some(&[EngineId::Architecture])).await;
        assert_eq!(result.engines_run, vec![EngineId::Architecture]);
        assert_eq!(result.total(), 1);
    }

    #[tokio::test]
    async fn repeated_scans_are_content_equal() {
        let make = || {
            ScanOrchestrator::new(vec![
                Arc::new(Stub {
                    delay: Duration::from_millis(20),
                    ..stub(EngineId::SchemaLint, vec![
                        violation(EngineId::SchemaLint, "plural-resources", "openapi.yaml", 4),
                        violation(EngineId::SchemaLint, "plural-resources", "openapi.yaml", 2),
                    ])
                }) as Arc<dyn EngineAdapter>,
                Arc::new(stub(
                    EngineId::Architecture,
                    vec![violation(EngineId::Architecture, "layer-dependencies", "A.java", 1)],
                )),
            ])
        };
        let a = make().scan(&ctx(), None).await;
        let b = make().scan(&ctx(), None).await;
        assert_eq!(a.violations, b.violations);
        assert!(a.same_findings(&b));
    }

    #[test]
    fn builds_configured_engines_in_order() {
        let settings = Settings {
            engines: vec![EngineId::Semantic, EngineId::SchemaLint],
            ..Settings::default()
        };
        let orch = ScanOrchestrator::from_settings(&settings, None);
        assert_eq!(orch.engine_ids(), vec![EngineId::Semantic, EngineId::SchemaLint]);
    }
}
