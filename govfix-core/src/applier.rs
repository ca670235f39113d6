//! The fix lifecycle: PROPOSED → PREVIEWED → APPLIED → {COMMITTED, ROLLED_BACK}.
//!
//! The applier borrows fixes from the session by id; the session stays the
//! only owner of fix content. Writes to one path are serialized through a
//! lock registry, and every state change is persisted before returning.

use crate::adapters::{GitCheckpointer, RecordCheckpointer};
use crate::error::{CoreError, CoreResult};
use crate::ports::{CheckpointRequest, Checkpointer};
use crate::session::FixSession;
use crate::settings::Settings;
use camino::Utf8Path;
use chrono::Utc;
use govfix_edit::{EditError, FileLocks, check_fresh, render_diff, replace_content, sha256_hex};
use govfix_types::fix::{FixOutcome, FixStatus, OutcomeError};
use govfix_types::session::{Checkpoint, Selector};
use govfix_types::violation::Severity;
use tracing::{debug, info, warn};

pub const STALE_FIX: &str = "stale_fix";
pub const PARTIAL_APPLY_FAILURE: &str = "partial_apply_failure";

fn outcome_error(e: &EditError) -> OutcomeError {
    OutcomeError {
        code: if e.is_stale() { STALE_FIX } else { PARTIAL_APPLY_FAILURE }.to_string(),
        message: e.to_string(),
    }
}

pub struct FixApplier {
    locks: FileLocks,
    checkpointer: Box<dyn Checkpointer>,
}

impl std::fmt::Debug for FixApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixApplier").finish_non_exhaustive()
    }
}

impl FixApplier {
    pub fn new(checkpointer: Box<dyn Checkpointer>) -> Self {
        Self {
            locks: FileLocks::new(),
            checkpointer,
        }
    }

    /// Git commits when enabled in settings, record-only checkpoints otherwise.
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.git_commits {
            Self::new(Box::new(GitCheckpointer))
        } else {
            Self::new(Box::new(RecordCheckpointer))
        }
    }

    fn transition_error(session: &FixSession, index: usize, op: &'static str) -> CoreError {
        let e = &session.record().fixes[index];
        CoreError::InvalidTransition {
            fix_id: e.fix.fix_id.clone(),
            from: e.status,
            op,
        }
    }

    /// Unified diff of the fix. PROPOSED becomes PREVIEWED; PREVIEWED stays.
    pub fn preview(&self, session: &mut FixSession, fix_id: &str) -> CoreResult<String> {
        let i = session.index_of(fix_id)?;
        match session.record().fixes[i].status {
            FixStatus::Proposed => {
                session.set_status(i, FixStatus::Previewed);
                session.persist()?;
            }
            FixStatus::Previewed => {}
            _ => return Err(Self::transition_error(session, i, "preview")),
        }
        let f = &session.record().fixes[i].fix;
        Ok(render_diff(&f.file_path, &f.original_content, &f.proposed_content))
    }

    /// Preview every fix not yet applied. Returns the previewed ids.
    pub fn preview_pending(&self, session: &mut FixSession) -> CoreResult<Vec<String>> {
        let ids: Vec<String> = session
            .record()
            .fixes
            .iter()
            .filter(|e| matches!(e.status, FixStatus::Proposed | FixStatus::Previewed))
            .map(|e| e.fix.fix_id.clone())
            .collect();
        for id in &ids {
            self.preview(session, id)?;
        }
        Ok(ids)
    }

    async fn apply_index(&self, session: &mut FixSession, i: usize) -> CoreResult<FixOutcome> {
        let result = {
            let e = &session.record().fixes[i];
            let path = Utf8Path::new(&e.fix.file_path);
            let _guard = self.locks.lock(path).await;
            replace_content(
                session.project(),
                path,
                &e.fix.original_content,
                &e.fix.proposed_content,
            )
        };

        let fix_id = session.record().fixes[i].fix.fix_id.clone();
        let outcome = match result {
            Ok(w) => {
                session.set_status(i, FixStatus::Applied);
                session.record_mut().fixes[i].last_error = None;
                info!(fix_id = %fix_id, path = %w.path, "fix applied");
                FixOutcome::ok(fix_id, FixStatus::Applied)
            }
            Err(e) => {
                let err = outcome_error(&e);
                warn!(fix_id = %fix_id, code = %err.code, "fix not applied: {e}");
                let status = session.record().fixes[i].status;
                let entry = &mut session.record_mut().fixes[i];
                entry.last_error = Some(err.clone());
                entry.updated_at = Utc::now();
                FixOutcome {
                    fix_id,
                    status,
                    error: Some(err),
                }
            }
        };
        session.persist()?;
        Ok(outcome)
    }

    /// Write one fix. A stale target or failed write comes back as a failed
    /// outcome with the fix left un-applied.
    pub async fn apply(&self, session: &mut FixSession, fix_id: &str) -> CoreResult<FixOutcome> {
        let i = session.index_of(fix_id)?;
        if !matches!(
            session.record().fixes[i].status,
            FixStatus::Proposed | FixStatus::Previewed
        ) {
            return Err(Self::transition_error(session, i, "apply"));
        }
        self.apply_index(session, i).await
    }

    /// Apply every matching, not-rejected fix in session order. One fix
    /// failing never blocks the others.
    pub async fn apply_all(
        &self,
        session: &mut FixSession,
        selector: &Selector,
    ) -> CoreResult<Vec<FixOutcome>> {
        let targets: Vec<usize> = session
            .record()
            .fixes
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matches!(e.status, FixStatus::Proposed | FixStatus::Previewed)
                    && e.decision != govfix_types::session::ReviewDecision::Rejected
                    && selector.matches_fix(&e.fix)
            })
            .map(|(i, _)| i)
            .collect();
        debug!(selector = %selector, fixes = targets.len(), "applying batch");

        let mut outcomes = Vec::with_capacity(targets.len());
        for i in targets {
            outcomes.push(self.apply_index(session, i).await?);
        }
        Ok(outcomes)
    }

    async fn rollback_index(&self, session: &mut FixSession, i: usize) -> CoreResult<FixOutcome> {
        let fix_id = session.record().fixes[i].fix.fix_id.clone();
        match session.record().fixes[i].status {
            FixStatus::Proposed | FixStatus::Previewed => {
                session.set_status(i, FixStatus::RolledBack);
                session.persist()?;
                debug!(fix_id = %fix_id, "discarded unapplied fix");
                return Ok(FixOutcome::ok(fix_id, FixStatus::RolledBack));
            }
            FixStatus::Applied => {}
            _ => return Err(Self::transition_error(session, i, "rollback")),
        }

        let result = {
            let e = &session.record().fixes[i];
            let path = Utf8Path::new(&e.fix.file_path);
            let _guard = self.locks.lock(path).await;
            replace_content(
                session.project(),
                path,
                &e.fix.proposed_content,
                &e.fix.original_content,
            )
        };
        let outcome = match result {
            Ok(_) => {
                session.set_status(i, FixStatus::RolledBack);
                session.record_mut().fixes[i].last_error = None;
                info!(fix_id = %fix_id, "fix rolled back");
                FixOutcome::ok(fix_id, FixStatus::RolledBack)
            }
            Err(e) => {
                let err = outcome_error(&e);
                warn!(fix_id = %fix_id, code = %err.code, "rollback failed: {e}");
                session.record_mut().fixes[i].last_error = Some(err.clone());
                FixOutcome {
                    fix_id,
                    status: FixStatus::Applied,
                    error: Some(err),
                }
            }
        };
        session.persist()?;
        Ok(outcome)
    }

    /// Undo one uncommitted fix. Closes the session if that left nothing applied.
    pub async fn rollback(&self, session: &mut FixSession, fix_id: &str) -> CoreResult<FixOutcome> {
        let i = session.index_of(fix_id)?;
        let was_applied = session.record().fixes[i].status == FixStatus::Applied;
        let outcome = self.rollback_index(session, i).await?;
        if was_applied && outcome.status == FixStatus::RolledBack {
            session.close_if_settled()?;
        }
        Ok(outcome)
    }

    /// Undo every uncommitted fix, newest first, then close the session.
    pub async fn rollback_all(&self, session: &mut FixSession) -> CoreResult<Vec<FixOutcome>> {
        let targets: Vec<usize> = session
            .record()
            .fixes
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.status.is_terminal())
            .map(|(i, _)| i)
            .rev()
            .collect();
        let mut outcomes = Vec::with_capacity(targets.len());
        for i in targets {
            outcomes.push(self.rollback_index(session, i).await?);
        }
        session.close_if_settled()?;
        Ok(outcomes)
    }

    fn checkpoint_indices(
        &self,
        session: &mut FixSession,
        rule_id: &str,
        indices: &[usize],
        committed_so_far: &[String],
    ) -> CoreResult<Checkpoint> {
        let record = session.record();
        let mut files: Vec<String> = Vec::new();
        let mut violations = 0u32;
        let mut critical = false;
        for &i in indices {
            let f = &record.fixes[i].fix;
            if !files.contains(&f.file_path) {
                files.push(f.file_path.clone());
            }
            violations += f.violations;
            critical |= f.severity == Severity::Critical;
        }
        let kind = if critical { "fix" } else { "refactor" };
        let mut message = format!("{kind}(governance): [{rule_id}] Fix {violations} violation(s)\n\n");
        for f in &files {
            message.push_str(&format!("- {f}\n"));
        }

        let request = CheckpointRequest {
            rule_id,
            message,
            files: &files,
        };
        let commit_ref = self
            .checkpointer
            .checkpoint(session.project(), &request)
            .map_err(|e| CoreError::Checkpoint {
                rule_id: rule_id.to_string(),
                committed_so_far: committed_so_far.to_vec(),
                detail: format!("{e:#}"),
            })?;

        let id = format!("cp-{:04}", record.checkpoints.len() + 1);
        let checkpoint = Checkpoint {
            id: id.clone(),
            rule_id: rule_id.to_string(),
            fix_ids: indices.iter().map(|&i| record.fixes[i].fix.fix_id.clone()).collect(),
            files,
            commit_ref,
            created_at: Utc::now(),
            reverted: false,
            reverts: None,
        };
        for &i in indices {
            session.set_status(i, FixStatus::Committed);
            session.record_mut().fixes[i].checkpoint_id = Some(id.clone());
        }
        session.record_mut().checkpoints.push(checkpoint.clone());
        session.persist()?;
        info!(checkpoint = %id, rule = %rule_id, fixes = indices.len(), "checkpoint created");
        Ok(checkpoint)
    }

    fn commit_indices(&self, session: &mut FixSession, indices: Vec<usize>) -> CoreResult<Vec<Checkpoint>> {
        let mut by_rule: Vec<(String, Vec<usize>)> = Vec::new();
        for i in indices {
            let rule = session.record().fixes[i].fix.rule_id.clone();
            match by_rule.iter_mut().find(|(r, _)| *r == rule) {
                Some((_, v)) => v.push(i),
                None => by_rule.push((rule, vec![i])),
            }
        }

        let mut created: Vec<Checkpoint> = Vec::new();
        for (rule, idx) in by_rule {
            let so_far: Vec<String> = created.iter().map(|c| c.id.clone()).collect();
            created.push(self.checkpoint_indices(session, &rule, &idx, &so_far)?);
        }
        if !created.is_empty() {
            session.close_if_settled()?;
        }
        Ok(created)
    }

    /// One checkpoint per rule over the applied fixes matching `selector`.
    pub fn commit(&self, session: &mut FixSession, selector: &Selector) -> CoreResult<Vec<Checkpoint>> {
        let indices: Vec<usize> = session
            .record()
            .fixes
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == FixStatus::Applied && selector.matches_fix(&e.fix))
            .map(|(i, _)| i)
            .collect();
        self.commit_indices(session, indices)
    }

    /// Checkpoint a single applied fix.
    pub fn commit_fix(&self, session: &mut FixSession, fix_id: &str) -> CoreResult<Checkpoint> {
        let i = session.index_of(fix_id)?;
        if session.record().fixes[i].status != FixStatus::Applied {
            return Err(Self::transition_error(session, i, "commit"));
        }
        let mut created = self.commit_indices(session, vec![i])?;
        created
            .pop()
            .ok_or_else(|| CoreError::Internal(anyhow::anyhow!("commit produced no checkpoint")))
    }

    /// Write a fix's original content back (`forward == false`) or its
    /// proposed content again (`forward == true`).
    async fn swap_content(&self, session: &FixSession, i: usize, forward: bool) -> Result<(), EditError> {
        let e = &session.record().fixes[i];
        let path = Utf8Path::new(&e.fix.file_path);
        let (from, to) = if forward {
            (&e.fix.original_content, &e.fix.proposed_content)
        } else {
            (&e.fix.proposed_content, &e.fix.original_content)
        };
        let _guard = self.locks.lock(path).await;
        replace_content(session.project(), path, from, to).map(|_| ())
    }

    /// Put back fixes a failed revert already restored, oldest first. A fix
    /// that cannot be re-applied is recorded ROLLED_BACK, which matches disk.
    async fn reapply(&self, session: &mut FixSession, restored: &[usize]) -> CoreResult<()> {
        for &i in restored.iter().rev() {
            if let Err(e) = self.swap_content(session, i, true).await {
                let fix_id = session.record().fixes[i].fix.fix_id.clone();
                warn!(fix_id = %fix_id, "could not re-apply after failed revert: {e}");
                session.record_mut().fixes[i].last_error = Some(outcome_error(&e));
                session.set_status(i, FixStatus::RolledBack);
            }
        }
        session.persist()
    }

    /// Explicitly reverse a committed checkpoint: verify, restore newest
    /// first, record the reversal and mark its fixes ROLLED_BACK.
    pub async fn revert_checkpoint(
        &self,
        session: &mut FixSession,
        checkpoint_id: &str,
    ) -> CoreResult<Checkpoint> {
        let Some(cp_index) = session
            .record()
            .checkpoints
            .iter()
            .position(|c| c.id == checkpoint_id)
        else {
            return Err(CoreError::UnknownCheckpoint(checkpoint_id.to_string()));
        };
        let cp = session.record().checkpoints[cp_index].clone();

        let mut indices = Vec::with_capacity(cp.fix_ids.len());
        for id in &cp.fix_ids {
            let i = session.index_of(id)?;
            if session.record().fixes[i].status != FixStatus::Committed {
                return Err(Self::transition_error(session, i, "revert"));
            }
            indices.push(i);
        }
        indices.sort_unstable();

        // The newest fix per file must still be what is on disk.
        for file in &cp.files {
            let Some(&last) = indices
                .iter()
                .rev()
                .find(|&&i| session.record().fixes[i].fix.file_path == *file)
            else {
                continue;
            };
            let expected = sha256_hex(session.record().fixes[last].fix.proposed_content.as_bytes());
            if check_fresh(session.project(), Utf8Path::new(file), &expected).is_err() {
                return Err(CoreError::StaleCheckpoint {
                    checkpoint_id: checkpoint_id.to_string(),
                    path: file.clone(),
                });
            }
        }

        let mut restored: Vec<usize> = Vec::with_capacity(indices.len());
        for &i in indices.iter().rev() {
            if let Err(e) = self.swap_content(session, i, false).await {
                let path = session.record().fixes[i].fix.file_path.clone();
                warn!(checkpoint = %checkpoint_id, path = %path, "revert failed: {e}");
                self.reapply(session, &restored).await?;
                return Err(CoreError::RevertFailed {
                    checkpoint_id: checkpoint_id.to_string(),
                    path,
                    detail: e.to_string(),
                });
            }
            restored.push(i);
        }
        for &i in &restored {
            session.set_status(i, FixStatus::RolledBack);
        }

        let mut message = format!(
            "revert(governance): [{}] Revert checkpoint {}\n\n",
            cp.rule_id, cp.id
        );
        for f in &cp.files {
            message.push_str(&format!("- {f}\n"));
        }
        let request = CheckpointRequest {
            rule_id: &cp.rule_id,
            message,
            files: &cp.files,
        };
        let commit_ref = self
            .checkpointer
            .checkpoint(session.project(), &request)
            .map_err(|e| CoreError::Checkpoint {
                rule_id: cp.rule_id.clone(),
                committed_so_far: Vec::new(),
                detail: format!("{e:#}"),
            })?;

        let revert = Checkpoint {
            id: format!("cp-{:04}", session.record().checkpoints.len() + 1),
            rule_id: cp.rule_id.clone(),
            fix_ids: cp.fix_ids.clone(),
            files: cp.files.clone(),
            commit_ref,
            created_at: Utc::now(),
            reverted: false,
            reverts: Some(cp.id.clone()),
        };
        let record = session.record_mut();
        record.checkpoints[cp_index].reverted = true;
        record.checkpoints.push(revert.clone());
        session.persist()?;
        info!(checkpoint = %cp.id, revert = %revert.id, "checkpoint reverted");
        session.close_if_settled()?;
        Ok(revert)
    }
}
