//! Fix sessions and the exclusive per-project session lock.
//!
//! A session is durable: every change is written to
//! `fix-session/review-state.json`, so separate invocations (or an external
//! driver) can resume it. The lock file lives next to the artifacts and is
//! held until the session closes or is abandoned.

use crate::error::{CoreError, CoreResult};
use crate::settings::Settings;
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use fs_err as fs;
use govfix_edit::write_atomic;
use govfix_engines::process::process_alive;
use govfix_render::render_review_report_md;
use govfix_types::fix::{FixStatus, ProposedFix};
use govfix_types::scan::ScanResult;
use govfix_types::schema;
use govfix_types::session::{
    BaselineRef, FixEntry, LockInfo, ReviewComment, ReviewDecision, ReviewSummary, Selector,
    SessionRecord, SessionState, SessionSummary,
};
use std::io::{ErrorKind, Write};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const REVIEW_STATE_FILE: &str = "review-state.json";
pub const REVIEW_REPORT_FILE: &str = "review-report.md";
/// The scan the session was proposed against, kept for validation.
pub const BASELINE_SCAN_FILE: &str = "baseline-scan.json";

/// Exclusive claim on a project's fix session.
#[derive(Debug)]
pub struct SessionLock {
    path: Utf8PathBuf,
    info: LockInfo,
}

impl SessionLock {
    /// Create the lock file, failing with `SessionConflict` if it exists.
    pub fn acquire(path: &Utf8Path, session_id: Uuid) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create artifact dir")?;
        }
        let info = LockInfo {
            session_id,
            pid: std::process::id(),
            created_at: Utc::now(),
        };
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = Self::read(path)
                    .ok()
                    .flatten()
                    .map(|i| i.session_id)
                    .unwrap_or_else(Uuid::nil);
                return Err(CoreError::SessionConflict { holder });
            }
            Err(e) => return Err(anyhow::Error::new(e).context("create session lock").into()),
        };
        let json = serde_json::to_vec_pretty(&info).context("serialize lock")?;
        file.write_all(&json).context("write session lock")?;
        debug!(path = %path, session = %session_id, "session lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    /// Re-attach to a lock this session already holds.
    pub fn adopt(path: &Utf8Path, session_id: Uuid) -> CoreResult<Self> {
        match Self::read(path)? {
            None => Err(CoreError::NoActiveSession),
            Some(info) if info.session_id == session_id => Ok(Self {
                path: path.to_path_buf(),
                info,
            }),
            Some(info) => Err(CoreError::SessionConflict {
                holder: info.session_id,
            }),
        }
    }

    pub fn read(path: &Utf8Path) -> anyhow::Result<Option<LockInfo>> {
        match fs::read_to_string(path) {
            Ok(s) => Ok(Some(serde_json::from_str(&s).context("parse session lock")?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("read session lock"),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.info.session_id
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Remove the lock file whoever holds it.
    pub fn force_release(path: &Utf8Path) -> anyhow::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("remove session lock"),
        }
    }

    /// Remove the lock file if it is still ours.
    pub fn release(self) -> anyhow::Result<()> {
        match Self::read(&self.path) {
            Ok(Some(info)) if info.session_id != self.info.session_id => {
                warn!(path = %self.path, holder = %info.session_id, "lock now held by another session; leaving it");
                return Ok(());
            }
            Ok(None) => return Ok(()),
            _ => {}
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("remove session lock"),
        }
        debug!(path = %self.path, session = %self.info.session_id, "session lock released");
        Ok(())
    }
}

/// What `FixSession::abandon_project` released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Abandonment {
    /// The active session, with the fixes it left applied on disk.
    Session { session_id: Uuid, applied: Vec<String> },
    /// A lock with no matching active record, left by an interrupted run.
    OrphanedLock { holder: Uuid },
}

/// The live session: the record plus the lock that guards it.
#[derive(Debug)]
pub struct FixSession {
    record: SessionRecord,
    lock: Option<SessionLock>,
    dir: Utf8PathBuf,
}

fn read_record(dir: &Utf8Path) -> anyhow::Result<Option<SessionRecord>> {
    let path = dir.join(REVIEW_STATE_FILE);
    match fs::read_to_string(&path) {
        Ok(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("parse {path}"))?,
        )),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {path}")),
    }
}

impl FixSession {
    /// Open a new session over a proposal batch. The lock must already be held.
    pub fn start(
        settings: &Settings,
        lock: SessionLock,
        selector: Selector,
        baseline: &ScanResult,
        fixes: Vec<ProposedFix>,
    ) -> CoreResult<Self> {
        let now = Utc::now();
        let dir = settings.session_dir();
        fs::create_dir_all(&dir).context("create session dir")?;
        let snapshot = dir.join(BASELINE_SCAN_FILE);
        let json = serde_json::to_string_pretty(baseline).context("serialize baseline")?;
        write_atomic(&snapshot, &json).with_context(|| format!("write {snapshot}"))?;
        let fixes = fixes
            .into_iter()
            .map(|fix| FixEntry {
                fix,
                status: FixStatus::Proposed,
                decision: ReviewDecision::Pending,
                comments: Vec::new(),
                last_error: None,
                checkpoint_id: None,
                updated_at: now,
            })
            .collect();
        let record = SessionRecord {
            schema: schema::GOVFIX_SESSION_V1.to_string(),
            session_id: lock.session_id(),
            project: settings.project.clone(),
            created_at: now,
            state: SessionState::Active,
            selector,
            baseline: BaselineRef {
                scanned_at: baseline.scanned_at,
                total: baseline.total() as u64,
            },
            fixes,
            checkpoints: Vec::new(),
            summary: SessionSummary::default(),
            review: ReviewSummary::default(),
        };
        let mut session = Self {
            record,
            lock: Some(lock),
            dir,
        };
        session.persist()?;
        info!(session = %session.id(), fixes = session.record.fixes.len(), "fix session started");
        Ok(session)
    }

    /// Resume the project's active session.
    pub fn resume(settings: &Settings) -> CoreResult<Self> {
        let dir = settings.session_dir();
        let Some(holder) = SessionLock::read(&settings.lock_path())? else {
            return Err(CoreError::NoActiveSession);
        };
        let Some(record) = read_record(&dir)? else {
            return Err(CoreError::NoActiveSession);
        };
        if record.state != SessionState::Active {
            return Err(CoreError::NoActiveSession);
        }
        if record.session_id != holder.session_id {
            return Err(CoreError::SessionConflict {
                holder: holder.session_id,
            });
        }
        let lock = SessionLock::adopt(&settings.lock_path(), record.session_id)?;
        Ok(Self {
            record,
            lock: Some(lock),
            dir,
        })
    }

    /// Re-activate the most recent closed session, taking the lock again.
    pub fn reopen(settings: &Settings) -> CoreResult<Self> {
        let dir = settings.session_dir();
        let Some(mut record) = read_record(&dir)? else {
            return Err(CoreError::NoActiveSession);
        };
        if record.state == SessionState::Active {
            return Self::resume(settings);
        }
        let lock = SessionLock::acquire(&settings.lock_path(), record.session_id)?;
        record.state = SessionState::Active;
        let mut session = Self {
            record,
            lock: Some(lock),
            dir,
        };
        session.persist()?;
        Ok(session)
    }

    /// The baseline snapshot of the last session, if one was started.
    pub fn load_baseline(settings: &Settings) -> anyhow::Result<Option<ScanResult>> {
        let path = settings.session_dir().join(BASELINE_SCAN_FILE);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(
                serde_json::from_str(&s).with_context(|| format!("parse {path}"))?,
            )),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {path}")),
        }
    }

    /// The persisted record, if any, without touching the lock.
    pub fn load_record(settings: &Settings) -> anyhow::Result<Option<SessionRecord>> {
        read_record(&settings.session_dir())
    }

    pub fn id(&self) -> Uuid {
        self.record.session_id
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn project(&self) -> &Utf8Path {
        &self.record.project
    }

    pub fn is_active(&self) -> bool {
        self.record.state == SessionState::Active && self.lock.is_some()
    }

    pub(crate) fn record_mut(&mut self) -> &mut SessionRecord {
        &mut self.record
    }

    pub fn index_of(&self, fix_id: &str) -> CoreResult<usize> {
        self.record
            .fixes
            .iter()
            .position(|e| e.fix.fix_id == fix_id)
            .ok_or_else(|| CoreError::UnknownFix(fix_id.to_string()))
    }

    pub fn entry(&self, fix_id: &str) -> CoreResult<&FixEntry> {
        let i = self.index_of(fix_id)?;
        Ok(&self.record.fixes[i])
    }

    pub(crate) fn set_status(&mut self, index: usize, status: FixStatus) {
        let e = &mut self.record.fixes[index];
        e.status = status;
        e.updated_at = Utc::now();
    }

    fn recount(&mut self) {
        let mut s = SessionSummary {
            total: self.record.fixes.len() as u64,
            ..SessionSummary::default()
        };
        let mut r = ReviewSummary {
            total: self.record.fixes.len() as u64,
            ..ReviewSummary::default()
        };
        for e in &self.record.fixes {
            match e.status {
                FixStatus::Proposed => s.proposed += 1,
                FixStatus::Previewed => s.previewed += 1,
                FixStatus::Applied => s.applied += 1,
                FixStatus::Committed => s.committed += 1,
                FixStatus::RolledBack => s.rolled_back += 1,
            }
            match e.decision {
                ReviewDecision::Pending => r.pending += 1,
                ReviewDecision::Approved => r.approved += 1,
                ReviewDecision::Rejected => r.rejected += 1,
                ReviewDecision::Skipped => r.skipped += 1,
            }
        }
        self.record.summary = s;
        self.record.review = r;
    }

    /// Write `review-state.json` and `review-report.md`.
    pub fn persist(&mut self) -> CoreResult<()> {
        self.recount();
        let json = serde_json::to_string_pretty(&self.record).context("serialize session")?;
        let state = self.dir.join(REVIEW_STATE_FILE);
        write_atomic(&state, &json).with_context(|| format!("write {state}"))?;
        let report = self.dir.join(REVIEW_REPORT_FILE);
        write_atomic(&report, &render_review_report_md(&self.record))
            .with_context(|| format!("write {report}"))?;
        debug!(path = %state, "session persisted");
        Ok(())
    }

    /// Close once nothing is left APPLIED: leftover proposals are discarded
    /// and the lock is released. Returns whether the session closed.
    pub fn close_if_settled(&mut self) -> CoreResult<bool> {
        if self.record.fixes.iter().any(|e| e.status == FixStatus::Applied) {
            return Ok(false);
        }
        for i in 0..self.record.fixes.len() {
            if !self.record.fixes[i].status.is_terminal() {
                self.set_status(i, FixStatus::RolledBack);
            }
        }
        self.record.state = SessionState::Closed;
        self.persist()?;
        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }
        info!(session = %self.id(), "fix session closed");
        Ok(true)
    }

    /// Release the lock without touching files. Returns the fixes still applied.
    pub fn abandon(&mut self) -> CoreResult<Vec<String>> {
        let applied: Vec<String> = self
            .record
            .fixes
            .iter()
            .filter(|e| e.status == FixStatus::Applied)
            .map(|e| e.fix.fix_id.clone())
            .collect();
        if !applied.is_empty() {
            warn!(fixes = ?applied, "abandoning session with applied fixes left on disk");
        }
        self.record.state = SessionState::Abandoned;
        self.persist()?;
        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }
        Ok(applied)
    }

    /// Abandon the active session, or clear a lock no active session owns.
    ///
    /// An orphaned lock whose process is still running is only cleared with
    /// `force`, since that process may be about to start its session.
    pub fn abandon_project(settings: &Settings, force: bool) -> CoreResult<Abandonment> {
        match Self::resume(settings) {
            Ok(mut session) => {
                let applied = session.abandon()?;
                return Ok(Abandonment::Session {
                    session_id: session.id(),
                    applied,
                });
            }
            Err(CoreError::NoActiveSession | CoreError::SessionConflict { .. }) => {}
            Err(e) => return Err(e),
        }

        let path = settings.lock_path();
        let Some(info) = SessionLock::read(&path)? else {
            return Err(CoreError::NoActiveSession);
        };
        if !force && info.pid != std::process::id() && process_alive(info.pid) {
            return Err(CoreError::SessionConflict {
                holder: info.session_id,
            });
        }
        SessionLock::force_release(&path)?;
        warn!(holder = %info.session_id, pid = info.pid, "cleared orphaned session lock");
        Ok(Abandonment::OrphanedLock {
            holder: info.session_id,
        })
    }

    fn review_index(&self, fix_id: &str, op: &'static str) -> CoreResult<usize> {
        let i = self.index_of(fix_id)?;
        let status = self.record.fixes[i].status;
        if status.is_terminal() {
            return Err(CoreError::InvalidTransition {
                fix_id: fix_id.to_string(),
                from: status,
                op,
            });
        }
        Ok(i)
    }

    fn decide(
        &mut self,
        fix_id: &str,
        decision: ReviewDecision,
        comment: Option<&str>,
        op: &'static str,
    ) -> CoreResult<()> {
        let i = self.review_index(fix_id, op)?;
        let now = Utc::now();
        let e = &mut self.record.fixes[i];
        e.decision = decision;
        e.updated_at = now;
        if let Some(c) = comment.map(str::trim).filter(|c| !c.is_empty()) {
            e.comments.push(ReviewComment {
                comment: c.to_string(),
                timestamp: now,
            });
        }
        debug!(fix_id, decision = decision.as_str(), "review decision");
        self.persist()
    }

    pub fn approve(&mut self, fix_id: &str, comment: Option<&str>) -> CoreResult<()> {
        self.decide(fix_id, ReviewDecision::Approved, comment, "approve")
    }

    pub fn reject(&mut self, fix_id: &str, comment: Option<&str>) -> CoreResult<()> {
        self.decide(fix_id, ReviewDecision::Rejected, comment, "reject")
    }

    pub fn skip(&mut self, fix_id: &str, comment: Option<&str>) -> CoreResult<()> {
        self.decide(fix_id, ReviewDecision::Skipped, comment, "skip")
    }

    pub fn comment(&mut self, fix_id: &str, comment: &str) -> CoreResult<()> {
        let i = self.index_of(fix_id)?;
        let now = Utc::now();
        let e = &mut self.record.fixes[i];
        e.comments.push(ReviewComment {
            comment: comment.trim().to_string(),
            timestamp: now,
        });
        e.updated_at = now;
        self.persist()
    }

    fn decide_pending(&mut self, decision: ReviewDecision, only_changing: bool) -> CoreResult<usize> {
        let now = Utc::now();
        let mut n = 0;
        for e in &mut self.record.fixes {
            if e.status.is_terminal() || e.decision != ReviewDecision::Pending {
                continue;
            }
            if only_changing && !e.fix.changes_content() {
                continue;
            }
            e.decision = decision;
            e.updated_at = now;
            n += 1;
        }
        self.persist()?;
        Ok(n)
    }

    /// Approve every pending fix. Returns how many changed.
    pub fn approve_all(&mut self) -> CoreResult<usize> {
        self.decide_pending(ReviewDecision::Approved, false)
    }

    /// Approve pending fixes whose proposed content differs from the original.
    pub fn approve_safe_only(&mut self) -> CoreResult<usize> {
        self.decide_pending(ReviewDecision::Approved, true)
    }

    pub fn reject_all(&mut self) -> CoreResult<usize> {
        self.decide_pending(ReviewDecision::Rejected, false)
    }
}
