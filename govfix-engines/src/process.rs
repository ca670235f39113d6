//! Subprocess execution with a time box.
//!
//! Children run in their own process group. A timeout, or dropping the
//! future, kills the whole group so build daemons and forked helpers do not
//! outlive the call.

use camino::Utf8Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut s = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !s.is_empty() && !s.ends_with('\n') {
                s.push('\n');
            }
            s.push_str(&self.stderr);
        }
        s
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("program not found: {program}")]
    NotFound { program: String },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("empty command line")]
    Empty,
}

/// Kills the child's process group unless disarmed.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid else { return };
        #[cfg(unix)]
        if let Ok(raw) = i32::try_from(pgid) {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;
            match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
                Ok(()) => debug!(pgid, "killed process group"),
                // The group already exited.
                Err(nix::errno::Errno::ESRCH) => {}
                Err(e) => warn!(pgid, "kill process group: {e}"),
            }
        }
    }
}

/// Run `argv` in `cwd`, waiting at most `timeout`.
pub async fn run_command(
    argv: &[String],
    cwd: &Utf8Path,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let (program, args) = argv.split_first().ok_or(ProcessError::Empty)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    debug!(program = %program, cwd = %cwd, timeout_secs = timeout.as_secs(), "spawning");
    let started = Instant::now();
    let child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ProcessError::NotFound {
            program: program.clone(),
        },
        _ => ProcessError::Io {
            program: program.clone(),
            source: e,
        },
    })?;
    let mut guard = GroupGuard { pgid: child.id() };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(out)) => {
            guard.disarm();
            let output = ProcessOutput {
                exit_code: out.status.code(),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                duration: started.elapsed(),
            };
            debug!(program = %program, exit_code = ?output.exit_code, "finished");
            Ok(output)
        }
        Ok(Err(e)) => Err(ProcessError::Io {
            program: program.clone(),
            source: e,
        }),
        Err(_) => {
            warn!(program = %program, timeout_secs = timeout.as_secs(), "timed out; killing process group");
            drop(guard);
            Err(ProcessError::Timeout {
                program: program.clone(),
                after: timeout,
            })
        }
    }
}

/// Whether a process with this pid still exists. Without a way to ask,
/// the answer is yes.
pub fn process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        !matches!(kill(Pid::from_raw(raw), None), Err(nix::errno::Errno::ESRCH))
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Last `max_lines` lines of `text`.
pub fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_output_and_exit_code() {
        let out = run_command(
            &argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]),
            Utf8Path::new("."),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn times_out() {
        let err = run_command(
            &argv(&["sh", "-c", "sleep 30"]),
            Utf8Path::new("."),
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }

    #[cfg(target_os = "linux")]
    fn gone_or_zombie(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_forked_children() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("child.pid");
        let script = format!("sleep 30 & echo $! > {}; wait", pidfile.display());
        let err = run_command(
            &argv(&["sh", "-c", &script]),
            Utf8Path::new("."),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pidfile).unwrap().trim().to_string();
        let mut gone = false;
        for _ in 0..40 {
            if gone_or_zombie(&pid) {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(gone, "background child {pid} survived the timeout");
    }

    #[cfg(unix)]
    #[test]
    fn liveness_of_self_and_an_exited_child() {
        assert!(process_alive(std::process::id()));
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!process_alive(pid));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let err = run_command(
            &argv(&["govfix-definitely-not-a-real-binary"]),
            Utf8Path::new("."),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_argv_is_rejected() {
        let err = run_command(&[], Utf8Path::new("."), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Empty));
    }
}
