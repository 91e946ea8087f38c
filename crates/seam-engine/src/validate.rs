//! Post-apply validation hook.
//!
//! Validation is an injected capability rather than a hardwired test-runner
//! invocation: the transaction manager only sees a function from working
//! tree to pass/fail, so its transactional guarantees are testable without
//! ever launching a real process. [`ShellValidator`] is the production
//! implementation.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// How often the shell validator polls a running child for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Verdict of one validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Passed,
    /// The command exited non-zero; captured output travels with the
    /// verdict so the caller can show why the transaction was rolled back.
    Failed {
        status: i32,
        stdout: String,
        stderr: String,
    },
    /// The command outlived its timeout and was killed.
    TimedOut { timeout: Duration },
}

/// A post-apply validation gate.
///
/// Implementations must not mutate the working tree; the engine treats a
/// failed validation as grounds for a full rollback.
pub trait Validator {
    fn validate(&self, workspace: &Path) -> std::io::Result<ValidationOutcome>;
}

/// Runs an arbitrary shell command with the working tree as its working
/// directory; a conventional zero exit status means pass.
pub struct ShellValidator {
    command: String,
    timeout: Option<Duration>,
}

impl ShellValidator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    /// Impose a wall-clock limit; expiry counts as a validation failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Validator for ShellValidator {
    fn validate(&self, workspace: &Path) -> std::io::Result<ValidationOutcome> {
        debug!(command = %self.command, cwd = %workspace.display(), "running validation command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes on background threads so a chatty command cannot
        // fill a pipe buffer and stall while we poll for exit.
        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let status = match self.timeout {
            None => child.wait()?,
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        warn!(
                            command = %self.command,
                            ?limit,
                            "validation command timed out, killing it"
                        );
                        let _ = child.kill();
                        let _ = child.wait();
                        return Ok(ValidationOutcome::TimedOut { timeout: limit });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = stdout_handle
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        let stderr = stderr_handle
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        if status.success() {
            Ok(ValidationOutcome::Passed)
        } else {
            Ok(ValidationOutcome::Failed {
                status: status.code().unwrap_or(-1),
                stdout,
                stderr,
            })
        }
    }
}

fn drain<R: Read + Send + 'static>(
    source: Option<R>,
) -> Option<std::thread::JoinHandle<String>> {
    source.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = reader.read_to_string(&mut buf);
            buf
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_shell_validator_passes_on_zero_exit() {
        let dir = tempdir().unwrap();
        let outcome = ShellValidator::new("true").validate(dir.path()).unwrap();
        assert_eq!(outcome, ValidationOutcome::Passed);
    }

    #[test]
    fn test_shell_validator_fails_on_nonzero_exit() {
        let dir = tempdir().unwrap();
        let outcome = ShellValidator::new("echo broken; exit 3")
            .validate(dir.path())
            .unwrap();
        match outcome {
            ValidationOutcome::Failed { status, stdout, .. } => {
                assert_eq!(status, 3);
                assert!(stdout.contains("broken"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_shell_validator_runs_in_workspace() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "here").unwrap();
        let outcome = ShellValidator::new("test -f marker")
            .validate(dir.path())
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Passed);
    }

    #[test]
    fn test_shell_validator_timeout() {
        let dir = tempdir().unwrap();
        let outcome = ShellValidator::new("sleep 10")
            .with_timeout(Duration::from_millis(100))
            .validate(dir.path())
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::TimedOut {
                timeout: Duration::from_millis(100)
            }
        );
    }
}
