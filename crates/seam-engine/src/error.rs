//! Error taxonomy for the patch engine.
//!
//! Three families, matching the three phases of a transaction:
//!
//! - [`ParseError`] (re-exported from seam-udiff): malformed diff text.
//!   Never touches the filesystem.
//! - [`GuardError`]: the diff does not match reality. Expected, frequent,
//!   recoverable; raised before any write occurs.
//! - [`CommitError`]: a write or validation failure after mutation started.
//!   Always surfaced after rollback has been attempted; `RollbackFailed` is
//!   the one fatal case where the tree may be partially modified.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use seam_udiff::ParseError;

/// Pre-flight rejection from the structural guard.
///
/// None of these imply any filesystem mutation: the guard is a pure
/// dry-run. They signal "the diff does not match reality", not a system
/// fault.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A modify/delete patch targets a file that does not exist.
    #[error("target file does not exist: {path}")]
    MissingTarget { path: PathBuf },

    /// The target exists but is not UTF-8 text; binary patching is
    /// unsupported by design.
    #[error("cannot patch binary or non-UTF-8 file: {path}")]
    NonTextFile { path: PathBuf },

    /// The hunks' context/removed lines do not match the file on disk.
    /// This is the mechanism that prevents corrupting a file the diff
    /// producer had a stale view of.
    #[error("context mismatch in {path}: the diff does not match the file on disk")]
    ContextMismatch { path: PathBuf },

    /// The resolved target escapes the base directory.
    #[error("path escapes the workspace: {path}")]
    OutsideWorkspace { path: PathBuf },

    /// The target resolves to a directory or other non-regular file.
    #[error("target is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// I/O failure while reading current content during the dry run.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while committing an approved plan.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Could not copy a target aside before mutating it. Raised before any
    /// target has been touched, so the tree is still unchanged.
    #[error("failed to back up {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A write or delete failed mid-commit; rollback was performed.
    #[error("failed to apply change to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The post-apply validation command exited non-zero; rollback was
    /// performed.
    #[error("validation command failed with exit status {status}")]
    ValidationFailed {
        status: i32,
        stdout: String,
        stderr: String,
    },

    /// The post-apply validation command outlived its timeout; rollback was
    /// performed exactly as for a non-zero exit.
    #[error("validation command timed out after {timeout:?}")]
    ValidationTimeout { timeout: Duration },

    /// The validation command could not be launched at all.
    #[error("failed to run validation command: {source}")]
    ValidationIo {
        #[source]
        source: std::io::Error,
    },

    /// Rollback itself failed. Some files may be left partially applied.
    /// The original commit failure is preserved, never masked by rollback
    /// noise; `dirty_paths` lists every file that could not be restored and
    /// needs manual inspection.
    #[error(
        "ROLLBACK FAILED: working tree may be partially modified \
         ({} file(s) not restored); original failure: {original}",
        .dirty_paths.len()
    )]
    RollbackFailed {
        original: Box<CommitError>,
        dirty_paths: Vec<PathBuf>,
    },
}

/// Umbrella error for one `apply()` invocation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl EngineError {
    /// Whether the working tree is guaranteed byte-identical to its
    /// pre-transaction state despite this error.
    ///
    /// True for everything except a failed rollback, which callers must
    /// report loudly as a potential partial mutation.
    pub fn filesystem_unchanged(&self) -> bool {
        !matches!(
            self,
            EngineError::Commit(CommitError::RollbackFailed { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failed_is_the_only_dirty_error() {
        let parse: EngineError = ParseError::Malformed("nope".into()).into();
        assert!(parse.filesystem_unchanged());

        let guard: EngineError = GuardError::ContextMismatch {
            path: PathBuf::from("f.py"),
        }
        .into();
        assert!(guard.filesystem_unchanged());

        let commit: EngineError = CommitError::ValidationFailed {
            status: 1,
            stdout: String::new(),
            stderr: String::new(),
        }
        .into();
        assert!(commit.filesystem_unchanged());

        let fatal: EngineError = CommitError::RollbackFailed {
            original: Box::new(CommitError::ValidationFailed {
                status: 1,
                stdout: String::new(),
                stderr: String::new(),
            }),
            dirty_paths: vec![PathBuf::from("f.py")],
        }
        .into();
        assert!(!fatal.filesystem_unchanged());
    }

    #[test]
    fn test_rollback_failed_message_preserves_original() {
        let err = CommitError::RollbackFailed {
            original: Box::new(CommitError::ValidationFailed {
                status: 2,
                stdout: String::new(),
                stderr: String::new(),
            }),
            dirty_paths: vec![PathBuf::from("a"), PathBuf::from("b")],
        };
        let msg = err.to_string();
        assert!(msg.contains("ROLLBACK FAILED"));
        assert!(msg.contains("2 file(s)"));
        assert!(msg.contains("exit status 2"));
    }
}
