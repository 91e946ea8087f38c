//! Atomic multi-file commit with backup and rollback.
//!
//! The transaction manager consumes the guard's approved plan: it copies
//! every affected file aside, applies all writes and deletes, optionally
//! runs the validation hook, and restores every backup in reverse order if
//! anything fails. Backups are keyed by the target's full relative path
//! (directory-mirrored under the control directory), so two files sharing a
//! basename never collide.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::CommitError;
use crate::guard::{Action, PendingChange};
use crate::validate::{ValidationOutcome, Validator};

/// Directory under the base that the engine owns.
pub const CONTROL_DIR: &str = ".seam";
/// Backup area inside the control directory.
const BACKUP_SUBDIR: &str = "backups";

/// Summary of a committed transaction.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CommitReport {
    /// Files created or overwritten, relative to the base.
    pub written: Vec<PathBuf>,
    /// Files deleted, relative to the base.
    pub deleted: Vec<PathBuf>,
    /// Whether a validation hook ran (and passed).
    pub validated: bool,
}

/// Pre-mutation snapshot of one target. A `None` saved copy means the file
/// did not previously exist, so rollback deletes it.
#[derive(Debug)]
struct Backup {
    target: PathBuf,
    saved_copy: Option<PathBuf>,
}

/// Executes an approved plan as a single all-or-nothing transaction.
pub struct TransactionManager;

impl TransactionManager {
    /// Commit `plan` against `base`, optionally gated by `validator`.
    ///
    /// On success backups are left in place under `.seam/backups/` as an
    /// audit trail. On failure every touched file is restored from its
    /// backup before the error is returned; only
    /// [`CommitError::RollbackFailed`] means that guarantee was broken.
    pub fn commit(
        plan: &[PendingChange],
        base: &Path,
        validator: Option<&dyn Validator>,
    ) -> Result<CommitReport, CommitError> {
        let backup_root = base.join(CONTROL_DIR).join(BACKUP_SUBDIR);
        fs::create_dir_all(&backup_root).map_err(|source| CommitError::BackupFailed {
            path: backup_root.clone(),
            source,
        })?;

        // Phase 1: snapshot every existing target before touching anything.
        // A failure here leaves the tree untouched, so no rollback needed.
        // One backup per unique target: a plan may carry several sections
        // for the same file, and restoring it twice would consume the
        // saved copy on the first pass.
        let mut backups: Vec<Backup> = Vec::with_capacity(plan.len());
        let mut seen: HashSet<&Path> = HashSet::with_capacity(plan.len());
        for change in plan {
            if !seen.insert(&change.path) {
                continue;
            }
            if change.path.exists() {
                let saved = backup_path(&backup_root, &change.rel_path);
                if let Some(parent) = saved.parent() {
                    fs::create_dir_all(parent).map_err(|source| CommitError::BackupFailed {
                        path: change.path.clone(),
                        source,
                    })?;
                }
                fs::copy(&change.path, &saved).map_err(|source| CommitError::BackupFailed {
                    path: change.path.clone(),
                    source,
                })?;
                debug!(
                    target = %change.rel_path.display(),
                    backup = %saved.display(),
                    "backed up"
                );
                backups.push(Backup {
                    target: change.path.clone(),
                    saved_copy: Some(saved),
                });
            } else {
                backups.push(Backup {
                    target: change.path.clone(),
                    saved_copy: None,
                });
            }
        }

        // Phase 2: apply every action. Any failure rolls everything back.
        let mut report = CommitReport::default();
        for change in plan {
            let result = match &change.action {
                Action::Write(lines) => {
                    report.written.push(change.rel_path.clone());
                    write_lines(&change.path, lines)
                }
                Action::Delete => {
                    report.deleted.push(change.rel_path.clone());
                    fs::remove_file(&change.path)
                }
            };
            if let Err(source) = result {
                let failure = CommitError::WriteFailed {
                    path: change.path.clone(),
                    source,
                };
                return Err(rollback(backups, failure));
            }
        }

        // Phase 3: validation gate. All writes have landed, so a failed,
        // timed-out, or unlaunchable validator rolls them back.
        if let Some(validator) = validator {
            let failure = match validator.validate(base) {
                Ok(ValidationOutcome::Passed) => {
                    report.validated = true;
                    None
                }
                Ok(ValidationOutcome::Failed {
                    status,
                    stdout,
                    stderr,
                }) => Some(CommitError::ValidationFailed {
                    status,
                    stdout,
                    stderr,
                }),
                Ok(ValidationOutcome::TimedOut { timeout }) => {
                    Some(CommitError::ValidationTimeout { timeout })
                }
                Err(source) => Some(CommitError::ValidationIo { source }),
            };
            if let Some(failure) = failure {
                warn!(%failure, "validation rejected the transaction, rolling back");
                return Err(rollback(backups, failure));
            }
        }

        info!(
            written = report.written.len(),
            deleted = report.deleted.len(),
            validated = report.validated,
            "transaction committed"
        );
        Ok(report)
    }
}

/// Mirror the target's relative path under the backup root, with a `.bak`
/// suffix on the file name.
fn backup_path(backup_root: &Path, rel_path: &Path) -> PathBuf {
    let mut saved = backup_root.join(rel_path);
    let name = saved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    saved.set_file_name(format!("{name}.bak"));
    saved
}

/// Join lines with newlines plus a trailing newline and write atomically
/// enough for our purposes (parent directories created as needed).
fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(path, content)
}

/// Restore every backup in reverse application order.
///
/// Returns the original failure unchanged when restoration succeeds, and
/// wraps it in [`CommitError::RollbackFailed`] when any file could not be
/// put back. The original error is never masked by rollback noise.
fn rollback(backups: Vec<Backup>, original: CommitError) -> CommitError {
    error!(%original, "commit failed, restoring {} backup(s)", backups.len());

    let mut dirty_paths: Vec<PathBuf> = Vec::new();
    for backup in backups.into_iter().rev() {
        let restored = match &backup.saved_copy {
            Some(copy) => restore_copy(copy, &backup.target),
            // The target did not exist before this transaction; undoing the
            // create means deleting it.
            None => {
                if backup.target.exists() {
                    fs::remove_file(&backup.target)
                } else {
                    Ok(())
                }
            }
        };
        if let Err(io_err) = restored {
            error!(
                path = %backup.target.display(),
                %io_err,
                "rollback could not restore file"
            );
            dirty_paths.push(backup.target);
        }
    }

    if dirty_paths.is_empty() {
        info!("rollback complete, working tree restored");
        original
    } else {
        CommitError::RollbackFailed {
            original: Box::new(original),
            dirty_paths,
        }
    }
}

/// Move the saved copy back over the target, falling back to copy+remove
/// when a direct rename is not possible.
fn restore_copy(copy: &Path, target: &Path) -> std::io::Result<()> {
    if fs::rename(copy, target).is_ok() {
        return Ok(());
    }
    fs::copy(copy, target)?;
    fs::remove_file(copy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_change(base: &Path, rel: &str, lines: &[&str]) -> PendingChange {
        PendingChange {
            path: base.join(rel),
            rel_path: PathBuf::from(rel),
            action: Action::Write(lines.iter().map(|l| l.to_string()).collect()),
        }
    }

    fn delete_change(base: &Path, rel: &str) -> PendingChange {
        PendingChange {
            path: base.join(rel),
            rel_path: PathBuf::from(rel),
            action: Action::Delete,
        }
    }

    struct AlwaysFail;
    impl Validator for AlwaysFail {
        fn validate(&self, _workspace: &Path) -> std::io::Result<ValidationOutcome> {
            Ok(ValidationOutcome::Failed {
                status: 1,
                stdout: "tests are broken".to_string(),
                stderr: String::new(),
            })
        }
    }

    struct AlwaysPass;
    impl Validator for AlwaysPass {
        fn validate(&self, _workspace: &Path) -> std::io::Result<ValidationOutcome> {
            Ok(ValidationOutcome::Passed)
        }
    }

    #[test]
    fn test_commit_writes_and_keeps_backup() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.py"), "old\n").unwrap();

        let plan = vec![write_change(dir.path(), "f.py", &["new"])];
        let report = TransactionManager::commit(&plan, dir.path(), None).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("f.py")).unwrap(), "new\n");
        assert_eq!(report.written, vec![PathBuf::from("f.py")]);
        assert!(!report.validated);

        // Audit trail stays on disk after success.
        let backup = dir.path().join(".seam/backups/f.py.bak");
        assert_eq!(fs::read_to_string(backup).unwrap(), "old\n");
    }

    #[test]
    fn test_commit_delete() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("gone.txt"), "bye\n").unwrap();

        let plan = vec![delete_change(dir.path(), "gone.txt")];
        let report = TransactionManager::commit(&plan, dir.path(), None).unwrap();

        assert!(!dir.path().join("gone.txt").exists());
        assert_eq!(report.deleted, vec![PathBuf::from("gone.txt")]);
        assert!(dir.path().join(".seam/backups/gone.txt.bak").exists());
    }

    #[test]
    fn test_backups_mirror_directories_no_basename_collision() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("a/same.txt"), "from a\n").unwrap();
        fs::write(dir.path().join("b/same.txt"), "from b\n").unwrap();

        let plan = vec![
            write_change(dir.path(), "a/same.txt", &["A"]),
            write_change(dir.path(), "b/same.txt", &["B"]),
        ];
        TransactionManager::commit(&plan, dir.path(), None).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join(".seam/backups/a/same.txt.bak")).unwrap(),
            "from a\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(".seam/backups/b/same.txt.bak")).unwrap(),
            "from b\n"
        );
    }

    #[test]
    fn test_failed_validation_rolls_back_everything() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "original\n").unwrap();

        let plan = vec![
            write_change(dir.path(), "keep.txt", &["mutated"]),
            write_change(dir.path(), "brand_new.txt", &["created"]),
        ];
        let err = TransactionManager::commit(&plan, dir.path(), Some(&AlwaysFail)).unwrap_err();

        assert!(matches!(err, CommitError::ValidationFailed { status: 1, .. }));
        assert_eq!(
            fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
            "original\n"
        );
        // The created file is gone again.
        assert!(!dir.path().join("brand_new.txt").exists());
    }

    #[test]
    fn test_duplicate_targets_roll_back_without_escalating() {
        // Two plan entries for the same file share one backup; rollback
        // must restore the file once instead of failing on the second,
        // already-consumed copy.
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "original\n").unwrap();

        let plan = vec![
            write_change(dir.path(), "f.txt", &["first pass"]),
            write_change(dir.path(), "f.txt", &["second pass"]),
        ];
        let err = TransactionManager::commit(&plan, dir.path(), Some(&AlwaysFail)).unwrap_err();

        assert!(matches!(err, CommitError::ValidationFailed { .. }));
        assert_eq!(
            fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "original\n"
        );
    }

    #[test]
    fn test_validation_failure_carries_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "x\n").unwrap();

        let plan = vec![write_change(dir.path(), "f.txt", &["y"])];
        let err = TransactionManager::commit(&plan, dir.path(), Some(&AlwaysFail)).unwrap_err();

        match err {
            CommitError::ValidationFailed { stdout, .. } => {
                assert!(stdout.contains("tests are broken"));
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_passing_validation_commits() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "x\n").unwrap();

        let plan = vec![write_change(dir.path(), "f.txt", &["y"])];
        let report = TransactionManager::commit(&plan, dir.path(), Some(&AlwaysPass)).unwrap();

        assert!(report.validated);
        assert_eq!(fs::read_to_string(dir.path().join("f.txt")).unwrap(), "y\n");
    }

    #[test]
    fn test_validation_timeout_rolls_back() {
        struct TimesOut;
        impl Validator for TimesOut {
            fn validate(&self, _workspace: &Path) -> std::io::Result<ValidationOutcome> {
                Ok(ValidationOutcome::TimedOut {
                    timeout: std::time::Duration::from_secs(1),
                })
            }
        }

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.txt"), "x\n").unwrap();

        let plan = vec![write_change(dir.path(), "f.txt", &["y"])];
        let err = TransactionManager::commit(&plan, dir.path(), Some(&TimesOut)).unwrap_err();

        assert!(matches!(err, CommitError::ValidationTimeout { .. }));
        assert_eq!(fs::read_to_string(dir.path().join("f.txt")).unwrap(), "x\n");
    }

    #[test]
    fn test_write_into_new_subdirectory() {
        let dir = tempdir().unwrap();
        let plan = vec![write_change(dir.path(), "deep/nested/new.txt", &["hi"])];
        TransactionManager::commit(&plan, dir.path(), None).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("deep/nested/new.txt")).unwrap(),
            "hi\n"
        );
    }

    #[test]
    fn test_empty_plan_commits_trivially() {
        let dir = tempdir().unwrap();
        let report = TransactionManager::commit(&[], dir.path(), None).unwrap();
        assert!(report.written.is_empty());
        assert!(report.deleted.is_empty());
    }
}
