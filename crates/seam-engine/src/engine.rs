//! The engine facade: one call, one transaction.

use std::path::{Path, PathBuf};

use seam_udiff::UdiffParser;
use tracing::debug;

use crate::error::EngineError;
use crate::guard::{PendingChange, StructuralGuard};
use crate::transaction::{CommitReport, TransactionManager};
use crate::validate::Validator;

/// Transactional unified-diff patch engine.
///
/// Each [`apply`](PatchEngine::apply) call is a self-contained transaction:
/// parse, guard (dry run), commit with backup, and rollback on any failure.
/// The engine holds no state across calls beyond the base path it was
/// constructed with, and no ambient globals: everything it needs comes in
/// through the constructor and the call arguments.
///
/// The engine assumes it is the sole writer to the working tree for the
/// duration of one call; callers serialize concurrent invocations against
/// the same base path.
pub struct PatchEngine {
    base: PathBuf,
}

impl PatchEngine {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Parse and dry-run a diff without writing anything.
    ///
    /// Returns the pending-changes plan the commit phase would execute.
    /// This is the whole engine up to, but excluding, the first write.
    pub fn check(&self, diff_text: &str) -> Result<Vec<PendingChange>, EngineError> {
        let patches = UdiffParser::parse(diff_text)?;
        debug!(files = patches.len(), "parsed diff");
        let plan = StructuralGuard::plan(&patches, &self.base)?;
        Ok(plan)
    }

    /// Apply a diff as one atomic transaction.
    ///
    /// On success the working tree holds the new state and the report lists
    /// every file written or deleted. On error the tree is unchanged unless
    /// the error is `CommitError::RollbackFailed` (see
    /// [`EngineError::filesystem_unchanged`]).
    pub fn apply(
        &self,
        diff_text: &str,
        validator: Option<&dyn Validator>,
    ) -> Result<CommitReport, EngineError> {
        let plan = self.check(diff_text)?;
        let report = TransactionManager::commit(&plan, &self.base, validator)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_apply_modify_scenario() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.py"), "old\n").unwrap();

        let engine = PatchEngine::new(dir.path());
        let diff = "--- a/f.py\n+++ b/f.py\n@@ -1,1 +1,1 @@\n-old\n+new\n";
        let report = engine.apply(diff, None).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("f.py")).unwrap(), "new\n");
        assert_eq!(report.written, vec![PathBuf::from("f.py")]);
    }

    #[test]
    fn test_check_is_pure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.py"), "old\n").unwrap();

        let engine = PatchEngine::new(dir.path());
        let diff = "--- a/f.py\n+++ b/f.py\n@@ -1,1 +1,1 @@\n-old\n+new\n";
        let plan = engine.check(diff).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(fs::read_to_string(dir.path().join("f.py")).unwrap(), "old\n");
        assert!(!dir.path().join(".seam").exists());
    }

    #[test]
    fn test_apply_malformed_diff_rejected() {
        let dir = tempdir().unwrap();
        let engine = PatchEngine::new(dir.path());
        let err = engine.apply("this is not a diff", None).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
        assert!(err.filesystem_unchanged());
    }
}
