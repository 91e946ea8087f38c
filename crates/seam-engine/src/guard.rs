//! Structural guard: the pre-flight dry run.
//!
//! For every file patch the guard resolves the target path, loads current
//! content, and exercises the hunk applier without writing anything. The
//! output is either a complete plan of pending changes or a single hard
//! failure; partial plans are never produced.

use std::fs;
use std::path::{Path, PathBuf};

use seam_udiff::{FilePatch, HunkApplier};
use tracing::debug;

use crate::error::GuardError;

/// What the transaction manager should do to one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Overwrite (or create) the target with these lines, joined by
    /// newlines plus a trailing newline.
    Write(Vec<String>),
    /// Remove the target file.
    Delete,
}

/// One approved change, produced by the guard and consumed by the
/// transaction manager. Ordered the same as the input patch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    /// Absolute, workspace-confined target path.
    pub path: PathBuf,
    /// Target path relative to the base directory; keys the backup copy.
    pub rel_path: PathBuf,
    pub action: Action,
}

/// Dry-run verifier that rejects a diff before any write occurs.
pub struct StructuralGuard;

impl StructuralGuard {
    /// Build a pending-changes plan for `patches` against `base`.
    ///
    /// Performs zero filesystem writes. Any single failure aborts the
    /// whole plan.
    pub fn plan(patches: &[FilePatch], base: &Path) -> Result<Vec<PendingChange>, GuardError> {
        let base_canonical = base.canonicalize().map_err(|source| GuardError::Read {
            path: base.to_path_buf(),
            source,
        })?;

        let mut plan = Vec::with_capacity(patches.len());

        for patch in patches {
            let rel = patch.header.effective_path();
            if rel.is_empty() {
                continue;
            }

            let target = resolve_target(rel, base, &base_canonical)?;
            let rel_path = target
                .strip_prefix(&base_canonical)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(rel));

            let is_create = patch.header.is_create();
            let is_delete = patch.header.is_delete();

            if !is_create && !target.exists() {
                return Err(GuardError::MissingTarget { path: target });
            }
            if target.exists() && !target.is_file() {
                return Err(GuardError::NotAFile { path: target });
            }

            if is_delete {
                // The content itself is discarded, but a delete target must
                // still be readable text; binary files are never touched.
                read_text(&target)?;
                debug!(path = %target.display(), "guard: staged delete");
                plan.push(PendingChange {
                    path: target,
                    rel_path,
                    action: Action::Delete,
                });
            } else if is_create {
                // No current-file lookup: the new content is synthesized
                // purely from the hunks.
                let new_lines = HunkApplier::synthesize(&patch.hunks);
                debug!(
                    path = %target.display(),
                    lines = new_lines.len(),
                    "guard: staged create"
                );
                plan.push(PendingChange {
                    path: target,
                    rel_path,
                    action: Action::Write(new_lines),
                });
            } else {
                let current = read_text(&target)?;
                let current_lines: Vec<String> =
                    current.lines().map(str::to_string).collect();

                let new_lines = HunkApplier::apply_hunks(&current_lines, &patch.hunks)
                    .ok_or_else(|| GuardError::ContextMismatch {
                        path: target.clone(),
                    })?;
                debug!(
                    path = %target.display(),
                    hunks = patch.hunks.len(),
                    "guard: staged modify"
                );
                plan.push(PendingChange {
                    path: target,
                    rel_path,
                    action: Action::Write(new_lines),
                });
            }
        }

        Ok(plan)
    }
}

/// Read the target as UTF-8 text; binary patching is unsupported.
fn read_text(path: &Path) -> Result<String, GuardError> {
    let bytes = fs::read(path).map_err(|source| GuardError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| GuardError::NonTextFile {
        path: path.to_path_buf(),
    })
}

/// Resolve a diff-relative path against the base directory, confined to it.
///
/// For not-yet-existing targets (creates), the deepest existing ancestor is
/// canonicalized and the remaining components are re-joined, so symlinked
/// base directories and fresh subdirectories both resolve correctly.
fn resolve_target(
    rel: &str,
    base: &Path,
    base_canonical: &Path,
) -> Result<PathBuf, GuardError> {
    let joined = base.join(rel);

    let canonical = if joined.exists() {
        joined.canonicalize().map_err(|source| GuardError::Read {
            path: joined.clone(),
            source,
        })?
    } else {
        // Walk up to the deepest existing ancestor.
        let mut existing = joined.as_path();
        let mut missing_parts: Vec<&std::ffi::OsStr> = Vec::new();
        while !existing.exists() {
            if let Some(name) = existing.file_name() {
                missing_parts.push(name);
            }
            match existing.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => existing = parent,
                _ => {
                    existing = base;
                    break;
                }
            }
        }

        let ancestor = existing.canonicalize().map_err(|source| GuardError::Read {
            path: existing.to_path_buf(),
            source,
        })?;
        if !ancestor.starts_with(base_canonical) {
            return Err(GuardError::OutsideWorkspace {
                path: PathBuf::from(rel),
            });
        }

        missing_parts.reverse();
        let mut rebuilt = ancestor;
        for part in missing_parts {
            rebuilt = rebuilt.join(part);
        }
        rebuilt
    };

    if !canonical.starts_with(base_canonical) {
        return Err(GuardError::OutsideWorkspace {
            path: PathBuf::from(rel),
        });
    }

    Ok(canonical)
}
