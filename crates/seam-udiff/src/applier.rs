//! Strict positional application of hunks to a line sequence.

use crate::parser::{Change, Hunk};

/// Applier for parsed hunks.
///
/// Application is strict: every `Context` and `Removed` line must appear
/// exactly where the hunk header says it does, with offsets accumulated
/// across prior hunks. There is no fuzzy or whitespace-normalized matching;
/// a diff that does not match the file on disk is rejected wholesale so the
/// engine never writes a half-guessed result.
pub struct HunkApplier;

impl HunkApplier {
    /// Apply `hunks` in order to `original_lines`, producing the new line
    /// sequence.
    ///
    /// Returns `None` on any context mismatch, out-of-order or overlapping
    /// hunk, or out-of-bounds offset. `None` is the expected signal that
    /// the diff's view of the file is stale, not an exceptional condition.
    /// Deterministic: identical inputs always yield the identical outcome.
    pub fn apply_hunks(original_lines: &[String], hunks: &[Hunk]) -> Option<Vec<String>> {
        let mut result: Vec<String> = Vec::with_capacity(original_lines.len());
        // Index of the next original line not yet consumed.
        let mut cursor = 0usize;

        for hunk in hunks {
            // old_start is 1-based for non-empty spans; a zero old_count
            // means "insert after line old_start" (git convention).
            let start = if hunk.old_count == 0 {
                hunk.old_start
            } else {
                hunk.old_start.checked_sub(1)?
            };
            if start < cursor || start > original_lines.len() {
                // Out of order against a prior hunk, or beyond EOF.
                return None;
            }

            result.extend(original_lines[cursor..start].iter().cloned());
            cursor = start;

            for change in &hunk.changes {
                match change {
                    Change::Context(line) => {
                        if original_lines.get(cursor)? != line {
                            return None;
                        }
                        result.push(line.clone());
                        cursor += 1;
                    }
                    Change::Removed(line) => {
                        if original_lines.get(cursor)? != line {
                            return None;
                        }
                        cursor += 1;
                    }
                    Change::Added(line) => {
                        result.push(line.clone());
                    }
                }
            }
        }

        result.extend(original_lines[cursor..].iter().cloned());
        Some(result)
    }

    /// Build the content of a brand-new file purely from its hunks.
    ///
    /// For a creation there is no current file to look up, so the new line
    /// sequence is every `Added` (and, tolerantly, `Context`) line in
    /// order. `Removed` lines make no sense here and are ignored.
    pub fn synthesize(hunks: &[Hunk]) -> Vec<String> {
        hunks
            .iter()
            .flat_map(|h| &h.changes)
            .filter_map(|change| match change {
                Change::Added(line) | Change::Context(line) => Some(line.clone()),
                Change::Removed(_) => None,
            })
            .collect()
    }
}
