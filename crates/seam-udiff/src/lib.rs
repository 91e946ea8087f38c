//! Unified diff parsing and strict hunk application.
//!
//! This crate turns raw unified-diff text (typically LLM output) into
//! structured per-file patches and applies them to line sequences with
//! strict positional context checking.
//!
//! # Architecture
//!
//! This is a **Layer 2 (Infrastructure)** crate:
//! - Depends on: thiserror only
//! - Used by: seam-engine (structural guard / transaction manager)
//!
//! # Usage
//!
//! ```rust,ignore
//! use seam_udiff::{HunkApplier, UdiffParser};
//!
//! // Parse per-file patches out of a unified diff
//! let patches = UdiffParser::parse(diff_text)?;
//!
//! // Apply one file's hunks to its current lines
//! match HunkApplier::apply_hunks(&current_lines, &patches[0].hunks) {
//!     Some(new_lines) => { /* stage new_lines for writing */ }
//!     None => { /* context mismatch: the diff does not match the file */ }
//! }
//! ```
//!
//! A `None` from the applier is an expected outcome, not a fault: it means
//! the file on disk has diverged from what the diff assumes. Callers decide
//! what to do about it (the engine rejects the whole transaction).

mod applier;
mod error;
mod parser;

pub use applier::HunkApplier;
pub use error::ParseError;
pub use parser::{Change, FilePatch, Hunk, PatchHeader, UdiffParser};
