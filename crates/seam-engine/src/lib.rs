//! Transactional unified-diff patch engine.
//!
//! Takes a textual patch (unified-diff form) and applies it to a working
//! tree with strict pre-flight structural verification, atomic multi-file
//! commit, and automatic rollback on any failure, optionally gated by a
//! post-apply validation hook.
//!
//! # Architecture
//!
//! This is a **Layer 3 (Domain)** crate:
//! - Depends on: seam-udiff (parsing/hunk application)
//! - Used by: seam (CLI)
//!
//! Per invocation the engine moves through
//! `Parsing -> Guarding -> Committing` and ends in exactly one of:
//!
//! - **Rejected** (from parsing or guarding): no write ever occurred.
//! - **Committed**: all changes landed, validation (if any) passed, backups
//!   retained under `.seam/backups/`.
//! - **RolledBack**: a write or validation failure occurred and every
//!   touched file was restored from its backup.
//!
//! The one residual risk is a rollback that itself fails
//! ([`CommitError::RollbackFailed`]), which callers must surface as a
//! potential partial mutation requiring manual inspection.
//!
//! # Usage
//!
//! ```rust,ignore
//! use seam_engine::{PatchEngine, ShellValidator};
//!
//! let engine = PatchEngine::new("/path/to/project");
//! let validator = ShellValidator::new("cargo test");
//! match engine.apply(diff_text, Some(&validator)) {
//!     Ok(report) => println!("applied {} file(s)", report.written.len()),
//!     Err(e) if e.filesystem_unchanged() => eprintln!("rejected: {e}"),
//!     Err(e) => eprintln!("FATAL: {e}"),
//! }
//! ```

mod engine;
mod error;
mod guard;
mod transaction;
mod validate;

pub use engine::PatchEngine;
pub use error::{CommitError, EngineError, GuardError, ParseError};
pub use guard::{Action, PendingChange, StructuralGuard};
pub use transaction::{CommitReport, TransactionManager, CONTROL_DIR};
pub use validate::{ShellValidator, ValidationOutcome, Validator};
