//! Seam CLI - apply unified diffs to a working tree transactionally.
//!
//! Reads a unified diff (from a file or stdin), dry-runs it against the
//! working tree, and either commits all changes atomically or leaves the
//! tree untouched. An optional validation command gates the commit: a
//! non-zero exit rolls every file back.
//!
//! # Usage
//!
//! ```bash
//! # Apply a diff from stdin to the current directory
//! some-model | seam
//!
//! # Apply a saved diff, gated by the test suite
//! seam --diff fix.patch --validate "cargo test" --validate-timeout 300
//!
//! # Verify only, write nothing
//! seam --diff fix.patch --dry-run
//!
//! # Machine-readable result
//! seam --diff fix.patch --json | jq .
//! ```
//!
//! Exit codes: 0 committed (or dry run passed), 1 rejected or rolled back,
//! 2 rollback failed (tree may be partially modified).

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;

use seam_engine::{
    Action, CommitError, EngineError, PatchEngine, PendingChange, ShellValidator,
};

mod config;
use config::SeamConfig;

/// Apply unified diffs to a working tree transactionally
#[derive(Parser, Debug)]
#[command(name = "seam")]
#[command(version, about, long_about = None)]
struct Args {
    /// Working directory the diff applies to (default: current directory)
    #[arg(short = 'C', long, default_value = ".")]
    base: PathBuf,

    /// Read the diff from this file instead of stdin
    #[arg(short = 'd', long)]
    diff: Option<PathBuf>,

    /// Shell command to run after applying; non-zero exit rolls back
    #[arg(long)]
    validate: Option<String>,

    /// Seconds the validation command may run before it is killed
    #[arg(long)]
    validate_timeout: Option<u64>,

    /// Parse and verify only; write nothing
    #[arg(long)]
    dry_run: bool,

    /// Emit the result as JSON (for scripting/parsing)
    #[arg(long)]
    json: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(if args.verbose {
            tracing_subscriber::EnvFilter::new("debug")
        } else {
            tracing_subscriber::EnvFilter::from_default_env()
        })
        .with_writer(std::io::stderr)
        .try_init();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            if args.json {
                println!("{}", json!({ "status": "error", "error": format!("{err:#}") }));
            } else {
                eprintln!("error: {err:#}");
            }
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let diff_text = read_diff(args)?;
    tracing::debug!(bytes = diff_text.len(), base = %args.base.display(), "read diff");
    let config = SeamConfig::load(&args.base)?;

    let engine = PatchEngine::new(&args.base);

    if args.dry_run {
        return Ok(report_dry_run(args, engine.check(&diff_text)));
    }

    // CLI flags win over the project config file.
    let command = args
        .validate
        .clone()
        .or_else(|| config.validation.command.clone());
    let timeout_secs = args.validate_timeout.or(config.validation.timeout_secs);

    let validator = command.map(|cmd| {
        let mut v = ShellValidator::new(cmd);
        if let Some(secs) = timeout_secs {
            v = v.with_timeout(Duration::from_secs(secs));
        }
        v
    });
    let validator_ref = validator.as_ref().map(|v| v as &dyn seam_engine::Validator);

    match engine.apply(&diff_text, validator_ref) {
        Ok(report) => {
            if args.json {
                println!(
                    "{}",
                    json!({ "status": "committed", "report": report })
                );
            } else {
                println!(
                    "Applied changes to {} file(s).",
                    report.written.len() + report.deleted.len()
                );
                if report.validated {
                    println!("Validation passed.");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(report_failure(args, err)),
    }
}

fn read_diff(args: &Args) -> Result<String> {
    match &args.diff {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read diff from {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read diff from stdin")?;
            Ok(text)
        }
    }
}

fn report_dry_run(args: &Args, result: Result<Vec<PendingChange>, EngineError>) -> ExitCode {
    match result {
        Ok(plan) => {
            if args.json {
                let staged: Vec<_> = plan
                    .iter()
                    .map(|c| {
                        json!({
                            "path": c.rel_path,
                            "action": match c.action {
                                Action::Write(_) => "write",
                                Action::Delete => "delete",
                            },
                        })
                    })
                    .collect();
                println!("{}", json!({ "status": "verified", "plan": staged }));
            } else {
                println!("Structural guard passed; {} change(s) staged:", plan.len());
                for change in &plan {
                    let verb = match change.action {
                        Action::Write(_) => "write",
                        Action::Delete => "delete",
                    };
                    println!("  {verb} {}", change.rel_path.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(err) => report_failure(args, err),
    }
}

fn report_failure(args: &Args, err: EngineError) -> ExitCode {
    let (status, code) = match &err {
        EngineError::Parse(_) | EngineError::Guard(_) => ("rejected", 1),
        EngineError::Commit(CommitError::RollbackFailed { .. }) => ("rollback-failed", 2),
        EngineError::Commit(_) => ("rolled-back", 1),
    };

    if args.json {
        println!(
            "{}",
            json!({
                "status": status,
                "error": err.to_string(),
                "filesystem_unchanged": err.filesystem_unchanged(),
            })
        );
    } else {
        eprintln!("error: {err}");
        if err.filesystem_unchanged() {
            eprintln!("The working tree was not modified.");
        } else {
            eprintln!(
                "WARNING: the working tree may be partially modified; \
                 inspect it (and .seam/backups/) manually."
            );
        }
    }
    ExitCode::from(code)
}
