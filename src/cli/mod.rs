//! CLI support for ksql
//!
//! Provides programmatic access to the `ksql` binary's behaviour so it can be
//! embedded in other tools and tested without spawning a process.

mod check;
mod stream;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use stream::{StreamOptions, StreamSummary, run_stream};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Pass a JSON document or pipe JSON lines to stdin.")]
    NoInput,
}
