//! Evaluate an expression against a single JSON document

use serde::de::IgnoredAny;

use super::CliError;
use crate::{Value, parse};

/// Options for a single evaluation
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The expression to compile
    pub expression: String,
    /// JSON document to evaluate against
    pub input: Option<String>,
    /// Only validate syntax, don't evaluate
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// The expression compiled
    SyntaxValid,
    /// The expression evaluated to a value
    Success(Value),
}

/// Compiles the expression and, unless only the syntax is checked, evaluates it.
///
/// Unlike streamed lines, an explicit input must be valid JSON.
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let expression = parse(&options.expression)?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid);
    }

    let input = options.input.as_deref().ok_or(CliError::NoInput)?;
    serde_json::from_str::<IgnoredAny>(input)?;

    let value = expression.calculate(input)?;
    Ok(CheckResult::Success(value))
}
