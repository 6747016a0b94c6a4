//! Evaluate an expression against a stream of JSON lines

use std::io::{BufRead, Write};

use log::{debug, warn};

use super::CliError;
use crate::{Expression, Value, output::write_json};

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Echo lines whose result is `true` instead of printing results
    pub filter: bool,
    /// Pretty-print results
    pub pretty: bool,
}

/// Counts gathered while streaming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Evaluates `expression` once per non-empty line of `reader`.
///
/// A line that fails to evaluate is logged and skipped; only I/O errors
/// stop the stream.
pub fn run_stream<R: BufRead, W: Write>(
    expression: &Expression,
    reader: R,
    writer: &mut W,
    options: StreamOptions,
) -> Result<StreamSummary, CliError> {
    let mut summary = StreamSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.processed += 1;

        match expression.calculate(&line) {
            Ok(value) if options.filter => {
                if value == Value::Bool(true) {
                    writer.write_all(line.as_bytes())?;
                    writer.write_all(b"\n")?;
                }
            }
            Ok(value) => write_json(writer, &value, options.pretty)?,
            Err(e) => {
                warn!("line {}: {e}", index + 1);
                summary.failed += 1;
            }
        }
    }

    writer.flush()?;
    debug!(
        "processed {} lines, {} failed",
        summary.processed, summary.failed
    );
    Ok(summary)
}
