//! JSON output for evaluation results.
//!
//! - **Compact output** via [`to_json()`], one value per line in streams
//! - **Pretty output** via [`to_json_pretty()`], 2-space indentation
//! - **Writers** via [`write_json()`] for streaming straight to stdout
//!
//! Integral numbers within the exact range of an `f64` are written without a
//! fraction, timestamps as RFC3339 strings, and non-finite numbers as `null`.
//!
//! # Examples
//!
//! ```
//! use ksql::Value;
//! use ksql::output::{to_json, to_json_pretty};
//!
//! let value = Value::Array(vec![Value::Number(42.0), Value::Null]);
//!
//! assert_eq!(to_json(&value), "[42,null]");
//! assert_eq!(to_json_pretty(&value), "[\n  42,\n  null\n]");
//! ```

use std::io::Write;

use crate::value::Value;

pub fn to_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn to_json_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Writes `value` followed by a newline.
pub fn write_json<W: Write>(writer: &mut W, value: &Value, pretty: bool) -> std::io::Result<()> {
    let result = if pretty {
        serde_json::to_writer_pretty(&mut *writer, value)
    } else {
        serde_json::to_writer(&mut *writer, value)
    };
    result.map_err(std::io::Error::from)?;
    writer.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_are_escaped() {
        let value = Value::String("say \"hi\"\n".to_string());
        assert_eq!(to_json(&value), r#""say \"hi\"\n""#);
    }

    #[test]
    fn test_non_finite_numbers() {
        assert_eq!(to_json(&Value::Number(f64::INFINITY)), "null");
        assert_eq!(to_json(&Value::Number(f64::NAN)), "null");
    }

    #[test]
    fn test_write_json_appends_newline() {
        let mut out = Vec::new();
        write_json(&mut out, &Value::Bool(true), false).unwrap();
        write_json(&mut out, &Value::Array(vec![]), true).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "true\n[]\n");
    }
}
