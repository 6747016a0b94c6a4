#![cfg(feature = "cli")]

use std::io::Cursor;

use ksql::cli::{
    CheckOptions, CheckResult, CliError, StreamOptions, StreamSummary, execute_check, run_stream,
};
use ksql::{Value, parse};

fn stream(expression: &str, input: &str, options: StreamOptions) -> (String, StreamSummary) {
    let expr = parse(expression).unwrap();
    let mut out = Vec::new();
    let summary = run_stream(&expr, Cursor::new(input), &mut out, options).unwrap();
    (String::from_utf8(out).unwrap(), summary)
}

// ============================================================================
// Check
// ============================================================================

#[test]
fn test_check_evaluates_input() {
    let options = CheckOptions {
        expression: ".properties.employees > 20".to_string(),
        input: Some(r#"{"properties":{"employees":50}}"#.to_string()),
        ..Default::default()
    };
    assert_eq!(
        execute_check(&options).unwrap(),
        CheckResult::Success(Value::Bool(true))
    );
}

#[test]
fn test_check_syntax_only() {
    let options = CheckOptions {
        expression: ".a == 1".to_string(),
        syntax_only: true,
        ..Default::default()
    };
    assert_eq!(execute_check(&options).unwrap(), CheckResult::SyntaxValid);

    let options = CheckOptions {
        expression: ".a ==".to_string(),
        syntax_only: true,
        ..Default::default()
    };
    assert!(matches!(execute_check(&options), Err(CliError::Parse(_))));
}

#[test]
fn test_check_errors() {
    let no_input = CheckOptions {
        expression: ".a".to_string(),
        ..Default::default()
    };
    assert!(matches!(execute_check(&no_input), Err(CliError::NoInput)));

    let bad_json = CheckOptions {
        expression: ".a".to_string(),
        input: Some("{not json".to_string()),
        ..Default::default()
    };
    assert!(matches!(execute_check(&bad_json), Err(CliError::Json(_))));

    let bad_types = CheckOptions {
        expression: ".a + 1".to_string(),
        input: Some(r#"{"a":true}"#.to_string()),
        ..Default::default()
    };
    assert!(matches!(execute_check(&bad_types), Err(CliError::Eval(_))));
}

// ============================================================================
// Stream
// ============================================================================

#[test]
fn test_stream_prints_results() {
    let input = "{\"a\":1}\n\n{\"a\":2.5}\n{\"b\":1}\n";
    let (out, summary) = stream(".a", input, StreamOptions::default());

    assert_eq!(out, "1\n2.5\nnull\n");
    assert_eq!(
        summary,
        StreamSummary {
            processed: 3,
            failed: 0
        }
    );
}

#[test]
fn test_stream_filter_echoes_matching_lines() {
    let input = "{\"n\":1}\n{\"n\":30}\n{\"n\":\"x\"}\n{\"n\":25}\n";
    let options = StreamOptions {
        filter: true,
        ..Default::default()
    };
    let (out, summary) = stream(".n > 20", input, options);

    assert_eq!(out, "{\"n\":30}\n{\"n\":25}\n");
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.failed, 1);
}

#[test]
fn test_stream_pretty() {
    let options = StreamOptions {
        pretty: true,
        ..Default::default()
    };
    let (out, _) = stream("[.a, .b]", "{\"a\":1,\"b\":\"x\"}\n", options);
    assert_eq!(out, "[\n  1,\n  \"x\"\n]\n");
}

#[test]
fn test_stream_keeps_going_after_failures() {
    let input = "{\"a\":1}\n{\"a\":\"s\"}\nnot json\n{\"a\":2}\n";
    let (out, summary) = stream(".a * 2", input, StreamOptions::default());

    assert_eq!(out, "2\n4\n");
    assert_eq!(
        summary,
        StreamSummary {
            processed: 4,
            failed: 2
        }
    );
}
