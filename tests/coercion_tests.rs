use std::sync::Arc;

use ksql::ast::{Coercion, Expression, TokenKind};
use ksql::coercion::{self, fold_constant};
use ksql::{
    Coercions, Document, EvalError, Evaluate, ParseError, TokenCursor, Value, parse, parse_with,
};

/// Repeats a string `times` over.
#[derive(Debug)]
struct Repeat {
    value: Box<Expression>,
    times: usize,
}

impl Evaluate for Repeat {
    fn evaluate(&self, document: &Document<'_>) -> Result<Value, EvalError> {
        match self.value.evaluate(document)? {
            Value::String(s) => Ok(Value::String(s.repeat(self.times))),
            other => Err(EvalError::Custom(format!("{other} for _repeat_"))),
        }
    }
}

/// `_repeat_ <n>`, consuming the count from the token stream.
fn repeat(
    cursor: &mut dyn TokenCursor,
    const_eligible: bool,
    value: Expression,
) -> Result<(bool, Expression), ParseError> {
    let times = match cursor.next_token() {
        Some(Ok(token)) if token.kind == TokenKind::Number => cursor
            .text(token)
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidCoerce(format!("bad count `{}`", cursor.text(token))))?,
        _ => return Err(ParseError::InvalidCoerce("_repeat_ needs a count".to_string())),
    };
    let custom = Expression::Custom(Box::new(Repeat {
        value: Box::new(value),
        times,
    }));
    fold_constant(const_eligible, custom)
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_builtin_names() {
    assert_eq!(
        Coercions::with_builtins().names(),
        vec![
            "_datetime_",
            "_lowercase_",
            "_number_",
            "_string_",
            "_substr_",
            "_title_",
            "_uppercase_",
        ]
    );
    assert!(Coercions::new().names().is_empty());
    assert!(Coercions::default().contains("_substr_"));
}

#[test]
fn test_empty_registry_knows_nothing() {
    let coercions = Coercions::new();
    assert_eq!(
        parse_with("COERCE .a _lowercase_", &coercions).unwrap_err(),
        ParseError::UnknownCoercion("_lowercase_".into())
    );
}

#[test]
fn test_register_and_unregister() {
    let coercions = Coercions::new();
    assert!(coercions.register("_repeat_", repeat).is_none());
    assert!(coercions.register("_repeat_", repeat).is_some());
    assert!(coercions.contains("_repeat_"));

    assert!(coercions.unregister("_repeat_").is_some());
    assert!(coercions.unregister("_repeat_").is_none());
    assert!(!coercions.contains("_repeat_"));
}

#[test]
fn test_builtins_can_be_overridden() {
    let coercions = Coercions::with_builtins();
    coercions.register("_uppercase_", |_cursor, const_eligible, value| {
        fold_constant(
            const_eligible,
            Expression::Coerce {
                kind: Coercion::Lowercase,
                value: Box::new(value),
            },
        )
    });

    let expr = parse_with("COERCE .a _uppercase_", &coercions).unwrap();
    assert_eq!(
        expr.calculate(r#"{"a":"LOUD"}"#).unwrap(),
        Value::String("loud".into())
    );
}

#[test]
fn test_handler_may_use_the_registry() {
    let coercions = Arc::new(Coercions::new());
    let registry = Arc::clone(&coercions);
    coercions.register("_self_", move |_cursor, const_eligible, value| {
        registry.register("_added_", |_cursor, const_eligible, value| {
            Ok((const_eligible, value))
        });
        Ok((const_eligible, value))
    });

    parse_with("COERCE .a _self_", &coercions).unwrap();
    assert!(coercions.contains("_added_"));
}

#[test]
fn test_global_registry() {
    assert!(coercion::global().contains("_datetime_"));
    assert!(matches!(
        parse("COERCE .a _shout_"),
        Err(ParseError::UnknownCoercion(name)) if name == "_shout_"
    ));

    coercion::register("_shout_", |_cursor, const_eligible, value| {
        fold_constant(
            const_eligible,
            Expression::Coerce {
                kind: Coercion::Uppercase,
                value: Box::new(value),
            },
        )
    });
    let expr = parse("COERCE .a _shout_").unwrap();
    assert_eq!(expr.calculate(r#"{"a":"hi"}"#).unwrap(), Value::String("HI".into()));

    assert!(coercion::unregister("_shout_").is_some());
    assert!(parse("COERCE .a _shout_").is_err());
    // already compiled expressions keep their handler's result
    assert_eq!(expr.calculate(r#"{"a":"hi"}"#).unwrap(), Value::String("HI".into()));
}

// ============================================================================
// Custom Coercions
// ============================================================================

#[test]
fn test_custom_coercion_consumes_tokens() {
    let coercions = Coercions::with_builtins();
    coercions.register("_repeat_", repeat);

    let expr = parse_with("COERCE .a _repeat_ 3 == \"ababab\"", &coercions).unwrap();
    assert_eq!(expr.calculate(r#"{"a":"ab"}"#).unwrap(), Value::Bool(true));

    let expr = parse_with("COERCE .a _repeat_ 2", &coercions).unwrap();
    assert!(matches!(expr, Expression::Custom(_)));
    assert!(matches!(
        expr.calculate(r#"{"a":1}"#),
        Err(EvalError::Custom(msg)) if msg == "1 for _repeat_"
    ));
}

#[test]
fn test_custom_coercion_chains_with_builtins() {
    let coercions = Coercions::with_builtins();
    coercions.register("_repeat_", repeat);

    let expr = parse_with("COERCE .a _repeat_ 2,_uppercase_", &coercions).unwrap();
    assert_eq!(
        expr.calculate(r#"{"a":"ab"}"#).unwrap(),
        Value::String("ABAB".into())
    );
}

#[test]
fn test_custom_coercion_folds_constants() {
    let coercions = Coercions::with_builtins();
    coercions.register("_repeat_", repeat);

    assert!(matches!(
        parse_with(r#"COERCE "ab" _repeat_ 2"#, &coercions).unwrap(),
        Expression::Constant(Value::String(s)) if s == "abab"
    ));
}

#[test]
fn test_custom_coercion_errors() {
    let coercions = Coercions::with_builtins();
    coercions.register("_repeat_", repeat);

    assert!(matches!(
        parse_with("COERCE .a _repeat_", &coercions),
        Err(ParseError::InvalidCoerce(_))
    ));
    assert!(matches!(
        parse_with("COERCE .a _repeat_ 1.5", &coercions),
        Err(ParseError::InvalidCoerce(msg)) if msg == "bad count `1.5`"
    ));
    // folding errors surface at parse time
    assert!(matches!(
        parse_with("COERCE 1 _repeat_ 2", &coercions),
        Err(ParseError::Eval(EvalError::Custom(_)))
    ));
}

// ============================================================================
// Constant Folding
// ============================================================================

#[test]
fn test_folded_expression_ignores_the_document() {
    let expr = parse(
        r#"COERCE "2022-01-01" _datetime_ == COERCE "2022-01-01T00:00:00Z" _datetime_"#,
    )
    .unwrap();

    match &expr {
        Expression::Binary { left, right, .. } => {
            assert!(matches!(**left, Expression::Constant(Value::Timestamp(_))));
            assert!(matches!(**right, Expression::Constant(Value::Timestamp(_))));
        }
        other => panic!("Expected binary, got {:?}", other),
    }

    let document = Document::new(b"{{{ not json");
    assert_eq!(expr.evaluate(&document), Ok(Value::Bool(true)));
    assert!(!document.is_parsed());
}

#[test]
fn test_selector_is_read_through_the_document() {
    let expr = parse(".a == 1").unwrap();
    let document = Document::new(br#"{"a":1}"#);
    assert_eq!(expr.evaluate(&document), Ok(Value::Bool(true)));
    assert!(document.is_parsed());
}

#[test]
fn test_folding_stops_at_the_first_selector() {
    match parse("COERCE (COERCE .a _lowercase_) _title_").unwrap() {
        Expression::Coerce { kind: Coercion::Title, value } => {
            assert!(matches!(*value, Expression::Coerce { kind: Coercion::Lowercase, .. }));
        }
        other => panic!("Expected coerce, got {:?}", other),
    }

    assert!(matches!(
        parse("COERCE NULL _string_").unwrap(),
        Expression::Constant(Value::String(s)) if s == "null"
    ));
    assert!(matches!(
        parse("COERCE true _number_").unwrap(),
        Expression::Constant(Value::Number(n)) if n == 1.0
    ));
}
