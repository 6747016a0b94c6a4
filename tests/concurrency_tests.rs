use std::sync::Arc;
use std::thread;

use ksql::{Coercions, Expression, Value, parse, parse_with};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_expression_is_shareable() {
    assert_send_sync::<Expression>();
    assert_send_sync::<Coercions>();
    assert_send_sync::<Value>();
}

#[test]
fn test_shared_expression_across_threads() {
    let expr = parse(r#".n > 50 && COERCE .name _lowercase_ STARTSWITH "user""#).unwrap();
    let documents: Vec<String> = (0..200)
        .map(|n| format!(r#"{{"n":{n},"name":"USER-{n}"}}"#))
        .collect();

    let sequential: Vec<Value> = documents
        .iter()
        .map(|doc| expr.calculate(doc).unwrap())
        .collect();

    let parallel: Vec<Value> = thread::scope(|s| {
        let handles: Vec<_> = documents
            .chunks(25)
            .map(|chunk| {
                let expr = &expr;
                s.spawn(move || {
                    chunk
                        .iter()
                        .map(|doc| expr.calculate(doc).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    assert_eq!(parallel, sequential);
    assert_eq!(
        parallel.iter().filter(|v| **v == Value::Bool(true)).count(),
        149
    );
}

#[test]
fn test_parallel_parsing_with_shared_registry() {
    let coercions = Arc::new(Coercions::with_builtins());

    thread::scope(|s| {
        for i in 0..8 {
            let coercions = Arc::clone(&coercions);
            s.spawn(move || {
                let expr = parse_with(format!("COERCE .v _substr_[0:{i}]"), &coercions).unwrap();
                let value = expr.calculate(r#"{"v":"abcdefgh"}"#).unwrap();
                assert_eq!(value, Value::String("abcdefgh"[..i].to_string()));
            });
        }
    });
}

#[test]
fn test_registration_during_parsing() {
    let coercions = Arc::new(Coercions::with_builtins());

    thread::scope(|s| {
        let writer = Arc::clone(&coercions);
        s.spawn(move || {
            for i in 0..50 {
                writer.register(format!("_extra{i}_"), |_cursor, const_eligible, value| {
                    Ok((const_eligible, value))
                });
            }
        });

        for _ in 0..4 {
            let reader = Arc::clone(&coercions);
            s.spawn(move || {
                for _ in 0..50 {
                    let expr = parse_with("COERCE .v _uppercase_", &reader).unwrap();
                    assert_eq!(
                        expr.calculate(r#"{"v":"x"}"#).unwrap(),
                        Value::String("X".into())
                    );
                }
            });
        }
    });

    assert!(coercions.contains("_extra49_"));
}
