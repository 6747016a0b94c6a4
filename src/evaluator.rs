use std::fmt::Debug;

use chrono::SecondsFormat;
use thiserror::Error;

use crate::{
    ast::{BinOp, Coercion, Expression},
    datetime::parse_datetime,
    selector::Document,
    value::Value,
};

/// Errors that can occur while evaluating an expression against a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Operand types are not valid for the operation
    #[error("Unsupported type comparison: {0}")]
    UnsupportedTypeComparison(String),

    /// Coercion applied to a value it cannot convert
    #[error("Unsupported type COERCE: {0}")]
    UnsupportedCoerce(String),

    /// Raised by user-registered expression nodes
    #[error("{0}")]
    Custom(String),
}

/// Something that can be evaluated against a document.
///
/// Implemented by [`Expression`] and by the nodes custom coercions wrap
/// their input in. Implementations must be pure: the same document always
/// yields the same result.
pub trait Evaluate: Debug + Send + Sync {
    fn evaluate(&self, document: &Document<'_>) -> Result<Value, EvalError>;
}

impl Expression {
    /// Evaluates the expression against raw JSON bytes.
    ///
    /// The document is only parsed if a selector path is reached, and a
    /// document that is not valid JSON resolves every path to `null`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ksql::{parse, Value};
    ///
    /// let expr = parse(".properties.employees > 20").unwrap();
    /// let result = expr.calculate(r#"{"properties":{"employees":50}}"#).unwrap();
    /// assert_eq!(result, Value::Bool(true));
    /// ```
    pub fn calculate(&self, document: impl AsRef<[u8]>) -> Result<Value, EvalError> {
        self.evaluate(&Document::new(document.as_ref()))
    }
}

impl Evaluate for Expression {
    fn evaluate(&self, document: &Document<'_>) -> Result<Value, EvalError> {
        match self {
            Expression::Null => Ok(Value::Null),
            Expression::Bool(b) => Ok(Value::Bool(*b)),
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Constant(value) => Ok(value.clone()),
            Expression::SelectorPath(selector) => Ok(document.get(selector)),
            Expression::Array(items) => items
                .iter()
                .map(|item| item.evaluate(document))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expression::Not(inner) => match inner.evaluate(document)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(EvalError::UnsupportedTypeComparison(format!("{other} for !"))),
            },
            Expression::Logical { first, rest } => {
                logical(first, rest.iter().map(|(op, operand)| (*op, operand)), document)
            }
            Expression::Binary {
                op: op @ (BinOp::And | BinOp::Or),
                left,
                right,
            } => logical(left, [(*op, right.as_ref())], document),
            Expression::Binary { op, left, right } => {
                let left = left.evaluate(document)?;
                let right = right.evaluate(document)?;
                apply_binop(*op, left, right)
            }
            Expression::Between { value, lower, upper } => {
                let lower = lower.evaluate(document)?;
                let upper = upper.evaluate(document)?;
                let value = value.evaluate(document)?;
                between(&value, &lower, &upper)
            }
            Expression::Coerce { kind, value } => apply_coercion(*kind, value.evaluate(document)?),
            Expression::Custom(inner) => inner.evaluate(document),
        }
    }
}

/// Evaluates `first op1 (x1 op2 (x2 ...))` without recursing per operator.
///
/// `||` stops at a `true` left side, `&&` at anything but `true`. Otherwise
/// the right side must be a boolean, and so must the left side of `||`.
fn logical<'e>(
    first: &Expression,
    rest: impl IntoIterator<Item = (BinOp, &'e Expression)>,
    document: &Document<'_>,
) -> Result<Value, EvalError> {
    let mut pending = Vec::new();
    let mut value = first.evaluate(document)?;

    for (op, operand) in rest {
        match op {
            BinOp::And if value != Value::Bool(true) => {
                value = Value::Bool(false);
                break;
            }
            BinOp::Or if value == Value::Bool(true) => break,
            _ => {}
        }
        pending.push((op, value));
        value = operand.evaluate(document)?;
    }

    // innermost operation first
    pending
        .into_iter()
        .rev()
        .try_fold(value, |right, (op, left)| match (&left, &right) {
            (_, Value::Bool(b)) if op == BinOp::And => Ok(Value::Bool(*b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
            _ => Err(mismatch(&left, op, &right)),
        })
}

fn mismatch(left: &Value, op: BinOp, right: &Value) -> EvalError {
    EvalError::UnsupportedTypeComparison(format!("{left} {op} {right}"))
}

/// Applies a binary operator other than the short-circuiting `&&` and `||`.
fn apply_binop(op: BinOp, left: Value, right: Value) -> Result<Value, EvalError> {
    use Value::*;

    match op {
        BinOp::Add => match (left, right) {
            (Number(a), Number(b)) => Ok(Number(a + b)),
            (String(a), String(b)) => Ok(String(a + &b)),
            // null is absorbed by a string or number on the other side
            (v @ (Number(_) | String(_)), Null) | (Null, v @ (Number(_) | String(_))) => Ok(v),
            (a, b) => Err(mismatch(&a, op, &b)),
        },
        BinOp::Subtract | BinOp::Multiply | BinOp::Divide => match (&left, &right) {
            (Number(a), Number(b)) => Ok(Number(match op {
                BinOp::Subtract => a - b,
                BinOp::Multiply => a * b,
                _ => a / b,
            })),
            _ => Err(mismatch(&left, op, &right)),
        },
        BinOp::Equals => Ok(Bool(left == right)),
        BinOp::Gt | BinOp::Gte | BinOp::Lt | BinOp::Lte => {
            let ordering = match (&left, &right) {
                (String(a), String(b)) => a.partial_cmp(b),
                (Number(a), Number(b)) => a.partial_cmp(b),
                (Timestamp(a), Timestamp(b)) => a.partial_cmp(b),
                _ => return Err(mismatch(&left, op, &right)),
            };
            Ok(Bool(ordering.is_some_and(|ord| match op {
                BinOp::Gt => ord.is_gt(),
                BinOp::Gte => ord.is_ge(),
                BinOp::Lt => ord.is_lt(),
                _ => ord.is_le(),
            })))
        }
        BinOp::StartsWith => match (&left, &right) {
            (String(a), String(b)) => Ok(Bool(a.starts_with(b.as_str()))),
            _ => Err(mismatch(&left, op, &right)),
        },
        BinOp::EndsWith => match (&left, &right) {
            (String(a), String(b)) => Ok(Bool(a.ends_with(b.as_str()))),
            _ => Err(mismatch(&left, op, &right)),
        },
        BinOp::Contains => match (&left, &right) {
            (String(a), String(b)) => Ok(Bool(a.contains(b.as_str()))),
            (Array(items), needle) => Ok(Bool(items.contains(needle))),
            _ => Err(mismatch(&left, op, &right)),
        },
        BinOp::ContainsAny => contains_matching(&left, &right, false)
            .map(Bool)
            .ok_or_else(|| mismatch(&left, op, &right)),
        BinOp::ContainsAll => contains_matching(&left, &right, true)
            .map(Bool)
            .ok_or_else(|| mismatch(&left, op, &right)),
        BinOp::In => match &right {
            Array(items) => Ok(Bool(items.contains(&left))),
            _ => Err(mismatch(&left, op, &right)),
        },
        BinOp::And | BinOp::Or => Err(mismatch(&left, op, &right)),
    }
}

/// `CONTAINS_ANY` / `CONTAINS_ALL`; `None` when the operand types do not combine.
///
/// - string, string: characters of the right appear in the left
/// - string, array: string elements are substrings of the left, others never match
/// - array, array: elements of the right appear in the left
/// - array, string: characters of the right appear as one-character elements
fn contains_matching(left: &Value, right: &Value, all: bool) -> Option<bool> {
    match (left, right) {
        (Value::String(haystack), Value::String(needles)) => {
            Some(check(all, needles.chars().map(|c| haystack.contains(c))))
        }
        (Value::String(haystack), Value::Array(needles)) => Some(check(
            all,
            needles
                .iter()
                .map(|n| n.as_str().is_some_and(|s| haystack.contains(s))),
        )),
        (Value::Array(items), Value::Array(needles)) => {
            Some(check(all, needles.iter().map(|n| items.contains(n))))
        }
        (Value::Array(items), Value::String(needles)) => Some(check(
            all,
            needles
                .chars()
                .map(|c| items.contains(&Value::String(c.to_string()))),
        )),
        _ => None,
    }
}

fn check(all: bool, mut found: impl Iterator<Item = bool>) -> bool {
    if all {
        found.all(|f| f)
    } else {
        found.any(|f| f)
    }
}

/// Exclusive range test; any null operand makes the whole test false.
fn between(value: &Value, lower: &Value, upper: &Value) -> Result<Value, EvalError> {
    if value.is_null() || lower.is_null() || upper.is_null() {
        return Ok(Value::Bool(false));
    }

    let unsupported =
        || EvalError::UnsupportedTypeComparison(format!("{lower} < {value} < {upper}"));

    if !(value.same_type(lower) && value.same_type(upper)) {
        return Err(unsupported());
    }

    let inside = match (value, lower, upper) {
        (Value::String(v), Value::String(l), Value::String(u)) => v > l && v < u,
        (Value::Number(v), Value::Number(l), Value::Number(u)) => v > l && v < u,
        (Value::Timestamp(v), Value::Timestamp(l), Value::Timestamp(u)) => v > l && v < u,
        _ => return Err(unsupported()),
    };
    Ok(Value::Bool(inside))
}

/// Applies a built-in coercion to an already evaluated value.
pub(crate) fn apply_coercion(kind: Coercion, value: Value) -> Result<Value, EvalError> {
    let unsupported =
        |value: &Value| EvalError::UnsupportedCoerce(format!("{value} for {}", kind.identifier()));

    match (kind, value) {
        // unparseable dates are null, not errors, so they fail comparisons quietly
        (Coercion::DateTime, Value::String(s)) => {
            Ok(parse_datetime(&s).map_or(Value::Null, Value::Timestamp))
        }
        (Coercion::DateTime, t @ Value::Timestamp(_)) => Ok(t),

        (Coercion::Number, Value::String(s)) => match s.parse::<f64>() {
            Ok(n) => Ok(Value::Number(n)),
            Err(_) => Err(unsupported(&Value::String(s))),
        },
        (Coercion::Number, n @ Value::Number(_)) => Ok(n),
        (Coercion::Number, Value::Bool(b)) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
        (Coercion::Number, Value::Timestamp(t)) => match t.timestamp_nanos_opt() {
            Some(nanos) => Ok(Value::Number(nanos as f64)),
            None => Err(unsupported(&Value::Timestamp(t))),
        },

        (Coercion::String, Value::Null) => Ok(Value::String("null".to_string())),
        (Coercion::String, s @ Value::String(_)) => Ok(s),
        (Coercion::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
        (Coercion::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (Coercion::String, Value::Timestamp(t)) => {
            Ok(Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        }

        (Coercion::Lowercase, Value::String(s)) => Ok(Value::String(s.to_lowercase())),
        (Coercion::Uppercase, Value::String(s)) => Ok(Value::String(s.to_uppercase())),
        (Coercion::Title, Value::String(s)) => Ok(Value::String(title_case(&s))),
        (Coercion::Substr { start, end }, Value::String(s)) => {
            Ok(substr(&s, start, end).map_or(Value::Null, Value::String))
        }

        (_, value) => Err(unsupported(&value)),
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut titled: String = first.to_uppercase().collect();
            titled.push_str(&chars.as_str().to_lowercase());
            titled
        }
        None => String::new(),
    }
}

/// Character-indexed slice; `None` when a bound falls outside the string.
fn substr(s: &str, start: Option<usize>, end: Option<usize>) -> Option<String> {
    let len = s.chars().count();
    let start = start.unwrap_or(0);
    let end = end.unwrap_or(len);

    if start > len || end > len || start > end {
        return None;
    }
    Some(s.chars().skip(start).take(end - start).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hELLO wORLD"), "Hello world");
        assert_eq!(title_case("élan"), "Élan");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_substr_bounds() {
        assert_eq!(substr("Joeybloggs", Some(0), Some(4)).as_deref(), Some("Joey"));
        assert_eq!(substr("Joeybloggs", Some(4), None).as_deref(), Some("bloggs"));
        assert_eq!(substr("Joeybloggs", None, Some(3)).as_deref(), Some("Joe"));
        assert_eq!(substr("héllo", Some(1), Some(2)).as_deref(), Some("é"));
        assert_eq!(substr("abc", Some(2), Some(10)), None);
        assert_eq!(substr("abc", Some(3), None).as_deref(), Some(""));
    }

    #[test]
    fn test_between_exclusive() {
        let n = Value::Number;
        assert_eq!(between(&n(5.0), &n(1.0), &n(10.0)), Ok(Value::Bool(true)));
        assert_eq!(between(&n(10.0), &n(1.0), &n(10.0)), Ok(Value::Bool(false)));
        assert_eq!(between(&Value::Null, &n(1.0), &n(10.0)), Ok(Value::Bool(false)));
        assert!(between(&n(5.0), &"a".into(), &n(10.0)).is_err());
    }

    #[test]
    fn test_contains_matching() {
        let s = |v: &str| Value::String(v.to_string());
        let arr = |v: Vec<Value>| Value::Array(v);

        assert_eq!(contains_matching(&s("team"), &s("xa"), false), Some(true));
        assert_eq!(contains_matching(&s("team"), &s("xa"), true), Some(false));
        assert_eq!(
            contains_matching(&s("team"), &arr(vec![s("ea"), Value::Number(1.0)]), true),
            Some(false)
        );
        assert_eq!(
            contains_matching(&arr(vec![s("a"), s("b")]), &s("ab"), true),
            Some(true)
        );
        assert_eq!(contains_matching(&arr(vec![]), &arr(vec![]), false), Some(false));
        assert_eq!(contains_matching(&arr(vec![]), &arr(vec![]), true), Some(true));
        assert_eq!(contains_matching(&Value::Number(1.0), &s("a"), true), None);
    }
}
