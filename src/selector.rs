//! Selector paths: addressing values inside a JSON document.
//!
//! A selector is written `.a.b.c`. Numeric keys index arrays, bracket
//! segments (`.items[0]`, `.map["dotted.key"]`) address a single key, `\`
//! escapes a literal dot, and `#` yields the length of an array or, mid-path,
//! maps the rest of the path over every element (`.friends.#.name`).
//!
//! Resolution never fails: anything missing is `null`.

use std::cell::OnceCell;

use crate::value::Value;

/// A segment in a selector path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Object key; also an array index when the key is numeric
    ///
    /// # Examples
    /// - `.name` → `Field("name")`
    /// - `.items.0` → `[Field("items"), Field("0")]`
    Field(String),

    /// Bracketed array index
    ///
    /// # Examples
    /// - `.items[2]` → `[Field("items"), Index(2)]`
    Index(usize),

    /// `#`: array length at the end of a path, element-wise mapping in the middle
    Length,
}

/// A parsed selector path such as `.properties.employees`.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    path: String,
    segments: Vec<PathSegment>,
}

impl Selector {
    /// Parses a selector; the leading `.` is optional.
    pub fn parse(path: &str) -> Self {
        let path = path.strip_prefix('.').unwrap_or(path);
        Selector {
            path: path.to_string(),
            segments: parse_segments(path),
        }
    }

    /// The path text without its leading `.`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolves the selector against a parsed JSON document.
    pub fn resolve(&self, document: &serde_json::Value) -> Value {
        resolve_segments(document, &self.segments).unwrap_or(Value::Null)
    }
}

fn parse_segments(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut key = String::new();
    // a key is pending at the start and after every dot
    let mut pending = true;
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    key.push(escaped);
                }
                pending = true;
            }
            '.' => {
                if pending {
                    segments.push(field(std::mem::take(&mut key)));
                }
                pending = true;
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(field(std::mem::take(&mut key)));
                }
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                segments.push(bracket(inner.trim()));
                pending = false;
            }
            c => {
                key.push(c);
                pending = true;
            }
        }
    }

    if pending {
        segments.push(field(key));
    }
    segments
}

fn field(key: String) -> PathSegment {
    if key == "#" {
        PathSegment::Length
    } else {
        PathSegment::Field(key)
    }
}

fn bracket(inner: &str) -> PathSegment {
    let unquoted = inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));

    match unquoted {
        Some(key) => PathSegment::Field(key.to_string()),
        None => match inner.parse::<usize>() {
            Ok(index) => PathSegment::Index(index),
            Err(_) => PathSegment::Field(inner.to_string()),
        },
    }
}

fn resolve_segments(value: &serde_json::Value, segments: &[PathSegment]) -> Option<Value> {
    use serde_json::Value as Json;

    let Some((segment, rest)) = segments.split_first() else {
        return Some(Value::from(value));
    };

    let next = match (segment, value) {
        (PathSegment::Field(key), Json::Object(map)) => map.get(key),
        (PathSegment::Field(key), Json::Array(items)) => {
            key.parse::<usize>().ok().and_then(|i| items.get(i))
        }
        (PathSegment::Index(i), Json::Array(items)) => items.get(*i),
        (PathSegment::Index(i), Json::Object(map)) => map.get(&i.to_string()),
        (PathSegment::Length, Json::Array(items)) if rest.is_empty() => {
            return Some(Value::Number(items.len() as f64));
        }
        (PathSegment::Length, Json::Array(items)) => {
            let mapped = items
                .iter()
                .filter_map(|item| resolve_segments(item, rest))
                .collect();
            return Some(Value::Array(mapped));
        }
        _ => None,
    };

    next.and_then(|v| resolve_segments(v, rest))
}

/// A JSON document being evaluated.
///
/// The raw bytes are parsed on first access, at most once per evaluation,
/// so expressions that never touch the document never parse it. A document
/// that is not valid JSON behaves as if every path were missing.
pub struct Document<'a> {
    raw: &'a [u8],
    parsed: OnceCell<Option<serde_json::Value>>,
}

impl<'a> Document<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        Document {
            raw,
            parsed: OnceCell::new(),
        }
    }

    /// Whether any selector has forced the document to be parsed yet
    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// Looks up a selector, yielding `Null` for anything missing.
    pub fn get(&self, selector: &Selector) -> Value {
        let parsed = self
            .parsed
            .get_or_init(|| serde_json::from_slice(self.raw).ok());

        match parsed {
            Some(json) => selector.resolve(json),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str, json: &str) -> Value {
        Document::new(json.as_bytes()).get(&Selector::parse(path))
    }

    #[test]
    fn segments() {
        assert_eq!(
            Selector::parse(".a.b[0].c").segments(),
            &[
                PathSegment::Field("a".into()),
                PathSegment::Field("b".into()),
                PathSegment::Index(0),
                PathSegment::Field("c".into()),
            ]
        );
        assert_eq!(
            Selector::parse(r".a\.b").segments(),
            &[PathSegment::Field("a.b".into())]
        );
        assert_eq!(
            Selector::parse(r#".m["x.y"]"#).segments(),
            &[PathSegment::Field("m".into()), PathSegment::Field("x.y".into())]
        );
    }

    #[test]
    fn nested_lookup() {
        let json = r#"{"name":"Company","properties":{"employees":50},"tags":["a","b"]}"#;
        assert_eq!(get(".properties.employees", json), Value::Number(50.0));
        assert_eq!(get(".tags.1", json), Value::String("b".into()));
        assert_eq!(get(".tags[0]", json), Value::String("a".into()));
        assert_eq!(get(".tags.#", json), Value::Number(2.0));
        assert_eq!(get(".properties", json), Value::Null);
        assert_eq!(get(".missing.deeper", json), Value::Null);
    }

    #[test]
    fn length_maps_over_elements() {
        let json = r#"{"friends":[{"name":"Dale"},{"name":"Roger"},{"age":3}]}"#;
        assert_eq!(
            get(".friends.#.name", json),
            Value::Array(vec!["Dale".into(), "Roger".into()])
        );
    }

    #[test]
    fn invalid_document_is_null() {
        assert_eq!(get(".a", "{not json"), Value::Null);
        assert_eq!(get(".a", ""), Value::Null);
    }

    #[test]
    fn parsed_lazily() {
        let doc = Document::new(br#"{"a":1}"#);
        assert!(!doc.is_parsed());
        doc.get(&Selector::parse(".a"));
        assert!(doc.is_parsed());
    }
}
