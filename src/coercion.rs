//! The coercion registry.
//!
//! `COERCE <value> _name_` looks `_name_` up here at parse time. A handler
//! receives the parser's token cursor (so it may consume extra syntax such as
//! `[1:3]`), whether its input is still a compile-time constant, and the
//! expression built so far. It returns the replacement expression and
//! whether that result is still constant.
//!
//! ```
//! use ksql::Coercions;
//! use ksql::coercion::fold_constant;
//!
//! let coercions = Coercions::with_builtins();
//! coercions.register("_noop_", |_cursor, const_eligible, value| {
//!     fold_constant(const_eligible, value)
//! });
//! assert!(coercions.contains("_noop_"));
//! ```

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, trace, warn};

use crate::{
    ast::{Coercion, Expression, Token, TokenKind},
    parser::{ParseError, TokenCursor},
};

/// A coercion handler: `(cursor, const_eligible, expression)` to
/// `(still_const_eligible, expression)`.
pub type CoercionFn =
    dyn Fn(&mut dyn TokenCursor, bool, Expression) -> Result<(bool, Expression), ParseError>
        + Send
        + Sync;

/// Name to handler table guarded by a reader/writer lock.
///
/// Lookups take the read lock and release it before the handler runs, so a
/// handler may itself consult the registry. Registration is meant to happen
/// during setup, before expressions are parsed concurrently.
pub struct Coercions {
    handlers: RwLock<HashMap<String, Arc<CoercionFn>>>,
}

impl Coercions {
    /// An empty registry; not even the built-ins are available.
    pub fn new() -> Self {
        Coercions {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding `_datetime_`, `_number_`, `_string_`, `_lowercase_`,
    /// `_uppercase_`, `_title_` and `_substr_`.
    pub fn with_builtins() -> Self {
        let coercions = Coercions::new();
        for kind in [
            Coercion::DateTime,
            Coercion::Number,
            Coercion::String,
            Coercion::Lowercase,
            Coercion::Uppercase,
            Coercion::Title,
        ] {
            coercions.insert(kind.identifier(), builtin(kind));
        }
        coercions.insert("_substr_", Arc::new(substr));
        coercions
    }

    /// Registers a handler, returning the one it replaced.
    pub fn register<F>(&self, name: impl Into<String>, handler: F) -> Option<Arc<CoercionFn>>
    where
        F: Fn(&mut dyn TokenCursor, bool, Expression) -> Result<(bool, Expression), ParseError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let previous = self.insert(&name, Arc::new(handler));
        if previous.is_some() {
            warn!("coercion `{name}` replaced");
        } else {
            debug!("coercion `{name}` registered");
        }
        previous
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<CoercionFn>> {
        let removed = self.write().remove(name);
        if removed.is_some() {
            debug!("coercion `{name}` unregistered");
        }
        removed
    }

    /// Clones the handler out so the lock is not held while it runs.
    pub fn get(&self, name: &str) -> Option<Arc<CoercionFn>> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn insert(&self, name: &str, handler: Arc<CoercionFn>) -> Option<Arc<CoercionFn>> {
        self.write().insert(name.to_string(), handler)
    }

    // every write is a single insert or remove, so a poisoned map is still consistent
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CoercionFn>>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CoercionFn>>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Coercions {
    fn default() -> Self {
        Coercions::with_builtins()
    }
}

impl fmt::Debug for Coercions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coercions")
            .field("names", &self.names())
            .finish()
    }
}

static GLOBAL: LazyLock<Coercions> = LazyLock::new(Coercions::with_builtins);

/// The process-wide registry used by [`crate::parse`].
pub fn global() -> &'static Coercions {
    &GLOBAL
}

/// Registers a handler on the process-wide registry.
pub fn register<F>(name: impl Into<String>, handler: F) -> Option<Arc<CoercionFn>>
where
    F: Fn(&mut dyn TokenCursor, bool, Expression) -> Result<(bool, Expression), ParseError>
        + Send
        + Sync
        + 'static,
{
    GLOBAL.register(name, handler)
}

/// Removes a handler from the process-wide registry.
pub fn unregister(name: &str) -> Option<Arc<CoercionFn>> {
    GLOBAL.unregister(name)
}

/// Evaluates `expression` once against an empty document when it is
/// constant eligible, replacing it with the computed value.
///
/// Errors raised while folding surface as parse errors.
pub fn fold_constant(
    const_eligible: bool,
    expression: Expression,
) -> Result<(bool, Expression), ParseError> {
    if !const_eligible {
        return Ok((false, expression));
    }
    let value = expression.calculate(b"")?;
    trace!("folded {expression:?} into {value}");
    Ok((true, Expression::Constant(value)))
}

fn builtin(kind: Coercion) -> Arc<CoercionFn> {
    Arc::new(move |_cursor: &mut dyn TokenCursor, const_eligible: bool, value: Expression| {
        fold_constant(
            const_eligible,
            Expression::Coerce {
                kind,
                value: Box::new(value),
            },
        )
    })
}

/// `_substr_[start:end]`, either bound optional but not both.
fn substr(
    cursor: &mut dyn TokenCursor,
    const_eligible: bool,
    value: Expression,
) -> Result<(bool, Expression), ParseError> {
    expect(cursor, TokenKind::OpenBracket, "[ after _substr_")?;

    let token = next(cursor, "number or : after _substr_[")?;
    let start = match token.kind {
        TokenKind::Colon => None,
        TokenKind::Number => {
            let start = index(cursor, token)?;
            expect(cursor, TokenKind::Colon, ": after _substr_[n")?;
            Some(start)
        }
        _ => {
            return Err(ParseError::InvalidCoerce(format!(
                "Expected number after _substr_[ but got `{}`",
                cursor.text(token)
            )));
        }
    };

    let token = next(cursor, "number or ] after _substr_[")?;
    let end = match token.kind {
        TokenKind::CloseBracket => None,
        TokenKind::Number => {
            let end = index(cursor, token)?;
            expect(cursor, TokenKind::CloseBracket, "] after _substr_[n:n")?;
            Some(end)
        }
        _ => {
            return Err(ParseError::InvalidCoerce(format!(
                "Expected number after _substr_[n: but got `{}`",
                cursor.text(token)
            )));
        }
    };

    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(ParseError::InvalidCoerce(format!(
            "Start index {start} cannot be greater than end index {end}"
        ))),
        (None, None) => Err(ParseError::InvalidCoerce(
            "Start and end index for _substr_ cannot both be empty".to_string(),
        )),
        _ => fold_constant(
            const_eligible,
            Expression::Coerce {
                kind: Coercion::Substr { start, end },
                value: Box::new(value),
            },
        ),
    }
}

fn next(cursor: &mut dyn TokenCursor, expected: &str) -> Result<Token, ParseError> {
    match cursor.next_token() {
        Some(token) => Ok(token?),
        None => Err(ParseError::InvalidCoerce(format!("Expected {expected}"))),
    }
}

fn expect(cursor: &mut dyn TokenCursor, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
    let token = next(cursor, expected)?;
    if token.kind == kind {
        Ok(())
    } else {
        Err(ParseError::InvalidCoerce(format!(
            "Expected {expected} but got `{}`",
            cursor.text(token)
        )))
    }
}

fn index(cursor: &dyn TokenCursor, token: Token) -> Result<usize, ParseError> {
    let text = cursor.text(token);
    text.parse()
        .map_err(|_| ParseError::InvalidCoerce(format!("Invalid _substr_ index `{text}`")))
}
