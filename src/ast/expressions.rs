use crate::ast::BinOp;
use crate::evaluator::Evaluate;
use crate::selector::Selector;
use crate::value::Value;

/// A parsed expression, ready to be evaluated against any number of documents.
///
/// Trees are immutable once built and may be shared across threads.
#[derive(Debug)]
pub enum Expression {
    // Literals
    /// `NULL`
    Null,

    /// `true` or `false`
    Bool(bool),

    /// Number literal
    ///
    /// # Example
    /// ```text
    /// 42
    /// -1.5
    /// ```
    Number(f64),

    /// String literal with its quotes removed
    String(String),

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, "two", .three]
    /// ```
    Array(Vec<Expression>),

    // References
    /// Lookup into the document being evaluated
    ///
    /// # Example
    /// ```text
    /// .properties.employees
    /// ```
    SelectorPath(Selector),

    // Operations
    /// `!value`, or an operation prefixed with `!`
    Not(Box<Expression>),

    /// Binary operation
    ///
    /// # Example
    /// ```text
    /// .age >= 18      // Binary { op: Gte, left: .age, right: 18 }
    /// ```
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Chain of `&&` and `||`
    ///
    /// Each operator takes everything to its right within the group, so
    /// the chain is read right-nested: `a && b || c` is `a && (b || c)`.
    ///
    /// # Example
    /// ```text
    /// .a && .b || .c  // Logical { first: .a, rest: [(And, .b), (Or, .c)] }
    /// ```
    Logical {
        first: Box<Expression>,
        rest: Vec<(BinOp, Expression)>,
    },

    /// Exclusive range test `value BETWEEN lower upper`
    Between {
        value: Box<Expression>,
        lower: Box<Expression>,
        upper: Box<Expression>,
    },

    /// Built-in coercion applied to a value
    Coerce {
        kind: Coercion,
        value: Box<Expression>,
    },

    /// Value computed once at parse time
    Constant(Value),

    /// Node contributed by a user-registered coercion
    Custom(Box<dyn Evaluate>),
}

impl Expression {
    /// Whether this node is a literal whose value never depends on the document.
    ///
    /// Coercions wrapping literals may be folded into [`Expression::Constant`].
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::Null
                | Expression::Bool(_)
                | Expression::Number(_)
                | Expression::String(_)
                | Expression::Constant(_)
        )
    }
}

/// Built-in coercions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// `_datetime_`: string to timestamp
    DateTime,
    /// `_number_`
    Number,
    /// `_string_`
    String,
    /// `_lowercase_`
    Lowercase,
    /// `_uppercase_`
    Uppercase,
    /// `_title_`: first character uppercased, the rest lowercased
    Title,
    /// `_substr_[start:end]`, bounds in characters, end exclusive
    ///
    /// # Examples
    /// ```text
    /// _substr_[1:3]
    /// _substr_[:3]
    /// _substr_[2:]
    /// ```
    Substr {
        start: Option<usize>,
        end: Option<usize>,
    },
}

impl Coercion {
    /// The identifier the coercion is registered under
    pub fn identifier(&self) -> &'static str {
        match self {
            Coercion::DateTime => "_datetime_",
            Coercion::Number => "_number_",
            Coercion::String => "_string_",
            Coercion::Lowercase => "_lowercase_",
            Coercion::Uppercase => "_uppercase_",
            Coercion::Title => "_title_",
            Coercion::Substr { .. } => "_substr_",
        }
    }
}
