/// The kind of a lexed token.
///
/// Tokens never carry their text; use [`Token::text`] with the original
/// expression to recover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    /// Dotted path into the document
    ///
    /// # Examples
    /// ```text
    /// .name
    /// .properties.employees
    /// .items[0].price
    /// ```
    SelectorPath,

    /// Single or double quoted string, quotes included in the token span
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'it\'s'
    /// ```
    QuotedString,

    /// Number, validated when the literal is materialized
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// 1e-10
    /// ```
    Number,

    /// `true`
    BooleanTrue,

    /// `false`
    BooleanFalse,

    /// `NULL`
    Null,

    // Operators
    /// `==` or `=`
    Equals,

    /// `+`
    Add,

    /// `-`
    Subtract,

    /// `*`
    Multiply,

    /// `/`
    Divide,

    /// `>`
    Gt,

    /// `>=`
    Gte,

    /// `<`
    Lt,

    /// `<=`
    Lte,

    /// `&&`
    And,

    /// `||`
    Or,

    /// `!`
    ///
    /// Negates the next value (`!.flag`) or the next operation (`.a !> 5`).
    Not,

    // Predicates
    /// `CONTAINS`
    Contains,

    /// `CONTAINS_ANY`
    ContainsAny,

    /// `CONTAINS_ALL`
    ContainsAll,

    /// `IN`
    In,

    /// `BETWEEN`
    ///
    /// # Examples
    /// ```text
    /// .age BETWEEN 18 65
    /// ```
    Between,

    /// `STARTSWITH`
    StartsWith,

    /// `ENDSWITH`
    EndsWith,

    // Structure
    /// `[`
    OpenBracket,

    /// `]`
    CloseBracket,

    /// `,`
    Comma,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `:`, only meaningful inside coercion sub-grammars such as `_substr_[1:3]`
    Colon,

    // Special forms
    /// `COERCE`
    ///
    /// # Examples
    /// ```text
    /// COERCE .created_at _datetime_
    /// COERCE .name _lowercase_,_title_
    /// ```
    Coerce,

    /// Coercion tag, must start and end with `_`
    ///
    /// # Examples
    /// ```text
    /// _datetime_
    /// _substr_
    /// ```
    Identifier,
}

/// A zero-copy token: a kind plus a byte span into the source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub start: u32,
    pub len: u16,
}

impl Token {
    pub fn new(kind: TokenKind, start: u32, len: u16) -> Self {
        Token { kind, start, len }
    }

    /// Byte offset one past the end of the token.
    pub fn end(&self) -> usize {
        self.start as usize + self.len as usize
    }

    /// Re-slice this token's text out of the expression it was lexed from.
    ///
    /// Returns an empty string if the span does not belong to `source`.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start as usize..self.end()).unwrap_or_default()
    }
}
