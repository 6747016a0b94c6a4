use log::debug;
use thiserror::Error;

use crate::{
    ast::{BinOp, Expression, Token, TokenKind},
    coercion::{self, Coercions},
    evaluator::EvalError,
    lexer::{LexError, Tokenizer},
    selector::Selector,
};

/// Errors raised while compiling an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Expression is empty")]
    EmptyExpression,

    #[error("Missing operand after `{0}`")]
    MissingOperand(String),

    #[error("Unclosed `(`")]
    UnclosedParen,

    #[error("Unclosed `[`")]
    UnclosedArray,

    #[error("Unexpected `)`")]
    UnexpectedCloseParen,

    #[error("Expected a coercion identifier after COERCE value, found {0}")]
    MissingCoerceIdentifier(String),

    #[error("Unknown coercion `{0}`")]
    UnknownCoercion(String),

    #[error("Invalid COERCE: {0}")]
    InvalidCoerce(String),

    #[error("Token `{0}` is not a valid value")]
    InvalidValue(String),

    #[error("Token `{0}` is not a valid operation")]
    InvalidOperation(String),

    #[error("Invalid number `{0}`")]
    InvalidNumber(String),

    #[error("Expression nests deeper than {} levels", MAX_DEPTH)]
    TooDeep,

    #[error("Expression is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Token access handed to coercion handlers so they can consume extra syntax.
pub trait TokenCursor {
    /// Consumes the next token; `None` at the end of the expression.
    fn next_token(&mut self) -> Option<Result<Token, LexError>>;

    /// Looks at the next token without consuming it.
    fn peek_token(&mut self) -> Option<Result<Token, LexError>>;

    /// The expression being parsed.
    fn source(&self) -> &str;

    fn text(&self, token: Token) -> &str {
        token.text(self.source())
    }
}

/// A [`Tokenizer`] with one token of lookahead.
pub struct TokenStream<'a> {
    tokenizer: Tokenizer<'a>,
    peeked: Option<Option<Result<Token, LexError>>>,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> Self {
        TokenStream {
            tokenizer: Tokenizer::new(source),
            peeked: None,
        }
    }
}

impl TokenCursor for TokenStream<'_> {
    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.tokenizer.next(),
        }
    }

    fn peek_token(&mut self) -> Option<Result<Token, LexError>> {
        self.peeked
            .get_or_insert_with(|| self.tokenizer.next())
            .clone()
    }

    fn source(&self) -> &str {
        self.tokenizer.source()
    }
}

/// How a call to [`Parser::parse_expression`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Eof,
    CloseParen,
}

/// How a run of non-logical operations stopped.
enum Term {
    End(Option<Expression>, End),
    Logical(Expression, Token),
}

/// Deepest nesting of groups, prefixes, arrays and chained operations.
pub const MAX_DEPTH: usize = 256;

/// Recursive-descent parser without operator precedence.
///
/// Operations apply left to right in the order they are written, except
/// that `&&` and `||` take the whole remainder of the current group as
/// their right operand.
pub struct Parser<'a> {
    tokens: TokenStream<'a>,
    coercions: &'a Coercions,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, coercions: &'a Coercions) -> Self {
        Parser {
            tokens: TokenStream::new(source),
            coercions,
            depth: 0,
        }
    }

    /// Parses the whole expression.
    pub fn parse(mut self) -> Result<Expression, ParseError> {
        match self.parse_expression()? {
            (_, End::CloseParen) => Err(ParseError::UnexpectedCloseParen),
            (None, End::Eof) => Err(ParseError::EmptyExpression),
            (Some(expression), End::Eof) => Ok(expression),
        }
    }

    fn advance(&mut self) -> Result<Option<Token>, ParseError> {
        Ok(self.tokens.next_token().transpose()?)
    }

    fn text(&self, token: Token) -> &'a str {
        token.text(self.tokens.tokenizer.source())
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }
        Ok(())
    }

    /// Runs `parse` one level deeper, restoring the depth afterwards.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let depth = self.depth;
        self.descend()?;
        let result = parse(self);
        self.depth = depth;
        result
    }

    /// A group: terms joined by `&&`/`||` into one flat chain.
    fn parse_expression(&mut self) -> Result<(Option<Expression>, End), ParseError> {
        let (first, mut token) = match self.nested(Self::parse_term)? {
            Term::End(expression, end) => return Ok((expression, end)),
            Term::Logical(first, token) => (first, token),
        };

        let mut rest = Vec::new();
        loop {
            let op = if token.kind == TokenKind::And {
                BinOp::And
            } else {
                BinOp::Or
            };
            match self.nested(Self::parse_term)? {
                Term::Logical(operand, next) => {
                    rest.push((op, operand));
                    token = next;
                }
                Term::End(Some(operand), end) => {
                    rest.push((op, operand));
                    let chain = Expression::Logical {
                        first: Box::new(first),
                        rest,
                    };
                    return Ok((Some(chain), end));
                }
                Term::End(None, _) => return Err(self.missing_operand(token)),
            }
        }
    }

    /// Values and operations up to `&&`, `||`, `)` or the end of input.
    fn parse_term(&mut self) -> Result<Term, ParseError> {
        let mut current: Option<Expression> = None;

        while let Some(token) = self.advance()? {
            current = match (current, token.kind) {
                (current, TokenKind::CloseParen) => {
                    return Ok(Term::End(current, End::CloseParen));
                }
                (Some(left), TokenKind::And | TokenKind::Or) => {
                    return Ok(Term::Logical(left, token));
                }
                (None, _) => Some(self.parse_value(token)?),
                (Some(left), _) => {
                    // every operation wraps everything before it
                    self.descend()?;
                    Some(self.parse_operation(token, left)?)
                }
            };
        }

        Ok(Term::End(current, End::Eof))
    }

    fn parse_value(&mut self, token: Token) -> Result<Expression, ParseError> {
        match token.kind {
            TokenKind::QuotedString => Ok(Expression::String(unescape(self.text(token)))),
            TokenKind::Number => self.parse_number(token, false).map(Expression::Number),
            TokenKind::BooleanTrue => Ok(Expression::Bool(true)),
            TokenKind::BooleanFalse => Ok(Expression::Bool(false)),
            TokenKind::Null => Ok(Expression::Null),
            TokenKind::SelectorPath => {
                Ok(Expression::SelectorPath(Selector::parse(self.text(token))))
            }
            TokenKind::OpenBracket => self.nested(Self::parse_array),
            TokenKind::OpenParen => match self.parse_expression()? {
                (Some(inner), End::CloseParen) => Ok(inner),
                (None, End::CloseParen) => Err(ParseError::EmptyExpression),
                (_, End::Eof) => Err(ParseError::UnclosedParen),
            },
            TokenKind::Not => self.nested(|parser| {
                let value = parser.operand_value(token)?;
                Ok(Expression::Not(Box::new(value)))
            }),
            TokenKind::Add | TokenKind::Subtract => self.parse_signed(token),
            TokenKind::Coerce => self.nested(|parser| parser.parse_coerce(token)),
            _ => Err(ParseError::InvalidValue(self.text(token).to_string())),
        }
    }

    /// `+`/`-` written directly against a number literal, as in `-1e-3`.
    fn parse_signed(&mut self, sign: Token) -> Result<Expression, ParseError> {
        match self.tokens.peek_token() {
            Some(Ok(number))
                if number.kind == TokenKind::Number && number.start as usize == sign.end() =>
            {
                self.advance()?;
                let negative = sign.kind == TokenKind::Subtract;
                self.parse_number(number, negative).map(Expression::Number)
            }
            _ => Err(ParseError::InvalidValue(self.text(sign).to_string())),
        }
    }

    fn parse_number(&self, token: Token, negative: bool) -> Result<f64, ParseError> {
        let text = self.text(token);
        let n: f64 = text
            .parse()
            .map_err(|_| ParseError::InvalidNumber(text.to_string()))?;
        Ok(if negative { -n } else { n })
    }

    /// Comma separated values up to `]`; a trailing comma is allowed.
    fn parse_array(&mut self) -> Result<Expression, ParseError> {
        let mut items = Vec::new();

        loop {
            let token = self.advance()?.ok_or(ParseError::UnclosedArray)?;
            if token.kind == TokenKind::CloseBracket {
                return Ok(Expression::Array(items));
            }
            items.push(self.parse_value(token)?);

            let token = self.advance()?.ok_or(ParseError::UnclosedArray)?;
            match token.kind {
                TokenKind::Comma => continue,
                TokenKind::CloseBracket => return Ok(Expression::Array(items)),
                _ => return Err(ParseError::InvalidValue(self.text(token).to_string())),
            }
        }
    }

    /// `COERCE <value> _a_[,_b_...]`, each identifier resolved in the registry.
    fn parse_coerce(&mut self, coerce: Token) -> Result<Expression, ParseError> {
        let token = self.operand(coerce)?;
        let mut expression = self.parse_value(token)?;
        let mut const_eligible = expression.is_literal();

        loop {
            let identifier = match self.advance()? {
                Some(token) if token.kind == TokenKind::Identifier => token,
                Some(token) => {
                    return Err(ParseError::MissingCoerceIdentifier(format!(
                        "`{}`",
                        self.text(token)
                    )));
                }
                None => {
                    return Err(ParseError::MissingCoerceIdentifier(
                        "end of expression".to_string(),
                    ));
                }
            };

            let name = self.text(identifier);
            let handler = self
                .coercions
                .get(name)
                .ok_or_else(|| ParseError::UnknownCoercion(name.to_string()))?;
            self.descend()?;
            (const_eligible, expression) =
                handler(&mut self.tokens, const_eligible, expression)?;

            match self.tokens.peek_token() {
                Some(Ok(token)) if token.kind == TokenKind::Comma => {
                    self.advance()?;
                }
                _ => return Ok(expression),
            }
        }
    }

    /// An operator followed by its operand(s), applied to `left`.
    fn parse_operation(
        &mut self,
        token: Token,
        left: Expression,
    ) -> Result<Expression, ParseError> {
        if token.kind == TokenKind::Not {
            self.descend()?;
            let next = self.operand(token)?;
            let negated = self.parse_operation(next, left)?;
            return Ok(Expression::Not(Box::new(negated)));
        }

        if token.kind == TokenKind::Between {
            let lower = self.operand_value(token)?;
            let upper = self.operand_value(token)?;
            return Ok(Expression::Between {
                value: Box::new(left),
                lower: Box::new(lower),
                upper: Box::new(upper),
            });
        }

        let op = match token.kind {
            TokenKind::Add => BinOp::Add,
            TokenKind::Subtract => BinOp::Subtract,
            TokenKind::Multiply => BinOp::Multiply,
            TokenKind::Divide => BinOp::Divide,
            TokenKind::Equals => BinOp::Equals,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Gte => BinOp::Gte,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Lte => BinOp::Lte,
            TokenKind::StartsWith => BinOp::StartsWith,
            TokenKind::EndsWith => BinOp::EndsWith,
            TokenKind::Contains => BinOp::Contains,
            TokenKind::ContainsAny => BinOp::ContainsAny,
            TokenKind::ContainsAll => BinOp::ContainsAll,
            TokenKind::In => BinOp::In,
            _ => return Err(ParseError::InvalidOperation(self.text(token).to_string())),
        };

        let right = self.operand_value(token)?;
        Ok(Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// The token following `op`, which must exist.
    fn operand(&mut self, op: Token) -> Result<Token, ParseError> {
        match self.advance()? {
            Some(token) if token.kind != TokenKind::CloseParen => Ok(token),
            _ => Err(self.missing_operand(op)),
        }
    }

    fn operand_value(&mut self, op: Token) -> Result<Expression, ParseError> {
        let token = self.operand(op)?;
        self.parse_value(token)
    }

    fn missing_operand(&self, op: Token) -> ParseError {
        ParseError::MissingOperand(self.text(op).to_string())
    }
}

/// Strips the quotes; `\x` stands for `x`.
fn unescape(quoted: &str) -> String {
    let inner = quoted.get(1..quoted.len().saturating_sub(1)).unwrap_or_default();
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Compiles an expression using the process-wide coercion registry.
///
/// # Examples
///
/// ```
/// use ksql::{parse, Value};
///
/// let expr = parse(r#".name == "Joey""#).unwrap();
/// assert_eq!(expr.calculate(r#"{"name":"Joey"}"#).unwrap(), Value::Bool(true));
/// ```
pub fn parse(expression: impl AsRef<[u8]>) -> Result<Expression, ParseError> {
    parse_with(expression, coercion::global())
}

/// Compiles an expression against an explicit coercion registry.
pub fn parse_with(
    expression: impl AsRef<[u8]>,
    coercions: &Coercions,
) -> Result<Expression, ParseError> {
    let source = std::str::from_utf8(expression.as_ref())?;
    let parsed = Parser::new(source, coercions).parse()?;
    debug!("parsed expression `{source}`");
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""hello""#), "hello");
        assert_eq!(unescape(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unescape(r"'it\'s'"), "it's");
        assert_eq!(unescape(r#""a\\b""#), r"a\b");
        assert_eq!(unescape(r#""""#), "");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut stream = TokenStream::new("1 2");
        let peeked = stream.peek_token();
        assert_eq!(stream.peek_token(), peeked);
        assert_eq!(stream.next_token(), peeked);
        let second = stream.next_token().and_then(Result::ok);
        assert_eq!(second.map(|t| stream.text(t).to_string()).as_deref(), Some("2"));
        assert!(stream.next_token().is_none());
    }
}
