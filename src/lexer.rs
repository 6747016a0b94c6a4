use thiserror::Error;

use crate::ast::{Token, TokenKind};

/// Errors raised while splitting an expression into tokens.
///
/// Each variant carries the offending text so the caller can point at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unsupported character `{0}`")]
    UnsupportedCharacter(char),

    #[error("Unterminated string `{0}`")]
    UnterminatedString(String),

    #[error("Invalid selector path `{0}`")]
    InvalidSelector(String),

    #[error("Invalid identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("Invalid boolean `{0}`")]
    InvalidBool(String),

    #[error("Invalid keyword `{0}`")]
    InvalidKeyword(String),

    #[error("Invalid number `{0}`")]
    InvalidNumber(String),

    #[error("Token at offset {start} is {len} bytes long, at most {} are supported", u16::MAX)]
    TokenTooLong { start: usize, len: usize },
}

/// Lazily tokenizes an expression.
///
/// Yields `Ok(Token)` until the input is exhausted. The first error is
/// yielded once and the tokenizer is fused afterwards.
pub struct Tokenizer<'a> {
    source: &'a str,
    position: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            position: 0,
            failed: false,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.source.as_bytes()[self.position..];
        self.position += take_while(rest, is_whitespace);
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        self.skip_whitespace();

        let rest = self.source.get(self.position..).filter(|r| !r.is_empty())?;
        let start = self.position;

        let result = tokenize_single(rest).and_then(|(kind, len)| {
            let token_too_long = || LexError::TokenTooLong { start, len };
            let offset = u32::try_from(start).map_err(|_| token_too_long())?;
            let length = u16::try_from(len).map_err(|_| token_too_long())?;
            self.position += len;
            Ok(Token::new(kind, offset, length))
        });

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_token()
    }
}

/// Tokenizes the whole expression, stopping at the first error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(source).collect()
}

/// Lexes a single token at the start of `rest`, returning its kind and byte length.
fn tokenize_single(rest: &str) -> Result<(TokenKind, usize), LexError> {
    let data = rest.as_bytes();

    match data[0] {
        b'=' => match data.get(1) {
            Some(b'=') => Ok((TokenKind::Equals, 2)),
            _ => Ok((TokenKind::Equals, 1)),
        },
        b'+' => Ok((TokenKind::Add, 1)),
        b'-' => Ok((TokenKind::Subtract, 1)),
        b'*' => Ok((TokenKind::Multiply, 1)),
        b'/' => Ok((TokenKind::Divide, 1)),
        b'>' => match data.get(1) {
            Some(b'=') => Ok((TokenKind::Gte, 2)),
            _ => Ok((TokenKind::Gt, 1)),
        },
        b'<' => match data.get(1) {
            Some(b'=') => Ok((TokenKind::Lte, 2)),
            _ => Ok((TokenKind::Lt, 1)),
        },
        b'(' => Ok((TokenKind::OpenParen, 1)),
        b')' => Ok((TokenKind::CloseParen, 1)),
        b'[' => Ok((TokenKind::OpenBracket, 1)),
        b']' => Ok((TokenKind::CloseBracket, 1)),
        b',' => Ok((TokenKind::Comma, 1)),
        b':' => Ok((TokenKind::Colon, 1)),
        b'!' => Ok((TokenKind::Not, 1)),
        b'&' => match data.get(1) {
            Some(b'&') => Ok((TokenKind::And, 2)),
            _ => Err(LexError::InvalidKeyword(non_whitespace_run(rest).to_string())),
        },
        b'|' => match data.get(1) {
            Some(b'|') => Ok((TokenKind::Or, 2)),
            _ => Err(LexError::InvalidKeyword(non_whitespace_run(rest).to_string())),
        },
        quote @ (b'"' | b'\'') => tokenize_string(rest, quote),
        b'.' => tokenize_selector(rest),
        b'_' => tokenize_identifier(rest),
        b't' | b'f' => tokenize_bool(rest),
        b'N' => tokenize_null(rest),
        // CONTAINS, CONTAINS_ANY, CONTAINS_ALL and COERCE share a prefix
        b'C' => match (data.get(2), data.get(8), data.get(10)) {
            (Some(b'N'), Some(b'_'), Some(b'N')) => {
                tokenize_keyword(rest, "CONTAINS_ANY", TokenKind::ContainsAny)
            }
            (Some(b'N'), Some(b'_'), _) => {
                tokenize_keyword(rest, "CONTAINS_ALL", TokenKind::ContainsAll)
            }
            (Some(b'N'), _, _) => tokenize_keyword(rest, "CONTAINS", TokenKind::Contains),
            _ => tokenize_keyword(rest, "COERCE", TokenKind::Coerce),
        },
        b'I' => tokenize_keyword(rest, "IN", TokenKind::In),
        b'S' => tokenize_keyword(rest, "STARTSWITH", TokenKind::StartsWith),
        b'E' => tokenize_keyword(rest, "ENDSWITH", TokenKind::EndsWith),
        b'B' => tokenize_keyword(rest, "BETWEEN", TokenKind::Between),
        b if b.is_ascii_digit() => tokenize_number(rest),
        _ => Err(LexError::UnsupportedCharacter(
            rest.chars().next().unwrap_or_default(),
        )),
    }
}

fn tokenize_string(rest: &str, quote: u8) -> Result<(TokenKind, usize), LexError> {
    let mut escaped = false;

    for (i, &b) in rest.as_bytes().iter().enumerate().skip(1) {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == quote {
            return Ok((TokenKind::QuotedString, i + 1));
        }
    }

    Err(LexError::UnterminatedString(rest.to_string()))
}

/// Numbers are scanned permissively; the float parser has the final say.
fn tokenize_number(rest: &str) -> Result<(TokenKind, usize), LexError> {
    let mut dot_seen = false;
    let mut bad_number = false;

    let end = take_while(rest.as_bytes(), |b| match b {
        b'.' if dot_seen => {
            bad_number = true;
            false
        }
        b'.' => {
            dot_seen = true;
            true
        }
        b'-' | b'+' => true,
        b => b.is_ascii_alphanumeric(),
    });

    if bad_number {
        return Err(LexError::InvalidNumber(
            non_whitespace_run(rest).to_string(),
        ));
    }
    Ok((TokenKind::Number, end))
}

fn tokenize_selector(rest: &str) -> Result<(TokenKind, usize), LexError> {
    let data = rest.as_bytes();
    let mut end = 1;

    while let Some(&b) = data.get(end) {
        match b {
            b'[' => {
                // bracket segments may contain anything up to the closing `]`
                end += data[end..]
                    .iter()
                    .position(|&c| c == b']')
                    .map_or(data.len() - end, |close| close + 1);
            }
            b')' | b']' | b',' => break,
            b if is_whitespace(b) => break,
            _ => end += 1,
        }
    }

    if end == 1 {
        return Err(LexError::InvalidSelector(rest[..1].to_string()));
    }
    Ok((TokenKind::SelectorPath, end))
}

fn tokenize_identifier(rest: &str) -> Result<(TokenKind, usize), LexError> {
    let end = take_while(rest.as_bytes(), |b| {
        !is_whitespace(b) && !matches!(b, b')' | b']' | b',' | b'[')
    });
    let identifier = &rest[..end];

    if identifier.len() >= 2 && identifier.ends_with('_') {
        Ok((TokenKind::Identifier, end))
    } else {
        Err(LexError::InvalidIdentifier(identifier.to_string()))
    }
}

/// A keyword must match the whole non-whitespace run and be followed by more input.
fn tokenize_keyword(
    rest: &str,
    keyword: &str,
    kind: TokenKind,
) -> Result<(TokenKind, usize), LexError> {
    let run = non_whitespace_run(rest);

    if run == keyword && rest.len() > keyword.len() {
        Ok((kind, run.len()))
    } else {
        Err(LexError::InvalidKeyword(run.to_string()))
    }
}

fn tokenize_null(rest: &str) -> Result<(TokenKind, usize), LexError> {
    let end = take_while(rest.as_bytes(), |b| b.is_ascii_alphabetic());

    if &rest[..end] == "NULL" {
        Ok((TokenKind::Null, end))
    } else {
        Err(LexError::InvalidKeyword(non_whitespace_run(rest).to_string()))
    }
}

fn tokenize_bool(rest: &str) -> Result<(TokenKind, usize), LexError> {
    let end = take_while(rest.as_bytes(), |b| b.is_ascii_alphabetic());

    match &rest[..end] {
        "true" => Ok((TokenKind::BooleanTrue, end)),
        "false" => Ok((TokenKind::BooleanFalse, end)),
        _ => Err(LexError::InvalidBool(non_whitespace_run(rest).to_string())),
    }
}

fn non_whitespace_run(rest: &str) -> &str {
    let end = take_while(rest.as_bytes(), |b| !is_whitespace(b));
    &rest[..end]
}

/// Counts leading bytes for which the predicate holds.
fn take_while(data: &[u8], mut pred: impl FnMut(u8) -> bool) -> usize {
    data.iter().position(|&b| !pred(b)).unwrap_or(data.len())
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0b | 0x0c | b'\r' | b' ')
}

#[test]
fn test_coerce_family() {
    let kinds: Vec<TokenKind> = tokenize("COERCE CONTAINS CONTAINS_ANY CONTAINS_ALL .")
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert!(kinds.is_empty(), "bare `.` must fail the whole stream");

    let tokens = tokenize("COERCE CONTAINS CONTAINS_ANY CONTAINS_ALL _x_").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Coerce,
            TokenKind::Contains,
            TokenKind::ContainsAny,
            TokenKind::ContainsAll,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn test_fused_after_error() {
    let mut tokenizer = Tokenizer::new("1 & 2");
    assert!(matches!(tokenizer.next(), Some(Ok(_))));
    assert!(matches!(tokenizer.next(), Some(Err(LexError::InvalidKeyword(_)))));
    assert!(tokenizer.next().is_none());
}
