pub mod ast;
pub mod coercion;
pub mod datetime;
pub mod evaluator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod selector;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Coercion, Expression, Token, TokenKind};
pub use coercion::{CoercionFn, Coercions};
pub use evaluator::{EvalError, Evaluate};
pub use lexer::{LexError, Tokenizer, tokenize};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser, TokenCursor, TokenStream, parse, parse_with};
pub use selector::{Document, PathSegment, Selector};
pub use value::Value;
