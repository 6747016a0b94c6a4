//! # Expression syntax tree
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Binary operators (comparison, arithmetic, logical, predicates)
//! - **[expressions]** - Expression nodes and coercion kinds
//!
//! Operators have no precedence. `1 + 2 * 3` is read left to right as
//! `(1 + 2) * 3`; parentheses are the only way to group.
//!
//! ```text
//! .properties.employees > 20 && COERCE .created _datetime_ >= COERCE "2022-01-01" _datetime_
//! ```
pub mod tokens;
pub mod operators;
pub mod expressions;

pub use tokens::{Token, TokenKind};
pub use operators::BinOp;
pub use expressions::{Coercion, Expression};
