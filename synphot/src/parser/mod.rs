//! Lexing and parsing of spectrum and bandpass expressions

pub mod grammar;
pub mod lexer;

pub use grammar::{parse, BinaryOp, Expr, Loc, SyntaxError};
pub use lexer::{tokenize, Token, TokenKind};

/// Tokenize and parse `text` in one step
pub fn parse_str(text: &str) -> Result<Expr, SyntaxError> {
    parse(&tokenize(text))
}
