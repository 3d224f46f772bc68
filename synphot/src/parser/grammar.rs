//! Recursive descent parser producing an expression tree
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := factor (('*' | '/') factor)*
//! factor  := IDENTIFIER '(' arglist ')' | FLOAT | IDENTIFIER | FILELIST
//!          | '(' expr ')'
//! arglist := expr (',' expr)* | ε
//! ```
//!
//! Any identifier may name a function. Whether the name exists is decided
//! by the evaluator, so the grammar stays independent of the registry.

use std::fmt;

use thiserror::Error;

use super::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset into the expression text
    pub position: usize,
}

/// Byte span of a node in the expression text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub start: usize,
    pub end: usize,
}

impl Loc {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    fn union(self, other: Loc) -> Loc {
        Loc::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        write!(f, "{symbol}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal, kept as written
    Number(String, Loc),
    /// A bare word: catalog name, file name or keyword such as `flam`
    Ident(String, Loc),
    /// `@path`, stored without the `@`
    FileList(String, Loc),
    Call(String, Vec<Expr>, Loc),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Loc),
}

impl Expr {
    pub fn loc(&self) -> Loc {
        match self {
            Expr::Number(_, loc)
            | Expr::Ident(_, loc)
            | Expr::FileList(_, loc)
            | Expr::Call(_, _, loc)
            | Expr::Binary(_, _, _, loc) => *loc,
        }
    }

    fn write_operand(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent: BinaryOp,
        right: bool,
    ) -> fmt::Result {
        let needs_parens = match self {
            Expr::Binary(op, _, _, _) => {
                op.precedence() < parent.precedence()
                    || (right
                        && op.precedence() == parent.precedence()
                        && matches!(parent, BinaryOp::Sub | BinaryOp::Div))
            }
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Renders the expression so that tokenizing the output yields the same tree
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(text, _) | Expr::Ident(text, _) => write!(f, "{text}"),
            Expr::FileList(path, _) => write!(f, "@{path}"),
            Expr::Call(name, args, _) => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Binary(op, lhs, rhs, _) => {
                lhs.write_operand(f, *op, false)?;
                // spaces keep '/' and '-' from fusing into the neighbouring words
                write!(f, " {op} ")?;
                rhs.write_operand(f, *op, true)
            }
        }
    }
}

/// Parser state over a borrowed token stream
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eof_position(&self) -> usize {
        self.tokens.last().map(|t| t.end).unwrap_or(0)
    }

    fn error<T>(&self, message: impl Into<String>, position: usize) -> Result<T, SyntaxError> {
        Err(SyntaxError {
            message: message.into(),
            position,
        })
    }

    fn expect(&mut self, expected: TokenKind, context: &str) -> Result<&'a Token, SyntaxError> {
        match self.peek() {
            Some(token) if token.kind == expected => {
                self.pos += 1;
                Ok(token)
            }
            Some(token) => self.error(
                format!("Expected {context}, found '{}'", token.text()),
                token.start,
            ),
            None => self.error(
                format!("Expected {context} before end of expression"),
                self.eof_position(),
            ),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            let loc = lhs.loc().union(rhs.loc());
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            let loc = lhs.loc().union(rhs.loc());
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), loc);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, SyntaxError> {
        let Some(token) = self.advance() else {
            return self.error("Unexpected end of expression", self.eof_position());
        };
        let loc = Loc::new(token.start, token.end);
        let attr = token.attr.clone().unwrap_or_default();

        match token.kind {
            TokenKind::Float => Ok(Expr::Number(attr, loc)),
            TokenKind::FileList => Ok(Expr::FileList(attr, loc)),
            TokenKind::Identifier => {
                if self.peek_kind() == Some(TokenKind::LParen) {
                    self.parse_call(attr, loc)
                } else {
                    Ok(Expr::Ident(attr, loc))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                let close = self.expect(TokenKind::RParen, "')'")?;
                // widen the span to the parentheses but keep the inner node
                Ok(match inner {
                    Expr::Binary(op, lhs, rhs, _) => {
                        Expr::Binary(op, lhs, rhs, Loc::new(loc.start, close.end))
                    }
                    other => other,
                })
            }
            TokenKind::Comma | TokenKind::RParen => {
                self.error(format!("Expected a value, found '{}'", token.text()), token.start)
            }
            TokenKind::Plus | TokenKind::Star | TokenKind::Slash | TokenKind::Minus => self.error(
                format!("Operator '{}' is missing its left operand", token.text()),
                token.start,
            ),
        }
    }

    fn parse_call(&mut self, name: String, name_loc: Loc) -> Result<Expr, SyntaxError> {
        let open = self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();

        if self.peek_kind() == Some(TokenKind::RParen) {
            let close = self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::Call(name, args, Loc::new(name_loc.start, close.end)));
        }

        loop {
            args.push(self.parse_expr()?);
            match self.peek() {
                Some(token) if token.kind == TokenKind::Comma => {
                    self.advance();
                }
                Some(token) if token.kind == TokenKind::RParen => break,
                Some(token) => {
                    return self.error(
                        format!("Expected ',' or ')', found '{}'", token.text()),
                        token.start,
                    );
                }
                None => {
                    return self.error(
                        format!("Unbalanced parenthesis opened at position {}", open.start),
                        self.eof_position(),
                    );
                }
            }
        }

        let close = self.expect(TokenKind::RParen, "')'")?;
        Ok(Expr::Call(name, args, Loc::new(name_loc.start, close.end)))
    }
}

/// Parse a token stream into one expression
///
/// # Errors
///
/// A [`SyntaxError`] for empty input, unbalanced parentheses, missing
/// commas, empty arguments, dangling operators and trailing tokens.
pub fn parse(tokens: &[Token]) -> Result<Expr, SyntaxError> {
    let mut parser = Parser { tokens, pos: 0 };
    if tokens.is_empty() {
        return parser.error("Empty expression", 0);
    }

    let expr = parser.parse_expr()?;

    if let Some(token) = parser.peek() {
        let message = if token.kind == TokenKind::RParen {
            "Unbalanced ')'".to_string()
        } else {
            format!("Unexpected '{}' after complete expression", token.text())
        };
        return parser.error(message, token.start);
    }

    Ok(expr)
}
