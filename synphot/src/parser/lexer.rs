//! Tokenizer for spectrum and bandpass expressions
//!
//! The language is small but its words are unusual: identifiers may start
//! with digits (`52X0.2`), contain slashes and dollar signs
//! (`$PYSYN_CDBS//calspec/gd71.fits`) or dots (`c4451`, `1.5e+3foo`). The
//! scanner therefore takes the maximal run of non-structural characters and
//! only afterwards decides whether the whole run is a number.
//!
//! Tokenizing never fails: anything unrecognized degrades into an
//! identifier and is rejected later by the parser or the evaluator.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Float,
    Identifier,
    LParen,
    RParen,
    Comma,
    Slash,
    FileList,
    Plus,
    Star,
    Minus,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Float => "FLOAT",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Comma => "COMMA",
            TokenKind::Slash => "SLASH",
            TokenKind::FileList => "FILELIST",
            TokenKind::Plus => "PLUS",
            TokenKind::Star => "STAR",
            TokenKind::Minus => "MINUS",
        };
        write!(f, "{name}")
    }
}

/// A token with its byte span in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text for numbers and identifiers, the list path for file
    /// lists, `None` for punctuation
    pub attr: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl Token {
    /// The token as it would be written in an expression
    pub fn text(&self) -> String {
        match (&self.attr, self.kind) {
            (Some(attr), TokenKind::FileList) => format!("@{attr}"),
            (Some(attr), _) => attr.clone(),
            (None, kind) => symbol(kind).to_string(),
        }
    }
}

/// Single characters that always form their own token
const STRUCTURAL: &[(char, TokenKind)] = &[
    ('(', TokenKind::LParen),
    (')', TokenKind::RParen),
    (',', TokenKind::Comma),
    ('+', TokenKind::Plus),
    ('*', TokenKind::Star),
];

fn structural_kind(c: char) -> Option<TokenKind> {
    STRUCTURAL
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, kind)| *kind)
}

fn symbol(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::Comma => ",",
        TokenKind::Plus => "+",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Minus => "-",
        TokenKind::Float | TokenKind::Identifier | TokenKind::FileList => "",
    }
}

/// Split an expression into tokens
///
/// # Arguments
///
/// * `text` - Expression such as `rn(unit(1.,flam),band(johnson,v),10,abmag)`
///
/// # Returns
///
/// Tokens in source order. Structural tokens carry no attribute.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(c) = text[pos..].chars().next() {
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        if let Some(kind) = structural_kind(c) {
            tokens.push(Token {
                kind,
                attr: None,
                start: pos,
                end: pos + c.len_utf8(),
            });
            pos += c.len_utf8();
            continue;
        }

        let end = run_end(text, pos);
        tokens.push(classify(&text[pos..end], pos, end));
        pos = end;
    }

    tokens
}

/// End of the maximal word starting at `start`
fn run_end(text: &str, start: usize) -> usize {
    for (offset, c) in text[start..].char_indices() {
        let at = start + offset;
        let keep = if c == '+' {
            // exponent sign, as in 1e+1
            ends_with_exponent_marker(&text[start..at])
        } else {
            !c.is_whitespace() && structural_kind(c).is_none()
        };
        if !keep {
            return at;
        }
    }
    text.len()
}

fn classify(run: &str, start: usize, end: usize) -> Token {
    let (kind, attr) = if let Some(list) = run.strip_prefix('@') {
        (TokenKind::FileList, Some(list.to_string()))
    } else if run == "/" {
        (TokenKind::Slash, None)
    } else if run == "-" {
        (TokenKind::Minus, None)
    } else if is_float(run) {
        (TokenKind::Float, Some(run.to_string()))
    } else {
        (TokenKind::Identifier, Some(run.to_string()))
    };
    Token {
        kind,
        attr,
        start,
        end,
    }
}

/// Length of a leading `digits '.'? digits?` or `'.' digits` mantissa
fn scan_mantissa(bytes: &[u8]) -> Option<usize> {
    let int_digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let mut i = int_digits;
    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        frac_digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        i += frac_digits;
    }
    if int_digits + frac_digits == 0 {
        None
    } else {
        Some(i)
    }
}

/// True if the whole of `s` is `mantissa ([eE] [+-]? digits)?`
pub fn is_float(s: &str) -> bool {
    let bytes = s.as_bytes();
    let Some(mut i) = scan_mantissa(bytes) else {
        return false;
    };

    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        let exp_digits = bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits == 0 {
            return false;
        }
        i += exp_digits;
    }

    i == bytes.len()
}

/// True if `prefix` is an optionally negated mantissa followed by `e`/`E`
fn ends_with_exponent_marker(prefix: &str) -> bool {
    let unsigned = prefix.strip_prefix('-').unwrap_or(prefix);
    match unsigned.strip_suffix(['e', 'E']) {
        Some(mantissa) => scan_mantissa(mantissa.as_bytes()) == Some(mantissa.len()),
        None => false,
    }
}
