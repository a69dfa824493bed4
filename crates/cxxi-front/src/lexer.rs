//! Tokenizer for header text.
//!
//! Preprocessor lines become single tokens: `#include` keeps its target,
//! every other directive is carried as text and ignored by the parser.

use cxxi_core::Span;
use winnow::ascii;
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{any, none_of, one_of, take_till, take_until, take_while};

// ============================================================================
// Tokens
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(u64),
    Str(String),
    Punct(&'static str),
    /// `#include "path"` (`system == false`) or `#include <path>`.
    Include { path: String, system: bool },
    /// Any other preprocessor line, without the leading `#`.
    Directive(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == name)
    }
}

/// Lexing failure with the byte offset where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lex error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for LexError {}

/// Longest punctuators first. `>>` is deliberately absent so template
/// argument lists can close back to back.
const PUNCTUATORS: &[&str] = &[
    "::", "...", "->", "{", "}", "(", ")", "[", "]", "<", ">", ";", ",", ":", "=", "*", "&", "+",
    "-", "~", "!", ".", "?", "/", "%", "|", "^",
];

// ============================================================================
// Winnow parsers
// ============================================================================

/// Skip whitespace and comments.
fn trivia(input: &mut &str) -> ModalResult<()> {
    loop {
        let before = input.len();
        ascii::multispace0.parse_next(input)?;
        if input.starts_with("//") {
            ascii::till_line_ending.void().parse_next(input)?;
        } else if input.starts_with("/*") {
            ("/*", take_until(0.., "*/"), "*/").void().parse_next(input)?;
        } else if input.starts_with("\\\n") {
            "\\\n".void().parse_next(input)?;
        }
        if input.len() == before {
            return Ok(());
        }
    }
}

/// Parse an identifier: [a-zA-Z_][a-zA-Z0-9_]*
fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Integer literal in C syntax: hex, octal or decimal, with `u`/`l` suffixes.
fn integer_lit(input: &mut &str) -> ModalResult<u64> {
    let value = alt((
        preceded(alt(("0x", "0X")), ascii::hex_digit1)
            .try_map(|digits: &str| u64::from_str_radix(digits, 16)),
        ascii::digit1.try_map(|digits: &str| {
            if digits.len() > 1 && digits.starts_with('0') {
                u64::from_str_radix(&digits[1..], 8)
            } else {
                digits.parse::<u64>()
            }
        }),
    ))
    .parse_next(input)?;
    take_while(0.., ['u', 'U', 'l', 'L'])
        .void()
        .parse_next(input)?;
    Ok(value)
}

/// Character literal, read as its code point.
fn char_lit(input: &mut &str) -> ModalResult<u64> {
    delimited(
        '\'',
        alt((
            preceded('\\', any).map(|c: char| match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            }),
            none_of(['\\', '\'']),
        )),
        '\'',
    )
    .map(|c: char| u64::from(u32::from(c)))
    .parse_next(input)
}

/// Parse a string literal without escapes; enough for `extern "C"`.
fn string_lit(input: &mut &str) -> ModalResult<String> {
    delimited('"', take_till(0.., ['"', '\n']), '"')
        .map(|s: &str| s.to_owned())
        .parse_next(input)
}

fn punct(input: &mut &str) -> ModalResult<&'static str> {
    for &p in PUNCTUATORS {
        if let Some(rest) = input.strip_prefix(p) {
            *input = rest;
            return Ok(p);
        }
    }
    Err(ErrMode::Backtrack(ContextError::new()))
}

/// A preprocessor line, including `\` continuations.
fn directive(input: &mut &str) -> ModalResult<TokenKind> {
    '#'.parse_next(input)?;
    take_while(0.., [' ', '\t']).void().parse_next(input)?;
    let name = ident.parse_next(input)?;
    let mut rest = ascii::till_line_ending.parse_next(input)?.to_owned();
    while rest.ends_with('\\') {
        rest.pop();
        opt(ascii::line_ending).void().parse_next(input)?;
        rest.push_str(ascii::till_line_ending.parse_next(input)?);
    }
    let rest = rest.trim();

    if name == "include" {
        let mut target = rest;
        if let Ok((path, system)) = include_target.parse_next(&mut target) {
            return Ok(TokenKind::Include { path, system });
        }
    }
    Ok(TokenKind::Directive(format!("{name} {rest}").trim_end().to_owned()))
}

fn include_target(input: &mut &str) -> ModalResult<(String, bool)> {
    alt((
        delimited('"', take_till(1.., '"'), '"').map(|p: &str| (p.to_owned(), false)),
        delimited('<', take_till(1.., '>'), '>').map(|p: &str| (p.to_owned(), true)),
    ))
    .parse_next(input)
}

fn token(input: &mut &str) -> ModalResult<TokenKind> {
    alt((
        directive,
        integer_lit.map(TokenKind::Int),
        char_lit.map(TokenKind::Int),
        string_lit.map(TokenKind::Str),
        ident.map(|s: &str| TokenKind::Ident(s.to_owned())),
        punct.map(TokenKind::Punct),
    ))
    .parse_next(input)
}

/// Split `source` into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut input = source;
    let mut tokens = Vec::new();
    loop {
        let offset = source.len() - input.len();
        trivia(&mut input).map_err(|_| LexError {
            message: "unterminated comment".to_owned(),
            offset,
        })?;
        if input.is_empty() {
            return Ok(tokens);
        }

        let start = source.len() - input.len();
        let kind = token(&mut input).map_err(|_| LexError {
            message: format!(
                "unexpected character '{}'",
                input.chars().next().unwrap_or_default()
            ),
            offset: start,
        })?;
        let end = source.len() - input.len();
        tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }
}
