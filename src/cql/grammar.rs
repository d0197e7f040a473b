//! Token grammar table for CQL.
//!
//! Each token kind owns a matcher and a `follows` list naming the kinds that
//! may legally appear right after it. The tokenizer only ever tries the
//! matchers of kinds that are legal at the current position.

use std::fmt;
use winnow::ascii::{Caseless, digit0, digit1, multispace1};
use winnow::combinator::{alt, not, opt, repeat, terminated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{literal, none_of, one_of, take_while};

/// Kind of a CQL token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Property,
    Comparison,
    Value,
    Logical,
    LParen,
    RParen,
    Spatial,
    Not,
    Between,
    Geometry,
    Comma,
    IsNull,
    Unit,
    End,
}

impl TokenKind {
    /// Kinds legal at the start of a filter.
    pub const START: &'static [TokenKind] = &[
        TokenKind::Not,
        TokenKind::Spatial,
        TokenKind::Property,
        TokenKind::LParen,
    ];

    /// Fixed order in which matchers are tried.
    ///
    /// Keywords come before PROPERTY so `AND`, `BBOX` or `NOT` never lex as
    /// property names.
    pub const PRIORITY: &'static [TokenKind] = &[
        TokenKind::Not,
        TokenKind::Spatial,
        TokenKind::Between,
        TokenKind::IsNull,
        TokenKind::Logical,
        TokenKind::Comparison,
        TokenKind::Geometry,
        TokenKind::Value,
        TokenKind::Unit,
        TokenKind::Property,
        TokenKind::LParen,
        TokenKind::RParen,
        TokenKind::Comma,
        TokenKind::End,
    ];

    /// Kinds that may legally follow a token of this kind.
    pub fn follows(self) -> &'static [TokenKind] {
        use TokenKind::*;
        match self {
            LParen => &[Spatial, Property, Value, LParen, Not],
            RParen => &[Logical, End, RParen],
            Property => &[Comparison, Between, Comma, IsNull],
            Between => &[Value],
            IsNull => &[Logical, RParen, End],
            Comparison => &[Value],
            Comma => &[Geometry, Value, Unit],
            Value => &[Logical, Comma, RParen, End],
            Spatial => &[LParen],
            Logical => &[Not, Value, Spatial, Property, LParen],
            Not => &[Spatial, Property, LParen],
            Geometry => &[Comma, RParen],
            Unit => &[RParen],
            End => &[],
        }
    }

    /// Shunting-yard precedence; a stacked operator is popped while its
    /// precedence is lower than or equal to the incoming one.
    ///
    /// NOT sits between the comparisons and the combinators: it outlives the
    /// comparison it negates but leaves before the next AND/OR is stacked.
    /// SPATIAL and LPAREN have none and only leave on a closing parenthesis
    /// or the final drain.
    pub fn precedence(self) -> Option<u8> {
        match self {
            TokenKind::Comparison | TokenKind::Between | TokenKind::IsNull => Some(1),
            TokenKind::Not => Some(2),
            TokenKind::Logical => Some(3),
            TokenKind::RParen => Some(4),
            _ => None,
        }
    }

    /// Length in bytes of the token of this kind at the start of `text`, if any.
    pub fn match_len(self, text: &str) -> Option<usize> {
        let mut input = text;
        let matched: PResult<&str> = match self {
            TokenKind::Property => lex_property.parse_next(&mut input),
            TokenKind::Comparison => lex_comparison.parse_next(&mut input),
            TokenKind::Value => lex_value.parse_next(&mut input),
            TokenKind::Logical => alt((keyword("AND"), keyword("OR"))).parse_next(&mut input),
            TokenKind::LParen => "(".parse_next(&mut input),
            TokenKind::RParen => ")".parse_next(&mut input),
            TokenKind::Spatial => lex_spatial.parse_next(&mut input),
            TokenKind::Not => keyword("NOT").parse_next(&mut input),
            TokenKind::Between => keyword("BETWEEN").parse_next(&mut input),
            TokenKind::Geometry => return geometry_len(text),
            TokenKind::Comma => ",".parse_next(&mut input),
            TokenKind::IsNull => lex_is_null.parse_next(&mut input),
            TokenKind::Unit => lex_unit.parse_next(&mut input),
            TokenKind::End => {
                return text.is_empty().then_some(0);
            }
        };
        matched.ok().map(|_| text.len() - input.len())
    }

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Property => "PROPERTY",
            TokenKind::Comparison => "COMPARISON",
            TokenKind::Value => "VALUE",
            TokenKind::Logical => "LOGICAL",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Spatial => "SPATIAL",
            TokenKind::Not => "NOT",
            TokenKind::Between => "BETWEEN",
            TokenKind::Geometry => "GEOMETRY",
            TokenKind::Comma => "COMMA",
            TokenKind::IsNull => "IS_NULL",
            TokenKind::Unit => "UNIT",
            TokenKind::End => "END",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lexed token. `position` is the byte offset of `text` in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    /// True for a LOGICAL token spelling `AND` in any case.
    pub fn is_and(&self) -> bool {
        self.kind == TokenKind::Logical && self.text.eq_ignore_ascii_case("AND")
    }
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, ErrMode<ContextError>>;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that must not run on into an identifier.
fn keyword<'s>(word: &'static str) -> impl Parser<&'s str, &'s str, ErrMode<ContextError>> {
    terminated(literal(Caseless(word)), not(one_of(is_ident_char)))
}

fn lex_property<'s>(input: &mut &'s str) -> PResult<&'s str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .parse_next(input)
}

fn lex_comparison<'s>(input: &mut &'s str) -> PResult<&'s str> {
    alt(("<>", "<=", ">=", "=", "<", ">", keyword("LIKE"))).parse_next(input)
}

fn lex_is_null<'s>(input: &mut &'s str) -> PResult<&'s str> {
    (literal(Caseless("IS")), multispace1, keyword("NULL"))
        .take()
        .parse_next(input)
}

fn lex_spatial<'s>(input: &mut &'s str) -> PResult<&'s str> {
    alt((
        keyword("BBOX"),
        keyword("INTERSECTS"),
        keyword("DWITHIN"),
        keyword("WITHIN"),
        keyword("CONTAINS"),
    ))
    .parse_next(input)
}

fn lex_unit<'s>(input: &mut &'s str) -> PResult<&'s str> {
    alt((
        keyword("meters"),
        keyword("metres"),
        keyword("kilometers"),
        keyword("kilometres"),
        keyword("feet"),
        (literal(Caseless("statute")), multispace1, keyword("miles")).take(),
        (literal(Caseless("nautical")), multispace1, keyword("miles")).take(),
    ))
    .parse_next(input)
}

/// Quoted string (`''` escapes a quote) or a number with optional sign,
/// fraction and exponent.
fn lex_value<'s>(input: &mut &'s str) -> PResult<&'s str> {
    alt((lex_string, lex_number)).parse_next(input)
}

fn lex_string<'s>(input: &mut &'s str) -> PResult<&'s str> {
    (
        '\'',
        repeat::<_, _, (), _, _>(0.., alt((none_of('\'').void(), "''".void()))),
        '\'',
    )
        .take()
        .parse_next(input)
}

fn lex_number<'s>(input: &mut &'s str) -> PResult<&'s str> {
    (
        opt(one_of(['-', '+'])),
        alt(((digit1, opt(('.', digit0))).void(), ('.', digit1).void())),
        opt((one_of(['e', 'E']), opt(one_of(['-', '+'])), digit1)),
        not(one_of(is_ident_char)),
    )
        .take()
        .parse_next(input)
}

const GEOMETRY_TYPES: &[&str] = &[
    "GEOMETRYCOLLECTION",
    "MULTILINESTRING",
    "MULTIPOLYGON",
    "MULTIPOINT",
    "LINESTRING",
    "POLYGON",
    "POINT",
];

/// WKT literal: a geometry type name followed by a balanced parenthesized body.
///
/// Not a plain pattern: the body nests its own coordinate lists, so the end
/// is found by counting parentheses.
fn geometry_len(text: &str) -> Option<usize> {
    let type_name = GEOMETRY_TYPES.iter().find(|name| {
        text.get(..name.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name))
    })?;

    let rest = &text[type_name.len()..];
    let body_start = text.len() - rest.trim_start().len();
    let body = &text[body_start..];
    if !body.starts_with('(') {
        return None;
    }

    let mut depth = 0usize;
    for (idx, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body_start + idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}
