//! Tokenizer for CQL.
//!
//! At every step only the kinds listed in the previous token's `follows`
//! entry are tried, so the token stream is always grammatical as far as
//! adjacent pairs go.

use super::error::{CqlError, Result};
use super::grammar::{Token, TokenKind};

/// Tokenize the entire input. The last token is always END.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut expected = TokenKind::START;
    let mut cursor = skip_whitespace(input, 0);

    loop {
        let token = next_token(input, cursor, expected)?;
        tracing::trace!(kind = %token.kind, text = %token.text, position = token.position, "token");

        cursor = skip_whitespace(input, cursor + token.text.len());
        expected = token.kind.follows();
        let done = token.kind == TokenKind::End;
        tokens.push(token);
        if done {
            break;
        }
    }

    tracing::debug!("Tokenized {} tokens", tokens.len());
    Ok(tokens)
}

/// Lex a single token at `cursor`, trying the legal kinds in priority order.
fn next_token(input: &str, cursor: usize, expected: &[TokenKind]) -> Result<Token> {
    let remainder = &input[cursor..];

    let matched = TokenKind::PRIORITY
        .iter()
        .filter(|kind| expected.contains(*kind))
        .find_map(|kind| kind.match_len(remainder).map(|len| (*kind, len)));

    match matched {
        Some((kind, len)) => Ok(Token::new(kind, &remainder[..len], cursor)),
        None => Err(CqlError::Syntax {
            expected: expected.to_vec(),
            position: cursor,
            remainder: remainder.to_string(),
        }),
    }
}

fn skip_whitespace(input: &str, from: usize) -> usize {
    let rest = &input[from..];
    from + (rest.len() - rest.trim_start().len())
}
