//! Shunting-yard conversion of the token stream to postfix order.
//!
//! `BETWEEN x AND y` needs one extra rule: a LOGICAL arriving while BETWEEN
//! sits on top of the stack is the range connector, not a combinator. It is
//! stacked above the BETWEEN with the BETWEEN's own precedence so that both
//! leave the stack together, connector first.
//!
//! Commas are only legal directly inside a spatial function's parentheses;
//! the number of arguments is checked when the call closes.

use super::error::{CqlError, Result};
use super::grammar::{Token, TokenKind};
use crate::filter::SpatialKind;

struct Stacked {
    token: Token,
    precedence: Option<u8>,
    /// Commas seen directly inside this parenthesis.
    commas: usize,
}

impl Stacked {
    fn new(token: Token, precedence: Option<u8>) -> Self {
        Stacked {
            token,
            precedence,
            commas: 0,
        }
    }
}

/// Convert an infix token list (as produced by `tokenize`) to postfix order.
pub fn to_postfix(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut stack: Vec<Stacked> = Vec::new();
    let mut output: Vec<Token> = Vec::with_capacity(tokens.len());

    for token in tokens {
        match token.kind {
            TokenKind::Property | TokenKind::Geometry | TokenKind::Value | TokenKind::Unit => {
                output.push(token);
            }
            TokenKind::Logical if top_kind(&stack) == Some(TokenKind::Between) => {
                if !token.is_and() {
                    return Err(CqlError::malformed(
                        token.position,
                        format!("BETWEEN bounds must be joined by AND, found {}", token.text),
                    ));
                }
                let precedence = TokenKind::Between.precedence();
                stack.push(Stacked::new(token, precedence));
            }
            TokenKind::Comparison
            | TokenKind::Between
            | TokenKind::IsNull
            | TokenKind::Logical => {
                let precedence = token.kind.precedence();
                while let Some(top) = stack.last() {
                    match (top.precedence, precedence) {
                        (Some(stacked), Some(incoming)) if stacked <= incoming => {
                            pop_to_output(&mut stack, &mut output)?;
                        }
                        _ => break,
                    }
                }
                stack.push(Stacked::new(token, precedence));
            }
            TokenKind::Not => {
                let precedence = token.kind.precedence();
                stack.push(Stacked::new(token, precedence));
            }
            TokenKind::Spatial | TokenKind::LParen => {
                stack.push(Stacked::new(token, None));
            }
            TokenKind::RParen => {
                let commas = loop {
                    match top_kind(&stack) {
                        Some(TokenKind::LParen) => {
                            break stack.pop().map(|paren| paren.commas).unwrap_or(0);
                        }
                        Some(_) => pop_to_output(&mut stack, &mut output)?,
                        None => {
                            return Err(CqlError::malformed(
                                token.position,
                                "closing parenthesis without a matching opening one",
                            ));
                        }
                    }
                };
                if top_kind(&stack) == Some(TokenKind::Spatial) {
                    check_arity(&stack, commas + 1)?;
                    pop_to_output(&mut stack, &mut output)?;
                } else if commas > 0 {
                    return Err(CqlError::malformed(
                        token.position,
                        "argument list outside of a spatial function",
                    ));
                }
            }
            TokenKind::Comma => {
                let in_call = stack.len() >= 2
                    && top_kind(&stack) == Some(TokenKind::LParen)
                    && stack[stack.len() - 2].token.kind == TokenKind::Spatial;
                match stack.last_mut() {
                    Some(paren) if in_call => paren.commas += 1,
                    _ => {
                        return Err(CqlError::malformed(
                            token.position,
                            "comma outside of a spatial function's argument list",
                        ));
                    }
                }
            }
            TokenKind::End => {}
        }
    }

    while let Some(top) = stack.last() {
        if top.token.kind == TokenKind::LParen {
            return Err(CqlError::malformed(
                top.token.position,
                "opening parenthesis is never closed",
            ));
        }
        pop_to_output(&mut stack, &mut output)?;
    }

    tracing::debug!("Postfix stream has {} tokens", output.len());
    Ok(output)
}

/// The spatial function on top of `stack` must accept `args` arguments.
fn check_arity(stack: &[Stacked], args: usize) -> Result<()> {
    let Some(function) = stack.last() else {
        return Ok(());
    };
    let kind = SpatialKind::from_cql(&function.token.text).ok_or_else(|| {
        CqlError::internal(format!("no spatial function named {}", function.token.text))
    })?;
    if kind.arity().contains(&args) {
        return Ok(());
    }
    Err(CqlError::malformed(
        function.token.position,
        format!(
            "{} takes {} to {} arguments, found {}",
            kind.keyword(),
            kind.arity().start(),
            kind.arity().end(),
            args
        ),
    ))
}

fn top_kind(stack: &[Stacked]) -> Option<TokenKind> {
    stack.last().map(|entry| entry.token.kind)
}

/// Move the top of the stack to the output.
///
/// A BETWEEN may only leave the stack right after its connector did.
fn pop_to_output(stack: &mut Vec<Stacked>, output: &mut Vec<Token>) -> Result<()> {
    let Some(entry) = stack.pop() else {
        return Ok(());
    };
    if entry.token.kind == TokenKind::Between && !output.last().is_some_and(Token::is_and) {
        return Err(CqlError::malformed(
            entry.token.position,
            "BETWEEN needs a lower and an upper bound joined by AND",
        ));
    }
    output.push(entry.token);
    Ok(())
}
