//! CQL reader and writer.
//!
//! Reading runs three stages:
//!   tokenize   - grammar-table driven lexing, one legal kind set per step
//!   to_postfix - shunting-yard over the token list
//!   build_tree - stack evaluation of the postfix stream into a `Predicate`
//!
//! Writing produces canonical text: every `And`/`Or` parenthesized, `NOT(..)`
//! always with parentheses, strings single-quoted.

mod builder;
mod error;
mod grammar;
mod lexer;
mod postfix;
mod wildcard;
mod writer;

pub use builder::build_tree;
pub use error::{CqlError, Result};
pub use grammar::{Token, TokenKind};
pub use lexer::tokenize;
pub use postfix::to_postfix;
pub use wildcard::{cql_to_internal, internal_to_cql};

use crate::config::ParserOptions;
use crate::filter::Predicate;

/// Reader and writer sharing one set of options.
#[derive(Debug, Clone, Default)]
pub struct Cql {
    options: ParserOptions,
}

impl Cql {
    pub fn new(options: ParserOptions) -> Self {
        Cql { options }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse CQL text. Blank input means "no filter" and yields `None`.
    pub fn read(&self, text: &str) -> Result<Option<Predicate>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let tokens = tokenize(text)?;
        let postfix = to_postfix(tokens)?;
        build_tree(postfix, &self.options).map(Some)
    }

    /// Like `read`, treating a missing text the same as a blank one.
    pub fn read_optional(&self, text: Option<&str>) -> Result<Option<Predicate>> {
        match text {
            Some(text) => self.read(text),
            None => Ok(None),
        }
    }

    /// Serialize a tree to canonical CQL.
    pub fn write(&self, predicate: &Predicate) -> Result<String> {
        writer::write_predicate(predicate, self.options.max_depth)
    }
}

/// Parse CQL text with default options.
pub fn read(text: &str) -> Result<Option<Predicate>> {
    Cql::default().read(text)
}

/// Serialize a tree with default options.
pub fn write(predicate: &Predicate) -> Result<String> {
    Cql::default().write(predicate)
}
