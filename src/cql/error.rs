//! Error types for the CQL reader and writer.

use super::grammar::TokenKind;
use thiserror::Error;

/// CQL compiler error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CqlError {
    /// No legal token matches at `position`.
    #[error("Syntax error at position {position}: expected one of {}, found '{remainder}'", join_kinds(.expected))]
    Syntax {
        expected: Vec<TokenKind>,
        position: usize,
        remainder: String,
    },

    /// Token sequence is lexically legal but structurally wrong.
    #[error("Malformed filter at position {position}: {message}")]
    Malformed { position: usize, message: String },

    /// An operator received an operand of the wrong shape.
    #[error("Invalid operand for {operator}: {message}")]
    Operand { operator: String, message: String },

    /// A geometry literal could not be parsed or written as WKT.
    #[error("Invalid geometry '{literal}': {message}")]
    Geometry { literal: String, message: String },

    /// Input nests deeper than the configured bound.
    #[error("Filter too complex: nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    /// The grammar tables and the tree builder or writer disagree.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for CQL operations
pub type Result<T> = std::result::Result<T, CqlError>;

impl CqlError {
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        CqlError::Malformed {
            position,
            message: message.into(),
        }
    }

    pub fn operand(operator: impl Into<String>, message: impl Into<String>) -> Self {
        CqlError::Operand {
            operator: operator.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CqlError::Internal(message.into())
    }

    /// Whether the message describes a problem in user-authored filter text
    /// and may be shown in an editor.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, CqlError::Internal(_))
    }
}

fn join_kinds(kinds: &[TokenKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}
