//! Error handling for OxC Lang

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::Span;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// A positioned message produced by one of the pipeline stages.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (line {line}, column {column})")]
pub struct Diagnostic {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

/// Syntax error reported by the parser
pub type ParseError = Diagnostic;

/// Error reported by the semantic analyzer
pub type SemanticError = Diagnostic;

/// Internal failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ==================== Semantic Errors ====================

    #[error("Duplicate definition: {name}")]
    DuplicateDefinition { name: String },

    #[error("malformed '{kind}' node: {detail}")]
    MalformedTree { kind: String, detail: String },
}
