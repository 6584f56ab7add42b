//! Utility module

mod span;
mod error;

pub use span::Span;
pub use error::{Diagnostic, Error, ParseError, Result, SemanticError};
