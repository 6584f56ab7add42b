//! OxC Lang front end
//!
//! Lexer, parser and semantic analyzer for OxC Lang, plus the staged
//! pipeline driver used by the `oxcc` binary.

pub mod feedback;
pub mod frontend;
pub mod types;
pub mod utils;

pub use feedback::{run, run_until, Report, Stage};
pub use utils::{Diagnostic, Error, Result, Span};
