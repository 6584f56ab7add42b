//! Source location tracking

use serde::{Deserialize, Serialize};

/// A position in the source text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Line of the first character
    pub line: usize,
    /// Column of the first character
    pub column: usize,
}

impl Span {
    /// Create a new span
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position used when a location cannot be recovered
    pub fn unknown() -> Self {
        Self { line: 0, column: 0 }
    }

    /// Check whether this is the unknown position
    pub fn is_unknown(&self) -> bool {
        self.line == 0 && self.column == 0
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::unknown()
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
