//! Structured Feedback Module
//!
//! Runs the stages over one source text and packages the outcome:
//! - every token, error tokens included
//! - the diagnostics of the stage that stopped the run
//! - the syntax tree when the run is clean
//!
//! Lexical errors block parsing; syntax errors (or a missing tree) block
//! semantic analysis.

use std::fmt;

use serde::Serialize;

use crate::frontend::{self, ast::AstNode, token::Token};
use crate::utils::Diagnostic;

// ==================== Stages ====================

/// Last stage a run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
    /// Every stage ran without errors
    Complete,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Lexical => "lexical",
            Stage::Syntax => "syntax",
            Stage::Semantic => "semantic",
            Stage::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ==================== Report ====================

/// Outcome of one run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub success: bool,
    pub stage: Stage,
    pub tokens: Vec<Token>,
    pub errors: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ast: Option<AstNode>,
}

impl Report {
    fn new(stage: Stage, tokens: Vec<Token>, errors: Vec<Diagnostic>, ast: Option<AstNode>) -> Self {
        Self { success: errors.is_empty(), stage, tokens, errors, ast }
    }

    /// Output as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Output as compact JSON (for programmatic use)
    pub fn to_json_compact(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ==================== Driver ====================

/// Run every stage
pub fn run(source: &str) -> Report {
    run_until(source, Stage::Complete)
}

/// Run the stages up to and including `last`, stopping early on errors
pub fn run_until(source: &str, last: Stage) -> Report {
    let tokens = frontend::tokenize(source);
    let lexical: Vec<Diagnostic> = tokens
        .iter()
        .filter_map(|token| token.message().map(|message| Diagnostic::new(message, token.span)))
        .collect();
    log::info!("lexical stage: {} token(s), {} error(s)", tokens.len(), lexical.len());
    if !lexical.is_empty() || last == Stage::Lexical {
        return Report::new(Stage::Lexical, tokens, lexical, None);
    }

    let (ast, syntax) = frontend::parse(&tokens);
    log::info!("syntax stage: {} error(s)", syntax.len());
    if !syntax.is_empty() || ast.is_none() {
        return Report::new(Stage::Syntax, tokens, syntax, None);
    }
    if last == Stage::Syntax {
        return Report::new(Stage::Syntax, tokens, syntax, ast);
    }

    let semantic = frontend::analyze(&tokens, ast.as_ref());
    log::info!("semantic stage: {} error(s)", semantic.len());
    if !semantic.is_empty() {
        return Report::new(Stage::Semantic, tokens, semantic, None);
    }
    Report::new(Stage::Complete, tokens, semantic, ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_run_is_complete() {
        let report = run("universal int x~ atmosphere() { x = 5~ }");
        assert!(report.success);
        assert_eq!(report.stage, Stage::Complete);
        assert!(report.errors.is_empty());
        assert!(report.ast.is_some());
    }

    #[test]
    fn test_lexical_errors_block_parsing() {
        let report = run("atmosphere() { int x = 12345678901~ }");
        assert!(!report.success);
        assert_eq!(report.stage, Stage::Lexical);
        assert!(report.ast.is_none());
        assert!(report.tokens.iter().any(Token::is_error));
    }

    #[test]
    fn test_syntax_errors_block_analysis() {
        let report = run("atmosphere() { } x");
        assert_eq!(report.stage, Stage::Syntax);
        assert!(!report.errors.is_empty());
        assert!(report.ast.is_none());
    }

    #[test]
    fn test_semantic_errors_drop_the_tree() {
        let report = run("atmosphere() { y = 1~ }");
        assert_eq!(report.stage, Stage::Semantic);
        assert_eq!(report.errors[0].message, "Undeclared identifier 'y'");
        assert!(report.ast.is_none());
    }

    #[test]
    fn test_run_until_syntax_keeps_the_tree() {
        let report = run_until("atmosphere() { y = 1~ }", Stage::Syntax);
        assert!(report.success);
        assert_eq!(report.stage, Stage::Syntax);
        assert!(report.ast.is_some());
    }

    #[test]
    fn test_json_shape() {
        let report = run("atmosphere() { }");
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["stage"], "complete");
        assert_eq!(json["tokens"][0]["type"], "atmosphere");
        assert_eq!(json["ast"]["type"], "program");
        assert_eq!(json["errors"], serde_json::json!([]));
    }

    #[test]
    fn test_compact_json_omits_missing_tree() {
        let report = run("atmosphere() { y = 1~ }");
        let json: serde_json::Value = serde_json::from_str(&report.to_json_compact()).unwrap();
        assert_eq!(json["stage"], "semantic");
        assert!(json.get("ast").is_none());
        assert_eq!(json["errors"][0]["line"], 1);
    }
}
