//! Frontend module - Lexer, Parser, Semantic Analysis

pub mod token;
pub mod delimiters;
pub mod lexer;
pub mod ast;
pub mod parser;
mod parser_stmt;
mod parser_expr;
pub mod semantic;
mod semantic_expr;

use crate::utils::{ParseError, SemanticError};

use self::ast::AstNode;
use self::lexer::Lexer;
use self::parser::Parser;
use self::semantic::SemanticAnalyzer;
use self::token::Token;

/// Tokenize `source` with a fresh lexer
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

/// Parse an error-free token sequence
pub fn parse(tokens: &[Token]) -> (Option<AstNode>, Vec<ParseError>) {
    Parser::new(tokens).parse()
}

/// Check a parse tree against the token sequence it was built from
pub fn analyze(tokens: &[Token], ast: Option<&AstNode>) -> Vec<SemanticError> {
    SemanticAnalyzer::new(tokens).analyze(ast)
}
