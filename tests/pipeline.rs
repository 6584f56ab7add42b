//! End-to-end runs of the lexer, parser and semantic analyzer

use oxc_lang::frontend::{self, token::TokenKind};
use oxc_lang::{run, Stage};
use pretty_assertions::assert_eq;

fn messages(source: &str) -> Vec<String> {
    run(source).errors.into_iter().map(|e| e.message).collect()
}

#[test]
fn test_tokenize_is_deterministic() {
    let source = "universal int x~ atmosphere() { x = x + 1~ }";
    assert_eq!(frontend::tokenize(source), frontend::tokenize(source));
}

#[test]
fn test_keyword_prefix_is_one_identifier() {
    let tokens = frontend::tokenize("integer~");
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].kind, TokenKind::Ident(1));
    assert_eq!(tokens[0].lexeme, "integer");
}

#[test]
fn test_number_limits() {
    for source in [
        "atmosphere() { int x = 12345678901~ }",
        "atmosphere() { float f = 1.1234567~ }",
        "atmosphere() { float f = 12. ~ }",
    ] {
        let report = run(source);
        assert_eq!(report.stage, Stage::Lexical, "{}", source);
        assert_eq!(report.errors.len(), 1, "{}", source);
    }
    assert!(run("atmosphere() { int x = 1234567890~ float f = 3.141592~ }").success);
}

#[test]
fn test_minus_after_operand_is_an_operator() {
    let tags: Vec<String> = frontend::tokenize("x-1")
        .iter()
        .map(|t| t.tag().into_owned())
        .collect();
    assert_eq!(tags, vec!["id1", "-", "int_lit"]);

    let tokens = frontend::tokenize("(-1)");
    assert_eq!(tokens[1].kind, TokenKind::IntLit);
    assert_eq!(tokens[1].lexeme, "-1");
}

#[test]
fn test_clean_program_passes_every_stage() {
    let report = run("universal int x~ atmosphere() { x = 5~ }");
    assert!(report.success);
    assert_eq!(report.stage, Stage::Complete);
    assert_eq!(report.ast.map(|ast| ast.name()), Some("program".to_string()));
}

#[test]
fn test_larger_program_is_clean() {
    let source = "universal gust P { int x~ float y~ }~ \
                  air int add(int a, int b) { gasp a + b~ } \
                  atmosphere() { \
                      gust P p = {1, 2.5}~ \
                      int total = add(p.x, 2)~ \
                      echo (int i = 0~ i < 3~ i++~ ) { total += i~ } \
                      if (total > 3) { exhale(total)~ } else { exhale(\"small\")~ } \
                  }";
    let report = run(source);
    assert_eq!(report.errors, vec![]);
    assert_eq!(report.stage, Stage::Complete);
}

#[test]
fn test_syntax_error_stops_before_analysis() {
    let report = run("atmosphere() { int x = ~ y = 1~ }");
    assert_eq!(report.stage, Stage::Syntax);
    assert_eq!(
        report.errors[0].message,
        "Expected value or expression after '=', not '~'"
    );
}

#[test]
fn test_redeclaration() {
    assert_eq!(
        messages("atmosphere() { int x~ int x~ }"),
        vec!["Variable 'x' is already declared in this scope"]
    );
}

#[test]
fn test_undeclared_identifier_position() {
    let report = run("atmosphere() {\n  y = 1~ }");
    assert_eq!(report.stage, Stage::Semantic);
    assert_eq!(report.errors[0].message, "Undeclared identifier 'y'");
    assert_eq!((report.errors[0].line, report.errors[0].column), (2, 3));
}

#[test]
fn test_string_to_int_mismatch() {
    assert_eq!(
        messages("atmosphere() { int x = \"hi\"~ }"),
        vec!["Type mismatch: cannot assign 'string' to 'int' variable 'x'"]
    );
}

#[test]
fn test_waft_arity() {
    assert_eq!(
        messages("atmosphere() { float w = waft(1.5)~ }"),
        vec!["'waft' expects exactly 2 arguments, got 1"]
    );
}

#[test]
fn test_resist_outside_loop() {
    assert_eq!(
        messages("atmosphere() { if (yuh) { resist~ } }"),
        vec!["'resist' (break) must be inside a loop or stream (switch)"]
    );
}

#[test]
fn test_missing_member() {
    let source = "universal gust P { int x~ }~ atmosphere() { gust P p = {1}~ p.z = 1~ }";
    assert_eq!(messages(source), vec!["'z' is not a member of structure 'p'"]);
}

#[test]
fn test_report_json() {
    let report = run("atmosphere() { y = 1~ }");
    let json: serde_json::Value = serde_json::from_str(&report.to_json_compact()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["stage"], "semantic");
    assert_eq!(json["errors"][0]["message"], "Undeclared identifier 'y'");
}
