//! Expression typing for the semantic analyzer
//!
//! Types are computed bottom-up and every expression is typed exactly once,
//! so an error inside an operand is reported once. `None` means the type is
//! unknown because an error was already reported below it.

use std::sync::OnceLock;

use regex::Regex;

use crate::frontend::ast::{AstNode, NodeKind};
use crate::frontend::parser_expr::operator_of;
use crate::frontend::semantic::{collect, SemanticAnalyzer, Symbol, SymbolKind};
use crate::types::{Builtin, Type};
use crate::utils::{Result, Span};

const EXHALE_EXPRESSION: &str = "Expressions are not allowed as output in exhale; only identifiers, function calls, literals, and concatenation are permitted";

/// `@{name}` inside a string literal
fn interpolation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@\{([^}]+)\}").expect("interpolation pattern is valid"))
}

impl SemanticAnalyzer {
    pub(super) fn expr_type(&mut self, node: &AstNode) -> Result<Option<Type>> {
        if node.empty || node.is_missing() {
            return Ok(None);
        }
        match node.kind {
            NodeKind::Expr | NodeKind::CondStat | NodeKind::ParamItem | NodeKind::Factor => {
                self.expr_type(node.node_at(0)?)
            }
            NodeKind::LogicExpr | NodeKind::AndExpr => {
                let left = self.expr_type(node.node_at(0)?)?;
                let mut tail = node.node_at(1)?;
                if tail.empty {
                    return Ok(left);
                }
                while !tail.empty {
                    self.expr_type(tail.node_at(1)?)?;
                    tail = tail.node_at(2)?;
                }
                Ok(Some(Type::Bool))
            }
            NodeKind::RelaExpr => self.relational_type(node),
            NodeKind::ArithExpr | NodeKind::Term => {
                let left = self.expr_type(node.node_at(0)?)?;
                self.arithmetic_type(left, node.node_at(1)?)
            }
            NodeKind::Primary => {
                if node.leaf_at(0) == Some("!") {
                    self.expr_type(node.node_at(1)?)?;
                    return Ok(Some(Type::Bool));
                }
                self.expr_type(node.node_at(0)?)
            }
            NodeKind::Output => self.output_type(node),
            NodeKind::Value => Ok(Some(literal_type(node.value_str()?))),
            NodeKind::OutputContent => {
                let text = node.value_str()?;
                self.check_interpolation(text);
                Ok(Some(literal_type(text)))
            }
            NodeKind::Identifier => self.identifier_type(node),
            NodeKind::FunctionCall => self.builtin_type(node),
            _ => Ok(None),
        }
    }

    // ==================== Operators ====================

    // rela_expr → arith_expr rela_tail
    fn relational_type(&mut self, node: &AstNode) -> Result<Option<Type>> {
        let left = self.expr_type(node.node_at(0)?)?;
        let tail = node.node_at(1)?;
        if tail.empty {
            return Ok(left);
        }
        let op = operator_of(tail.node_at(0)?).unwrap_or_default().to_string();
        let right = self.expr_type(tail.node_at(1)?)?;

        if matches!(op.as_str(), "<" | ">" | "<=" | ">=") {
            let rejected = [&left, &right]
                .into_iter()
                .flatten()
                .find(|ty| !ty.is_arithmetic())
                .cloned();
            if let Some(ty) = rejected {
                self.error(
                    format!("Cannot compare type '{}' with '{}'", ty, op),
                    self.position_of(node),
                );
            }
        }
        Ok(Some(Type::Bool))
    }

    /// Fold an `arith_tail` / `term_tail` chain onto `left`
    fn arithmetic_type(&mut self, left: Option<Type>, tail: &AstNode) -> Result<Option<Type>> {
        let mut result = left;
        let mut tail = tail;
        while !tail.empty {
            let op = operator_of(tail.node_at(0)?).unwrap_or_default().to_string();
            let right = self.expr_type(tail.node_at(1)?)?;
            result = self.combine(&op, result, right, self.position_of(tail));
            tail = tail.node_at(2)?;
        }
        Ok(result)
    }

    fn combine(&mut self, op: &str, left: Option<Type>, right: Option<Type>, at: Span) -> Option<Type> {
        let operands = [&left, &right];
        if let Some(ty) = operands.into_iter().flatten().find(|ty| !ty.is_arithmetic()) {
            self.error(format!("Cannot perform arithmetic on type '{}'", ty), at);
            return None;
        }
        if op == "%" {
            if let Some(ty) = operands.into_iter().flatten().find(|ty| **ty != Type::Int) {
                self.error(format!("Modulus operator '%' requires integer operands, got '{}'", ty), at);
            }
            return Some(Type::Int);
        }
        Type::arithmetic_result(left.as_ref(), right.as_ref())
    }

    // ==================== Operands ====================

    // output → identifier | function_call | value | output_content output_tail
    fn output_type(&mut self, output: &AstNode) -> Result<Option<Type>> {
        let first = output.node_at(0)?;
        if first.kind != NodeKind::OutputContent {
            return self.expr_type(first);
        }
        let head = self.expr_type(first)?;
        let mut tail = output.node_at(1)?;
        if tail.empty {
            return Ok(head);
        }
        while !tail.empty {
            self.expr_type(tail.node_at(0)?)?;
            tail = tail.node_at(1)?;
        }
        Ok(Some(Type::Str))
    }

    // identifier → unary_op id id_access | id id_tail
    fn identifier_type(&mut self, node: &AstNode) -> Result<Option<Type>> {
        let first = node.node_at(0)?;
        if first.kind == NodeKind::UnaryOp {
            let name = self.name_of(node.node_at(1)?)?;
            let Some(symbol) = self.lookup_reported(&name) else {
                return Ok(None);
            };
            let ty = self.access_type(&symbol, node.node_at(2)?)?;
            self.check_unary(&symbol, ty.as_ref());
            return Ok(ty);
        }

        let name = self.name_of(first)?;
        let tail = node.node_at(1)?;
        let head = tail.node_at(0)?;
        if head.kind == NodeKind::ParamOpts {
            return self.call_function(&name, head);
        }
        let Some(symbol) = self.lookup_reported(&name) else {
            return Ok(None);
        };
        let ty = self.access_type(&symbol, head)?;
        if !tail.node_at(1)?.empty {
            self.check_unary(&symbol, ty.as_ref());
        }
        Ok(ty)
    }

    /// Type of `symbol` seen through `id_access`: member, element or the whole symbol
    pub(super) fn access_type(&mut self, symbol: &Symbol, access: &AstNode) -> Result<Option<Type>> {
        if access.leaf_at(0) == Some(".") {
            let member = self.name_of(access.node_at(1)?)?;
            return Ok(self.member_type(symbol, &member));
        }
        let dimension = access.node_at(0)?;
        if !dimension.empty {
            self.check_indices(dimension.node_at(0)?)?;
        }
        Ok(Some(symbol.ty.clone()))
    }

    fn member_type(&mut self, symbol: &Symbol, member: &str) -> Option<Type> {
        let Some(struct_type) = symbol.struct_type() else {
            self.error(
                format!("'{}' is not a structure instance", symbol.name),
                self.locator.identifier(&symbol.name),
            );
            return None;
        };
        // An undefined structure type was reported at the declaration
        self.structs.members(struct_type)?;
        let ty = self.structs.member_type(struct_type, member).cloned();
        if ty.is_none() {
            self.error(
                format!("'{}' is not a member of structure '{}'", member, symbol.name),
                self.locator.identifier(member),
            );
        }
        ty
    }

    // row_size → [ size ] col_size
    fn check_indices(&mut self, row_size: &AstNode) -> Result<()> {
        let size = row_size.node_at(0)?;
        let col_size = row_size.node_at(1)?;
        let mut indices = Vec::new();
        if !size.empty {
            indices.push(size.node_at(0)?);
        }
        if !col_size.empty {
            indices.push(col_size.node_at(0)?.node_at(0)?);
        }
        for index in indices {
            if let Some(ty) = self.expr_type(index)? {
                if ty != Type::Int {
                    self.error(
                        format!("Array index must be an integer, got '{}'", ty),
                        self.position_of(index),
                    );
                }
            }
        }
        Ok(())
    }

    // ==================== Calls ====================

    /// Call of a user function through `id ( param_opts )`
    pub(super) fn call_function(&mut self, name: &str, param_opts: &AstNode) -> Result<Option<Type>> {
        let at = self.locator.identifier(name);
        let signature = match self.symbols.lookup(name).map(|symbol| symbol.kind.clone()) {
            None => {
                self.error(format!("Undeclared function '{}'", name), at);
                return Ok(None);
            }
            Some(SymbolKind::Function(signature)) => signature,
            Some(_) => {
                self.error(format!("'{}' is not a function", name), at);
                return Ok(None);
            }
        };

        let args = collect(param_opts, NodeKind::ParamItem);
        let mut types = Vec::with_capacity(args.len());
        for arg in &args {
            types.push(self.expr_type(arg)?);
        }

        if args.len() != signature.params.len() {
            self.error(
                format!(
                    "Function '{}' expects {} argument(s), got {}",
                    name,
                    signature.params.len(),
                    args.len()
                ),
                at,
            );
            return Ok(Some(signature.ret));
        }
        for (index, (param, actual)) in signature.params.iter().zip(&types).enumerate() {
            let Some(actual) = actual else { continue };
            if !param.ty.accepts_argument(actual) {
                self.error(
                    format!(
                        "Argument {} of function '{}': expected '{}', got '{}'",
                        index + 1,
                        name,
                        param.ty,
                        actual
                    ),
                    self.position_of(args[index]),
                );
            }
        }
        Ok(Some(signature.ret))
    }

    // function_call → builtin ( param_item param_tail )
    fn builtin_type(&mut self, call: &AstNode) -> Result<Option<Type>> {
        let name = call
            .leaf_at(0)
            .ok_or_else(|| call.malformed("missing function name".to_string()))?;
        let Some(builtin) = Builtin::from_name(name) else {
            return Ok(None);
        };
        let at = self.locator.keyword(name);

        let args = collect(call, NodeKind::ParamItem);
        let mut types = Vec::with_capacity(args.len());
        for arg in &args {
            types.push(self.expr_type(arg)?);
        }

        if args.len() != builtin.arity() {
            let message = match builtin {
                Builtin::Waft => format!("'waft' expects exactly 2 arguments, got {}", args.len()),
                other => format!("'{}' expects exactly 1 argument, got {}", other, args.len()),
            };
            self.error(message, at);
        } else {
            for message in builtin_argument_errors(builtin, &types) {
                self.error(message, at);
            }
        }
        Ok(Some(builtin.return_type()))
    }

    // ==================== Restrictions ====================

    /// `exhale` prints identifiers, calls, literals and joins, never computed values
    pub(super) fn check_exhale_output(&mut self, output: &AstNode) {
        if let Some(message) = exhale_violation(output) {
            self.error(message, self.locator.keyword("exhale"));
        }
    }

    /// Element list of an array declaration against the element table
    pub(super) fn check_elements(&mut self, name: &str, ty: &Type, elements: &AstNode) -> Result<()> {
        for element in collect(elements, NodeKind::Output) {
            let Some(actual) = self.expr_type(element)? else {
                continue;
            };
            if ty.accepts_element(&actual) {
                continue;
            }
            let origin = variable_of(element)
                .map(|tag| format!(" from variable '{}'", self.locator.name(tag)))
                .unwrap_or_default();
            self.error(
                format!(
                    "Array element type mismatch in '{}': expected '{}', got '{}'{}",
                    name, ty, actual, origin
                ),
                self.position_of(element),
            );
        }
        Ok(())
    }

    /// Every unescaped `@{name}` in a string literal must name a visible symbol
    fn check_interpolation(&mut self, literal: &str) {
        if !literal.starts_with('"') {
            return;
        }
        for captures in interpolation().captures_iter(literal) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if literal[..whole.start()].ends_with('\\') {
                continue;
            }
            let name = inner.as_str().trim();
            if name.is_empty() || self.symbols.lookup(name).is_some() {
                continue;
            }
            self.error(
                format!("Undeclared identifier '{}' in string interpolation", name),
                self.locator.literal(literal),
            );
        }
    }
}

/// Type of a literal by its shape
fn literal_type(text: &str) -> Type {
    if text.starts_with('"') {
        Type::Str
    } else if text.starts_with('\'') {
        Type::Char
    } else if text == "yuh" || text == "naur" {
        Type::Bool
    } else if text.contains('.') {
        Type::Float
    } else {
        Type::Int
    }
}

fn builtin_argument_errors(builtin: Builtin, types: &[Option<Type>]) -> Vec<String> {
    let arg = |index: usize| types.get(index).cloned().flatten();
    let mut errors = Vec::new();
    match builtin {
        Builtin::ToRise | Builtin::ToFall => {
            if let Some(ty) = arg(0).filter(|ty| !matches!(ty, Type::Str | Type::Char)) {
                errors.push(format!("'{}' expects a string or char argument, got '{}'", builtin, ty));
            }
        }
        Builtin::Horizon => {
            if let Some(ty) = arg(0).filter(|ty| !matches!(ty, Type::Int | Type::Float | Type::Str)) {
                errors.push(format!("'horizon' expects an int, float, or string argument, got '{}'", ty));
            }
        }
        Builtin::ToInt | Builtin::ToFloat => {
            if let Some(ty) = arg(0).filter(|ty| *ty != Type::Str) {
                errors.push(format!("'{}' expects a string argument, got '{}'", builtin, ty));
            }
        }
        Builtin::ToChar => {
            if let Some(ty) = arg(0).filter(|ty| !matches!(ty, Type::Int | Type::Str)) {
                errors.push(format!("'toChar' expects an int or string argument, got '{}'", ty));
            }
        }
        Builtin::Waft => {
            if let Some(ty) = arg(0).filter(|ty| !matches!(ty, Type::Float | Type::Int)) {
                errors.push(format!("'waft' first argument must be float or int, got '{}'", ty));
            }
            if let Some(ty) = arg(1).filter(|ty| *ty != Type::Int) {
                errors.push(format!("'waft' second argument must be int, got '{}'", ty));
            }
        }
        Builtin::SizeOf | Builtin::ToString | Builtin::ToBool => {}
    }
    errors
}

/// First operator construct under an `exhale` output
fn exhale_violation(node: &AstNode) -> Option<&'static str> {
    if node.empty {
        return None;
    }
    match node.kind {
        NodeKind::ArithTail => Some("Arithmetic expressions are not allowed as output in exhale"),
        NodeKind::RelaTail => Some("Relational expressions are not allowed as output in exhale"),
        NodeKind::OrTail | NodeKind::AndTail => Some("Logical expressions are not allowed as output in exhale"),
        NodeKind::RelaSym | NodeKind::ArithOp1 | NodeKind::ArithOp2 => Some(EXHALE_EXPRESSION),
        _ => node.nodes().find_map(exhale_violation),
    }
}

/// Identifier tag of an element that names a variable
fn variable_of(output: &AstNode) -> Option<&str> {
    let identifier = output.node_at(0).ok().filter(|node| node.kind == NodeKind::Identifier)?;
    let tail = identifier.node_at(1).ok()?;
    if tail.node_at(0).ok()?.kind == NodeKind::ParamOpts {
        return None;
    }
    identifier.node_at(0).ok()?.value.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> Vec<String> {
        let tokens = Lexer::new(source).tokenize();
        let (ast, parse_errors) = Parser::new(&tokens).parse();
        assert!(parse_errors.is_empty(), "unexpected parse errors: {:?}", parse_errors);
        SemanticAnalyzer::new(&tokens)
            .analyze(ast.as_ref())
            .into_iter()
            .map(|error| error.message)
            .collect()
    }

    #[test]
    fn test_literal_shapes() {
        assert_eq!(literal_type("\"hi\""), Type::Str);
        assert_eq!(literal_type("'c'"), Type::Char);
        assert_eq!(literal_type("naur"), Type::Bool);
        assert_eq!(literal_type("-1.25"), Type::Float);
        assert_eq!(literal_type("-7"), Type::Int);
    }

    #[test]
    fn test_arithmetic_operands() {
        let errors = check("atmosphere() { string s = \"a\"~ float f = 1.5~ int x = s + 1~ int m = f % 2~ }");
        assert_eq!(
            errors,
            vec![
                "Cannot perform arithmetic on type 'string'",
                "Modulus operator '%' requires integer operands, got 'float'",
            ]
        );
    }

    #[test]
    fn test_promotion_feeds_declarations() {
        // int + float is float, which an int variable accepts
        assert!(check("atmosphere() { int x = 1 + 2.5~ char c = 'a'~ int y = c * 2~ }").is_empty());
    }

    #[test]
    fn test_ordering_comparison() {
        let errors = check("atmosphere() { bool b = \"a\" < 3~ bool e = \"a\" == \"b\"~ }");
        assert_eq!(errors, vec!["Cannot compare type 'string' with '<'"]);
    }

    #[test]
    fn test_logical_result_is_bool() {
        let errors = check("atmosphere() { string s = 1 < 2 && yuh~ }");
        assert_eq!(errors, vec!["Type mismatch: cannot assign 'bool' to 'string' variable 's'"]);
    }

    #[test]
    fn test_concatenation_is_string() {
        let errors = check("atmosphere() { string s = \"a\" & 'b'~ int x = \"a\" & \"b\"~ }");
        assert_eq!(errors, vec!["Type mismatch: cannot assign 'string' to 'int' variable 'x'"]);
    }

    #[test]
    fn test_builtin_arguments() {
        let source = "atmosphere() { float w = waft(1.5)~ string r = toRise(5)~ int n = toInt(1.5)~ \
                      char c = toChar(yuh)~ int h = horizon('c')~ float v = waft(1.5, 2.5)~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "'waft' expects exactly 2 arguments, got 1",
                "'toRise' expects a string or char argument, got 'int'",
                "'toInt' expects a string argument, got 'float'",
                "'toChar' expects an int or string argument, got 'bool'",
                "'horizon' expects an int, float, or string argument, got 'char'",
                "'waft' second argument must be int, got 'float'",
            ]
        );
    }

    #[test]
    fn test_builtin_return_types() {
        let errors = check("atmosphere() { int n = horizon(\"abc\")~ string s = toString(1)~ bool b = toBool(\"s\")~ int x = toString(1)~ }");
        assert_eq!(errors, vec!["Type mismatch: cannot assign 'string' to 'int' variable 'x'"]);
    }

    #[test]
    fn test_user_function_result_type() {
        let errors = check("air string name() { gasp \"n\"~ } atmosphere() { int x = name()~ }");
        assert_eq!(errors, vec!["Type mismatch: cannot assign 'string' to 'int' variable 'x'"]);
    }

    #[test]
    fn test_interpolation() {
        let errors = check("atmosphere() { int n = 1~ exhale(\"n is @{n} and @{ m } \\@{q}\")~ }");
        assert_eq!(errors, vec!["Undeclared identifier 'm' in string interpolation"]);
    }

    #[test]
    fn test_exhale_restrictions() {
        let source = "atmosphere() { int a = 1~ exhale(toString(a + 1))~ exhale(toString(a > 1))~ \
                      exhale(toString(a * 2))~ exhale(toString(a))~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Arithmetic expressions are not allowed as output in exhale",
                "Relational expressions are not allowed as output in exhale",
                EXHALE_EXPRESSION,
            ]
        );
    }

    #[test]
    fn test_whole_gust_cannot_be_displayed() {
        let errors = check("universal gust P { int x~ }~ atmosphere() { gust P p~ exhale(p)~ exhale(p.x)~ }");
        assert_eq!(errors, vec!["Must access member; whole gusts cannot be displayed"]);
    }

    #[test]
    fn test_index_and_member_access() {
        let source = "atmosphere() { int a[3]~ float f = 1.5~ int v~ a[f] = 1~ v.x = 1~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Array index must be an integer, got 'float'",
                "'v' is not a structure instance",
            ]
        );
    }

    #[test]
    fn test_element_from_variable() {
        let errors = check("atmosphere() { string s = \"x\"~ int a[2] = {1, s}~ }");
        assert_eq!(
            errors,
            vec!["Array element type mismatch in 'a': expected 'int', got 'string' from variable 's'"]
        );
    }

    #[test]
    fn test_each_undeclared_occurrence_is_reported() {
        let errors = check("atmosphere() { int x = y + y * 2~ }");
        assert_eq!(
            errors,
            vec!["Undeclared identifier 'y'", "Undeclared identifier 'y'"]
        );
    }
}
