//! Expression rules of the parser
//!
//! Precedence climbs `||`, `&&`, relational, `+ -`, `* / %`, then primary.
//! `term`, `factor` and `primary` fail hard, as does a binary operator with
//! no operand after it; the outer levels report softly.

use crate::frontend::ast::{AstNode, Child, NodeKind};
use crate::frontend::parser::{ends_dimension, ends_operand, starts_expr, starts_output, Abort, Parsed, Parser, Rule};
use crate::frontend::token::TokenKind;

const EXPR_START: &str = "Expected '(', identifier, value literal, or function call, got";

impl<'t> Parser<'t> {
    // ==================== Identifiers ====================

    // Production 84: identifier → unary_op id id_access
    // Production 85: identifier → id id_tail
    fn parse_identifier(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                let unary = self.parse_unary_op()?;
                let id = self.expect_id()?;
                let access = self.parse_id_access()?;
                Ok(Parsed::node(NodeKind::Identifier, vec![unary.into(), id.into(), access.into()]))
            }
            Some(kind) if kind.is_ident() => {
                let id = self.expect_id()?;
                let tail = self.parse_id_tail()?;
                Ok(Parsed::node(NodeKind::Identifier, vec![id.into(), tail.into()]))
            }
            _ => self.soft(format!("[84-85] Expected ++, --, or identifier, got '{}'", self.got())),
        }
    }

    // Production 86: id_tail → ( param_opts )
    // Production 87: id_tail → id_access unary_op2
    fn parse_id_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LParen) => {
                self.advance();
                let args = self.parse_param_opts()?;
                self.expect(TokenKind::RParen)?;
                Ok(Parsed::node(NodeKind::IdTail, vec![args.into()]))
            }
            Some(kind)
                if ends_dimension(kind) || matches!(kind, TokenKind::LBracket | TokenKind::Dot) =>
            {
                let access = self.parse_id_access()?;
                let unary = self.parse_unary_op2()?;
                Ok(Parsed::node(NodeKind::IdTail, vec![access.into(), unary.into()]))
            }
            _ => self.soft(format!(
                "[86-87] Expected (, [, ., ~, ++, --, +, -, *, /, %, ], >, <, >=, <=, ==, !=, ,, ), ||, &&, }} got '{}'",
                self.got()
            )),
        }
    }

    // Production 88: id_access → dimension
    // Production 89: id_access → . id
    pub(super) fn parse_id_access(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if ends_dimension(kind) || *kind == TokenKind::LBracket => {
                let dimension = self.parse_dimension()?;
                Ok(Parsed::node(NodeKind::IdAccess, vec![dimension.into()]))
            }
            Some(TokenKind::Dot) => {
                self.advance();
                let member = self.expect_id()?;
                Ok(Parsed::node(
                    NodeKind::IdAccess,
                    vec![Child::Leaf(".".to_string()), member.into()],
                ))
            }
            _ => self.soft(format!(
                "[88-89] Expected (, [, ., ~, ++, --, +, -, *, /, %, ], >, <, >=, <=, ==, !=, ,, ), ||, &&, }} got '{}'",
                self.got()
            )),
        }
    }

    // Productions 90-91: unary_op → ++ | --
    pub(super) fn parse_unary_op(&mut self) -> Rule {
        match self.kind() {
            Some(kind @ (TokenKind::PlusPlus | TokenKind::MinusMinus)) => {
                self.advance();
                Ok(Parsed::valued(NodeKind::UnaryOp, kind.tag()))
            }
            _ => self.soft(format!("[90-91] Expected '++' or '--', got '{}'", self.got())),
        }
    }

    // Production 92: unary_op2 → unary_op
    // Production 93: unary_op2 → λ
    fn parse_unary_op2(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                let unary = self.parse_unary_op()?;
                Ok(Parsed::node(NodeKind::UnaryOp2, vec![unary.into()]))
            }
            Some(kind) if ends_operand(kind) => Ok(Parsed::empty(NodeKind::UnaryOp2)),
            _ => self.soft(format!(
                "[92-93] Expected ++, --, +, -, *, /, %, ], >, <, >=, <=, ==, !=, ,, ~, ), ||, &&, }} got '{}'",
                self.got()
            )),
        }
    }

    // ==================== Output ====================

    // Production 96: output → identifier
    // Production 97: output → function_call
    // Production 98: output → value
    // Production 99: output → output_content output_tail
    pub(super) fn parse_output(&mut self) -> Rule {
        let children = match self.kind() {
            Some(kind) if kind.is_ident() => vec![self.parse_identifier()?.into()],
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => vec![self.parse_identifier()?.into()],
            Some(kind) if kind.is_builtin() => vec![self.parse_function_call()?.into()],
            Some(TokenKind::IntLit | TokenKind::FloatLit | TokenKind::Yuh | TokenKind::Naur) => {
                vec![self.parse_value()?.into()]
            }
            Some(TokenKind::CharLit | TokenKind::StringLit) => {
                let content = self.parse_output_content()?;
                let tail = self.parse_output_tail()?;
                vec![content.into(), tail.into()]
            }
            _ => {
                return self.soft(format!(
                    "[98-100] Expected '++, --' or function call or character/string literal, got '{}'",
                    self.got()
                ))
            }
        };
        Ok(Parsed::node(NodeKind::Output, children))
    }

    // Productions 100-103: value → int_lit | float_lit | yuh | naur
    fn parse_value(&mut self) -> Rule {
        match self.current() {
            Some(token)
                if matches!(
                    token.kind,
                    TokenKind::IntLit | TokenKind::FloatLit | TokenKind::Yuh | TokenKind::Naur
                ) =>
            {
                self.advance();
                Ok(Parsed::valued(NodeKind::Value, token.lexeme.clone()))
            }
            _ => self.soft(format!("[100-103] Expected value literal, got '{}'", self.got())),
        }
    }

    // Productions 104-105: output_content → char_lit | string_lit
    fn parse_output_content(&mut self) -> Rule {
        match self.current() {
            Some(token) if matches!(token.kind, TokenKind::CharLit | TokenKind::StringLit) => {
                self.advance();
                Ok(Parsed::valued(NodeKind::OutputContent, token.lexeme.clone()))
            }
            _ => self.soft(format!("[104-105] Expected character/string literal, got '{}'", self.got())),
        }
    }

    // Production 106: output_tail → & output_content output_tail
    // Production 107: output_tail → λ
    fn parse_output_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Amp) => {
                self.advance();
                let content = self.parse_output_content()?;
                let rest = self.parse_output_tail()?;
                Ok(Parsed::node(NodeKind::OutputTail, vec![content.into(), rest.into()]))
            }
            Some(kind) if ends_operand(kind) => Ok(Parsed::empty(NodeKind::OutputTail)),
            _ => self.soft(format!(
                "[106-107] Expected '&' or operators or terminator '~', got '{}'",
                self.got()
            )),
        }
    }

    // ==================== Assignment ====================

    // Productions 108-113: assi_op → = | += | -= | *= | /= | %=
    fn parse_assi_op(&mut self) -> Rule {
        if !self.kind().map_or(false, TokenKind::is_assign_op) {
            return self.soft(format!("[108-113] Expected assignment operator, got '{}'", self.got()));
        }
        let op = self.take_operator();
        Ok(Parsed::node(NodeKind::AssiOp, vec![op.into()]))
    }

    // Production 114: assignment → assi_op expr
    pub(super) fn parse_assignment(&mut self) -> Rule {
        if !self.kind().map_or(false, TokenKind::is_assign_op) {
            return self.soft(format!("[114] Expected assignment operator, got '{}'", self.got()));
        }
        let op = self.parse_assi_op()?;
        let expr = self.parse_expr()?;
        Ok(Parsed::node(NodeKind::Assignment, vec![op.into(), expr.into()]))
    }

    // ==================== Expressions ====================

    fn at_expr_start(&self) -> bool {
        self.kind().map_or(false, starts_expr)
    }

    /// Hard failure when a binary operator has no operand after it
    fn require_operand(&mut self, message: String) -> Result<(), Abort> {
        if self.at_expr_start() {
            Ok(())
        } else {
            Err(self.hard(message))
        }
    }

    // Production 115: expr → logic_expr
    pub(super) fn parse_expr(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[115] {} '{}'", EXPR_START, self.got()));
        }
        let logic = self.parse_logic_expr()?;
        Ok(Parsed::node(NodeKind::Expr, vec![logic.into()]))
    }

    // Production 116: logic_expr → and_expr or_tail
    fn parse_logic_expr(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[116] {} '{}'", EXPR_START, self.got()));
        }
        let and_expr = self.parse_and_expr()?;
        let tail = self.parse_or_tail()?;
        Ok(Parsed::node(NodeKind::LogicExpr, vec![and_expr.into(), tail.into()]))
    }

    // Production 117: or_tail → || and_expr or_tail
    // Production 118: or_tail → λ
    fn parse_or_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::OrOr) => {
                let op = self.take_operator();
                self.require_operand(
                    "[117-118] Expected relational expression after or boolean '||' operator".to_string(),
                )?;
                let and_expr = self.parse_and_expr()?;
                let rest = self.parse_or_tail()?;
                Ok(Parsed::node(NodeKind::OrTail, vec![op.into(), and_expr.into(), rest.into()]))
            }
            Some(TokenKind::Tilde | TokenKind::Comma | TokenKind::RParen) => {
                Ok(Parsed::empty(NodeKind::OrTail))
            }
            _ => self.soft(format!("[117-118] Expected '||' or '~' or ',' , got '{}'", self.got())),
        }
    }

    // Production 119: and_expr → rela_expr and_tail
    fn parse_and_expr(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[119] {} '{}'", EXPR_START, self.got()));
        }
        let rela = self.parse_rela_expr()?;
        let tail = self.parse_and_tail()?;
        Ok(Parsed::node(NodeKind::AndExpr, vec![rela.into(), tail.into()]))
    }

    // Production 120: and_tail → && rela_expr and_tail
    // Production 121: and_tail → λ
    fn parse_and_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::AndAnd) => {
                let op = self.take_operator();
                self.require_operand(
                    "[120-121] Expected relational expression or boolean after '&&' operator".to_string(),
                )?;
                let rela = self.parse_rela_expr()?;
                let rest = self.parse_and_tail()?;
                Ok(Parsed::node(NodeKind::AndTail, vec![op.into(), rela.into(), rest.into()]))
            }
            Some(TokenKind::OrOr | TokenKind::Tilde | TokenKind::Comma | TokenKind::RParen) => {
                Ok(Parsed::empty(NodeKind::AndTail))
            }
            _ => self.soft(format!(
                "[120-121] Expected '&&' or '||' or '~' or ',' , got '{}'",
                self.got()
            )),
        }
    }

    // Production 122: rela_expr → arith_expr rela_tail
    fn parse_rela_expr(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[122] {} '{}'", EXPR_START, self.got()));
        }
        let arith = self.parse_arith_expr()?;
        let tail = self.parse_rela_tail()?;
        Ok(Parsed::node(NodeKind::RelaExpr, vec![arith.into(), tail.into()]))
    }

    // Production 123: rela_tail → rela_sym arith_expr
    // Production 124: rela_tail → λ
    fn parse_rela_tail(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if kind.is_relational() => {
                let symbol = kind.tag();
                let rela_sym = self.parse_rela_sym()?;
                self.require_operand(format!("[122-123] Expected expression after '{}' operator", symbol))?;
                let arith = self.parse_arith_expr()?;
                Ok(Parsed::node(NodeKind::RelaTail, vec![rela_sym.into(), arith.into()]))
            }
            Some(
                TokenKind::AndAnd
                | TokenKind::OrOr
                | TokenKind::Tilde
                | TokenKind::Comma
                | TokenKind::RParen,
            ) => Ok(Parsed::empty(NodeKind::RelaTail)),
            _ => self.soft(format!(
                "[122-123] Expected relational symbols (> < >= <= == !=) or '&&' '||' '~' ',' ')', got '{}'",
                self.got()
            )),
        }
    }

    // Productions 125-130: rela_sym → > | < | >= | <= | == | !=
    fn parse_rela_sym(&mut self) -> Rule {
        if !self.kind().map_or(false, TokenKind::is_relational) {
            return self.soft(format!(
                "[125-130] Expected relational symbols (> < >= <= == !=), got '{}'",
                self.got()
            ));
        }
        let op = self.take_operator();
        Ok(Parsed::node(NodeKind::RelaSym, vec![op.into()]))
    }

    // Productions 131-132: arith_op1 → + | -
    fn parse_arith_op1(&mut self) -> Rule {
        if !matches!(self.kind(), Some(TokenKind::Plus | TokenKind::Minus)) {
            return self.soft(format!("[131-132] Expected '+' or '-', got '{}'", self.got()));
        }
        let op = self.take_operator();
        Ok(Parsed::node(NodeKind::ArithOp1, vec![op.into()]))
    }

    // Productions 133-135: arith_op2 → * | / | %
    fn parse_arith_op2(&mut self) -> Rule {
        if !matches!(
            self.kind(),
            Some(TokenKind::Star | TokenKind::Slash | TokenKind::Percent)
        ) {
            return self.soft(format!("[133-135] Expected '*' or '/' or '%', got '{}'", self.got()));
        }
        let op = self.take_operator();
        Ok(Parsed::node(NodeKind::ArithOp2, vec![op.into()]))
    }

    // Production 136: arith_expr → term arith_tail
    pub(super) fn parse_arith_expr(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[136] {} '{}'", EXPR_START, self.got()));
        }
        let term = self.parse_term()?;
        let tail = self.parse_arith_tail()?;
        Ok(Parsed::node(NodeKind::ArithExpr, vec![term.into(), tail.into()]))
    }

    // Production 137: arith_tail → arith_op1 term arith_tail
    // Production 138: arith_tail → λ
    fn parse_arith_tail(&mut self) -> Rule {
        match self.kind() {
            Some(kind @ (TokenKind::Plus | TokenKind::Minus)) => {
                let symbol = kind.tag();
                let op = self.parse_arith_op1()?;
                self.require_operand(format!("[137-138] Expected expression after '{}' operator", symbol))?;
                let term = self.parse_term()?;
                let rest = self.parse_arith_tail()?;
                Ok(Parsed::node(NodeKind::ArithTail, vec![op.into(), term.into(), rest.into()]))
            }
            Some(kind)
                if kind.is_relational()
                    || matches!(
                        kind,
                        TokenKind::Tilde
                            | TokenKind::Comma
                            | TokenKind::RBracket
                            | TokenKind::RParen
                            | TokenKind::OrOr
                            | TokenKind::AndAnd
                    ) =>
            {
                Ok(Parsed::empty(NodeKind::ArithTail))
            }
            _ => self.soft(format!("[137-138] Expected operators or '~', got '{}'", self.got())),
        }
    }

    // Production 139: term → factor term_tail
    fn parse_term(&mut self) -> Rule {
        if !self.at_expr_start() {
            let message = format!("[139] {} '{}'", EXPR_START, self.got());
            return Err(self.hard(message));
        }
        let factor = self.parse_factor()?;
        let tail = self.parse_term_tail()?;
        Ok(Parsed::node(NodeKind::Term, vec![factor.into(), tail.into()]))
    }

    // Production 140: term_tail → arith_op2 factor term_tail
    // Production 141: term_tail → λ
    fn parse_term_tail(&mut self) -> Rule {
        match self.kind() {
            Some(kind @ (TokenKind::Star | TokenKind::Slash | TokenKind::Percent)) => {
                let symbol = kind.tag();
                let op = self.parse_arith_op2()?;
                self.require_operand(format!("[140-141] Expected expression after '{}' operator", symbol))?;
                let factor = self.parse_factor()?;
                let rest = self.parse_term_tail()?;
                Ok(Parsed::node(NodeKind::TermTail, vec![op.into(), factor.into(), rest.into()]))
            }
            Some(kind)
                if kind.is_relational()
                    || matches!(
                        kind,
                        TokenKind::Tilde
                            | TokenKind::RBracket
                            | TokenKind::Comma
                            | TokenKind::RParen
                            | TokenKind::OrOr
                            | TokenKind::AndAnd
                            | TokenKind::Plus
                            | TokenKind::Minus
                    ) =>
            {
                Ok(Parsed::empty(NodeKind::TermTail))
            }
            _ => {
                let message = format!(
                    "[140-141] Expected terminator '~' or continuation of expression, got '{}'.",
                    self.got()
                );
                Err(self.hard(message))
            }
        }
    }

    // Production 142: factor → primary
    fn parse_factor(&mut self) -> Rule {
        if !self.at_expr_start() {
            let message = format!("[142] {} '{}'", EXPR_START, self.got());
            return Err(self.hard(message));
        }
        let primary = self.parse_primary()?;
        Ok(Parsed::node(NodeKind::Factor, vec![primary.into()]))
    }

    // Production 143: primary → ( expr )
    // Production 144: primary → output
    // Production 145: primary → ! ( logic_expr )
    fn parse_primary(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LParen) => {
                self.advance();
                if !self.at_expr_start() {
                    return Err(self.missing_operand());
                }
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Parsed::node(NodeKind::Primary, vec![expr.into()]))
            }
            Some(kind) if starts_output(kind) => {
                let output = self.parse_output()?;
                Ok(Parsed::node(NodeKind::Primary, vec![output.into()]))
            }
            Some(TokenKind::Not) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let logic = self.parse_logic_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Parsed::node(
                    NodeKind::Primary,
                    vec![Child::Leaf("!".to_string()), logic.into()],
                ))
            }
            _ => Err(self.missing_operand()),
        }
    }

    /// Hard failure where a primary operand was required
    fn missing_operand(&mut self) -> Abort {
        let message = match self.kind() {
            Some(kind) if is_binary_operator(kind) => {
                format!("Unexpected operator '{}' - expected value or identifier", kind.tag())
            }
            Some(TokenKind::Tilde | TokenKind::RBrace | TokenKind::Comma | TokenKind::RParen) => {
                format!("[143-145] Incomplete expression - unexpected '{}'", self.got())
            }
            _ => format!(
                "[143-145] Expected value, identifier, or '(' in expression, got '{}'",
                self.got()
            ),
        };
        self.hard(message)
    }

    // ==================== Calls ====================

    // Productions 173-182: function_call → builtin ( param_item param_tail )
    fn parse_function_call(&mut self) -> Rule {
        let name = match self.kind() {
            Some(kind) if kind.is_builtin() => kind.tag().into_owned(),
            _ => {
                return self.soft(format!(
                    "[173-182] Expected function call (toRise, toFall, horizon, sizeOf, toInt, toFloat, toString, toChar, toBool, waft), got '{}'",
                    self.got()
                ))
            }
        };
        self.advance();
        self.expect(TokenKind::LParen)?;
        let first = self.parse_param_item()?;
        let rest = self.parse_param_tail()?;
        self.expect(TokenKind::RParen)?;
        Ok(Parsed::node(
            NodeKind::FunctionCall,
            vec![Child::Leaf(name), first.into(), rest.into()],
        ))
    }

    // Production 183: param_opts → param_list
    // Production 184: param_opts → λ
    pub(super) fn parse_param_opts(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if starts_expr(kind) => {
                let list = self.parse_param_list()?;
                Ok(Parsed::node(NodeKind::ParamOpts, vec![list.into()]))
            }
            Some(TokenKind::RParen) => Ok(Parsed::empty(NodeKind::ParamOpts)),
            _ => self.soft(format!(
                "[183-184] Expected '(', ')', identifier, value literal, or function call, got '{}'",
                self.got()
            )),
        }
    }

    // Production 185: param_list → param_item param_tail
    fn parse_param_list(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[185] {} '{}'", EXPR_START, self.got()));
        }
        let item = self.parse_param_item()?;
        let tail = self.parse_param_tail()?;
        Ok(Parsed::node(NodeKind::ParamList, vec![item.into(), tail.into()]))
    }

    // Production 186: param_item → expr
    fn parse_param_item(&mut self) -> Rule {
        if !self.at_expr_start() {
            return self.soft(format!("[186] {} '{}'", EXPR_START, self.got()));
        }
        let expr = self.parse_expr()?;
        Ok(Parsed::node(NodeKind::ParamItem, vec![expr.into()]))
    }

    // Production 187: param_tail → , param_list
    // Production 188: param_tail → λ
    fn parse_param_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                let list = self.parse_param_list()?;
                Ok(Parsed::node(NodeKind::ParamTail, vec![list.into()]))
            }
            Some(TokenKind::RParen) => Ok(Parsed::empty(NodeKind::ParamTail)),
            _ => self.soft(format!("[187-188] Expected ',' or ')', got '{}'", self.got())),
        }
    }
}

fn is_binary_operator(kind: &TokenKind) -> bool {
    kind.is_relational()
        || kind.is_assign_op()
        || matches!(
            kind,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        )
}

/// Operator terminal carried by an `*_op*` / `rela_sym` wrapper node
pub(crate) fn operator_of(node: &AstNode) -> Option<&str> {
    node.nodes()
        .find(|child| child.kind == NodeKind::Operator)
        .and_then(|op| op.value.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::utils::ParseError;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> (Option<AstNode>, Vec<ParseError>) {
        let tokens = Lexer::new(source).tokenize();
        assert!(tokens.iter().all(|t| !t.is_error()), "lexical errors in {:?}", source);
        Parser::new(&tokens).parse()
    }

    fn first_error(source: &str) -> String {
        let (_, errors) = parse(source);
        errors.into_iter().next().map(|e| e.message).unwrap_or_default()
    }

    #[test]
    fn test_precedence_shape() {
        let (ast, errors) = parse("atmosphere() { int x = 1 + 2 * 3 > 4 && yuh || naur~ }");
        assert!(errors.is_empty(), "{:?}", errors);
        let ast = ast.unwrap();
        let or_tail = ast.find(&|n| n.kind == NodeKind::OrTail && !n.empty).unwrap();
        assert_eq!(operator_of(or_tail), Some("||"));
        let term_tail = ast.find(&|n| n.kind == NodeKind::TermTail && !n.empty).unwrap();
        assert_eq!(operator_of(term_tail.node_at(0).unwrap()), Some("*"));
        let rela_sym = ast.find(&|n| n.kind == NodeKind::RelaSym).unwrap();
        assert_eq!(operator_of(rela_sym), Some(">"));
    }

    #[test]
    fn test_not_keeps_marker() {
        let (ast, errors) = parse("atmosphere() { bool b = !(yuh)~ }");
        assert!(errors.is_empty(), "{:?}", errors);
        let primary = ast.unwrap().find(&|n| n.leaf_at(0) == Some("!")).cloned();
        assert_eq!(primary.map(|p| p.kind), Some(NodeKind::Primary));
    }

    #[test]
    fn test_builtin_call_keeps_name() {
        let (ast, errors) = parse("atmosphere() { float f = waft(1.5, 2)~ }");
        assert!(errors.is_empty(), "{:?}", errors);
        let ast = ast.unwrap();
        let call = ast.find(&|n| n.kind == NodeKind::FunctionCall).unwrap();
        assert_eq!(call.leaf_at(0), Some("waft"));
        assert!(!call.node_at(2).unwrap().empty);
    }

    #[test]
    fn test_member_and_index_access() {
        let (ast, errors) = parse("atmosphere() { int a[3]~ a[1] = a[0] + p.q~ }");
        assert!(errors.is_empty(), "{:?}", errors);
        let ast = ast.unwrap();
        let member = ast.find(&|n| n.kind == NodeKind::IdAccess && n.leaf_at(0) == Some(".")).unwrap();
        assert_eq!(member.node_at(1).unwrap().kind, NodeKind::Id);
    }

    #[test]
    fn test_missing_operand_is_hard() {
        assert_eq!(
            first_error("atmosphere() { int x = 1 + ~ }"),
            "[137-138] Expected expression after '+' operator"
        );
        assert_eq!(
            first_error("atmosphere() { bool x = yuh && ~ }"),
            "[120-121] Expected relational expression or boolean after '&&' operator"
        );
        assert_eq!(
            first_error("atmosphere() { bool x = 1 < ~ }"),
            "[122-123] Expected expression after '<' operator"
        );
    }

    #[test]
    fn test_primary_diagnostics() {
        assert_eq!(
            first_error("atmosphere() { int x = ( ~ }"),
            "[143-145] Incomplete expression - unexpected '~'"
        );
        let (ast, errors) = parse("atmosphere() { int x = ( * 2)~ }");
        assert!(ast.is_none());
        assert_eq!(errors[0].message, "Unexpected operator '*' - expected value or identifier");
    }

    #[test]
    fn test_concatenation_chain() {
        let (ast, errors) = parse("atmosphere() { string s = \"a\" & 'b' & \"c\"~ }");
        assert!(errors.is_empty(), "{:?}", errors);
        let content = ast.unwrap().find(&|n| n.kind == NodeKind::OutputContent).cloned();
        assert_eq!(content.and_then(|c| c.value), Some("\"a\"".to_string()));
    }
}
