//! Function and statement rules of the parser

use crate::frontend::ast::{Child, NodeKind};
use crate::frontend::parser::{starts_expr, starts_statement, Abort, Parsed, Parser, Rule};
use crate::frontend::token::TokenKind;

impl<'t> Parser<'t> {
    // ==================== Functions ====================

    // Production 56: sub_functions → air_func sub_functions
    // Production 57: sub_functions → λ
    pub(super) fn parse_sub_functions(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Air) => {
                let function = self.parse_air_func()?;
                let rest = self.parse_sub_functions()?;
                Ok(Parsed::node(NodeKind::SubFunctions, vec![function.into(), rest.into()]))
            }
            Some(TokenKind::Atmosphere) => Ok(Parsed::empty(NodeKind::SubFunctions)),
            _ => self.soft(format!("[56-57] Expected 'air' or 'atmosphere', got '{}'", self.got())),
        }
    }

    // Production 58: air_func → air return_type id ( params ) { body return_stat }
    fn parse_air_func(&mut self) -> Rule {
        if !self.at(&TokenKind::Air) {
            return self.soft(format!("[58] Expected 'air', got '{}'", self.got()));
        }
        self.advance();
        let return_type = self.parse_return_type()?;
        let id = self.expect_id()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_body()?;
        let return_stat = self.parse_return_stat()?;
        self.expect(TokenKind::RBrace)?;
        Ok(Parsed::node(
            NodeKind::AirFunc,
            vec![
                return_type.into(),
                id.into(),
                params.into(),
                body.into(),
                return_stat.into(),
            ],
        ))
    }

    // Production 59: return_type → data_type
    // Production 60: return_type → vacuum
    fn parse_return_type(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if kind.is_data_type() => {
                let data_type = self.parse_data_type()?;
                Ok(Parsed::node(NodeKind::ReturnType, vec![data_type.into()]))
            }
            Some(TokenKind::Vacuum) => {
                self.advance();
                Ok(Parsed::valued(NodeKind::ReturnType, "vacuum"))
            }
            _ => self.soft(format!("[59-60] Expected data type or 'vacuum', got '{}'", self.got())),
        }
    }

    // Production 61: params → data_type id params_dim params_tail
    // Production 62: params → λ
    fn parse_params(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if kind.is_data_type() => {
                let children = self.parse_param_decl()?;
                Ok(Parsed::node(NodeKind::Params, children))
            }
            Some(TokenKind::RParen) => Ok(Parsed::empty(NodeKind::Params)),
            _ => self.soft(format!("[61-62] Expected data type or ')', got '{}'", self.got())),
        }
    }

    /// `data_type id params_dim params_tail`, shared by `params` and `params_tail`
    fn parse_param_decl(&mut self) -> Result<Vec<Child>, Abort> {
        let data_type = self.parse_data_type()?;
        let id = self.expect_id()?;
        let dims = self.parse_params_dim()?;
        let rest = self.parse_params_tail()?;
        Ok(vec![data_type.into(), id.into(), dims.into(), rest.into()])
    }

    // Production 63: params_dim → [ pdim_tail
    // Production 64: params_dim → λ
    fn parse_params_dim(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LBracket) => {
                self.advance();
                let tail = self.parse_pdim_tail()?;
                Ok(Parsed::node(NodeKind::ParamsDim, vec![tail.into()]))
            }
            Some(TokenKind::Comma | TokenKind::RParen) => Ok(Parsed::empty(NodeKind::ParamsDim)),
            _ => self.soft(format!("[63-64] Expected '[' or ',' or ')', got '{}'", self.got())),
        }
    }

    // Production 65: pdim_tail → ]
    // Production 66: pdim_tail → pdim_size ] [ pdim_size ]
    fn parse_pdim_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::RBracket) => {
                self.advance();
                Ok(Parsed::valued(NodeKind::PdimTail, "]"))
            }
            Some(kind) if starts_expr(kind) => {
                let rows = self.parse_pdim_size()?;
                self.expect(TokenKind::RBracket)?;
                self.expect(TokenKind::LBracket)?;
                let cols = self.parse_pdim_size()?;
                self.expect(TokenKind::RBracket)?;
                Ok(Parsed::node(NodeKind::PdimTail, vec![rows.into(), cols.into()]))
            }
            _ => self.soft(format!(
                "[65-66] Expected '(', identifier, value literal, or predefined function, got '{}'",
                self.got()
            )),
        }
    }

    // Production 68: params_tail → , data_type id params_dim params_tail
    // Production 69: params_tail → λ
    fn parse_params_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                let children = self.parse_param_decl()?;
                Ok(Parsed::node(NodeKind::ParamsTail, children))
            }
            Some(TokenKind::RParen) => Ok(Parsed::empty(NodeKind::ParamsTail)),
            _ => self.soft(format!("[68-69] Expected ',' or ')', got '{}'", self.got())),
        }
    }

    // Production 70: body → stmt_list
    pub(super) fn parse_body(&mut self) -> Rule {
        match self.kind() {
            Some(kind)
                if starts_statement(kind)
                    || matches!(kind, TokenKind::RBrace | TokenKind::Gasp) =>
            {
                let statements = self.parse_stmt_list()?;
                Ok(Parsed::node(NodeKind::Body, vec![statements.into()]))
            }
            _ => self.soft(format!("[70] Invalid body start. Expected statements, got '{}'", self.got())),
        }
    }

    // Production 189: return_stat → gasp expr ~
    // Production 190: return_stat → λ
    fn parse_return_stat(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Gasp) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(NodeKind::ReturnStat, vec![expr.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::ReturnStat)),
            _ => self.soft(format!("[189-190] Expected 'gasp' or end of program, got '{}'", self.got())),
        }
    }

    // ==================== Statements ====================

    // Production 71: stmt_list → statement stmt_list
    // Production 72: stmt_list → λ
    fn parse_stmt_list(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if starts_statement(kind) => {
                let statement = self.parse_statement()?;
                if statement.is_degraded() {
                    return Err(Abort);
                }
                let rest = self.parse_stmt_list()?;
                Ok(Parsed::node(NodeKind::StmtList, vec![statement.into(), rest.into()]))
            }
            Some(TokenKind::RBrace | TokenKind::Gasp | TokenKind::Resist) => {
                Ok(Parsed::empty(NodeKind::StmtList))
            }
            None => Err(Abort),
            _ => self.soft(format!("[71-72] Invalid statements, got '{}'", self.got())),
        }
    }

    // Productions 73-77: statement → declaration | input_output | identifier_stat
    //                              | conditioner | iteration
    pub(super) fn parse_statement(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(kind) if kind.is_data_type() => self.parse_declaration()?,
            Some(TokenKind::Gust | TokenKind::Wind) => self.parse_declaration()?,
            Some(TokenKind::Inhale | TokenKind::Exhale) => self.parse_input_output()?,
            Some(kind) if kind.is_ident() => self.parse_identifier_stat()?,
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => self.parse_identifier_stat()?,
            Some(TokenKind::If | TokenKind::Stream) => self.parse_conditioner()?,
            Some(TokenKind::Cycle | TokenKind::Echo | TokenKind::Do) => self.parse_iteration()?,
            _ => {
                let message = format!("[73-77] Invalid statements, got '{}'", self.got());
                return Err(self.hard(message));
            }
        };
        if inner.is_degraded() {
            return Ok(Parsed::Degraded(inner.into_node()));
        }
        Ok(Parsed::node(NodeKind::Statement, vec![inner.into()]))
    }

    // Production 78: identifier_stat → unary_op id id_access ~
    // Production 79: identifier_stat → id id_stat_body ~
    pub(super) fn parse_identifier_stat(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                let unary = self.parse_unary_op()?;
                let id = self.expect_id()?;
                let access = self.parse_id_access()?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(
                    NodeKind::IdentifierStat,
                    vec![unary.into(), id.into(), access.into()],
                ))
            }
            Some(kind) if kind.is_ident() => {
                let id = self.expect_id()?;
                let body = self.parse_id_stat_body()?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(NodeKind::IdentifierStat, vec![id.into(), body.into()]))
            }
            _ => self.soft(format!(
                "[78-79] Expected '++' or '--' or identifier, got '{}'",
                self.got()
            )),
        }
    }

    // Production 80: id_stat_body → ( param_opts )
    // Production 81: id_stat_body → id_access id_stat_tail
    fn parse_id_stat_body(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LParen) => {
                self.advance();
                let args = self.parse_param_opts()?;
                self.expect(TokenKind::RParen)?;
                Ok(Parsed::node(NodeKind::IdStatBody, vec![args.into()]))
            }
            Some(kind)
                if kind.is_assign_op()
                    || matches!(
                        kind,
                        TokenKind::LBracket
                            | TokenKind::Dot
                            | TokenKind::PlusPlus
                            | TokenKind::MinusMinus
                    ) =>
            {
                let access = self.parse_id_access()?;
                let tail = self.parse_id_stat_tail()?;
                Ok(Parsed::node(NodeKind::IdStatBody, vec![access.into(), tail.into()]))
            }
            _ => self.soft(format!(
                "[80-81] Expected [, ., ++, --, =, +=, -=, *=, /=, %=, got '{}'",
                self.got()
            )),
        }
    }

    // Production 82: id_stat_tail → unary_op
    // Production 83: id_stat_tail → assignment
    fn parse_id_stat_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => {
                let unary = self.parse_unary_op()?;
                Ok(Parsed::node(NodeKind::IdStatTail, vec![unary.into()]))
            }
            Some(kind) if kind.is_assign_op() => {
                let assignment = self.parse_assignment()?;
                Ok(Parsed::node(NodeKind::IdStatTail, vec![assignment.into()]))
            }
            _ => self.soft(format!(
                "[82-83] Expected ++, --, =, +=, -=, *=, /=, %=, got '{}'",
                self.got()
            )),
        }
    }

    // Production 94: input_output → inhale ( id id_access ) ~
    // Production 95: input_output → exhale ( output ) ~
    fn parse_input_output(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Inhale) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let id = self.expect_id()?;
                let access = self.parse_id_access()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(
                    NodeKind::InputOutput,
                    vec![Child::Leaf("inhale".to_string()), id.into(), access.into()],
                ))
            }
            Some(TokenKind::Exhale) => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let output = self.parse_output()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(
                    NodeKind::InputOutput,
                    vec![Child::Leaf("exhale".to_string()), output.into()],
                ))
            }
            _ => self.soft(format!("[94-95] Expected 'inhale' or 'exhale', got '{}'", self.got())),
        }
    }

    // ==================== Control Flow ====================

    // Production 146: stmt_ctrl → statement stmt_ctrl
    // Production 147: stmt_ctrl → ctrl_flow stmt_ctrl
    // Production 148: stmt_ctrl → λ
    fn parse_stmt_ctrl(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if starts_statement(kind) => {
                let statement = self.parse_statement()?;
                let rest = self.parse_stmt_ctrl()?;
                Ok(Parsed::node(NodeKind::StmtCtrl, vec![statement.into(), rest.into()]))
            }
            Some(TokenKind::Resist | TokenKind::Flow) => {
                let ctrl = self.parse_ctrl_flow()?;
                let rest = self.parse_stmt_ctrl()?;
                Ok(Parsed::node(NodeKind::StmtCtrl, vec![ctrl.into(), rest.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::StmtCtrl)),
            _ => self.soft(format!("[146-148] Expected statement(s), got '{}'", self.got())),
        }
    }

    // Productions 149-150: ctrl_flow → resist ~ | flow ~
    fn parse_ctrl_flow(&mut self) -> Rule {
        match self.kind() {
            Some(kind @ (TokenKind::Resist | TokenKind::Flow)) => {
                self.advance();
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::valued(NodeKind::CtrlFlow, kind.tag()))
            }
            _ => self.soft(format!("[149-150] Expected 'resist' or 'flow', got '{}'", self.got())),
        }
    }

    // Productions 151-152: conditioner → if_stat | switch_stat
    fn parse_conditioner(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(TokenKind::If) => self.parse_if_stat()?,
            Some(TokenKind::Stream) => self.parse_switch_stat()?,
            _ => return self.soft(format!("[151-152] Expected 'if' or 'stream', got '{}'", self.got())),
        };
        Ok(Parsed::node(NodeKind::Conditioner, vec![inner.into()]))
    }

    /// `( cond_stat ) { stmt_ctrl }`, shared by `if` and `elseif`
    fn parse_guarded_block(&mut self) -> Result<(Parsed, Parsed), Abort> {
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_cond_stat()?;
        self.expect(TokenKind::RParen)?;
        let block = self.parse_block()?;
        Ok((cond, block))
    }

    /// `{ stmt_ctrl }`
    fn parse_block(&mut self) -> Rule {
        self.expect(TokenKind::LBrace)?;
        let block = self.parse_stmt_ctrl()?;
        self.expect(TokenKind::RBrace)?;
        Ok(block)
    }

    // Production 153: if_stat → if ( cond_stat ) { stmt_ctrl } if_tail
    fn parse_if_stat(&mut self) -> Rule {
        if !self.at(&TokenKind::If) {
            return self.soft(format!("[153] Expected 'if', got '{}'", self.got()));
        }
        self.advance();
        let (cond, block) = self.parse_guarded_block()?;
        let tail = self.parse_if_tail()?;
        Ok(Parsed::node(NodeKind::IfStat, vec![cond.into(), block.into(), tail.into()]))
    }

    // Production 154: if_tail → elseif ( cond_stat ) { stmt_ctrl } if_tail
    // Production 155: if_tail → else { stmt_ctrl }
    // Production 156: if_tail → λ
    fn parse_if_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Elseif) => {
                self.advance();
                let (cond, block) = self.parse_guarded_block()?;
                let rest = self.parse_if_tail()?;
                Ok(Parsed::node(NodeKind::IfTail, vec![cond.into(), block.into(), rest.into()]))
            }
            Some(TokenKind::Else) => {
                self.advance();
                let block = self.parse_block()?;
                Ok(Parsed::node(NodeKind::IfTail, vec![block.into()]))
            }
            Some(kind)
                if starts_statement(kind)
                    || matches!(
                        kind,
                        TokenKind::RBrace | TokenKind::Resist | TokenKind::Flow | TokenKind::Gasp
                    ) =>
            {
                Ok(Parsed::empty(NodeKind::IfTail))
            }
            _ => self.soft(format!(
                "[154-156] Expected 'elseif' or 'else' or other statements, got '{}'",
                self.got()
            )),
        }
    }

    // Production 157: cond_stat → expr
    fn parse_cond_stat(&mut self) -> Rule {
        if !self.kind().map_or(false, starts_expr) {
            return self.soft(format!(
                "[157] Expected '(', identifier, value literal, or function call, got '{}'",
                self.got()
            ));
        }
        let expr = self.parse_expr()?;
        Ok(Parsed::node(NodeKind::CondStat, vec![expr.into()]))
    }

    // Production 158: switch_stat → stream ( id id_access ) { switch_cases switch_def }
    fn parse_switch_stat(&mut self) -> Rule {
        if !self.at(&TokenKind::Stream) {
            return self.soft(format!("[158] Expected 'stream', got '{}'", self.got()));
        }
        self.advance();
        self.expect(TokenKind::LParen)?;
        let id = self.expect_id()?;
        let access = self.parse_id_access()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let cases = self.parse_switch_cases()?;
        let default = self.parse_switch_def()?;
        self.expect(TokenKind::RBrace)?;
        Ok(Parsed::node(
            NodeKind::SwitchStat,
            vec![id.into(), access.into(), cases.into(), default.into()],
        ))
    }

    // Production 159: switch_cases → case switch_opts : stmt_list resist ~ switch_cases
    // Production 160: switch_cases → λ
    fn parse_switch_cases(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Case) => {
                self.advance();
                let label = self.parse_switch_opts()?;
                self.expect(TokenKind::Colon)?;
                let statements = self.parse_stmt_list()?;
                self.expect(TokenKind::Resist)?;
                self.expect(TokenKind::Tilde)?;
                let rest = self.parse_switch_cases()?;
                Ok(Parsed::node(
                    NodeKind::SwitchCases,
                    vec![label.into(), statements.into(), rest.into()],
                ))
            }
            Some(TokenKind::RBrace | TokenKind::Diffuse) => Ok(Parsed::empty(NodeKind::SwitchCases)),
            _ => self.soft(format!(
                "[159-160] Expected 'case' or 'diffuse' or '}}', got '{}'",
                self.got()
            )),
        }
    }

    // Productions 161-162: switch_opts → int_lit | char_lit
    fn parse_switch_opts(&mut self) -> Rule {
        match self.current() {
            Some(token) if matches!(token.kind, TokenKind::IntLit | TokenKind::CharLit) => {
                self.advance();
                Ok(Parsed::valued(NodeKind::SwitchOpts, token.lexeme.clone()))
            }
            _ => self.soft(format!("[161-162] Expected integer type literal, got '{}'", self.got())),
        }
    }

    // Production 163: switch_def → diffuse : stmt_list resist ~
    // Production 164: switch_def → λ
    fn parse_switch_def(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Diffuse) => {
                self.advance();
                self.expect(TokenKind::Colon)?;
                let statements = self.parse_stmt_list()?;
                self.expect(TokenKind::Resist)?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(NodeKind::SwitchDef, vec![statements.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::SwitchDef)),
            _ => self.soft(format!("[163-165] Expected 'diffuse' or '}}', got '{}'", self.got())),
        }
    }

    // ==================== Iteration ====================

    // Productions 165-167: iteration → while_loop | for_loop | dowhile_loop
    fn parse_iteration(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(TokenKind::Cycle) => self.parse_while_loop()?,
            Some(TokenKind::Echo) => self.parse_for_loop()?,
            Some(TokenKind::Do) => self.parse_dowhile_loop()?,
            _ => {
                return self.soft(format!(
                    "[165-167] Expected 'cycle' or 'echo' or 'do', got '{}'",
                    self.got()
                ))
            }
        };
        Ok(Parsed::node(NodeKind::Iteration, vec![inner.into()]))
    }

    // Production 168: while_loop → cycle ( cond_stat ) { stmt_ctrl }
    fn parse_while_loop(&mut self) -> Rule {
        self.expect(TokenKind::Cycle)?;
        let (cond, block) = self.parse_guarded_block()?;
        Ok(Parsed::node(NodeKind::WhileLoop, vec![cond.into(), block.into()]))
    }

    // Production 169: for_loop → echo ( for_init cond_stat ~ identifier_stat ) { stmt_ctrl }
    fn parse_for_loop(&mut self) -> Rule {
        self.expect(TokenKind::Echo)?;
        self.expect(TokenKind::LParen)?;
        let init = self.parse_for_init()?;
        let cond = self.parse_cond_stat()?;
        self.expect(TokenKind::Tilde)?;
        let update = self.parse_identifier_stat()?;
        self.expect(TokenKind::RParen)?;
        let block = self.parse_block()?;
        Ok(Parsed::node(
            NodeKind::ForLoop,
            vec![init.into(), cond.into(), update.into(), block.into()],
        ))
    }

    // Production 170: dowhile_loop → do { stmt_ctrl } cycle ( cond_stat ) ~
    fn parse_dowhile_loop(&mut self) -> Rule {
        self.expect(TokenKind::Do)?;
        let block = self.parse_block()?;
        self.expect(TokenKind::Cycle)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_cond_stat()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Tilde)?;
        Ok(Parsed::node(NodeKind::DoWhileLoop, vec![block.into(), cond.into()]))
    }

    // Production 171: for_init → normal
    // Production 172: for_init → identifier_stat
    fn parse_for_init(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(kind) if kind.is_data_type() => self.parse_normal()?,
            Some(kind) if kind.is_ident() => self.parse_identifier_stat()?,
            Some(TokenKind::PlusPlus | TokenKind::MinusMinus) => self.parse_identifier_stat()?,
            _ => {
                return self.soft(format!(
                    "[171-172] Expected data type or identifier, got '{}'",
                    self.got()
                ))
            }
        };
        Ok(Parsed::node(NodeKind::ForInit, vec![inner.into()]))
    }
}

#[cfg(test)]
mod tests {
    use crate::frontend::ast::{AstNode, NodeKind};
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;
    use crate::utils::ParseError;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> (Option<AstNode>, Vec<ParseError>) {
        let tokens = Lexer::new(source).tokenize();
        assert!(tokens.iter().all(|t| !t.is_error()), "lexical errors in {:?}", source);
        Parser::new(&tokens).parse()
    }

    fn parses(source: &str) -> AstNode {
        let (ast, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors);
        ast.unwrap()
    }

    #[test]
    fn test_function_definition() {
        let ast = parses("air int add(int a, int b) { gasp a + b~ } atmosphere() { }");
        let function = ast.node_at(1).unwrap().node_at(0).unwrap();
        assert_eq!(function.kind, NodeKind::AirFunc);
        let params = function.node_at(2).unwrap();
        assert_eq!(params.kind, NodeKind::Params);
        assert_eq!(params.node_at(3).unwrap().kind, NodeKind::ParamsTail);
        assert_eq!(function.node_at(4).unwrap().kind, NodeKind::ReturnStat);
    }

    #[test]
    fn test_array_parameters() {
        let ast = parses("air vacuum f(int a[], float m[2][3]) { } atmosphere() { }");
        assert!(ast.contains(NodeKind::PdimTail));
    }

    #[test]
    fn test_if_elseif_else() {
        let source = "atmosphere() { int x = 1~ if (x > 0) { x++~ } elseif (x < 0) { x--~ } else { x = 0~ } }";
        let ast = parses(source);
        assert!(ast.contains(NodeKind::IfTail));
        assert!(ast.contains(NodeKind::IdStatTail));
    }

    #[test]
    fn test_loops() {
        let source = "atmosphere() { int i~ cycle (i < 3) { i++~ resist~ } \
                      echo (int j = 0~ j < 2~ j++~ ) { flow~ } \
                      do { i--~ } cycle (i > 0)~ }";
        let ast = parses(source);
        assert!(ast.contains(NodeKind::WhileLoop));
        assert!(ast.contains(NodeKind::ForLoop));
        assert!(ast.contains(NodeKind::DoWhileLoop));
        assert!(ast.contains(NodeKind::CtrlFlow));
    }

    #[test]
    fn test_switch() {
        let source = "atmosphere() { int x~ stream (x) { case 1: x++~ resist~ case 2: resist~ diffuse: x = 0~ resist~ } }";
        let ast = parses(source);
        let switch = ast.find(&|n| n.kind == NodeKind::SwitchStat).unwrap();
        let first = switch.node_at(2).unwrap().node_at(0).unwrap();
        assert_eq!(first.value.as_deref(), Some("1"));
        assert_eq!(switch.node_at(3).unwrap().name(), "switch_def");
    }

    #[test]
    fn test_io_statements() {
        let ast = parses("atmosphere() { int x~ inhale(x)~ exhale(\"x is \" & \"done\")~ }");
        let io = ast.find(&|n| n.kind == NodeKind::InputOutput).unwrap();
        assert_eq!(io.leaf_at(0), Some("inhale"));
        assert!(ast.contains(NodeKind::OutputTail));
    }

    #[test]
    fn test_function_call_statement() {
        let ast = parses("air vacuum f(int a) { } atmosphere() { f(1)~ }");
        assert!(ast.contains(NodeKind::ParamOpts));
    }

    #[test]
    fn test_stray_control_flow_in_body() {
        let (_, errors) = parse("atmosphere() { flow~ }");
        assert_eq!(errors[0].message, "[70] Invalid body start. Expected statements, got 'flow'");
    }
}
