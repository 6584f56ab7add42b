//! Parser for OxC Lang
//!
//! Predictive recursive descent over the LL(1) grammar, one method per
//! nonterminal. Each rule picks its production by testing the lookahead
//! against the production's PREDICT set; production numbers appear in the
//! rule comments and in diagnostics.
//!
//! Failures come in two tiers. A PREDICT mismatch in most rules is *soft*:
//! the diagnostic is recorded and a `missing` node stands in for the rule.
//! Terminal mismatches, missing operands and a few declaration shapes are
//! *hard*: they unwind the whole parse and no tree is returned. Statement
//! rules live in `parser_stmt.rs`, expression rules in `parser_expr.rs`.

use crate::frontend::ast::{AstNode, Child, NodeKind};
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{ParseError, Span};

/// Result of one grammar rule
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Parsed {
    Node(AstNode),
    /// Soft failure, already reported
    Degraded(AstNode),
}

impl Parsed {
    pub(super) fn node(kind: NodeKind, children: Vec<Child>) -> Self {
        Parsed::Node(AstNode::new(kind, children))
    }

    pub(super) fn empty(kind: NodeKind) -> Self {
        Parsed::Node(AstNode::empty(kind))
    }

    pub(super) fn valued(kind: NodeKind, value: impl Into<String>) -> Self {
        Parsed::Node(AstNode::valued(kind, value))
    }

    pub(super) fn is_degraded(&self) -> bool {
        matches!(self, Parsed::Degraded(_))
    }

    pub(super) fn into_node(self) -> AstNode {
        match self {
            Parsed::Node(node) | Parsed::Degraded(node) => node,
        }
    }
}

impl From<Parsed> for Child {
    fn from(parsed: Parsed) -> Self {
        Child::Node(parsed.into_node())
    }
}

/// Hard failure; unwinds to `Parser::parse`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Abort;

pub(super) type Rule = std::result::Result<Parsed, Abort>;

/// The parser
pub struct Parser<'t> {
    pub(super) tokens: &'t [Token],
    pub(super) pos: usize,
    errors: Vec<ParseError>,
    /// Token position of the last recorded diagnostic
    last_error_at: Option<usize>,
}

impl<'t> Parser<'t> {
    /// Create a parser over an error-free token stream
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            last_error_at: None,
        }
    }

    /// Parse a complete program
    pub fn parse(mut self) -> (Option<AstNode>, Vec<ParseError>) {
        if !matches!(
            self.kind(),
            Some(TokenKind::Universal | TokenKind::Air | TokenKind::Atmosphere)
        ) {
            let message = format!(
                "Program must start with 'universal', 'air', or 'atmosphere', got '{}'",
                self.got()
            );
            self.error(message);
            return (None, self.errors);
        }

        let ast = match self.parse_program() {
            Ok(program) => Some(program.into_node()),
            Err(Abort) => {
                if !self.at(&TokenKind::RBrace) {
                    self.error("Expected '}' to close atmosphere() function");
                }
                None
            }
        };

        if ast.is_some() && !self.is_at_end() {
            let message = format!("Unexpected '{}' after end of program", self.got());
            self.error(message);
        }

        log::debug!(
            "parsed {} tokens: {} ({} errors)",
            self.tokens.len(),
            if ast.is_some() { "tree built" } else { "aborted" },
            self.errors.len()
        );
        (ast, self.errors)
    }

    // ==================== Helper Methods ====================

    pub(super) fn current(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub(super) fn kind(&self) -> Option<&'t TokenKind> {
        self.current().map(|t| &t.kind)
    }

    pub(super) fn at(&self, kind: &TokenKind) -> bool {
        self.kind() == Some(kind)
    }

    pub(super) fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Current tag for diagnostics
    pub(super) fn got(&self) -> String {
        match self.kind() {
            Some(kind) => kind.tag().into_owned(),
            None => "end of input".to_string(),
        }
    }

    pub(super) fn advance(&mut self) -> Option<&'t Token> {
        let token = self.current();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Record a diagnostic at the current token, once per position
    pub(super) fn error(&mut self, message: impl Into<String>) {
        if self.last_error_at == Some(self.pos) {
            return;
        }
        let span = self
            .current()
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(Span::unknown);
        let message = message.into();
        log::trace!("parse error at {}: {}", span, message);
        self.errors.push(ParseError::new(message, span));
        self.last_error_at = Some(self.pos);
    }

    /// Soft failure: report and stand in a `missing` node
    pub(super) fn soft(&mut self, message: impl Into<String>) -> Rule {
        self.error(message);
        Ok(Parsed::Degraded(AstNode::missing()))
    }

    /// Hard failure: report and unwind
    pub(super) fn hard(&mut self, message: impl Into<String>) -> Abort {
        self.error(message);
        Abort
    }

    /// Consume the expected terminal
    pub(super) fn expect(&mut self, expected: TokenKind) -> Result<&'t Token, Abort> {
        match self.current() {
            Some(token) if token.kind == expected => {
                self.pos += 1;
                Ok(token)
            }
            Some(_) => {
                let message = format!("Expected '{}', got '{}'", expected, self.got());
                Err(self.hard(message))
            }
            None => Err(self.hard(format!("Expected '{}', but reached end of input", expected))),
        }
    }

    /// Consume an identifier terminal
    pub(super) fn expect_id(&mut self) -> Result<AstNode, Abort> {
        match self.current() {
            Some(token) if token.kind.is_ident() => {
                self.pos += 1;
                Ok(AstNode::id(token.tag()))
            }
            Some(_) => {
                let message = format!("Expected 'identifier', got '{}'", self.got());
                Err(self.hard(message))
            }
            None => Err(self.hard("Expected identifier, but reached end of input.")),
        }
    }

    /// Operator terminal node for the current token
    pub(super) fn take_operator(&mut self) -> AstNode {
        let op = self.advance().map(|t| t.lexeme.clone()).unwrap_or_default();
        AstNode::operator(op)
    }

    // ==================== Program ====================

    // Production 1: program → global_dec sub_functions atmosphere ( ) { body }
    fn parse_program(&mut self) -> Rule {
        let global_dec = self.parse_global_dec()?;
        let sub_functions = self.parse_sub_functions()?;

        self.expect(TokenKind::Atmosphere)?;
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_body()?;
        if self.at(&TokenKind::RBrace) {
            self.advance();
        } else {
            let message = format!("Expected '}}' to close atmosphere() function, got '{}'", self.got());
            self.error(message);
        }

        Ok(Parsed::node(
            NodeKind::Program,
            vec![global_dec.into(), sub_functions.into(), body.into()],
        ))
    }

    // Production 2: global_dec → universal declaration global_dec
    // Production 3: global_dec → λ
    fn parse_global_dec(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Universal) => {
                self.advance();
                let declaration = self.parse_declaration()?;
                let rest = self.parse_global_dec()?;
                Ok(Parsed::node(NodeKind::GlobalDec, vec![declaration.into(), rest.into()]))
            }
            Some(TokenKind::Air | TokenKind::Atmosphere) => Ok(Parsed::empty(NodeKind::GlobalDec)),
            _ => self.soft(format!(
                "[2-3] Expected 'universal', 'air', or 'atmosphere', got '{}'",
                self.got()
            )),
        }
    }

    // ==================== Declarations ====================

    // Production 4: declaration → normal
    // Production 5: declaration → structure
    // Production 6: declaration → wind constant
    pub(super) fn parse_declaration(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(kind) if kind.is_data_type() => self.parse_normal()?,
            Some(TokenKind::Gust) => self.parse_structure()?,
            Some(TokenKind::Wind) => {
                self.advance();
                self.parse_constant()?
            }
            _ => {
                return self.soft(format!(
                    "[4-6] Expected data type (int, float, char, string, bool) or 'gust' or 'wind', got '{}'",
                    self.got()
                ))
            }
        };
        Ok(Parsed::node(NodeKind::Declaration, vec![inner.into()]))
    }

    // Production 7: normal → data_type id norm_dec norm_tail ~
    pub(super) fn parse_normal(&mut self) -> Rule {
        if !self.kind().map_or(false, TokenKind::is_data_type) {
            return self.soft(format!(
                "[7] Expected data type (int, float, char, string, bool) got '{}'",
                self.got()
            ));
        }

        let data_type = self.parse_data_type()?;
        let id = self.expect_id()?;
        let norm_dec = self.parse_norm_dec()?;
        let norm_tail = self.parse_norm_tail()?;

        if !self.at(&TokenKind::Tilde) {
            let message = match self.kind() {
                Some(TokenKind::RBrace) => "Missing '~' terminator.".to_string(),
                Some(TokenKind::Comma) | None => {
                    format!("Expected '~' to end declaration, got '{}'", self.got())
                }
                Some(other) => {
                    format!("Unexpected '{}' in declaration - expected ',' or '~'", other.tag())
                }
            };
            return Err(self.hard(message));
        }
        self.expect(TokenKind::Tilde)?;

        Ok(Parsed::node(
            NodeKind::Normal,
            vec![data_type.into(), id.into(), norm_dec.into(), norm_tail.into()],
        ))
    }

    // Production 8: norm_dec → row_size array
    // Production 9: norm_dec → = expr
    // Production 10: norm_dec → λ
    fn parse_norm_dec(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LBracket) => {
                let row_size = self.parse_row_size()?;
                let array = self.parse_array()?;
                Ok(Parsed::node(NodeKind::NormDec, vec![row_size.into(), array.into()]))
            }
            Some(TokenKind::Assign) => {
                let op = self.take_operator();
                if matches!(
                    self.kind(),
                    None | Some(
                        TokenKind::Comma
                            | TokenKind::Tilde
                            | TokenKind::Atmosphere
                            | TokenKind::Air
                            | TokenKind::Universal
                    )
                ) {
                    let message = format!("Expected value or expression after '=', not '{}'", self.got());
                    return Err(self.hard(message));
                }
                let expr = self.parse_expr()?;
                Ok(Parsed::node(NodeKind::NormDec, vec![op.into(), expr.into()]))
            }
            Some(TokenKind::Comma | TokenKind::Tilde) => Ok(Parsed::empty(NodeKind::NormDec)),
            _ => self.soft(format!(
                "[8-10] Expected '[' or '=' or ',' or terminator '~' got '{}'",
                self.got()
            )),
        }
    }

    // Production 11: norm_tail → , id norm_dec norm_tail
    // Production 12: norm_tail → λ
    fn parse_norm_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                let id = self.expect_id()?;
                let norm_dec = self.parse_norm_dec()?;
                let rest = self.parse_norm_tail()?;
                Ok(Parsed::node(NodeKind::NormTail, vec![id.into(), norm_dec.into(), rest.into()]))
            }
            Some(TokenKind::Tilde) => Ok(Parsed::empty(NodeKind::NormTail)),
            _ => self.soft(format!("[11-12] Expected ',' or terminator '~' got '{}'", self.got())),
        }
    }

    // Production 13: array → = { arr_element }
    // Production 14: array → λ
    fn parse_array(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Assign) => {
                let op = self.take_operator();
                self.expect(TokenKind::LBrace)?;
                let elements = self.parse_arr_element()?;
                self.expect(TokenKind::RBrace)?;
                Ok(Parsed::node(NodeKind::Array, vec![op.into(), elements.into()]))
            }
            Some(TokenKind::Comma | TokenKind::Tilde) => Ok(Parsed::empty(NodeKind::Array)),
            _ => self.soft(format!(
                "[13-14] Expected '=' or ',' or terminator '~' got '{}'",
                self.got()
            )),
        }
    }

    // Production 15: arr_element → 1d_element
    // Production 16: arr_element → 2d_element
    fn parse_arr_element(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(kind) if starts_output(kind) || *kind == TokenKind::RBrace => self.parse_1d_element()?,
            Some(TokenKind::LBrace) => self.parse_2d_element()?,
            _ => {
                return self.soft(format!(
                    "[15-16] Expected a value literal or '}}' got '{}'",
                    self.got()
                ))
            }
        };
        Ok(Parsed::node(NodeKind::ArrElement, vec![inner.into()]))
    }

    // Production 17: 1d_element → output element_tail
    // Production 18: 1d_element → λ
    fn parse_1d_element(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if starts_output(kind) => {
                let output = self.parse_output()?;
                let tail = self.parse_element_tail()?;
                Ok(Parsed::node(NodeKind::OneDElement, vec![output.into(), tail.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::OneDElement)),
            _ => self.soft(format!("[17-18] Expected a value literal, got '{}'", self.got())),
        }
    }

    // Production 19: 2d_element → { 1d_element } 2d_tail
    fn parse_2d_element(&mut self) -> Rule {
        if !self.at(&TokenKind::LBrace) {
            return self.soft(format!("[19] Expected '{{', got '{}'", self.got()));
        }
        self.expect(TokenKind::LBrace)?;
        let row = self.parse_1d_element()?;
        self.expect(TokenKind::RBrace)?;
        let tail = self.parse_2d_tail()?;
        Ok(Parsed::node(NodeKind::TwoDElement, vec![row.into(), tail.into()]))
    }

    // Production 20: element_tail → , output element_tail
    // Production 21: element_tail → λ
    pub(super) fn parse_element_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                let output = self.parse_output()?;
                let rest = self.parse_element_tail()?;
                Ok(Parsed::node(NodeKind::ElementTail, vec![output.into(), rest.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::ElementTail)),
            _ => self.soft(format!("[20-21] Expected ',' or '}}' got '{}'", self.got())),
        }
    }

    // Production 22: 2d_tail → , { 1d_element } 2d_tail
    // Production 23: 2d_tail → λ
    fn parse_2d_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                self.expect(TokenKind::LBrace)?;
                let row = self.parse_1d_element()?;
                self.expect(TokenKind::RBrace)?;
                let rest = self.parse_2d_tail()?;
                Ok(Parsed::node(NodeKind::TwoDTail, vec![row.into(), rest.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::TwoDTail)),
            _ => self.soft(format!("[22-23] Expected ',' or '}}' got '{}'", self.got())),
        }
    }

    // Production 24: structure → gust id struct_tail ~
    fn parse_structure(&mut self) -> Rule {
        if !self.at(&TokenKind::Gust) {
            return self.soft(format!("[24] Expected 'gust', got '{}'", self.got()));
        }
        self.advance();
        let id = self.expect_id()?;
        let tail = self.parse_struct_tail()?;
        self.expect(TokenKind::Tilde)?;
        Ok(Parsed::node(NodeKind::Structure, vec![id.into(), tail.into()]))
    }

    // Production 25: struct_tail → { data_type id ~ gust_tail }
    // Production 26: struct_tail → id struct_tail2
    fn parse_struct_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LBrace) => {
                self.advance();
                let data_type = self.parse_data_type()?;
                let id = self.expect_id()?;
                self.expect(TokenKind::Tilde)?;
                let members = self.parse_gust_tail()?;
                self.expect(TokenKind::RBrace)?;
                Ok(Parsed::node(
                    NodeKind::StructTail,
                    vec![data_type.into(), id.into(), members.into()],
                ))
            }
            Some(kind) if kind.is_ident() => {
                let id = self.expect_id()?;
                let init = self.parse_struct_tail2()?;
                Ok(Parsed::node(NodeKind::StructTail, vec![id.into(), init.into()]))
            }
            _ => self.soft(format!("[25-26] Expected '{{' or identifier, got '{}'", self.got())),
        }
    }

    // Production 27: struct_tail2 → = { 1d_element }
    // Production 28: struct_tail2 → λ
    fn parse_struct_tail2(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Assign) => {
                let op = self.take_operator();
                self.expect(TokenKind::LBrace)?;
                let values = self.parse_1d_element()?;
                self.expect(TokenKind::RBrace)?;
                Ok(Parsed::node(NodeKind::StructTail2, vec![op.into(), values.into()]))
            }
            Some(TokenKind::Tilde) => Ok(Parsed::empty(NodeKind::StructTail2)),
            _ => self.soft(format!("[27-28] Expected '=' or '~', got '{}'", self.got())),
        }
    }

    // Production 29: gust_tail → data_type id ~ gust_tail
    // Production 30: gust_tail → λ
    fn parse_gust_tail(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if kind.is_data_type() => {
                let data_type = self.parse_data_type()?;
                let id = self.expect_id()?;
                self.expect(TokenKind::Tilde)?;
                let rest = self.parse_gust_tail()?;
                Ok(Parsed::node(NodeKind::GustTail, vec![data_type.into(), id.into(), rest.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::GustTail)),
            _ => self.soft(format!("[29-30] Expected data type or '}}', got '{}'", self.got())),
        }
    }

    // Production 31: constant → data_type id const_dec ~
    // Production 32: constant → struct_const
    fn parse_constant(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if kind.is_data_type() => {
                let data_type = self.parse_data_type()?;
                let id = self.expect_id()?;
                let const_dec = self.parse_const_dec()?;
                self.expect(TokenKind::Tilde)?;
                Ok(Parsed::node(
                    NodeKind::Constant,
                    vec![data_type.into(), id.into(), const_dec.into()],
                ))
            }
            Some(TokenKind::Gust) => {
                let inner = self.parse_struct_const()?;
                Ok(Parsed::node(NodeKind::Constant, vec![inner.into()]))
            }
            _ => self.soft(format!("[31-32] Expected data type or gust, got '{}'", self.got())),
        }
    }

    // Production 33: const_dec → = expr const_tail
    // Production 34: const_dec → row_size = { const_arr } const_tail
    fn parse_const_dec(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Assign) => {
                let op = self.take_operator();
                let expr = self.parse_expr()?;
                let tail = self.parse_const_tail()?;
                Ok(Parsed::node(NodeKind::ConstDec, vec![op.into(), expr.into(), tail.into()]))
            }
            Some(TokenKind::LBracket) => {
                let row_size = self.parse_row_size()?;
                if !self.at(&TokenKind::Assign) {
                    self.expect(TokenKind::Assign)?;
                }
                let op = self.take_operator();
                self.expect(TokenKind::LBrace)?;
                let values = self.parse_const_arr()?;
                self.expect(TokenKind::RBrace)?;
                let tail = self.parse_const_tail()?;
                Ok(Parsed::node(
                    NodeKind::ConstDec,
                    vec![row_size.into(), op.into(), values.into(), tail.into()],
                ))
            }
            _ => self.soft(format!("[33-34] Expected '=' or '[', got '{}'", self.got())),
        }
    }

    // Production 35: const_tail → , id const_dec
    // Production 36: const_tail → λ
    fn parse_const_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                let id = self.expect_id()?;
                let const_dec = self.parse_const_dec()?;
                Ok(Parsed::node(NodeKind::ConstTail, vec![id.into(), const_dec.into()]))
            }
            Some(TokenKind::Tilde) => Ok(Parsed::empty(NodeKind::ConstTail)),
            _ => self.soft(format!("[35-36] Expected ',' or '~', got '{}'", self.got())),
        }
    }

    // Production 37: const_arr → const_1d
    // Production 38: const_arr → const_2d
    fn parse_const_arr(&mut self) -> Rule {
        let inner = match self.kind() {
            Some(
                TokenKind::IntLit
                | TokenKind::FloatLit
                | TokenKind::CharLit
                | TokenKind::StringLit
                | TokenKind::Yuh
                | TokenKind::Naur,
            ) => self.parse_const_1d()?,
            Some(TokenKind::LBrace) => self.parse_const_2d()?,
            _ => {
                return self.soft(format!(
                    "[37-38] Expected value literal or '{{', got '{}'",
                    self.got()
                ))
            }
        };
        Ok(Parsed::node(NodeKind::ConstArr, vec![inner.into()]))
    }

    // Production 39: const_1d → output element_tail
    fn parse_const_1d(&mut self) -> Rule {
        if !self.kind().map_or(false, starts_output) {
            return self.soft(format!("[39] Expected value literal, got '{}'", self.got()));
        }
        let output = self.parse_output()?;
        let tail = self.parse_element_tail()?;
        Ok(Parsed::node(NodeKind::Const1d, vec![output.into(), tail.into()]))
    }

    // Production 40: const_2d → { const_1d } const_2d_tail
    fn parse_const_2d(&mut self) -> Rule {
        if !self.at(&TokenKind::LBrace) {
            return self.soft(format!("[40] Expected '{{', got '{}'", self.got()));
        }
        self.advance();
        let row = self.parse_const_1d()?;
        self.expect(TokenKind::RBrace)?;
        let tail = self.parse_const_2d_tail()?;
        Ok(Parsed::node(NodeKind::Const2d, vec![row.into(), tail.into()]))
    }

    // Production 41: const_2d_tail → , { const_1d } const_2d_tail
    // Production 42: const_2d_tail → λ
    fn parse_const_2d_tail(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::Comma) => {
                self.advance();
                self.expect(TokenKind::LBrace)?;
                let row = self.parse_const_1d()?;
                self.expect(TokenKind::RBrace)?;
                let rest = self.parse_const_2d_tail()?;
                Ok(Parsed::node(NodeKind::Const2dTail, vec![row.into(), rest.into()]))
            }
            Some(TokenKind::RBrace) => Ok(Parsed::empty(NodeKind::Const2dTail)),
            _ => self.soft(format!("[41-42] Expected ',' or '}}', got '{}'", self.got())),
        }
    }

    // Production 43: struct_const → gust id id = { const_1d } ~
    fn parse_struct_const(&mut self) -> Rule {
        if !self.at(&TokenKind::Gust) {
            return self.soft(format!("[43] Expected 'gust', got '{}'", self.got()));
        }
        self.advance();
        let struct_type = self.expect_id()?;
        let name = self.expect_id()?;
        if !self.at(&TokenKind::Assign) {
            self.expect(TokenKind::Assign)?;
        }
        let op = self.take_operator();
        self.expect(TokenKind::LBrace)?;
        let values = self.parse_const_1d()?;
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::Tilde)?;
        Ok(Parsed::node(
            NodeKind::StructConst,
            vec![struct_type.into(), name.into(), op.into(), values.into()],
        ))
    }

    // ==================== Dimensions ====================

    // Production 44: dimension → row_size
    // Production 45: dimension → λ
    pub(super) fn parse_dimension(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LBracket) => {
                let row_size = self.parse_row_size()?;
                Ok(Parsed::node(NodeKind::Dimension, vec![row_size.into()]))
            }
            Some(kind) if ends_dimension(kind) => Ok(Parsed::empty(NodeKind::Dimension)),
            _ => self.soft(format!(
                "[44-45] Expected '~', '++', '--', operator, ')', '}}' got '{}'",
                self.got()
            )),
        }
    }

    // Production 46: row_size → [ size ] col_size
    fn parse_row_size(&mut self) -> Rule {
        if !self.at(&TokenKind::LBracket) {
            return self.soft(format!("[46] Expected '[', got '{}'", self.got()));
        }
        self.advance();
        let size = self.parse_size()?;
        self.expect(TokenKind::RBracket)?;
        let col_size = self.parse_col_size()?;
        Ok(Parsed::node(NodeKind::RowSize, vec![size.into(), col_size.into()]))
    }

    // Production 47: col_size → [ pdim_size ]
    // Production 48: col_size → λ
    fn parse_col_size(&mut self) -> Rule {
        match self.kind() {
            Some(TokenKind::LBracket) => {
                self.advance();
                let size = self.parse_pdim_size()?;
                self.expect(TokenKind::RBracket)?;
                Ok(Parsed::node(NodeKind::ColSize, vec![size.into()]))
            }
            Some(kind) if ends_dimension(kind) => Ok(Parsed::empty(NodeKind::ColSize)),
            _ => self.soft(format!(
                "[47-48] Expected '[', '}}', identifier, '~', operator, statement, or 'gasp', got '{}'",
                self.got()
            )),
        }
    }

    // Production 49: size → arith_expr
    // Production 50: size → λ
    fn parse_size(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if starts_expr(kind) => {
                let expr = self.parse_arith_expr()?;
                Ok(Parsed::node(NodeKind::Size, vec![expr.into()]))
            }
            Some(TokenKind::RBracket) => Ok(Parsed::empty(NodeKind::Size)),
            _ => self.soft(format!(
                "[49-50] Expected '(', identifier, value literal, or predefined function, got '{}'",
                self.got()
            )),
        }
    }

    // Production 67: pdim_size → arith_expr
    pub(super) fn parse_pdim_size(&mut self) -> Rule {
        if !self.kind().map_or(false, starts_expr) {
            return self.soft(format!(
                "[67] Expected '(', identifier, value literal, or predefined function, got '{}'",
                self.got()
            ));
        }
        let expr = self.parse_arith_expr()?;
        Ok(Parsed::node(NodeKind::PdimSize, vec![expr.into()]))
    }

    // Productions 51-55: data_type → int | float | char | string | bool
    pub(super) fn parse_data_type(&mut self) -> Rule {
        match self.kind() {
            Some(kind) if kind.is_data_type() => {
                self.advance();
                Ok(Parsed::valued(NodeKind::DataType, kind.tag()))
            }
            _ => self.soft(format!(
                "[51-55] Expected data type (int, float, char, string, bool), got '{}'",
                self.got()
            )),
        }
    }
}

// ==================== PREDICT and FOLLOW sets ====================

/// FIRST of `expr`
pub(super) fn starts_expr(kind: &TokenKind) -> bool {
    matches!(kind, TokenKind::LParen | TokenKind::Not) || starts_output(kind)
}

/// FIRST of `output`
pub(super) fn starts_output(kind: &TokenKind) -> bool {
    kind.is_ident()
        || kind.is_builtin()
        || matches!(
            kind,
            TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::IntLit
                | TokenKind::FloatLit
                | TokenKind::Yuh
                | TokenKind::Naur
                | TokenKind::CharLit
                | TokenKind::StringLit
        )
}

/// FIRST of `statement`
pub(super) fn starts_statement(kind: &TokenKind) -> bool {
    kind.is_data_type()
        || kind.is_ident()
        || matches!(
            kind,
            TokenKind::Gust
                | TokenKind::Wind
                | TokenKind::Inhale
                | TokenKind::Exhale
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::If
                | TokenKind::Stream
                | TokenKind::Cycle
                | TokenKind::Echo
                | TokenKind::Do
        )
}

/// Tokens that may follow an operand (FOLLOW of `unary_op2` and `output_tail`)
pub(super) fn ends_operand(kind: &TokenKind) -> bool {
    kind.is_relational()
        || matches!(
            kind,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::RBracket
                | TokenKind::Comma
                | TokenKind::Tilde
                | TokenKind::RParen
                | TokenKind::OrOr
                | TokenKind::AndAnd
                | TokenKind::RBrace
        )
}

/// FOLLOW of `dimension` and `col_size`
pub(super) fn ends_dimension(kind: &TokenKind) -> bool {
    ends_operand(kind)
        || kind.is_assign_op()
        || matches!(kind, TokenKind::PlusPlus | TokenKind::MinusMinus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use pretty_assertions::assert_eq;

    pub(crate) fn parse(source: &str) -> (Option<AstNode>, Vec<ParseError>) {
        let tokens = Lexer::new(source).tokenize();
        assert!(tokens.iter().all(|t| !t.is_error()), "lexical errors in {:?}", source);
        Parser::new(&tokens).parse()
    }

    fn messages(source: &str) -> Vec<String> {
        parse(source).1.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_minimal_program() {
        let (ast, errors) = parse("atmosphere() { }");
        assert!(errors.is_empty());
        let ast = ast.unwrap();
        assert_eq!(ast.name(), "program");
        assert_eq!(ast.node_at(0).unwrap().name(), "global_dec_empty");
        assert_eq!(ast.node_at(1).unwrap().name(), "sub_functions_empty");
    }

    #[test]
    fn test_global_declarations() {
        let (ast, errors) = parse("universal int x = 3, y~ universal gust P { int a~ } ~ atmosphere() { }");
        assert!(errors.is_empty(), "{:?}", errors);
        let globals = ast.unwrap().node_at(0).unwrap().clone();
        let normal = globals.node_at(0).unwrap().node_at(0).unwrap();
        assert_eq!(normal.kind, NodeKind::Normal);
        assert_eq!(normal.node_at(0).unwrap().value.as_deref(), Some("int"));
        assert_eq!(normal.node_at(1).unwrap().value.as_deref(), Some("id1"));
        let structure = globals.node_at(1).unwrap().node_at(0).unwrap().node_at(0).unwrap();
        assert_eq!(structure.kind, NodeKind::Structure);
    }

    #[test]
    fn test_arrays_and_constants() {
        let source = "atmosphere() { int a[2][2] = {{1, 2}, {3, 4}}~ wind float pi = 3.14~ wind int r[2] = {1, 2}~ }";
        let (ast, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(ast.unwrap().contains(NodeKind::TwoDElement));
    }

    #[test]
    fn test_wrong_start() {
        assert_eq!(
            messages("int x~"),
            vec!["Program must start with 'universal', 'air', or 'atmosphere', got 'int'"]
        );
        assert_eq!(
            messages(""),
            vec!["Program must start with 'universal', 'air', or 'atmosphere', got 'end of input'"]
        );
    }

    #[test]
    fn test_unterminated_expression_is_hard() {
        let (ast, errors) = parse("atmosphere() { int x = 5 }");
        assert!(ast.is_none());
        assert_eq!(
            errors[0].message,
            "[140-141] Expected terminator '~' or continuation of expression, got '}'."
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unexpected_in_declaration() {
        assert_eq!(
            messages("atmosphere() { int x y~ }"),
            vec!["[8-10] Expected '[' or '=' or ',' or terminator '~' got 'id2'"]
        );
    }

    #[test]
    fn test_missing_value_after_assign() {
        let (ast, errors) = parse("atmosphere() { int x = ~ }");
        assert!(ast.is_none());
        assert_eq!(errors[0].message, "Expected value or expression after '=', not '~'");
    }

    #[test]
    fn test_unclosed_program() {
        let (ast, errors) = parse("atmosphere() { int x~");
        assert!(ast.is_none());
        assert_eq!(errors[0].message, "Expected '}' to close atmosphere() function");
        assert_eq!(errors[0].line, 1);
    }

    #[test]
    fn test_trailing_tokens() {
        assert_eq!(
            messages("atmosphere() { } x"),
            vec!["Unexpected 'id1' after end of program"]
        );
    }

    #[test]
    fn test_errors_deduplicated_per_position() {
        let mut parser = Parser::new(&[]);
        parser.error("first");
        parser.error("second");
        assert_eq!(parser.errors.len(), 1);
    }

    #[test]
    fn test_ast_serializes() {
        let (ast, _) = parse("atmosphere() { }");
        let json = serde_json::to_value(ast.unwrap()).unwrap();
        assert_eq!(json["type"], "program");
        assert_eq!(json["children"][2]["type"], "body");
        assert_eq!(json["children"][2]["children"][0]["type"], "stmt_list_empty");
    }
}
