//! Semantic Analysis for OxC Lang
//!
//! Performs:
//! - Symbol table management (scope stack, structure registry)
//! - Declaration, assignment and call checking over the conversion tables
//! - Context checks for `resist`, `flow` and `gasp`
//!
//! Expression typing lives in `semantic_expr`.

use std::collections::{HashMap, HashSet};

use crate::frontend::ast::{AstNode, Child, NodeKind};
use crate::frontend::parser_expr::operator_of;
use crate::frontend::token::{Token, TokenKind};
use crate::types::Type;
use crate::utils::{Error, Result, SemanticError, Span};

// ==================== Symbol Table ====================

/// One array dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Sized,
    Unsized,
}

/// A function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub is_array: bool,
    pub dims: Vec<Dim>,
}

/// Function signature
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub ret: Type,
}

/// Kind of symbol
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Function(Signature),
    Structure(Vec<(String, Type)>),
    StructInstance { struct_type: String },
}

/// Symbol information
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    /// Name of the frame the symbol was declared in
    pub scope: String,
    pub constant: bool,
    /// Empty unless the symbol is an array
    pub dims: Vec<Dim>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type) -> Self {
        let constant = kind == SymbolKind::Constant;
        Self {
            name: name.into(),
            kind,
            ty,
            scope: String::new(),
            constant,
            dims: Vec::new(),
        }
    }

    pub fn variable(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, SymbolKind::Variable, ty)
    }

    pub fn constant(name: impl Into<String>, ty: Type) -> Self {
        Self::new(name, SymbolKind::Constant, ty)
    }

    /// An instance of structure type `struct_type`
    pub fn instance(name: impl Into<String>, struct_type: &str, constant: bool) -> Self {
        let mut symbol = Self::new(
            name,
            SymbolKind::StructInstance { struct_type: struct_type.to_string() },
            Type::Struct(struct_type.to_string()),
        );
        symbol.constant = constant;
        symbol
    }

    pub fn with_dims(mut self, dims: Vec<Dim>) -> Self {
        self.dims = dims;
        self
    }

    /// Structure type of an instance
    pub fn struct_type(&self) -> Option<&str> {
        match &self.kind {
            SymbolKind::StructInstance { struct_type } => Some(struct_type),
            _ => None,
        }
    }
}

/// A frame of the scope stack
#[derive(Debug)]
struct Scope {
    name: String,
    symbols: HashMap<String, Symbol>,
}

impl Scope {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), symbols: HashMap::new() }
    }

    fn insert(&mut self, mut symbol: Symbol) -> Result<()> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(Error::DuplicateDefinition { name: symbol.name });
        }
        symbol.scope = self.name.clone();
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }
}

/// Symbol table as a stack of frames; frame 0 is global
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { scopes: vec![Scope::new("global")] }
    }

    /// Push a frame
    pub fn enter_scope(&mut self, name: &str) {
        self.scopes.push(Scope::new(name));
    }

    /// Pop the innermost frame; the global frame stays
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn is_global(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Define a symbol in the innermost frame
    pub fn define(&mut self, symbol: Symbol) -> Result<()> {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(symbol),
            None => Err(Error::DuplicateDefinition { name: symbol.name }),
        }
    }

    /// Define a symbol in the global frame
    pub fn define_global(&mut self, symbol: Symbol) -> Result<()> {
        self.scopes[0].insert(symbol)
    }

    /// Look up a symbol, innermost frame first
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.symbols.get(name))
    }

    /// Look up a symbol only in the innermost frame
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.scopes.last().and_then(|scope| scope.symbols.get(name))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Structure types by name, independent of the scope stack
#[derive(Debug, Default)]
pub struct StructRegistry {
    structs: HashMap<String, Vec<(String, Type)>>,
}

impl StructRegistry {
    pub fn define(&mut self, name: &str, members: Vec<(String, Type)>) -> Result<()> {
        if self.structs.contains_key(name) {
            return Err(Error::DuplicateDefinition { name: name.to_string() });
        }
        self.structs.insert(name.to_string(), members);
        Ok(())
    }

    pub fn members(&self, name: &str) -> Option<&[(String, Type)]> {
        self.structs.get(name).map(Vec::as_slice)
    }

    pub fn member_type(&self, name: &str, member: &str) -> Option<&Type> {
        self.members(name)?
            .iter()
            .find(|(field, _)| field == member)
            .map(|(_, ty)| ty)
    }
}

// ==================== Positions ====================

/// Names and positions recovered from the token stream
#[derive(Debug, Default)]
pub(super) struct Locator {
    /// `idN` tag to source name
    names: HashMap<String, String>,
    /// Last occurrence of each identifier
    identifiers: HashMap<String, Span>,
    /// First occurrence of each keyword
    keywords: HashMap<String, Span>,
    /// First occurrence of each literal lexeme
    literals: HashMap<String, Span>,
}

impl Locator {
    pub(super) fn new(tokens: &[Token]) -> Self {
        let mut locator = Self::default();
        for token in tokens {
            match &token.kind {
                TokenKind::Ident(_) => {
                    locator.names.insert(token.tag().into_owned(), token.lexeme.clone());
                    locator.identifiers.insert(token.lexeme.clone(), token.span);
                }
                TokenKind::IntLit | TokenKind::FloatLit | TokenKind::CharLit | TokenKind::StringLit => {
                    locator.literals.entry(token.lexeme.clone()).or_insert(token.span);
                }
                kind if kind.is_keyword() => {
                    locator.keywords.entry(token.lexeme.clone()).or_insert(token.span);
                }
                _ => {}
            }
        }
        locator
    }

    /// Source name of an identifier tag
    pub(super) fn name(&self, tag: &str) -> String {
        self.names.get(tag).cloned().unwrap_or_else(|| tag.to_string())
    }

    pub(super) fn identifier(&self, name: &str) -> Span {
        self.identifiers.get(name).copied().unwrap_or_default()
    }

    pub(super) fn keyword(&self, keyword: &str) -> Span {
        self.keywords.get(keyword).copied().unwrap_or_default()
    }

    /// Literal position; `yuh` / `naur` are keywords
    pub(super) fn literal(&self, lexeme: &str) -> Span {
        self.literals
            .get(lexeme)
            .or_else(|| self.keywords.get(lexeme))
            .copied()
            .unwrap_or_default()
    }
}

// ==================== Semantic Analyzer ====================

/// The function whose body is being checked
#[derive(Debug, Clone)]
pub(super) struct FunctionContext {
    pub(super) name: String,
    pub(super) ret: Type,
    pub(super) returns: bool,
}

/// Semantic analyzer
pub struct SemanticAnalyzer {
    pub(super) locator: Locator,
    pub(super) symbols: SymbolTable,
    pub(super) structs: StructRegistry,
    errors: Vec<SemanticError>,
    pub(super) function: Option<FunctionContext>,
    in_atmosphere: bool,
    in_loop: bool,
    in_switch: bool,
}

impl SemanticAnalyzer {
    pub fn new(tokens: &[Token]) -> Self {
        Self {
            locator: Locator::new(tokens),
            symbols: SymbolTable::new(),
            structs: StructRegistry::default(),
            errors: Vec::new(),
            function: None,
            in_atmosphere: false,
            in_loop: false,
            in_switch: false,
        }
    }

    /// Check a program and return the errors in discovery order
    pub fn analyze(mut self, ast: Option<&AstNode>) -> Vec<SemanticError> {
        match ast {
            None => self.error("No AST to analyze", Span::unknown()),
            Some(program) => {
                if let Err(err) = self.visit(program) {
                    self.error(format!("Semantic analysis error: {}", err), Span::unknown());
                }
            }
        }
        log::debug!("semantic analysis finished with {} error(s)", self.errors.len());
        self.errors
    }

    pub(super) fn error(&mut self, message: impl Into<String>, span: Span) {
        let error = SemanticError::new(message, span);
        log::trace!("semantic error at {}: {}", span, error.message);
        self.errors.push(error);
    }

    /// Source name of an `Id` node
    pub(super) fn name_of(&self, id: &AstNode) -> Result<String> {
        Ok(self.locator.name(id.value_str()?))
    }

    /// Position of the first positioned terminal under `node`
    pub(super) fn position_of(&self, node: &AstNode) -> Span {
        let first = node.find(&|n| {
            matches!(n.kind, NodeKind::Value | NodeKind::OutputContent | NodeKind::Id) && n.value.is_some()
        });
        match first {
            Some(n) if n.kind == NodeKind::Id => {
                let name = self.locator.name(n.value.as_deref().unwrap_or_default());
                self.locator.identifier(&name)
            }
            Some(n) => self.locator.literal(n.value.as_deref().unwrap_or_default()),
            None => Span::unknown(),
        }
    }

    // ==================== Visitor ====================

    pub(super) fn visit(&mut self, node: &AstNode) -> Result<()> {
        if node.empty {
            return Ok(());
        }
        match node.kind {
            NodeKind::Program => self.visit_program(node),
            NodeKind::Normal => self.visit_normal(node),
            NodeKind::Structure => self.visit_structure(node),
            NodeKind::Constant => self.visit_constant(node),
            NodeKind::AirFunc => self.visit_air_func(node),
            NodeKind::ReturnStat => self.visit_return_stat(node),
            NodeKind::IdentifierStat => self.visit_identifier_stat(node),
            NodeKind::InputOutput => self.visit_input_output(node),
            NodeKind::IfStat | NodeKind::IfTail => self.visit_if(node),
            NodeKind::SwitchStat => self.visit_switch(node),
            NodeKind::WhileLoop | NodeKind::ForLoop | NodeKind::DoWhileLoop => self.visit_loop(node),
            NodeKind::CtrlFlow => self.visit_ctrl_flow(node),
            NodeKind::Expr | NodeKind::CondStat => self.expr_type(node).map(drop),
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: &AstNode) -> Result<()> {
        for child in node.nodes() {
            self.visit(child)?;
        }
        Ok(())
    }

    // program → global_dec sub_functions atmosphere ( ) { body }
    fn visit_program(&mut self, node: &AstNode) -> Result<()> {
        self.visit(node.node_at(0)?)?;
        self.visit(node.node_at(1)?)?;

        self.symbols.enter_scope("atmosphere");
        self.in_atmosphere = true;
        let result = self.visit(node.node_at(2)?);
        self.in_atmosphere = false;
        self.symbols.exit_scope();
        result
    }

    // ==================== Declarations ====================

    fn visit_normal(&mut self, node: &AstNode) -> Result<()> {
        let ty = Type::from_name(node.node_at(0)?.value_str()?);
        self.declare_variable(node.node_at(1)?, node.node_at(2)?, &ty)?;

        let mut tail = node.node_at(3)?;
        while !tail.empty {
            self.declare_variable(tail.node_at(0)?, tail.node_at(1)?, &ty)?;
            tail = tail.node_at(2)?;
        }
        Ok(())
    }

    /// `id norm_dec`: the initializer is checked before the name is visible
    fn declare_variable(&mut self, id: &AstNode, norm_dec: &AstNode, ty: &Type) -> Result<()> {
        let name = self.name_of(id)?;
        let mut dims = Vec::new();

        if !norm_dec.empty {
            let first = norm_dec.node_at(0)?;
            if first.kind == NodeKind::RowSize {
                dims = self.array_dims(&name, first)?;
                let array = norm_dec.node_at(1)?;
                if !array.empty {
                    self.check_elements(&name, ty, array.node_at(1)?)?;
                }
            } else if let Some(source) = self.expr_type(norm_dec.node_at(1)?)? {
                if !ty.accepts(&source) {
                    self.error(
                        format!("Type mismatch: cannot assign '{}' to '{}' variable '{}'", source, ty, name),
                        self.locator.identifier(&name),
                    );
                }
            }
        }

        let symbol = Symbol::variable(name.as_str(), ty.clone()).with_dims(dims);
        if self.symbols.define(symbol).is_err() {
            self.error(
                format!("Variable '{}' is already declared in this scope", name),
                self.locator.identifier(&name),
            );
        }
        Ok(())
    }

    /// `row_size → [ size ] col_size`, checking that sizes are integers
    fn array_dims(&mut self, name: &str, row_size: &AstNode) -> Result<Vec<Dim>> {
        let mut dims = Vec::new();

        let size = row_size.node_at(0)?;
        if size.empty {
            dims.push(Dim::Unsized);
        } else {
            if let Some(ty) = self.expr_type(size.node_at(0)?)? {
                if ty != Type::Int {
                    self.error(
                        format!("Array size for '{}' must be an integer, got '{}'", name, ty),
                        self.position_of(size),
                    );
                }
            }
            dims.push(Dim::Sized);
        }

        let col_size = row_size.node_at(1)?;
        if !col_size.empty {
            let pdim = col_size.node_at(0)?;
            if let Some(ty) = self.expr_type(pdim.node_at(0)?)? {
                if ty != Type::Int {
                    self.error(
                        format!("Array column size for '{}' must be an integer, got '{}'", name, ty),
                        self.position_of(pdim),
                    );
                }
            }
            dims.push(Dim::Sized);
        }
        Ok(dims)
    }

    // constant → data_type id const_dec | struct_const
    fn visit_constant(&mut self, node: &AstNode) -> Result<()> {
        let first = node.node_at(0)?;
        if first.kind == NodeKind::StructConst {
            return self.visit_struct_const(first);
        }
        let ty = Type::from_name(first.value_str()?);
        let mut id = node.node_at(1)?;
        let mut const_dec = node.node_at(2)?;
        loop {
            self.declare_constant(id, const_dec, &ty)?;
            let tail = const_dec.children.last().and_then(|child| match child {
                Child::Node(n) if n.kind == NodeKind::ConstTail && !n.empty => Some(n),
                _ => None,
            });
            match tail {
                Some(tail) => {
                    id = tail.node_at(0)?;
                    const_dec = tail.node_at(1)?;
                }
                None => return Ok(()),
            }
        }
    }

    /// `id const_dec`, either `= expr` or `row_size = { const_arr }`
    fn declare_constant(&mut self, id: &AstNode, const_dec: &AstNode, ty: &Type) -> Result<()> {
        let name = self.name_of(id)?;
        let at = self.locator.identifier(&name);

        if const_dec.empty || const_dec.children.is_empty() {
            self.error(format!("Constant '{}' must be initialized at declaration", name), at);
            return Ok(());
        }

        let first = const_dec.node_at(0)?;
        let dims = if first.kind == NodeKind::RowSize {
            self.array_dims(&name, first)?
        } else {
            Vec::new()
        };

        let symbol = Symbol::constant(name.as_str(), ty.clone()).with_dims(dims.clone());
        if self.symbols.define(symbol).is_err() {
            self.error(format!("Constant '{}' is already declared in this scope", name), at);
        }

        if dims.is_empty() {
            let expr = const_dec.node_at(1)?;
            if !is_standalone_literal(expr) {
                self.error(
                    format!(
                        "Constant '{}' must be initialized with a standalone literal, not an expression",
                        name
                    ),
                    at,
                );
                return Ok(());
            }
            if let Some(source) = self.expr_type(expr)? {
                if !ty.accepts(&source) {
                    self.error(
                        format!(
                            "Type mismatch: cannot initialize constant '{}' of type '{}' with '{}'",
                            name, ty, source
                        ),
                        at,
                    );
                }
            }
        } else {
            self.check_elements(&name, ty, const_dec.node_at(2)?)?;
        }
        Ok(())
    }

    // struct_const → gust id id = { const_1d }
    fn visit_struct_const(&mut self, node: &AstNode) -> Result<()> {
        let struct_type = self.name_of(node.node_at(0)?)?;
        let name = self.name_of(node.node_at(1)?)?;
        let values = collect(node.node_at(3)?, NodeKind::Output);

        match self.structs.members(&struct_type).map(|members| members.to_vec()) {
            None => {
                self.error(
                    format!("Undefined structure type '{}'", struct_type),
                    self.locator.identifier(&struct_type),
                );
            }
            Some(members) if members.len() != values.len() => {
                self.error(
                    format!(
                        "Constant structure '{}' must be fully initialized: expects {} value(s), got {}",
                        name,
                        members.len(),
                        values.len()
                    ),
                    self.locator.identifier(&name),
                );
            }
            Some(members) => self.check_struct_values(&name, &members, &values)?,
        }

        let symbol = Symbol::instance(name.as_str(), &struct_type, true);
        let defined = if self.symbols.is_global() {
            self.symbols.define_global(symbol)
        } else {
            self.symbols.define(symbol)
        };
        if defined.is_err() {
            self.error(
                format!("Constant '{}' is already declared in this scope", name),
                self.locator.identifier(&name),
            );
        }
        Ok(())
    }

    // ==================== Structures ====================

    // structure → gust id struct_tail
    fn visit_structure(&mut self, node: &AstNode) -> Result<()> {
        let struct_name = self.name_of(node.node_at(0)?)?;
        let tail = node.node_at(1)?;
        if tail.node_at(0)?.kind == NodeKind::DataType {
            self.define_structure(&struct_name, tail)
        } else {
            self.declare_instance(&struct_name, tail)
        }
    }

    /// `{ data_type id ~ gust_tail }`
    fn define_structure(&mut self, struct_name: &str, tail: &AstNode) -> Result<()> {
        let at = self.locator.identifier(struct_name);
        let mut members: Vec<(String, Type)> = Vec::new();
        let mut seen = HashSet::new();

        let mut member = tail;
        while !member.empty {
            let ty = Type::from_name(member.node_at(0)?.value_str()?);
            let field = self.name_of(member.node_at(1)?)?;
            if seen.insert(field.clone()) {
                members.push((field, ty));
            } else {
                self.error(
                    format!("Duplicate member '{}' in structure '{}'", field, struct_name),
                    self.locator.identifier(&field),
                );
            }
            member = member.node_at(2)?;
        }

        if members.is_empty() {
            self.error(format!("Structure '{}' must have at least one member", struct_name), at);
            return Ok(());
        }
        if self.structs.define(struct_name, members.clone()).is_err() {
            self.error(format!("Structure '{}' is already defined", struct_name), at);
            return Ok(());
        }
        let symbol = Symbol::new(
            struct_name,
            SymbolKind::Structure(members),
            Type::Struct(struct_name.to_string()),
        );
        // A variable of the same name may already own the global slot
        let _ = self.symbols.define_global(symbol);
        Ok(())
    }

    /// `id struct_tail2`
    fn declare_instance(&mut self, struct_name: &str, tail: &AstNode) -> Result<()> {
        let name = self.name_of(tail.node_at(0)?)?;
        let members = self.structs.members(struct_name).map(|members| members.to_vec());
        if members.is_none() {
            self.error(
                format!("Undefined structure type '{}'", struct_name),
                self.locator.identifier(struct_name),
            );
        }

        let symbol = Symbol::instance(name.as_str(), struct_name, false);
        if self.symbols.define(symbol).is_err() {
            self.error(
                format!("Variable '{}' is already declared in this scope", name),
                self.locator.identifier(&name),
            );
        }

        let init = tail.node_at(1)?;
        if init.empty {
            return Ok(());
        }
        let values = collect(init.node_at(1)?, NodeKind::Output);
        match members {
            Some(members) if members.len() != values.len() => {
                self.error(
                    format!(
                        "Structure '{}' initialization expects {} value(s), got {}",
                        name,
                        members.len(),
                        values.len()
                    ),
                    self.locator.identifier(&name),
                );
            }
            Some(members) => self.check_struct_values(&name, &members, &values)?,
            None => {}
        }
        Ok(())
    }

    /// Positional member initialization, permissive table
    fn check_struct_values(
        &mut self,
        name: &str,
        members: &[(String, Type)],
        values: &[&AstNode],
    ) -> Result<()> {
        for ((member, expected), value) in members.iter().zip(values) {
            if let Some(actual) = self.expr_type(value)? {
                if !expected.accepts(&actual) {
                    self.error(
                        format!(
                            "Type mismatch in structure '{}' initialization: member '{}' expects '{}', got '{}'",
                            name, member, expected, actual
                        ),
                        self.position_of(value),
                    );
                }
            }
        }
        Ok(())
    }

    // ==================== Functions ====================

    // air_func → air return_type id ( params ) { body return_stat }
    fn visit_air_func(&mut self, node: &AstNode) -> Result<()> {
        let return_type = node.node_at(0)?;
        let ret = match &return_type.value {
            Some(vacuum) => Type::from_name(vacuum),
            None => Type::from_name(return_type.node_at(0)?.value_str()?),
        };
        let name = self.name_of(node.node_at(1)?)?;
        let params = self.collect_params(node.node_at(2)?)?;

        let signature = Signature { params: params.clone(), ret: ret.clone() };
        let symbol = Symbol::new(name.as_str(), SymbolKind::Function(signature), ret.clone());
        if self.symbols.define_global(symbol).is_err() {
            self.error(format!("Function '{}' is already declared", name), self.locator.identifier(&name));
        }

        let outer = self.function.replace(FunctionContext {
            name: name.clone(),
            ret: ret.clone(),
            returns: false,
        });
        self.symbols.enter_scope(&name);
        for param in params {
            let param_name = param.name.clone();
            let symbol = Symbol::variable(param.name, param.ty).with_dims(param.dims);
            if self.symbols.define(symbol).is_err() {
                self.error(
                    format!("Variable '{}' is already declared in this scope", param_name),
                    self.locator.identifier(&param_name),
                );
            }
        }

        let result = self
            .visit(node.node_at(3)?)
            .and_then(|_| self.visit(node.node_at(4)?));

        let returns = self.function.as_ref().map_or(false, |ctx| ctx.returns);
        if result.is_ok() && ret != Type::Vacuum && !returns {
            self.error(
                format!(
                    "Function '{}' with return type '{}' must return a value using 'gasp'",
                    name, ret
                ),
                self.locator.identifier(&name),
            );
        }
        self.symbols.exit_scope();
        self.function = outer;
        result
    }

    /// `params` / `params_tail` chain in declaration order
    fn collect_params(&self, params: &AstNode) -> Result<Vec<Param>> {
        let mut collected = Vec::new();
        let mut node = params;
        while !node.empty {
            let ty = Type::from_name(node.node_at(0)?.value_str()?);
            let name = self.name_of(node.node_at(1)?)?;
            let params_dim = node.node_at(2)?;
            let dims = if params_dim.empty {
                Vec::new()
            } else if params_dim.node_at(0)?.value.is_some() {
                vec![Dim::Unsized]
            } else {
                vec![Dim::Sized, Dim::Sized]
            };
            collected.push(Param { name, ty, is_array: !dims.is_empty(), dims });
            node = node.node_at(3)?;
        }
        Ok(collected)
    }

    // return_stat → gasp expr ~
    fn visit_return_stat(&mut self, node: &AstNode) -> Result<()> {
        let at = self.locator.keyword("gasp");
        if self.in_atmosphere {
            self.error("The 'atmosphere' function must not return any value", at);
            return Ok(());
        }
        let actual = self.expr_type(node.node_at(0)?)?;
        let Some(function) = self.function.as_mut() else {
            return Ok(());
        };
        function.returns = true;
        let function = function.clone();

        if function.ret == Type::Vacuum {
            self.error(
                format!("Function '{}' has return type 'vacuum' but returns a value", function.name),
                at,
            );
        } else if let Some(actual) = actual {
            if !function.ret.accepts(&actual) {
                self.error(
                    format!(
                        "Return type mismatch in function '{}': expected '{}', got '{}'",
                        function.name, function.ret, actual
                    ),
                    at,
                );
            }
        }
        Ok(())
    }

    // ==================== Statements ====================

    // identifier_stat → unary_op id id_access | id id_stat_body
    fn visit_identifier_stat(&mut self, node: &AstNode) -> Result<()> {
        let first = node.node_at(0)?;
        if first.kind == NodeKind::UnaryOp {
            let name = self.name_of(node.node_at(1)?)?;
            let Some(symbol) = self.lookup_reported(&name) else {
                return Ok(());
            };
            let ty = self.access_type(&symbol, node.node_at(2)?)?;
            self.check_unary(&symbol, ty.as_ref());
            return Ok(());
        }

        let name = self.name_of(first)?;
        let body = node.node_at(1)?;
        let head = body.node_at(0)?;
        if head.kind == NodeKind::ParamOpts {
            self.call_function(&name, head)?;
            return Ok(());
        }

        let Some(symbol) = self.lookup_reported(&name) else {
            return Ok(());
        };
        let target = self.access_type(&symbol, head)?;
        let tail = body.node_at(1)?;
        let action = tail.node_at(0)?;
        if action.kind == NodeKind::UnaryOp {
            self.check_unary(&symbol, target.as_ref());
        } else if head.leaf_at(0) == Some(".") {
            let member = self.name_of(head.node_at(1)?)?;
            self.check_member_assignment(&symbol, &member, target.as_ref(), action)?;
        } else {
            self.check_assignment(&symbol, target.as_ref(), action)?;
        }
        Ok(())
    }

    /// Look up `name`, reporting it when undeclared
    pub(super) fn lookup_reported(&mut self, name: &str) -> Option<Symbol> {
        let symbol = self.symbols.lookup(name).cloned();
        if symbol.is_none() {
            self.error(format!("Undeclared identifier '{}'", name), self.locator.identifier(name));
        }
        symbol
    }

    /// `++` / `--` target
    pub(super) fn check_unary(&mut self, symbol: &Symbol, target: Option<&Type>) {
        let at = self.locator.identifier(&symbol.name);
        if let Some(ty) = target {
            if !ty.is_unary() {
                self.error(
                    format!(
                        "Cannot apply increment/decrement to '{}' of type '{}' (only 'int' and 'char' allowed)",
                        symbol.name, ty
                    ),
                    at,
                );
                return;
            }
        }
        if symbol.constant {
            self.error(format!("Cannot modify constant '{}'", symbol.name), at);
        }
    }

    /// `assignment → assi_op expr` to a variable or array element
    fn check_assignment(&mut self, symbol: &Symbol, target: Option<&Type>, assignment: &AstNode) -> Result<()> {
        let at = self.locator.identifier(&symbol.name);
        let op = operator_of(assignment.node_at(0)?).unwrap_or("=").to_string();
        let source = self.expr_type(assignment.node_at(1)?)?;

        if symbol.constant {
            self.error(format!("Cannot assign to constant '{}'", symbol.name), at);
            return Ok(());
        }
        let Some(target) = target else {
            return Ok(());
        };
        if op != "=" {
            if !target.is_arithmetic() {
                self.error(
                    format!(
                        "Compound assignment '{}' cannot be applied to '{}' of type '{}'",
                        op, symbol.name, target
                    ),
                    at,
                );
                return Ok(());
            }
            if op == "%=" && *target != Type::Int {
                self.error(
                    format!(
                        "Modulus assignment '%=' requires integer type, '{}' is '{}'",
                        symbol.name, target
                    ),
                    at,
                );
                return Ok(());
            }
        }
        if let Some(source) = source {
            if !target.accepts(&source) {
                self.error(
                    format!(
                        "Type mismatch: cannot assign '{}' to '{}' variable '{}'",
                        source, target, symbol.name
                    ),
                    at,
                );
            }
        }
        Ok(())
    }

    /// `v.m = expr`; the member itself was validated by `access_type`
    fn check_member_assignment(
        &mut self,
        symbol: &Symbol,
        member: &str,
        target: Option<&Type>,
        assignment: &AstNode,
    ) -> Result<()> {
        let source = self.expr_type(assignment.node_at(1)?)?;
        let Some(target) = target else {
            return Ok(());
        };
        if symbol.constant {
            self.error(
                "Content of constant gust cannot be modified",
                self.locator.identifier(&symbol.name),
            );
            return Ok(());
        }
        if let Some(source) = source {
            if !target.accepts(&source) {
                self.error(
                    format!(
                        "Type mismatch: cannot assign '{}' to member '{}' of type '{}'",
                        source, member, target
                    ),
                    self.locator.identifier(member),
                );
            }
        }
        Ok(())
    }

    // input_output → inhale ( id id_access ) | exhale ( output )
    fn visit_input_output(&mut self, node: &AstNode) -> Result<()> {
        if node.leaf_at(0) == Some("inhale") {
            let name = self.name_of(node.node_at(1)?)?;
            let at = self.locator.identifier(&name);
            match self.symbols.lookup(&name).cloned() {
                None => self.error(format!("Undeclared identifier '{}' in inhale statement", name), at),
                Some(symbol) => {
                    self.access_type(&symbol, node.node_at(2)?)?;
                    if symbol.constant {
                        self.error(format!("Cannot read into constant '{}'", name), at);
                    }
                }
            }
            return Ok(());
        }

        let output = node.node_at(1)?;
        self.check_exhale_output(output);
        if let Some(Type::Struct(_)) = self.expr_type(output)? {
            let at = match self.position_of(output) {
                span if span.is_unknown() => self.locator.keyword("exhale"),
                span => span,
            };
            self.error("Must access member; whole gusts cannot be displayed", at);
        }
        Ok(())
    }

    // ==================== Control Flow ====================

    // if_stat → if ( cond_stat ) { stmt_ctrl } if_tail
    // if_tail → elseif ( cond_stat ) { stmt_ctrl } if_tail | else { stmt_ctrl }
    fn visit_if(&mut self, node: &AstNode) -> Result<()> {
        let first = node.node_at(0)?;
        if first.kind != NodeKind::CondStat {
            return self.visit_children(node);
        }
        let keyword = if node.kind == NodeKind::IfStat { "if" } else { "elseif" };
        if let Some(ty) = self.expr_type(first)? {
            if !ty.is_condition() {
                let at = match self.position_of(first) {
                    span if span.is_unknown() => self.locator.keyword(keyword),
                    span => span,
                };
                self.error(
                    format!(
                        "Condition in '{}' must evaluate to a boolean-compatible type, got '{}'",
                        keyword, ty
                    ),
                    at,
                );
            }
        }
        self.visit(node.node_at(1)?)?;
        self.visit(node.node_at(2)?)
    }

    // switch_stat → stream ( id id_access ) { switch_cases switch_def }
    fn visit_switch(&mut self, node: &AstNode) -> Result<()> {
        let name = self.name_of(node.node_at(0)?)?;
        let at = self.locator.identifier(&name);
        match self.symbols.lookup(&name).cloned() {
            None => self.error(format!("Undeclared identifier '{}' in stream statement", name), at),
            Some(symbol) => {
                if let Some(ty) = self.access_type(&symbol, node.node_at(1)?)? {
                    if !matches!(ty, Type::Int | Type::Char) {
                        self.error(
                            format!(
                                "Stream (switch) variable '{}' must be 'int' or 'char' type, got '{}'",
                                name, ty
                            ),
                            at,
                        );
                    }
                }
            }
        }

        let outer = self.in_switch;
        self.in_switch = true;
        let result = self.visit_switch_cases(node.node_at(2)?, &mut HashSet::new())
            .and_then(|_| self.visit(node.node_at(3)?));
        self.in_switch = outer;
        result
    }

    fn visit_switch_cases(&mut self, cases: &AstNode, labels: &mut HashSet<String>) -> Result<()> {
        let mut case = cases;
        while !case.empty {
            let label = case.node_at(0)?.value_str()?;
            if !labels.insert(label.to_string()) {
                self.error(
                    format!("Duplicate case label '{}' in stream statement", label),
                    self.locator.literal(label),
                );
            }
            self.visit(case.node_at(1)?)?;
            case = case.node_at(2)?;
        }
        Ok(())
    }

    fn visit_loop(&mut self, node: &AstNode) -> Result<()> {
        let outer = self.in_loop;
        let result = match node.kind {
            NodeKind::ForLoop => {
                self.visit(node.node_at(0)?)?;
                self.visit(node.node_at(1)?)?;
                self.visit(node.node_at(2)?)?;
                self.in_loop = true;
                self.visit(node.node_at(3)?)
            }
            NodeKind::DoWhileLoop => {
                self.in_loop = true;
                let body = self.visit(node.node_at(0)?);
                self.in_loop = outer;
                body.and_then(|_| self.visit(node.node_at(1)?))
            }
            _ => {
                self.visit(node.node_at(0)?)?;
                self.in_loop = true;
                self.visit(node.node_at(1)?)
            }
        };
        self.in_loop = outer;
        result
    }

    fn visit_ctrl_flow(&mut self, node: &AstNode) -> Result<()> {
        match node.value_str()? {
            "resist" if !self.in_loop && !self.in_switch => self.error(
                "'resist' (break) must be inside a loop or stream (switch)",
                self.locator.keyword("resist"),
            ),
            "flow" if !self.in_loop => self.error(
                "'flow' (continue) must be inside a loop",
                self.locator.keyword("flow"),
            ),
            _ => {}
        }
        Ok(())
    }
}

// ==================== Tree Helpers ====================

/// Nodes of `kind` under `node` in pre-order, without descending into a match
pub(super) fn collect(node: &AstNode, kind: NodeKind) -> Vec<&AstNode> {
    let mut found = Vec::new();
    collect_into(node, kind, &mut found);
    found
}

fn collect_into<'a>(node: &'a AstNode, kind: NodeKind, found: &mut Vec<&'a AstNode>) {
    if node.kind == kind && !node.empty {
        found.push(node);
        return;
    }
    for child in node.nodes() {
        collect_into(child, kind, found);
    }
}

/// A literal, optionally parenthesized, with every operator tail empty
fn is_standalone_literal(node: &AstNode) -> bool {
    let mut node = node;
    loop {
        let next = match node.kind {
            NodeKind::Expr | NodeKind::Factor => node.node_at(0).ok(),
            NodeKind::LogicExpr
            | NodeKind::AndExpr
            | NodeKind::RelaExpr
            | NodeKind::ArithExpr
            | NodeKind::Term => match node.node_at(1) {
                Ok(tail) if tail.empty => node.node_at(0).ok(),
                _ => None,
            },
            NodeKind::Primary if node.leaf_at(0).is_none() => node.node_at(0).ok(),
            NodeKind::Output => {
                return match node.node_at(0) {
                    Ok(value) if value.kind == NodeKind::Value => true,
                    Ok(content) if content.kind == NodeKind::OutputContent => {
                        node.node_at(1).map_or(false, |tail| tail.empty)
                    }
                    _ => false,
                }
            }
            _ => None,
        };
        match next {
            Some(child) => node = child,
            None => return false,
        }
    }
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
    fn test_symbol_table_scopes() {
        let mut table = SymbolTable::new();
        table.define(Symbol::variable("x", Type::Int)).unwrap();
        table.enter_scope("f");
        table.define(Symbol::variable("x", Type::Float)).unwrap();
        assert_eq!(table.lookup("x").map(|s| s.ty.clone()), Some(Type::Float));
        assert_eq!(table.lookup_local("x").map(|s| s.scope.as_str()), Some("f"));
        assert!(table.define(Symbol::variable("x", Type::Char)).is_err());
        table.exit_scope();
        assert_eq!(table.lookup("x").map(|s| s.ty.clone()), Some(Type::Int));
        table.exit_scope();
        assert!(table.is_global());
    }

    #[test]
    fn test_define_global_from_inner_frame() {
        let mut table = SymbolTable::new();
        table.enter_scope("atmosphere");
        table.define_global(Symbol::variable("g", Type::Bool)).unwrap();
        table.exit_scope();
        assert_eq!(table.lookup_local("g").map(|s| s.scope.as_str()), Some("global"));
    }

    #[test]
    fn test_struct_registry() {
        let mut registry = StructRegistry::default();
        registry
            .define("P", vec![("x".to_string(), Type::Int), ("y".to_string(), Type::Float)])
            .unwrap();
        assert!(registry.define("P", Vec::new()).is_err());
        assert_eq!(registry.member_type("P", "y"), Some(&Type::Float));
        assert_eq!(registry.member_type("P", "z"), None);
    }

    #[test]
    fn test_clean_program() {
        assert!(check("universal int x~ atmosphere() { x = 5~ }").is_empty());
    }

    #[test]
    fn test_no_ast() {
        let errors = SemanticAnalyzer::new(&[]).analyze(None);
        assert_eq!(errors[0].message, "No AST to analyze");
        assert_eq!(errors[0].span(), Span::unknown());
    }

    #[test]
    fn test_redeclaration() {
        let errors = check("atmosphere() { int x~ int x~ }");
        assert_eq!(errors, vec!["Variable 'x' is already declared in this scope"]);
    }

    #[test]
    fn test_shadowing_across_frames_is_allowed() {
        assert!(check("universal int x~ atmosphere() { float x = 1.5~ }").is_empty());
    }

    #[test]
    fn test_undeclared_identifier() {
        let errors = check("atmosphere() { y = 1~ }");
        assert_eq!(errors, vec!["Undeclared identifier 'y'"]);
    }

    #[test]
    fn test_type_mismatch_on_declaration() {
        let errors = check("atmosphere() { int x = \"hi\"~ }");
        assert_eq!(errors, vec!["Type mismatch: cannot assign 'string' to 'int' variable 'x'"]);
    }

    #[test]
    fn test_error_position_is_identifier() {
        let tokens = Lexer::new("atmosphere() {\n  int x = \"hi\"~\n}").tokenize();
        let (ast, _) = Parser::new(&tokens).parse();
        let errors = SemanticAnalyzer::new(&tokens).analyze(ast.as_ref());
        assert_eq!(errors[0].span(), Span::new(2, 7));
    }

    #[test]
    fn test_constants() {
        let errors = check("atmosphere() { wind int c = 1 + 2~ wind int d = 3~ d = 4~ }");
        assert_eq!(
            errors,
            vec![
                "Constant 'c' must be initialized with a standalone literal, not an expression",
                "Cannot assign to constant 'd'",
            ]
        );
    }

    #[test]
    fn test_constant_type_mismatch() {
        let errors = check("atmosphere() { wind int c = \"s\"~ }");
        assert_eq!(errors, vec!["Type mismatch: cannot initialize constant 'c' of type 'int' with 'string'"]);
    }

    #[test]
    fn test_structures() {
        let source = "universal gust P { int x~ float y~ }~ \
                      atmosphere() { gust P p = {1, 2.5}~ p.x = 3~ p.z = 1~ gust Q q~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "'z' is not a member of structure 'p'",
                "Undefined structure type 'Q'",
            ]
        );
    }

    #[test]
    fn test_structure_initialization() {
        let source = "universal gust P { int x~ string s~ }~ \
                      atmosphere() { gust P a = {1}~ gust P b = {1, 2.5}~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Structure 'a' initialization expects 2 value(s), got 1",
                "Type mismatch in structure 'b' initialization: member 's' expects 'string', got 'float'",
            ]
        );
    }

    #[test]
    fn test_constant_structure() {
        let source = "universal gust P { int x~ int y~ }~ \
                      atmosphere() { wind gust P o = {1}~ wind gust P k = {1, 2}~ k.x = 5~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Constant structure 'o' must be fully initialized: expects 2 value(s), got 1",
                "Content of constant gust cannot be modified",
            ]
        );
    }

    #[test]
    fn test_duplicate_structure_and_member() {
        let errors = check("universal gust P { int x~ int x~ }~ universal gust P { int y~ }~ atmosphere() { }");
        assert_eq!(
            errors,
            vec![
                "Duplicate member 'x' in structure 'P'",
                "Structure 'P' is already defined",
            ]
        );
    }

    #[test]
    fn test_function_return_checks() {
        let source = "air int f() { gasp \"s\"~ } \
                      air vacuum g() { gasp 1~ } \
                      air float h() { int a~ } \
                      atmosphere() { }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Return type mismatch in function 'f': expected 'int', got 'string'",
                "Function 'g' has return type 'vacuum' but returns a value",
                "Function 'h' with return type 'float' must return a value using 'gasp'",
            ]
        );
    }

    #[test]
    fn test_function_calls() {
        let source = "air int add(int a, int b) { gasp a + b~ } \
                      atmosphere() { int r = 0~ add(1)~ add(1, \"x\")~ nope(1)~ r(1)~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Function 'add' expects 2 argument(s), got 1",
                "Argument 2 of function 'add': expected 'int', got 'string'",
                "Undeclared function 'nope'",
                "'r' is not a function",
            ]
        );
    }

    #[test]
    fn test_parameters_are_scoped_to_the_body() {
        let errors = check("air vacuum f(int a) { a++~ } atmosphere() { a = 1~ }");
        assert_eq!(errors, vec!["Undeclared identifier 'a'"]);
    }

    #[test]
    fn test_unary_and_compound_assignment() {
        let source = "atmosphere() { string s~ float f~ s++~ s += \"a\"~ f %= 2~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Cannot apply increment/decrement to 's' of type 'string' (only 'int' and 'char' allowed)",
                "Compound assignment '+=' cannot be applied to 's' of type 'string'",
                "Modulus assignment '%=' requires integer type, 'f' is 'float'",
            ]
        );
    }

    #[test]
    fn test_inhale() {
        let errors = check("atmosphere() { wind int c = 1~ inhale(c)~ inhale(z)~ }");
        assert_eq!(
            errors,
            vec![
                "Cannot read into constant 'c'",
                "Undeclared identifier 'z' in inhale statement",
            ]
        );
    }

    #[test]
    fn test_control_flow_context() {
        let source = "atmosphere() { int i = 0~ if (yuh) { resist~ } \
                      cycle (i < 3) { if (yuh) { flow~ } resist~ } }";
        let errors = check(source);
        assert_eq!(errors, vec!["'resist' (break) must be inside a loop or stream (switch)"]);
    }

    #[test]
    fn test_condition_type() {
        let errors = check("atmosphere() { if (\"s\") { } elseif (1) { } }");
        assert_eq!(
            errors,
            vec!["Condition in 'if' must evaluate to a boolean-compatible type, got 'string'"]
        );
    }

    #[test]
    fn test_stream_checks() {
        let source = "atmosphere() { float f~ int k~ \
                      stream (f) { case 1: resist~ } \
                      stream (k) { case 1: resist~ case 1: resist~ diffuse: resist~ } }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Stream (switch) variable 'f' must be 'int' or 'char' type, got 'float'",
                "Duplicate case label '1' in stream statement",
            ]
        );
    }

    #[test]
    fn test_for_loop_initializer_lives_in_enclosing_frame() {
        let errors = check("atmosphere() { echo (int i = 0~ i < 3~ i++~ ) { flow~ } int i~ }");
        assert_eq!(errors, vec!["Variable 'i' is already declared in this scope"]);
    }

    #[test]
    fn test_array_declarations() {
        let source = "atmosphere() { int a[3] = {1, 2, 3}~ float b[1.5]~ string s[2] = {\"x\", 1}~ }";
        let errors = check(source);
        assert_eq!(
            errors,
            vec![
                "Array size for 'b' must be an integer, got 'float'",
                "Array element type mismatch in 's': expected 'string', got 'int'",
            ]
        );
    }
}
