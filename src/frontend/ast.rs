//! Abstract Syntax Tree definitions for OxC Lang
//!
//! The tree mirrors the grammar: one node per nonterminal, children in
//! right-hand-side order. Lambda productions yield an explicit empty node.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::utils::{Error, Result};

/// A syntax tree node
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: NodeKind,
    /// The zero-width `<kind>_empty` variant
    pub empty: bool,
    pub value: Option<String>,
    pub children: Vec<Child>,
}

/// A child slot: a nested node or a bare terminal
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(AstNode),
    Leaf(String),
}

impl From<AstNode> for Child {
    fn from(node: AstNode) -> Self {
        Child::Node(node)
    }
}

impl AstNode {
    pub fn new(kind: NodeKind, children: Vec<Child>) -> Self {
        Self { kind, empty: false, value: None, children }
    }

    /// The lambda variant of `kind`
    pub fn empty(kind: NodeKind) -> Self {
        Self { kind, empty: true, value: None, children: Vec::new() }
    }

    /// A childless node carrying a value
    pub fn valued(kind: NodeKind, value: impl Into<String>) -> Self {
        Self { kind, empty: false, value: Some(value.into()), children: Vec::new() }
    }

    /// Identifier terminal, valued with its synthetic tag
    pub fn id(tag: impl Into<String>) -> Self {
        Self::valued(NodeKind::Id, tag)
    }

    pub fn operator(op: impl Into<String>) -> Self {
        Self::valued(NodeKind::Operator, op)
    }

    /// Placeholder returned by a soft parse failure
    pub fn missing() -> Self {
        Self::new(NodeKind::Missing, Vec::new())
    }

    pub fn is_missing(&self) -> bool {
        self.kind == NodeKind::Missing
    }

    /// External name, `<kind>_empty` for lambda nodes
    pub fn name(&self) -> String {
        if self.empty {
            format!("{}_empty", self.kind.name())
        } else {
            self.kind.name().to_string()
        }
    }

    /// Nested nodes, skipping leaves
    pub fn nodes(&self) -> impl Iterator<Item = &AstNode> {
        self.children.iter().filter_map(|child| match child {
            Child::Node(node) => Some(node),
            Child::Leaf(_) => None,
        })
    }

    /// The child at `index`, which must be a node
    pub fn node_at(&self, index: usize) -> Result<&AstNode> {
        match self.children.get(index) {
            Some(Child::Node(node)) => Ok(node),
            Some(Child::Leaf(leaf)) => Err(self.malformed(format!("child {} is leaf '{}'", index, leaf))),
            None => Err(self.malformed(format!("missing child {}", index))),
        }
    }

    /// The child at `index` if it is a leaf
    pub fn leaf_at(&self, index: usize) -> Option<&str> {
        match self.children.get(index) {
            Some(Child::Leaf(leaf)) => Some(leaf),
            _ => None,
        }
    }

    /// The node's value, required
    pub fn value_str(&self) -> Result<&str> {
        self.value
            .as_deref()
            .ok_or_else(|| self.malformed("missing value".to_string()))
    }

    /// First node in pre-order matching `predicate`
    pub fn find(&self, predicate: &dyn Fn(&AstNode) -> bool) -> Option<&AstNode> {
        if predicate(self) {
            return Some(self);
        }
        self.nodes().find_map(|node| node.find(predicate))
    }

    /// Whether any node in the subtree has `kind` (non-empty)
    pub fn contains(&self, kind: NodeKind) -> bool {
        self.find(&|node| node.kind == kind && !node.empty).is_some()
    }

    pub fn malformed(&self, detail: String) -> Error {
        Error::MalformedTree { kind: self.name(), detail }
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let indent = "  ".repeat(level);
        write!(f, "{}{}", indent, self.name())?;
        if let Some(value) = &self.value {
            write!(f, " = {}", value)?;
        }
        writeln!(f)?;
        for child in &self.children {
            match child {
                Child::Node(node) => node.write_tree(f, level + 1)?,
                Child::Leaf(leaf) => writeln!(f, "{}  {}", indent, leaf)?,
            }
        }
        Ok(())
    }
}

/// Indented tree rendering
impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

impl Serialize for AstNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", &self.name())?;
        if let Some(value) = &self.value {
            map.serialize_entry("value", value)?;
        }
        if !self.children.is_empty() {
            map.serialize_entry("children", &self.children)?;
        }
        map.end()
    }
}

impl Serialize for Child {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Child::Node(node) => node.serialize(serializer),
            Child::Leaf(leaf) => serializer.serialize_str(leaf),
        }
    }
}

/// Grammar nonterminals, plus terminal and placeholder kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // ==================== Program ====================
    Program,
    GlobalDec,

    // ==================== Declarations ====================
    Declaration,
    Normal,
    NormDec,
    NormTail,
    Array,
    ArrElement,
    OneDElement,
    TwoDElement,
    ElementTail,
    TwoDTail,
    Structure,
    StructTail,
    StructTail2,
    GustTail,
    Constant,
    ConstDec,
    ConstTail,
    ConstArr,
    Const1d,
    Const2d,
    Const2dTail,
    StructConst,
    Dimension,
    RowSize,
    ColSize,
    Size,
    DataType,

    // ==================== Functions ====================
    SubFunctions,
    AirFunc,
    ReturnType,
    Params,
    ParamsDim,
    PdimTail,
    PdimSize,
    ParamsTail,
    Body,
    ReturnStat,

    // ==================== Statements ====================
    StmtList,
    Statement,
    IdentifierStat,
    IdStatBody,
    IdStatTail,
    Identifier,
    IdTail,
    IdAccess,
    UnaryOp,
    UnaryOp2,
    InputOutput,
    Output,
    Value,
    OutputContent,
    OutputTail,
    AssiOp,
    Assignment,
    StmtCtrl,
    CtrlFlow,
    Conditioner,
    IfStat,
    IfTail,
    CondStat,
    SwitchStat,
    SwitchCases,
    SwitchOpts,
    SwitchDef,
    Iteration,
    WhileLoop,
    ForLoop,
    DoWhileLoop,
    ForInit,

    // ==================== Expressions ====================
    Expr,
    LogicExpr,
    OrTail,
    AndExpr,
    AndTail,
    RelaExpr,
    RelaTail,
    RelaSym,
    ArithOp1,
    ArithOp2,
    ArithExpr,
    ArithTail,
    Term,
    TermTail,
    Factor,
    Primary,
    FunctionCall,
    ParamOpts,
    ParamList,
    ParamItem,
    ParamTail,

    // ==================== Terminals ====================
    /// Identifier terminal
    Id,
    /// Operator terminal
    Operator,
    /// Soft parse failure
    Missing,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::GlobalDec => "global_dec",
            NodeKind::Declaration => "declaration",
            NodeKind::Normal => "normal",
            NodeKind::NormDec => "norm_dec",
            NodeKind::NormTail => "norm_tail",
            NodeKind::Array => "array",
            NodeKind::ArrElement => "arr_element",
            NodeKind::OneDElement => "1d_element",
            NodeKind::TwoDElement => "2d_element",
            NodeKind::ElementTail => "element_tail",
            NodeKind::TwoDTail => "2d_tail",
            NodeKind::Structure => "structure",
            NodeKind::StructTail => "struct_tail",
            NodeKind::StructTail2 => "struct_tail2",
            NodeKind::GustTail => "gust_tail",
            NodeKind::Constant => "constant",
            NodeKind::ConstDec => "const_dec",
            NodeKind::ConstTail => "const_tail",
            NodeKind::ConstArr => "const_arr",
            NodeKind::Const1d => "const_1d",
            NodeKind::Const2d => "const_2d",
            NodeKind::Const2dTail => "const_2d_tail",
            NodeKind::StructConst => "struct_const",
            NodeKind::Dimension => "dimension",
            NodeKind::RowSize => "row_size",
            NodeKind::ColSize => "col_size",
            NodeKind::Size => "size",
            NodeKind::DataType => "data_type",
            NodeKind::SubFunctions => "sub_functions",
            NodeKind::AirFunc => "air_func",
            NodeKind::ReturnType => "return_type",
            NodeKind::Params => "params",
            NodeKind::ParamsDim => "params_dim",
            NodeKind::PdimTail => "pdim_tail",
            NodeKind::PdimSize => "pdim_size",
            NodeKind::ParamsTail => "params_tail",
            NodeKind::Body => "body",
            NodeKind::ReturnStat => "return_stat",
            NodeKind::StmtList => "stmt_list",
            NodeKind::Statement => "statement",
            NodeKind::IdentifierStat => "identifier_stat",
            NodeKind::IdStatBody => "id_stat_body",
            NodeKind::IdStatTail => "id_stat_tail",
            NodeKind::Identifier => "identifier",
            NodeKind::IdTail => "id_tail",
            NodeKind::IdAccess => "id_access",
            NodeKind::UnaryOp => "unary_op",
            NodeKind::UnaryOp2 => "unary_op2",
            NodeKind::InputOutput => "input_output",
            NodeKind::Output => "output",
            NodeKind::Value => "value",
            NodeKind::OutputContent => "output_content",
            NodeKind::OutputTail => "output_tail",
            NodeKind::AssiOp => "assi_op",
            NodeKind::Assignment => "assignment",
            NodeKind::StmtCtrl => "stmt_ctrl",
            NodeKind::CtrlFlow => "ctrl_flow",
            NodeKind::Conditioner => "conditioner",
            NodeKind::IfStat => "if_stat",
            NodeKind::IfTail => "if_tail",
            NodeKind::CondStat => "cond_stat",
            NodeKind::SwitchStat => "switch_stat",
            NodeKind::SwitchCases => "switch_cases",
            NodeKind::SwitchOpts => "switch_opts",
            NodeKind::SwitchDef => "switch_def",
            NodeKind::Iteration => "iteration",
            NodeKind::WhileLoop => "while_loop",
            NodeKind::ForLoop => "for_loop",
            NodeKind::DoWhileLoop => "dowhile_loop",
            NodeKind::ForInit => "for_init",
            NodeKind::Expr => "expr",
            NodeKind::LogicExpr => "logic_expr",
            NodeKind::OrTail => "or_tail",
            NodeKind::AndExpr => "and_expr",
            NodeKind::AndTail => "and_tail",
            NodeKind::RelaExpr => "rela_expr",
            NodeKind::RelaTail => "rela_tail",
            NodeKind::RelaSym => "rela_sym",
            NodeKind::ArithOp1 => "arith_op1",
            NodeKind::ArithOp2 => "arith_op2",
            NodeKind::ArithExpr => "arith_expr",
            NodeKind::ArithTail => "arith_tail",
            NodeKind::Term => "term",
            NodeKind::TermTail => "term_tail",
            NodeKind::Factor => "factor",
            NodeKind::Primary => "primary",
            NodeKind::FunctionCall => "function_call",
            NodeKind::ParamOpts => "param_opts",
            NodeKind::ParamList => "param_list",
            NodeKind::ParamItem => "param_item",
            NodeKind::ParamTail => "param_tail",
            NodeKind::Id => "id",
            NodeKind::Operator => "operator",
            NodeKind::Missing => "missing",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialize_shape() {
        let node = AstNode::new(
            NodeKind::IdAccess,
            vec![Child::Leaf(".".to_string()), AstNode::id("id2").into()],
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "id_access",
                "children": [".", {"type": "id", "value": "id2"}]
            })
        );
    }

    #[test]
    fn test_empty_name() {
        let node = AstNode::empty(NodeKind::OneDElement);
        assert_eq!(node.name(), "1d_element_empty");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json, serde_json::json!({"type": "1d_element_empty"}));
    }

    #[test]
    fn test_node_at_reports_malformed_tree() {
        let node = AstNode::new(NodeKind::Expr, vec![Child::Leaf("!".to_string())]);
        assert!(matches!(node.node_at(0), Err(Error::MalformedTree { .. })));
        assert!(matches!(node.node_at(3), Err(Error::MalformedTree { .. })));
    }

    #[test]
    fn test_find_in_subtree() {
        let tree = AstNode::new(
            NodeKind::Factor,
            vec![AstNode::new(NodeKind::Primary, vec![AstNode::id("id1").into()]).into()],
        );
        let found = tree.find(&|n| n.kind == NodeKind::Id);
        assert_eq!(found.and_then(|n| n.value.as_deref()), Some("id1"));
        assert!(tree.contains(NodeKind::Primary));
        assert!(!tree.contains(NodeKind::Value));
    }
}
