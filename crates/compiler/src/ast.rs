//! Abstract syntax tree for Cedar
//!
//! Every node shares one header — kind, token, static type, constant
//! value — and up to three child slots. The slot convention is fixed per
//! kind (statement chains link through `right`, binary operators put the
//! left operand in `left` and the right operand in `right`, and so on),
//! which keeps the checker and the evaluator as uniform walks instead of
//! one visitor per shape.

use crate::symbol_table::Symbol;
use crate::token::Token;
use crate::types::Type;
use crate::value::Value;

/// Which construct a node represents. Per-kind payloads all live in the
/// shared header, so the variants stay bare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Placeholder emitted while recovering from a parse error.
    #[default]
    Untyped,
    /// Root of a module; `left` is the first statement, `right` chains on.
    Start,
    /// Statement list link: `left` statement, `right` next link.
    Chain,

    Declaration,
    Identifier,
    Literal,

    /// `left` RHS expression, `middle` optional array subscript.
    Assignment,
    /// `left` identifier, `right` RHS expression; token is the operator.
    TerseAssignment,
    /// `left` element expression, `right` next chain link.
    InitializerList,

    /// Struct definition; `left` chains the field declarations.
    StructDeclaration,
    /// A struct name appearing in member access position.
    StructIdentifier,
    /// A struct field; `left` optional assigned expression, `middle`
    /// optional subscript, `right` the owning struct identifier.
    StructMemberIdentifier,

    /// Enum definition; `left` chains the entries.
    EnumIdentifier,
    /// One implicit-valued enum entry.
    EnumEntry,
    /// `Name = expr` inside an enum body; `left` is the expression.
    EnumAssignment,

    ArraySubscript,

    /// `left` condition, `middle` then-body, `right` else-body (or none).
    If,
    TernaryIf,
    /// `left` condition, `right` body.
    While,
    /// `left` initialization, `right` the derived While node.
    For,
    Break,
    Continue,
    /// `left` optional returned expression.
    Return,

    /// `left` return type, `middle` parameter chain, `right` body.
    Function,
    FunctionReturnType,
    /// Parameter chain link: chains through `left`.
    FunctionParam,
    FunctionBody,
    /// `middle` chains the arguments.
    FunctionCall,
    FunctionArgument,

    /// `left` is the printed expression.
    PrintCall,

    /// `left` operand; token is the operator.
    UnaryOp,
    BinaryLogical,
    BinaryArithmetic,
    BinaryBitwise,

    PrefixIncrement,
    PrefixDecrement,
    /// Token names the target variable; no children.
    PostfixIncrement,
    PostfixDecrement,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AstNode {
    pub kind: NodeKind,
    pub token: Token,
    /// Actualized static type, filled in by the type checker.
    pub data_type: Type,
    /// Constant value for literal-bearing nodes, filled in by the checker.
    pub value: Value,
    pub left: Option<Box<AstNode>>,
    pub middle: Option<Box<AstNode>>,
    pub right: Option<Box<AstNode>>,
}

impl AstNode {
    pub fn new(kind: NodeKind, data_type: Type) -> Self {
        AstNode {
            kind,
            data_type,
            ..AstNode::default()
        }
    }

    pub fn from_token(kind: NodeKind, token: Token, data_type: Type) -> Self {
        AstNode {
            kind,
            token,
            data_type,
            ..AstNode::default()
        }
    }

    /// Build a node that inherits its token and type from a symbol.
    pub fn from_symbol(kind: NodeKind, symbol: &Symbol) -> Self {
        AstNode {
            kind,
            token: symbol.token.clone(),
            data_type: symbol.ty().clone(),
            ..AstNode::default()
        }
    }

    pub fn with_left(mut self, child: AstNode) -> Self {
        self.left = Some(Box::new(child));
        self
    }

    pub fn with_middle(mut self, child: AstNode) -> Self {
        self.middle = Some(Box::new(child));
        self
    }

    pub fn with_right(mut self, child: AstNode) -> Self {
        self.right = Some(Box::new(child));
        self
    }

    pub fn is_chain(&self) -> bool {
        self.kind == NodeKind::Chain
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == NodeKind::Identifier
    }

    pub fn is_return(&self) -> bool {
        self.kind == NodeKind::Return
    }

    pub fn is_function(&self) -> bool {
        self.kind == NodeKind::Function
    }

    pub fn is_loop_or_branch(&self) -> bool {
        matches!(self.kind, NodeKind::If | NodeKind::While | NodeKind::For)
    }

    /// A chain link carrying nothing: the terminator every statement
    /// list ends with.
    pub fn is_dead_end(&self) -> bool {
        self.is_chain() && self.left.is_none() && self.middle.is_none() && self.right.is_none()
    }

    /// Iterate the statements of a chain starting at this node.
    pub fn chain_statements(&self) -> ChainIter<'_> {
        ChainIter {
            current: Some(self),
        }
    }

    /// Render the tree for `--dump-ast`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        if self.is_chain() || self.kind == NodeKind::Start {
            // Chain links add nesting noise without information.
            for child in [&self.left, &self.middle, &self.right].into_iter().flatten() {
                child.dump_into(out, depth);
            }
            return;
        }

        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("{:?}", self.kind));
        if !self.token.lexeme.is_empty() {
            out.push_str(&format!(" '{}'", self.token.lexeme));
        }
        if !self.data_type.is_none() {
            out.push_str(&format!(" : {}", self.data_type));
        }
        out.push('\n');

        for child in [&self.left, &self.middle, &self.right].into_iter().flatten() {
            child.dump_into(out, depth + 1);
        }
    }
}

/// Iterator over the `left` statements of a `Chain`/`Start`/body list.
pub struct ChainIter<'a> {
    current: Option<&'a AstNode>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a AstNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        // An empty link ends the chain.
        let statement = node.left.as_deref()?;
        self.current = node.right.as_deref();
        Some(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn leaf(kind: NodeKind, name: &str) -> AstNode {
        AstNode::from_token(
            kind,
            Token::new(TokenKind::Identifier, name, 1, 0),
            Type::none(),
        )
    }

    fn chain_of(statements: Vec<AstNode>) -> AstNode {
        let mut head = AstNode::new(NodeKind::Start, Type::none());
        let mut current = &mut head;
        for stmt in statements {
            current.left = Some(Box::new(stmt));
            current.right = Some(Box::new(AstNode::new(NodeKind::Chain, Type::none())));
            current = current.right.as_mut().unwrap();
        }
        head
    }

    #[test]
    fn test_chain_iteration_stops_at_dead_end() {
        let root = chain_of(vec![
            leaf(NodeKind::Identifier, "a"),
            leaf(NodeKind::Identifier, "b"),
        ]);
        let names: Vec<_> = root
            .chain_statements()
            .map(|n| n.token.lexeme.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_dead_end_detection() {
        let empty = AstNode::new(NodeKind::Chain, Type::none());
        assert!(empty.is_dead_end());

        let full = AstNode::new(NodeKind::Chain, Type::none())
            .with_left(leaf(NodeKind::Identifier, "x"));
        assert!(!full.is_dead_end());
    }

    #[test]
    fn test_dump_skips_chain_links() {
        let root = chain_of(vec![leaf(NodeKind::Identifier, "a")]);
        let dump = root.dump();
        assert!(dump.contains("Identifier 'a'"));
        assert!(!dump.contains("Chain"));
    }
}
