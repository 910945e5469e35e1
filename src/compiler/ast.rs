use std::fmt::Write;

use crate::common::{
    number,
    operator::{BinaryOp, UnaryOp},
    span::{Span, Spanned},
};

/// A handle to a node in an [`AST`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Handles are only meaningful for the arena they came from.
    pub fn from_index(index: usize) -> NodeId {
        NodeId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A single syntax node.
/// Children are referenced by handle, never by pointer,
/// and are always pushed to the arena before their parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Iden(String),
    /// The wildcard `_`.
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    List(Vec<NodeId>),
    /// Key-value pairs, keys being unevaluated expressions.
    Composite(Vec<(NodeId, NodeId)>),
    /// Parameters are `Iden` or `Empty` nodes.
    Function { params: Vec<NodeId>, body: NodeId },
    Unary(UnaryOp, NodeId),
    Binary(BinaryOp, NodeId, NodeId),
    /// A block of expressions, evaluating to the last.
    ExprList(Vec<NodeId>),
    /// A condition followed by `(target, result)` clauses.
    Match { cond: NodeId, clauses: Vec<(NodeId, NodeId)> },
    Call { callee: NodeId, args: Vec<NodeId> },
}

impl Node {
    /// Handles of all direct children, in source order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Iden(_)
            | Node::Empty
            | Node::Number(_)
            | Node::String(_)
            | Node::Boolean(_) => vec![],
            Node::List(items) | Node::ExprList(items) => items.clone(),
            Node::Composite(entries) => entries.iter()
                .flat_map(|(k, v)| vec![*k, *v])
                .collect(),
            Node::Function { params, body } => {
                let mut children = params.clone();
                children.push(*body);
                children
            },
            Node::Unary(_, operand) => vec![*operand],
            Node::Binary(_, left, right) => vec![*left, *right],
            Node::Match { cond, clauses } => {
                let mut children = vec![*cond];
                for (target, result) in clauses {
                    children.push(*target);
                    children.push(*result);
                }
                children
            },
            Node::Call { callee, args } => {
                let mut children = vec![*callee];
                children.extend(args.iter().copied());
                children
            },
        }
    }
}

/// An append-only arena of syntax nodes.
/// Only the constant folder rewrites nodes after parsing,
/// and it only ever replaces a node with a literal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AST {
    nodes: Vec<Spanned<Node>>,
}

impl AST {
    pub fn new() -> AST {
        AST { nodes: vec![] }
    }

    /// Appends a node, returning its handle.
    pub fn push(&mut self, node: Node, span: Span) -> NodeId {
        debug_assert!(
            node.children().iter().all(|c| c.0 < self.nodes.len()),
            "children must exist before their parent",
        );
        self.nodes.push(Spanned::new(node, span));
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0].item
    }

    pub fn span(&self, id: NodeId) -> &Span {
        &self.nodes[id.0].span
    }

    /// Rewrites a node in place, keeping its span.
    pub fn replace(&mut self, id: NodeId, node: Node) {
        self.nodes[id.0].item = node;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Prints a subtree as an s-expression, for debugging and tests.
    pub fn print(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.print_into(&mut out, id);
        out
    }

    fn print_all(&self, out: &mut String, ids: &[NodeId]) {
        for id in ids {
            out.push(' ');
            self.print_into(out, *id);
        }
    }

    fn print_into(&self, out: &mut String, id: NodeId) {
        match self.node(id) {
            Node::Iden(name)   => out.push_str(name),
            Node::Empty        => out.push('_'),
            Node::Number(n)    => out.push_str(&number::format(*n)),
            Node::String(s)    => { let _ = write!(out, "{:?}", s); },
            Node::Boolean(b)   => { let _ = write!(out, "{}", b); },
            Node::List(items) => {
                out.push_str("[list");
                self.print_all(out, items);
                out.push(']');
            },
            Node::Composite(entries) => {
                out.push_str("{composite");
                for (key, value) in entries {
                    out.push(' ');
                    self.print_into(out, *key);
                    out.push(':');
                    self.print_into(out, *value);
                }
                out.push('}');
            },
            Node::Function { params, body } => {
                out.push_str("(fn [");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 { out.push(' '); }
                    self.print_into(out, *param);
                }
                out.push_str("] ");
                self.print_into(out, *body);
                out.push(')');
            },
            Node::Unary(op, operand) => {
                let _ = write!(out, "({} ", op);
                self.print_into(out, *operand);
                out.push(')');
            },
            Node::Binary(op, left, right) => {
                let _ = write!(out, "({} ", op);
                self.print_into(out, *left);
                out.push(' ');
                self.print_into(out, *right);
                out.push(')');
            },
            Node::ExprList(items) => {
                out.push_str("(do");
                self.print_all(out, items);
                out.push(')');
            },
            Node::Match { cond, clauses } => {
                out.push_str("(match ");
                self.print_into(out, *cond);
                for (target, result) in clauses {
                    out.push_str(" (");
                    self.print_into(out, *target);
                    out.push_str(" -> ");
                    self.print_into(out, *result);
                    out.push(')');
                }
                out.push(')');
            },
            Node::Call { callee, args } => {
                out.push_str("(call ");
                self.print_into(out, *callee);
                self.print_all(out, args);
                out.push(')');
            },
        }
    }
}
