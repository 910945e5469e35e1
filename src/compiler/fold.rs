//! Constant folding.
//! Arithmetic and comparisons over number literals are evaluated ahead of time,
//! using the same operator semantics as the VM.
//! Anything that would produce an error is left for the VM to raise at runtime,
//! so folding never changes what a program does.

use crate::{
    common::{
        operator::BinaryOp,
        value::Value,
    },
    compiler::ast::{Node, NodeId, AST},
    core,
};

fn literal(node: &Node) -> Option<Value> {
    match node {
        Node::Number(n) => Some(Value::Number(*n)),
        _ => None,
    }
}

fn node(value: Value) -> Option<Node> {
    match value {
        Value::Number(n)  => Some(Node::Number(n)),
        Value::Boolean(b) => Some(Node::Boolean(b)),
        _ => None,
    }
}

fn foldable(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Mod
        | BinaryOp::Greater
        | BinaryOp::Less
        | BinaryOp::Equal
    )
}

fn fold_node(ast: &AST, id: NodeId) -> Option<Node> {
    match ast.node(id) {
        Node::Unary(op, operand) => {
            let operand = literal(ast.node(*operand))?;
            node(core::unary(*op, &operand).ok()?)
        },
        Node::Binary(op, left, right) if foldable(*op) => {
            let left = literal(ast.node(*left))?;
            let right = literal(ast.node(*right))?;
            node(core::binary(*op, &left, &right).ok()?)
        },
        _ => None,
    }
}

/// Folds every constant subexpression in place, returning how many nodes were rewritten.
/// Children always precede their parents in the arena,
/// so one pass in order folds nested expressions bottom-up.
pub fn fold(ast: &mut AST) -> usize {
    let mut folded = 0;

    for index in 0..ast.len() {
        let id = NodeId::from_index(index);
        if let Some(replacement) = fold_node(ast, id) {
            ast.replace(id, replacement);
            folded += 1;
        }
    }

    folded
}
