use std::fmt::{self, Display, Formatter};

use crate::common::operator::{BinaryOp, UnaryOp};

/// Addresses a variable by how many scopes out it lives
/// and which slot it occupies in that scope.
/// Both are resolved at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeIndex {
    pub depth: usize,
    pub slot:  usize,
}

impl ScopeIndex {
    pub fn new(depth: usize, slot: usize) -> ScopeIndex {
        ScopeIndex { depth, slot }
    }
}

impl Display for ScopeIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.depth, self.slot)
    }
}

/// A single instruction.
/// Operands are carried inline, so jump targets can be patched in place
/// once the address they point to is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Load a constant.
    Con(usize),
    /// Creates a closure over the current scope chain.
    Closure(usize),
    /// Push a copy of a variable onto the stack.
    Load(ScopeIndex),
    /// Store the topmost value into a variable, leaving it on the stack.
    Save(ScopeIndex),
    /// Bind the topmost value against a destructuring pattern.
    Destructure(usize),
    /// Assign into a nested container: value, keys, then root, on the stack.
    SubSet(usize),
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Constructs a list from the topmost values.
    List(usize),
    /// Constructs a composite from the topmost key-value pairs.
    Composite(usize),
    /// Call a function with some number of arguments.
    Call(usize),
    /// Return from a function.
    Return,
    /// Compares a clause target against the match condition.
    Match,
    /// Drops the match condition from beneath the result.
    MatchClear,
    JumpIfFalse(usize),
    JumpIfTrue(usize),
    Jump(usize),
    /// Copies topmost value on the stack.
    Copy,
    /// Delete a value off the stack.
    Del,
    ScopePush,
    ScopePop,
    Nop,
}

impl Opcode {
    /// Points a jump at a new address.
    /// Non-jump instructions are left untouched.
    pub fn patch(&mut self, address: usize) {
        match self {
            Opcode::JumpIfFalse(a)
            | Opcode::JumpIfTrue(a)
            | Opcode::Jump(a) => *a = address,
            _ => (),
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Con(i)         => write!(f, "Con         {}", i),
            Opcode::Closure(i)     => write!(f, "Closure     #{}", i),
            Opcode::Load(i)        => write!(f, "Load        {}", i),
            Opcode::Save(i)        => write!(f, "Save        {}", i),
            Opcode::Destructure(i) => write!(f, "Destructure {}", i),
            Opcode::SubSet(n)      => write!(f, "SubSet      {}", n),
            Opcode::Unary(op)      => write!(f, "Unary       {}", op),
            Opcode::Binary(op)     => write!(f, "Binary      {}", op),
            Opcode::List(n)        => write!(f, "List        {}", n),
            Opcode::Composite(n)   => write!(f, "Composite   {}", n),
            Opcode::Call(n)        => write!(f, "Call        {}", n),
            Opcode::Return         => write!(f, "Return"),
            Opcode::Match          => write!(f, "Match"),
            Opcode::MatchClear     => write!(f, "MatchClear"),
            Opcode::JumpIfFalse(a) => write!(f, "JumpIfFalse @{}", a),
            Opcode::JumpIfTrue(a)  => write!(f, "JumpIfTrue  @{}", a),
            Opcode::Jump(a)        => write!(f, "Jump        @{}", a),
            Opcode::Copy           => write!(f, "Copy"),
            Opcode::Del            => write!(f, "Del"),
            Opcode::ScopePush      => write!(f, "ScopePush"),
            Opcode::ScopePop       => write!(f, "ScopePop"),
            Opcode::Nop            => write!(f, "Nop"),
        }
    }
}
