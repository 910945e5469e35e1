use std::fmt::Write;

use crate::common::{
    lit::Lit,
    opcode::{Opcode, ScopeIndex},
    span::Span,
};

/// The compiled shape of a destructuring definition's left-hand side.
/// The VM walks it against the assigned value.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Bind(ScopeIndex),
    Ignore,
    List(Vec<Pattern>),
    Composite(Vec<(String, Pattern)>),
}

/// Represents a single interpretable chunk of bytecode,
/// Think a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub code:      Vec<Opcode>,
    /// One span per instruction, for error reporting.
    pub spans:     Vec<Span>,
    pub constants: Vec<Lit>,
    pub patterns:  Vec<Pattern>,
    pub arity:     usize,
}

impl Lambda {
    /// Creates a new empty Lambda to be filled.
    pub fn empty(arity: usize) -> Lambda {
        Lambda {
            code:      vec![],
            spans:     vec![],
            constants: vec![],
            patterns:  vec![],
            arity,
        }
    }

    /// Emits an opcode, returning its address.
    pub fn emit(&mut self, op: Opcode, span: &Span) -> usize {
        self.code.push(op);
        self.spans.push(span.clone());
        self.code.len() - 1
    }

    /// Points the jump at `address` to the next instruction to be emitted.
    pub fn patch(&mut self, address: usize) {
        let target = self.code.len();
        self.code[address].patch(target);
    }

    /// Given some data, this function adds it to the constants table,
    /// and returns the data's index.
    /// The constants table is push only, so constants are identified by their index.
    pub fn index_data(&mut self, data: Lit) -> usize {
        match self.constants.iter().position(|d| d == &data) {
            Some(d) => d,
            None => {
                self.constants.push(data);
                self.constants.len() - 1
            },
        }
    }

    pub fn index_pattern(&mut self, pattern: Pattern) -> usize {
        self.patterns.push(pattern);
        self.patterns.len() - 1
    }

    /// Dump some bytecode for inspection.
    pub fn dump(&self) -> String {
        let mut out = String::new();

        for (index, op) in self.code.iter().enumerate() {
            let _ = write!(out, "{:>4}  {}", index, op);
            match op {
                Opcode::Con(i) => {
                    if let Some(lit) = self.constants.get(*i) {
                        let _ = write!(out, "\t({})", lit);
                    }
                },
                Opcode::Destructure(i) => {
                    if let Some(pattern) = self.patterns.get(*i) {
                        let _ = write!(out, "\t({:?})", pattern);
                    }
                },
                _ => (),
            }
            out.push('\n');
        }

        out
    }
}

/// Every function compiled from one source unit.
/// The top-level expression list is always function `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub functions: Vec<Lambda>,
}

impl Program {
    pub fn main(&self) -> Option<&Lambda> {
        self.functions.first()
    }

    /// Disassembles every function in the program.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, lambda) in self.functions.iter().enumerate() {
            let _ = writeln!(out, "fn #{} (arity {}):", id, lambda.arity);
            out.push_str(&lambda.dump());
        }
        out
    }
}
