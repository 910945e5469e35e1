use std::rc::Rc;

use crate::{
    common::{closure::Closure, lambda::Lambda, opcode::Opcode, span::Span},
    vm::scope::Scope,
};

/// One activation of a compiled function.
#[derive(Debug, Clone)]
pub struct Frame {
    pub closure: Closure,
    /// Index of the next instruction to run.
    pub ip:      usize,
    /// The innermost scope; grows and shrinks with `ScopePush` and `ScopePop`.
    pub scope:   Rc<Scope>,
    /// Height of the operand stack beneath this frame's arguments.
    pub base:    usize,
}

impl Frame {
    pub fn new(closure: Closure, base: usize) -> Frame {
        let scope = Rc::clone(&closure.scope);
        Frame { closure, ip: 0, scope, base }
    }

    pub fn lambda(&self) -> &Lambda {
        self.closure.lambda()
    }

    pub fn current(&self) -> Option<Opcode> {
        self.lambda().code.get(self.ip).copied()
    }

    /// The span of the instruction run last.
    /// `ip` is advanced before an instruction runs, so this is the one running now.
    pub fn span(&self) -> Option<Span> {
        self.lambda().spans.get(self.ip.saturating_sub(1)).cloned()
    }

    /// True if nothing but scope bookkeeping lies between the instruction at `ip`
    /// and the function's `Return`, so a call made there can reuse this frame.
    pub fn in_tail_position(&self, ip: usize) -> bool {
        let code = &self.lambda().code;
        let mut next = ip + 1;

        // Jumps only go forward, the bound is a guard.
        for _ in 0..code.len() {
            match code.get(next) {
                Some(Opcode::Return) => return true,
                Some(Opcode::ScopePop)
                | Some(Opcode::MatchClear)
                | Some(Opcode::Nop) => next += 1,
                Some(Opcode::Jump(target)) => next = *target,
                _ => return false,
            }
        }

        false
    }
}
