use std::{
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

use crate::{
    common::lambda::{Lambda, Program},
    vm::scope::Scope,
};

/// Wraps a compiled function with the scope chain it was created in.
/// The chain is shared, not copied:
/// writes made to captured variables after the closure is built remain visible.
#[derive(Clone)]
pub struct Closure {
    pub program: Rc<Program>,
    pub id:      usize,
    pub scope:   Rc<Scope>,
}

impl Closure {
    pub fn new(program: &Rc<Program>, id: usize, scope: &Rc<Scope>) -> Closure {
        Closure {
            program: Rc::clone(program),
            id,
            scope: Rc::clone(scope),
        }
    }

    pub fn lambda(&self) -> &Lambda {
        &self.program.functions[self.id]
    }
}

/// Two closures are the same function if they come from the same definition,
/// regardless of the scope they captured.
impl PartialEq for Closure {
    fn eq(&self, other: &Closure) -> bool {
        Rc::ptr_eq(&self.program, &other.program) && self.id == other.id
    }
}

impl Debug for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Closure(#{}, arity {})", self.id, self.lambda().arity)
    }
}
