use std::{cell::RefCell, rc::Rc};

use crate::common::{opcode::ScopeIndex, value::Value};

/// One activation of a block or function body:
/// a growable array of slots, and the scope it is nested in.
/// Scopes are shared by reference,
/// so a closure sees writes made to a captured slot after it was created.
#[derive(Debug, Default)]
pub struct Scope {
    slots:  RefCell<Vec<Value>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    /// The outermost scope, holding the natives.
    pub fn root(values: Vec<Value>) -> Rc<Scope> {
        Rc::new(Scope { slots: RefCell::new(values), parent: None })
    }

    /// A fresh, empty scope nested in `parent`.
    pub fn push(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope { slots: RefCell::new(vec![]), parent: Some(Rc::clone(parent)) })
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    fn ancestor(&self, depth: usize) -> Option<&Scope> {
        let mut scope = self;
        for _ in 0..depth {
            scope = scope.parent.as_deref()?;
        }
        Some(scope)
    }

    /// Reads a slot.
    /// A slot that was never written holds `()`;
    /// `None` means the chain is shallower than `index.depth`.
    pub fn get(&self, index: ScopeIndex) -> Option<Value> {
        let scope = self.ancestor(index.depth)?;
        let slots = scope.slots.borrow();
        Some(slots.get(index.slot).cloned().unwrap_or(Value::Null))
    }

    /// Writes a slot, growing the scope as needed.
    /// Returns `false` if the chain is shallower than `index.depth`.
    pub fn set(&self, index: ScopeIndex, value: Value) -> bool {
        let scope = match self.ancestor(index.depth) {
            Some(scope) => scope,
            None => return false,
        };

        let mut slots = scope.slots.borrow_mut();
        if index.slot >= slots.len() {
            slots.resize(index.slot + 1, Value::Null);
        }
        slots[index.slot] = value;
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup_through_chain() {
        let root = Scope::root(vec![Value::Number(1.0)]);
        let inner = Scope::push(&root);
        assert!(inner.set(ScopeIndex::new(0, 2), Value::Boolean(true)));

        assert!(inner.get(ScopeIndex::new(1, 0)).unwrap().equals(&Value::Number(1.0)));
        assert!(matches!(inner.get(ScopeIndex::new(0, 0)), Some(Value::Null)));
        assert!(matches!(inner.get(ScopeIndex::new(0, 2)), Some(Value::Boolean(true))));
        assert!(inner.get(ScopeIndex::new(2, 0)).is_none());
    }

    #[test]
    fn shared_by_reference() {
        let root = Scope::root(vec![]);
        let alias = Rc::clone(&root);
        root.set(ScopeIndex::new(0, 0), Value::Number(3.0));
        assert!(alias.get(ScopeIndex::new(0, 0)).unwrap().equals(&Value::Number(3.0)));
    }

    #[test]
    fn siblings_are_independent() {
        let root = Scope::root(vec![]);
        let a = Scope::push(&root);
        let b = Scope::push(&root);
        a.set(ScopeIndex::new(0, 0), Value::Number(1.0));
        assert!(matches!(b.get(ScopeIndex::new(0, 0)), Some(Value::Null)));
    }
}
