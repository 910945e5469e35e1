use std::fmt::{Display, Formatter, Result};

use crate::common::{number, value::Value};

/// Literal values stored in a function's constants table.
/// Constants are kept apart from runtime [`Value`]s
/// so that every load of a string constant yields a fresh buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Null,
    Empty,
    Boolean(bool),
    Number(f64),
    /// A UTF-8 encoded string, as written in source.
    String(String),
}

impl Lit {
    /// Materializes this constant as a runtime value.
    pub fn value(&self) -> Value {
        match self {
            Lit::Null       => Value::Null,
            Lit::Empty      => Value::Empty,
            Lit::Boolean(b) => Value::Boolean(*b),
            Lit::Number(n)  => Value::Number(*n),
            Lit::String(s)  => Value::string(s),
        }
    }
}

impl Display for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Lit::Null       => write!(f, "()"),
            Lit::Empty      => write!(f, "_"),
            Lit::Boolean(b) => write!(f, "{}", b),
            Lit::Number(n)  => write!(f, "{}", number::format(*n)),
            Lit::String(s)  => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_string_per_load() {
        let lit = Lit::String("hello".to_string());
        let (a, b) = (lit.value(), lit.value());

        if let (Value::String(a), Value::String(b)) = (&a, &b) {
            a.borrow_mut()[0] = b'j';
            assert_eq!(&*b.borrow(), b"hello");
            assert_eq!(&*a.borrow(), b"jello");
        } else {
            panic!("string constant did not load as a string");
        }
    }
}
