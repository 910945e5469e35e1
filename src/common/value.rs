use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

use crate::{
    common::{closure::Closure, number, span::Span},
    core::ffi::Native,
};

/// Where an error value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unknown,
    Syntax,
    Runtime,
    System,
    Assert,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unknown => "unknown",
            ErrorKind::Syntax  => "syntax",
            ErrorKind::Runtime => "runtime",
            ErrorKind::System  => "system",
            ErrorKind::Assert  => "assert",
        };
        write!(f, "{}", name)
    }
}

/// A runtime error, as seen by programs.
/// Errors wrap their cause, forming a chain that is reported in full
/// when an error reaches the top level uncaught.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub kind:    ErrorKind,
    pub message: String,
    pub parent:  Option<Rc<ErrorValue>>,
    pub span:    Option<Span>,
}

impl ErrorValue {
    /// Iterates over this error and each of its causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ErrorValue> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.as_deref();
            Some(current)
        })
    }

    /// Renders the whole chain, one cause per line,
    /// with the source position of each error that has one.
    pub fn report(&self) -> String {
        self.chain()
            .enumerate()
            .map(|(depth, error)| {
                let indent = "  ".repeat(depth);
                match &error.span {
                    Some(span) => format!("{}{} [{}]", indent, error, span.position()),
                    None       => format!("{}{}", indent, error),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Display for ErrorValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// The kind of a value, without its contents.
/// Used for introspection and argument validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Empty,
    Boolean,
    Number,
    String,
    List,
    Composite,
    Function,
    Error,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Null      => "()",
            Kind::Empty     => "_",
            Kind::Boolean   => "boolean",
            Kind::Number    => "number",
            Kind::String    => "string",
            Kind::List      => "list",
            Kind::Composite => "composite",
            Kind::Function  => "function",
            Kind::Error     => "error",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A runtime value.
/// Strings, lists, and composites are shared by reference,
/// so index-assignment through one binding is visible through every other.
/// Operators that build new values (like `+`) always allocate fresh storage.
#[derive(Clone)]
pub enum Value {
    Null,
    /// The wildcard `_`, equal to everything.
    Empty,
    Boolean(bool),
    Number(f64),
    String(Rc<RefCell<Vec<u8>>>),
    List(Rc<RefCell<Vec<Value>>>),
    /// Keys are byte strings, like every other string.
    Composite(Rc<RefCell<BTreeMap<Vec<u8>, Value>>>),
    Function(Closure),
    Native(Native),
    Error(Rc<ErrorValue>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::bytes(s.as_bytes().to_vec())
    }

    pub fn bytes(bytes: Vec<u8>) -> Value {
        Value::String(Rc::new(RefCell::new(bytes)))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn composite(entries: BTreeMap<Vec<u8>, Value>) -> Value {
        Value::Composite(Rc::new(RefCell::new(entries)))
    }

    /// Builds a composite from borrowed keys, a common case for natives.
    pub fn record(entries: Vec<(&str, Value)>) -> Value {
        Value::composite(
            entries.into_iter()
                .map(|(k, v)| (k.as_bytes().to_vec(), v))
                .collect()
        )
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>, span: Option<Span>) -> Value {
        Value::Error(Rc::new(ErrorValue {
            kind,
            message: message.into(),
            parent: None,
            span,
        }))
    }

    /// Wraps an existing error with a new, outer one.
    pub fn wrap(
        kind: ErrorKind,
        message: impl Into<String>,
        parent: Rc<ErrorValue>,
        span: Option<Span>,
    ) -> Value {
        Value::Error(Rc::new(ErrorValue {
            kind,
            message: message.into(),
            parent: Some(parent),
            span,
        }))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null         => Kind::Null,
            Value::Empty        => Kind::Empty,
            Value::Boolean(_)   => Kind::Boolean,
            Value::Number(_)    => Kind::Number,
            Value::String(_)    => Kind::String,
            Value::List(_)      => Kind::List,
            Value::Composite(_) => Kind::Composite,
            Value::Function(_)
            | Value::Native(_)  => Kind::Function,
            Value::Error(_)     => Kind::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Structural equality.
    /// `_` equals every value; otherwise values of different kinds never match.
    pub fn equals(&self, other: &Value) -> bool {
        self.equals_within(other, &mut Vec::new())
    }

    /// `pairs` holds the containers being compared further up,
    /// which are assumed equal when a cycle leads back to them.
    fn equals_within(&self, other: &Value, pairs: &mut Vec<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Value::Empty, _) | (_, Value::Empty) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            },
            (Value::List(a), Value::List(b)) => {
                let pair = (address(a), address(b));
                if Rc::ptr_eq(a, b) || pairs.contains(&pair) { return true; }
                pairs.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.equals_within(y, pairs));
                pairs.pop();
                equal
            },
            (Value::Composite(a), Value::Composite(b)) => {
                let pair = (address(a), address(b));
                if Rc::ptr_eq(a, b) || pairs.contains(&pair) { return true; }
                pairs.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a.iter().all(|(k, x)| {
                        b.get(k).map_or(false, |y| x.equals_within(y, pairs))
                    });
                pairs.pop();
                equal
            },
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => a.name() == b.name(),
            (Value::Error(a), Value::Error(b)) => {
                Rc::ptr_eq(a, b) || (a.kind == b.kind && a.message == b.message)
            },
            _ => false,
        }
    }

    /// The text of a string, or the printed form of anything else.
    /// This is what `out` and `string` produce.
    pub fn raw(&self) -> Vec<u8> {
        match self {
            Value::String(s) => s.borrow().clone(),
            other => other.to_string().into_bytes(),
        }
    }
}

fn address<T>(shared: &Rc<T>) -> *const () {
    Rc::as_ptr(shared) as *const ()
}

fn escape(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

impl Value {
    /// Writes a value, printing a container that contains itself as `[...]` or `{...}`.
    /// `open` holds the containers currently being written.
    fn write(&self, f: &mut Formatter<'_>, open: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Value::List(l) => {
                if open.contains(&address(l)) { return write!(f, "[...]"); }
                open.push(address(l));
                write!(f, "[")?;
                for (i, item) in l.borrow().iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    item.write(f, open)?;
                }
                open.pop();
                write!(f, "]")
            },
            Value::Composite(c) => {
                if open.contains(&address(c)) { return write!(f, "{{...}}"); }
                open.push(address(c));
                write!(f, "{{")?;
                for (i, (key, item)) in c.borrow().iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}: ", String::from_utf8_lossy(key))?;
                    item.write(f, open)?;
                }
                open.pop();
                write!(f, "}}")
            },
            other => write!(f, "{}", other),
        }
    }
}

impl Display for Value {
    /// Displays a value the way a program would write it.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null       => write!(f, "()"),
            Value::Empty      => write!(f, "_"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n)  => write!(f, "{}", number::format(*n)),
            Value::String(s)  => write!(f, "'{}'", escape(&s.borrow())),
            Value::List(_)
            | Value::Composite(_) => self.write(f, &mut Vec::new()),
            Value::Function(c) => write!(f, "(function #{})", c.id),
            Value::Native(n)   => write!(f, "Native Function ({})", n.name()),
            Value::Error(e)    => write!(f, "{}", e),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Function(c) => write!(f, "Function({:?})", c),
            other => write!(f, "{}({})", other.kind(), other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn every_kind() -> Vec<Value> {
        vec![
            Value::Null,
            Value::Boolean(false),
            Value::Number(5.0),
            Value::string("x"),
            Value::list(vec![Value::Number(1.0)]),
            Value::record(vec![("a", Value::Null)]),
            Value::error(ErrorKind::Runtime, "oops", None),
        ]
    }

    #[test]
    fn empty_equals_everything() {
        for value in every_kind() {
            assert!(Value::Empty.equals(&value), "_ != {}", value);
            assert!(value.equals(&Value::Empty), "{} != _", value);
        }
    }

    #[test]
    fn kinds_never_cross() {
        let values = every_kind();
        for (i, a) in values.iter().enumerate() {
            for (j, b) in values.iter().enumerate() {
                assert_eq!(a.equals(b), i == j, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn deep_equality() {
        let a = Value::list(vec![Value::string("a"), Value::record(vec![("k", Value::Number(1.0))])]);
        let b = Value::list(vec![Value::string("a"), Value::record(vec![("k", Value::Number(1.0))])]);
        let c = Value::list(vec![Value::string("a"), Value::record(vec![("k", Value::Number(2.0))])]);
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert!(!Value::list(vec![]).equals(&Value::list(vec![Value::Null])));
    }

    #[test]
    fn printing() {
        let value = Value::record(vec![
            ("list", Value::list(vec![Value::Number(1.0), Value::Number(2.5)])),
            ("name", Value::string("it's\n")),
            ("none", Value::Null),
        ]);
        assert_eq!(value.to_string(), "{list: [1, 2.5], name: 'it\\'s\\n', none: ()}");
        assert_eq!(Value::Empty.to_string(), "_");
    }

    #[test]
    fn cycles_terminate() {
        let a = Value::list(vec![]);
        if let Value::List(items) = &a { items.borrow_mut().push(a.clone()); }
        assert_eq!(a.to_string(), "[[...]]");

        let b = Value::list(vec![]);
        if let Value::List(items) = &b { items.borrow_mut().push(b.clone()); }
        assert!(a.equals(&b));

        let c = Value::record(vec![("n", Value::Number(1.0))]);
        if let Value::Composite(map) = &c {
            map.borrow_mut().insert(b"self".to_vec(), c.clone());
        }
        assert_eq!(c.to_string(), "{n: 1, self: {...}}");
        assert!(!c.equals(&a));
    }

    #[test]
    fn error_chain() {
        let inner = Rc::new(ErrorValue {
            kind: ErrorKind::Assert,
            message: "takes expected 1 arguments, but got 0".to_string(),
            parent: None,
            span: None,
        });
        let outer = Value::wrap(ErrorKind::Runtime, "len()", inner, None);

        if let Value::Error(e) = outer {
            let messages = e.chain().map(|e| e.to_string()).collect::<Vec<_>>();
            assert_eq!(messages, vec![
                "runtime error: len()",
                "assert error: takes expected 1 arguments, but got 0",
            ]);
            assert_eq!(
                e.report(),
                "runtime error: len()\n  assert error: takes expected 1 arguments, but got 0",
            );
        } else {
            panic!("expected an error");
        }
    }
}
