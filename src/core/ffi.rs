use std::{
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

use crate::{
    common::{
        span::Span,
        value::{ErrorKind, ErrorValue, Kind, Value},
    },
    engine::Context,
};

/// The arguments a native is called with, already evaluated.
pub type Args = Vec<Value>;

type NativeFn = dyn Fn(&mut Context, &Span, Args) -> Value;

/// A function implemented in Rust, callable from programs.
/// Natives are compared by name.
#[derive(Clone)]
pub struct Native {
    name: Rc<str>,
    exec: Rc<NativeFn>,
}

impl Native {
    pub fn new(
        name: &str,
        exec: impl Fn(&mut Context, &Span, Args) -> Value + 'static,
    ) -> Native {
        Native { name: Rc::from(name), exec: Rc::new(exec) }
    }

    /// Builds a native from a fallible routine.
    /// An `Err` becomes an assertion error, wrapped in a runtime error naming the native.
    pub fn checked(
        name: &str,
        exec: impl Fn(&mut Context, &Span, Args) -> Result<Value, String> + 'static,
    ) -> Native {
        let label = format!("{}()", name);
        Native::new(name, move |context, span, args| {
            match exec(context, span, args) {
                Ok(value) => value,
                Err(message) => {
                    let cause = Rc::new(ErrorValue {
                        kind: ErrorKind::Assert,
                        message,
                        parent: None,
                        span: Some(span.clone()),
                    });
                    Value::wrap(ErrorKind::Runtime, label.clone(), cause, Some(span.clone()))
                },
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn call(&self, context: &mut Context, span: &Span, args: Args) -> Value {
        (self.exec)(context, span, args)
    }
}

impl Debug for Native {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}

/// A foreign functional interface, an ordered table of natives.
/// The order is the slot order of the root scope,
/// so the compiler and the VM agree on where each native lives.
#[derive(Debug, Clone, Default)]
pub struct FFI {
    natives: Vec<Native>,
}

impl FFI {
    /// Creates a new empty Foreign Functional Interface.
    pub fn new() -> FFI {
        FFI { natives: vec![] }
    }

    /// Returns true if the function had not already been added to the `FFI`.
    /// A native registered twice replaces the earlier one in place.
    pub fn insert(&mut self, native: Native) -> bool {
        match self.natives.iter().position(|n| n.name() == native.name()) {
            Some(index) => {
                log::warn!("native `{}` registered twice", native.name());
                self.natives[index] = native;
                false
            },
            None => {
                self.natives.push(native);
                true
            },
        }
    }

    /// Adds a native that can reach the engine context.
    pub fn add(
        &mut self,
        name: &str,
        exec: impl Fn(&mut Context, &Span, Args) -> Result<Value, String> + 'static,
    ) -> bool {
        self.insert(Native::checked(name, exec))
    }

    /// Adds a native that only depends on its arguments.
    pub fn pure(&mut self, name: &str, exec: fn(Args) -> Result<Value, String>) -> bool {
        self.add(name, move |_, _, args| exec(args))
    }

    pub fn natives(&self) -> &[Native] {
        &self.natives
    }

    pub fn names(&self) -> Vec<String> {
        self.natives.iter().map(|n| n.name().to_string()).collect()
    }
}

// Argument validation.
// Messages number arguments from zero.

pub fn arity(args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        Err(format!("takes expected {} arguments, but got {}", expected, args.len()))?
    }
    Ok(())
}

fn mismatch(args: &[Value], index: usize, expected: Kind) -> String {
    match args.get(index) {
        Some(Value::Error(e)) => {
            format!("{}-th argument must be {}, but got ERROR: {}", index, expected, e)
        },
        got => {
            let got = got.map_or(Kind::Null, |a| a.kind());
            format!("{}-th argument must be {}, but got {}", index, expected, got)
        },
    }
}

pub fn number_arg(args: &[Value], index: usize) -> Result<f64, String> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        _ => Err(mismatch(args, index, Kind::Number)),
    }
}

pub fn string_arg(args: &[Value], index: usize) -> Result<Vec<u8>, String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.borrow().clone()),
        _ => Err(mismatch(args, index, Kind::String)),
    }
}

/// A list whose items are all strings.
pub fn string_list_arg(args: &[Value], index: usize) -> Result<Vec<Vec<u8>>, String> {
    let items = match args.get(index) {
        Some(Value::List(items)) => items.borrow().clone(),
        _ => Err(mismatch(args, index, Kind::List))?,
    };
    items.iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.borrow().clone()),
            other => Err(format!(
                "{}-th argument must contain strings, but got {}",
                index,
                other.kind(),
            )),
        })
        .collect()
}

pub fn function_arg(args: &[Value], index: usize) -> Result<Value, String> {
    match args.get(index) {
        Some(f @ Value::Function(_)) | Some(f @ Value::Native(_)) => Ok(f.clone()),
        _ => Err(mismatch(args, index, Kind::Function)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation_messages() {
        let args = vec![Value::Number(1.0), Value::string("x")];
        assert_eq!(arity(&args, 3).unwrap_err(), "takes expected 3 arguments, but got 2");
        assert!(arity(&args, 2).is_ok());
        assert_eq!(
            number_arg(&args, 1).unwrap_err(),
            "1-th argument must be number, but got string",
        );
        assert_eq!(
            string_arg(&args, 0).unwrap_err(),
            "0-th argument must be string, but got number",
        );
        let failed = vec![Value::error(ErrorKind::Runtime, "oops", None)];
        assert_eq!(
            number_arg(&failed, 0).unwrap_err(),
            "0-th argument must be number, but got ERROR: runtime error: oops",
        );
        assert_eq!(number_arg(&args, 0), Ok(1.0));
    }

    #[test]
    fn string_lists() {
        let args = vec![
            Value::list(vec![Value::string("-l"), Value::string("a")]),
            Value::list(vec![Value::string("-l"), Value::Number(2.0)]),
        ];
        assert_eq!(string_list_arg(&args, 0).unwrap(), vec![b"-l".to_vec(), b"a".to_vec()]);
        assert_eq!(
            string_list_arg(&args, 1).unwrap_err(),
            "1-th argument must contain strings, but got number",
        );
        assert_eq!(
            string_list_arg(&[Value::Null], 0).unwrap_err(),
            "0-th argument must be list, but got ()",
        );
    }

    #[test]
    fn ordered_registry() {
        let mut ffi = FFI::new();
        assert!(ffi.pure("a", |_| Ok(Value::Null)));
        assert!(ffi.pure("b", |_| Ok(Value::Null)));
        assert!(!ffi.pure("a", |_| Ok(Value::Empty)));
        assert_eq!(ffi.names(), vec!["a", "b"]);
    }
}
