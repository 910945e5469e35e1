use crate::{
    common::value::Value,
    core::ffi::{arity, number_arg, string_arg, Args, FFI},
};

// Introspection

/// Byte length of a string, or the number of entries in a list or composite.
pub fn len(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let length = match &args[0] {
        Value::String(s)    => s.borrow().len(),
        Value::List(l)      => l.borrow().len(),
        Value::Composite(c) => c.borrow().len(),
        other => Err(format!("len() takes a string or composite value, but got {}", other))?,
    };
    Ok(Value::Number(length as f64))
}

pub fn kind(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    Ok(Value::string(args[0].kind().name()))
}

/// The sorted keys of a composite, or the indices of a list.
pub fn keys(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let keys: Vec<Value> = match &args[0] {
        Value::Composite(c) => c.borrow().keys().map(|k| Value::bytes(k.clone())).collect(),
        Value::List(l) => (0..l.borrow().len()).map(|i| Value::Number(i as f64)).collect(),
        other => Err(format!("keys() takes a list or composite value, but got {}", other))?,
    };
    Ok(Value::list(keys))
}

// Conversions

/// Strings are returned as-is; everything else is printed.
pub fn string(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    Ok(Value::bytes(args[0].raw()))
}

/// Parses a string, returning `()` if it is not a number.
pub fn number(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let result = match &args[0] {
        Value::String(s) => String::from_utf8_lossy(&s.borrow())
            .trim()
            .parse::<f64>()
            .map_or(Value::Null, Value::Number),
        Value::Number(n)  => Value::Number(*n),
        Value::Boolean(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
        _ => Value::Number(0.0),
    };
    Ok(result)
}

/// The first byte of a string.
pub fn point(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let bytes = string_arg(&args, 0)?;
    match bytes.first() {
        Some(b) => Ok(Value::Number(*b as f64)),
        None => Err("argument must be of length at least 1".to_string()),
    }
}

/// A single-byte string.
/// The code is truncated to a byte.
pub fn char(args: Args) -> Result<Value, String> {
    arity(&args, 1)?;
    let code = number_arg(&args, 0)?;
    Ok(Value::bytes(vec![code as i64 as u8]))
}

pub fn register(ffi: &mut FFI) {
    ffi.pure("len", len);
    ffi.pure("type", kind);
    ffi.pure("keys", keys);
    ffi.pure("string", string);
    ffi.pure("number", number);
    ffi.pure("point", point);
    ffi.pure("char", char);
}
