//! This module provides the core language library:
//! the semantics of every operator,
//! and the natives loaded into the root scope of each program.

pub mod ffi;

pub mod access;
pub mod control;
pub mod convert;
pub mod io;
pub mod logic;
pub mod math;

use crate::common::{
    operator::{BinaryOp, UnaryOp},
    value::Value,
};
use ffi::FFI;

/// Applies a unary operator.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, String> {
    match op {
        UnaryOp::Negate => math::negate(operand),
    }
}

/// Applies a binary operator.
/// An error operand is passed through as the result, right operand first.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, String> {
    if right.is_error() {
        return Ok(right.clone());
    }
    if left.is_error() {
        return Ok(left.clone());
    }

    match op {
        BinaryOp::Add     => math::add(left, right),
        BinaryOp::Sub     => math::sub(left, right),
        BinaryOp::Mul     => math::mul(left, right),
        BinaryOp::Div     => math::div(left, right),
        BinaryOp::Mod     => math::modulus(left, right),
        BinaryOp::And     => logic::and(left, right),
        BinaryOp::Or      => logic::or(left, right),
        BinaryOp::Xor     => logic::xor(left, right),
        BinaryOp::Greater => logic::greater(left, right),
        BinaryOp::Less    => logic::less(left, right),
        BinaryOp::Equal   => logic::equal(left, right),
        BinaryOp::Access  => access::get(left, right),
        BinaryOp::Define  => Err("a definition is not a value operator".to_string()),
    }
}

/// Returns the core FFI: every native, in root scope order.
pub fn ffi_core() -> FFI {
    let mut ffi = FFI::new();

    convert::register(&mut ffi);
    math::register(&mut ffi);

    ffi.add("out", io::out);
    ffi.add("args", io::args);
    ffi.add("env", io::env);
    ffi.add("time", io::time);
    ffi.add("rand", io::rand);
    ffi.add("urand", io::urand);
    ffi.add("exit", control::exit);
    ffi.add("wait", control::wait);
    ffi.add("in", io::stdin);
    ffi.add("read", io::read);
    ffi.add("write", io::write);
    ffi.add("delete", io::delete);
    ffi.add("dir", io::dir);
    ffi.add("stat", io::stat);
    ffi.add("make", io::make);
    ffi.add("exec", io::exec);
    ffi.add("import", control::import);

    ffi
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::value::ErrorKind;

    #[test]
    fn errors_pass_through() {
        let left = Value::error(ErrorKind::Runtime, "left", None);
        let right = Value::error(ErrorKind::Runtime, "right", None);

        let result = binary(BinaryOp::Add, &left, &right).unwrap();
        assert_eq!(result.to_string(), "runtime error: right");
        let result = binary(BinaryOp::Mul, &left, &Value::Number(1.0)).unwrap();
        assert_eq!(result.to_string(), "runtime error: left");
    }

    #[test]
    fn catalogue_order() {
        let names = ffi_core().names();
        assert_eq!(&names[..3], &["len", "type", "keys"]);
        assert_eq!(names.last().map(|n| n.as_str()), Some("import"));
        assert_eq!(names.len(), 31);
    }
}
