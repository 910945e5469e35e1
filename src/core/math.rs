use crate::{
    common::{number, value::Value},
    core::ffi::{arity, number_arg, Args, FFI},
};

/// Adds two numbers, concatenates two strings or lists,
/// merges two composites, and ors two booleans.
/// Every result is freshly allocated.
pub fn add(left: &Value, right: &Value) -> Result<Value, String> {
    let result = match (left, right) {
        (Value::Number(l), Value::Number(r)) => Value::Number(l + r),
        (Value::String(l), Value::String(r)) => {
            let mut bytes = l.borrow().clone();
            bytes.extend_from_slice(&r.borrow());
            Value::bytes(bytes)
        },
        (Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(*l || *r),
        (Value::Composite(l), Value::Composite(r)) => {
            let mut merged = l.borrow().clone();
            merged.extend(r.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::composite(merged)
        },
        (Value::List(l), Value::List(r)) => {
            let mut items = l.borrow().clone();
            items.extend(r.borrow().iter().cloned());
            Value::list(items)
        },
        _ => Err(format!("values {} and {} do not support addition", left, right))?,
    };

    Ok(result)
}

/// Subtraction between two numbers.
pub fn sub(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l - r)),
        _ => Err(format!("values {} and {} do not support subtraction", left, right)),
    }
}

/// Multiplication between two numbers, and between two booleans.
pub fn mul(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l * r)),
        (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(*l && *r)),
        _ => Err(format!("values {} and {} do not support multiplication", left, right)),
    }
}

/// Division between two numbers.
/// Division by zero is an error, not an infinity.
pub fn div(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(_), Value::Number(r)) if *r == 0.0 => Err("division by zero error")?,
        (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l / r)),
        _ => Err(format!("values {} and {} do not support division", left, right)),
    }
}

/// Integer remainder, truncating the dividend.
/// The divisor must be a non-zero integer.
pub fn modulus(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(_), Value::Number(r)) if *r == 0.0 => {
            Err("division by zero error in modulus")?
        },
        (Value::Number(l), Value::Number(r)) => match number::as_integer(*r) {
            Some(r) => Ok(Value::Number((*l as i64).wrapping_rem(r) as f64)),
            None => Err(format!("cannot take modulus of non-integer value {}", right)),
        },
        _ => Err(format!("values {} and {} do not support modulus", left, right)),
    }
}

/// Negates a number or inverts a boolean.
pub fn negate(operand: &Value) -> Result<Value, String> {
    match operand {
        Value::Number(n) => Ok(Value::Number(-n)),
        Value::Boolean(b) => Ok(Value::Boolean(!b)),
        Value::Error(_) => Ok(operand.clone()),
        _ => Err(format!("cannot negate non-boolean and non-number value {}", operand)),
    }
}

// Natives

fn unary(args: &Args, f: impl Fn(f64) -> Result<f64, String>) -> Result<Value, String> {
    arity(args, 1)?;
    Ok(Value::Number(f(number_arg(args, 0)?)?))
}

pub fn sin(args: Args) -> Result<Value, String> {
    unary(&args, |n| Ok(n.sin()))
}

pub fn cos(args: Args) -> Result<Value, String> {
    unary(&args, |n| Ok(n.cos()))
}

pub fn asin(args: Args) -> Result<Value, String> {
    unary(&args, |n| {
        if !(-1.0..=1.0).contains(&n) {
            Err(format!("cannot take asin of {}, outside the range [-1, 1]", number::format(n)))?
        }
        Ok(n.asin())
    })
}

pub fn acos(args: Args) -> Result<Value, String> {
    unary(&args, |n| {
        if !(-1.0..=1.0).contains(&n) {
            Err(format!("cannot take acos of {}, outside the range [-1, 1]", number::format(n)))?
        }
        Ok(n.acos())
    })
}

pub fn ln(args: Args) -> Result<Value, String> {
    unary(&args, |n| {
        if n <= 0.0 {
            Err(format!("cannot take natural logarithm of non-positive number {}", number::format(n)))?
        }
        Ok(n.ln())
    })
}

/// Truncates toward zero.
pub fn floor(args: Args) -> Result<Value, String> {
    unary(&args, |n| Ok(n.trunc()))
}

pub fn pow(args: Args) -> Result<Value, String> {
    arity(&args, 2)?;
    let base = number_arg(&args, 0)?;
    let exp = number_arg(&args, 1)?;

    if base == 0.0 && exp == 0.0 {
        Err("math error, pow(0, 0) is not defined")?
    }
    if base < 0.0 && !number::is_integer(exp) {
        Err(format!(
            "math error, fractional power {} of negative number {}",
            number::format(exp),
            number::format(base),
        ))?
    }

    Ok(Value::Number(base.powf(exp)))
}

pub fn register(ffi: &mut FFI) {
    ffi.pure("sin", sin);
    ffi.pure("cos", cos);
    ffi.pure("asin", asin);
    ffi.pure("acos", acos);
    ffi.pure("pow", pow);
    ffi.pure("ln", ln);
    ffi.pure("floor", floor);
}

#[cfg(test)]
mod test {
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    fn s(x: &str) -> Value {
        Value::string(x)
    }

    #[test]
    fn arithmetic() {
        assert!(add(&n(2.0), &n(2.0)).unwrap().equals(&n(4.0)));
        assert!(sub(&n(2.0), &n(5.0)).unwrap().equals(&n(-3.0)));
        assert!(mul(&n(3.0), &n(1.5)).unwrap().equals(&n(4.5)));
        assert!(div(&n(1.0), &n(4.0)).unwrap().equals(&n(0.25)));
        assert!(modulus(&n(7.5), &n(2.0)).unwrap().equals(&n(1.0)));
        assert!(modulus(&n(-7.0), &n(2.0)).unwrap().equals(&n(-1.0)));
    }

    #[test]
    fn modulus_at_integer_bounds() {
        let min = -9223372036854775808.0;
        assert!(modulus(&n(min), &n(-1.0)).unwrap().equals(&n(0.0)));
        assert!(modulus(&n(min), &n(3.0)).unwrap().equals(&n(-2.0)));
    }

    #[test]
    fn arithmetic_errors() {
        assert_eq!(div(&n(1.0), &n(0.0)).unwrap_err(), "division by zero error");
        assert_eq!(modulus(&n(1.0), &n(0.0)).unwrap_err(), "division by zero error in modulus");
        assert_eq!(
            modulus(&n(1.0), &n(0.5)).unwrap_err(),
            "cannot take modulus of non-integer value 0.5",
        );
        assert_eq!(
            sub(&s("a"), &n(1.0)).unwrap_err(),
            "values 'a' and 1 do not support subtraction",
        );
    }

    #[test]
    fn concatenation_allocates() {
        let a = s("ab");
        let b = add(&a, &s("c")).unwrap();

        if let (Value::String(a), Value::String(b)) = (&a, &b) {
            assert!(!std::rc::Rc::ptr_eq(a, b));
            b.borrow_mut()[0] = b'x';
            assert_eq!(&*a.borrow(), b"ab");
            assert_eq!(&*b.borrow(), b"xbc");
        } else {
            panic!("expected strings");
        }
    }

    #[test]
    fn merging() {
        let left = Value::record(vec![("a", n(1.0)), ("b", n(2.0))]);
        let right = Value::record(vec![("b", n(3.0))]);
        let merged = add(&left, &right).unwrap();
        assert_eq!(merged.to_string(), "{a: 1, b: 3}");
        assert_eq!(left.to_string(), "{a: 1, b: 2}");

        let joined = add(&Value::list(vec![n(1.0)]), &Value::list(vec![n(2.0)])).unwrap();
        assert_eq!(joined.to_string(), "[1, 2]");
    }

    #[test]
    fn negation() {
        assert!(negate(&n(3.0)).unwrap().equals(&n(-3.0)));
        assert!(negate(&Value::Boolean(true)).unwrap().equals(&Value::Boolean(false)));
        assert!(negate(&s("x")).is_err());
    }

    #[test]
    fn domains() {
        assert!(asin(vec![n(2.0)]).is_err());
        assert!(acos(vec![n(-1.0)]).is_ok());
        assert!(ln(vec![n(0.0)]).is_err());
        assert!(pow(vec![n(0.0), n(0.0)]).is_err());
        assert!(pow(vec![n(-8.0), n(0.5)]).is_err());
        assert!(pow(vec![n(-2.0), n(3.0)]).unwrap().equals(&n(-8.0)));
        assert!(floor(vec![n(-2.5)]).unwrap().equals(&n(-2.0)));
        assert!(sin(vec![]).is_err());
    }
}
