use crate::common::{number, value::Value};

/// Which of the three bitwise-or-logical operators to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bitwise {
    And,
    Or,
    Xor,
}

impl Bitwise {
    fn symbol(self) -> &'static str {
        match self {
            Bitwise::And => "&",
            Bitwise::Or  => "|",
            Bitwise::Xor => "^",
        }
    }

    fn integers(self, l: i64, r: i64) -> i64 {
        match self {
            Bitwise::And => l & r,
            Bitwise::Or  => l | r,
            Bitwise::Xor => l ^ r,
        }
    }

    fn bytes(self, l: u8, r: u8) -> u8 {
        match self {
            Bitwise::And => l & r,
            Bitwise::Or  => l | r,
            Bitwise::Xor => l ^ r,
        }
    }

    fn booleans(self, l: bool, r: bool) -> bool {
        match self {
            Bitwise::And => l && r,
            Bitwise::Or  => l || r,
            Bitwise::Xor => l != r,
        }
    }
}

/// Strings are combined byte by byte,
/// the shorter one padded with zeroes to the length of the longer.
fn zip_bytes(op: Bitwise, left: &[u8], right: &[u8]) -> Vec<u8> {
    let len = left.len().max(right.len());
    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            op.bytes(l, r)
        })
        .collect()
}

fn bitwise(op: Bitwise, left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            match (number::as_integer(*l), number::as_integer(*r)) {
                (Some(l), Some(r)) => Ok(Value::Number(op.integers(l, r) as f64)),
                _ => Err(format!(
                    "cannot take logical {} of non-integer values {}, {}",
                    op.symbol(), left, right,
                )),
            }
        },
        (Value::String(l), Value::String(r)) => {
            let bytes = zip_bytes(op, &l.borrow(), &r.borrow());
            Ok(Value::bytes(bytes))
        },
        (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(op.booleans(*l, *r))),
        _ => Err(format!(
            "values {} and {} do not support bitwise or logical {}",
            left, right, op.symbol(),
        )),
    }
}

pub fn and(left: &Value, right: &Value) -> Result<Value, String> {
    bitwise(Bitwise::And, left, right)
}

pub fn or(left: &Value, right: &Value) -> Result<Value, String> {
    bitwise(Bitwise::Or, left, right)
}

pub fn xor(left: &Value, right: &Value) -> Result<Value, String> {
    bitwise(Bitwise::Xor, left, right)
}

/// Only numbers and strings are ordered.
/// Strings compare by bytes.
pub fn greater(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(l > r)),
        (Value::String(l), Value::String(r)) => Ok(Value::Boolean(*l.borrow() > *r.borrow())),
        _ => Err(format!("values {} and {} do not support comparison", left, right)),
    }
}

pub fn less(left: &Value, right: &Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Boolean(l < r)),
        (Value::String(l), Value::String(r)) => Ok(Value::Boolean(*l.borrow() < *r.borrow())),
        _ => Err(format!("values {} and {} do not support comparison", left, right)),
    }
}

/// Equality never fails; see [`Value::equals`].
pub fn equal(left: &Value, right: &Value) -> Result<Value, String> {
    Ok(Value::Boolean(left.equals(right)))
}
