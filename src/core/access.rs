//! Property access and index assignment on containers.

use crate::common::{number, value::Value};

/// Turns a key into the bytes a composite is indexed by.
/// Numbers use their printed form, so `c.1` and `c.('1')` agree.
pub fn composite_key(key: &Value) -> Result<Vec<u8>, String> {
    match key {
        Value::String(s) => Ok(s.borrow().clone()),
        Value::Number(n) => Ok(number::format(*n).into_bytes()),
        _ => Err(format!("cannot use {} as a composite key", key)),
    }
}

/// Lists accept numbers, and strings that parse as numbers.
fn list_index(key: &Value) -> Result<f64, String> {
    match key {
        Value::Number(n) => Ok(*n),
        Value::String(s) => {
            let text = String::from_utf8_lossy(&s.borrow()).into_owned();
            text.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid list index: {:?}", text))
        },
        _ => Err(format!("invalid list index: {}", key)),
    }
}

/// Converts an index into a position within `len`, if it points at an element.
fn in_bounds(index: f64, len: usize) -> Option<usize> {
    if !index.is_finite() || index < 0.0 {
        return None;
    }
    let index = index.trunc() as usize;
    if index < len { Some(index) } else { None }
}

/// A string read out of a container is copied,
/// so a later index-assignment through one binding is not seen through the container.
pub fn detach(value: Value) -> Value {
    match value {
        Value::String(s) => Value::bytes(s.borrow().clone()),
        other => other,
    }
}

/// Reads `receiver.key`.
/// Reads past the end of a list or string, or of a missing composite key, yield `()`.
pub fn get(receiver: &Value, key: &Value) -> Result<Value, String> {
    walk(receiver, key).map(detach)
}

/// Like [`get`], but hands back the stored value itself,
/// for assignments that reach through a path of containers.
pub fn walk(receiver: &Value, key: &Value) -> Result<Value, String> {
    match receiver {
        Value::Composite(c) => {
            let key = composite_key(key)?;
            let found = c.borrow().get(&key).cloned();
            Ok(found.unwrap_or(Value::Null))
        },
        Value::List(l) => {
            let index = list_index(key)?;
            let items = l.borrow();
            Ok(in_bounds(index, items.len()).map_or(Value::Null, |i| items[i].clone()))
        },
        Value::String(s) => {
            let index = match key {
                Value::Number(n) => *n,
                _ => Err(format!("cannot index string {} by non-number {}", receiver, key))?,
            };
            let bytes = s.borrow();
            Ok(in_bounds(index, bytes.len()).map_or(Value::Null, |i| Value::bytes(vec![bytes[i]])))
        },
        _ => Err(format!(
            "cannot access property {} of a non-list/string/composite value {}",
            key, receiver,
        )),
    }
}

/// The integer position a write lands on: inside, or exactly at the end of, `len`.
fn write_index(index: f64, len: usize) -> Result<usize, String> {
    match number::as_integer(index) {
        Some(i) if i >= 0 && (i as usize) <= len => Ok(i as usize),
        Some(i) => Err(format!("index {} out of bounds for length {}", i, len)),
        None => Err(format!("cannot assign at non-integer index {}", number::format(index))),
    }
}

/// Writes `receiver.key = value` in place.
/// Composites upsert.
/// Lists and strings replace in bounds and append at exactly their length.
pub fn set(receiver: &Value, key: &Value, value: Value) -> Result<(), String> {
    match receiver {
        Value::Composite(c) => {
            let key = composite_key(key)?;
            c.borrow_mut().insert(key, value);
        },
        Value::List(l) => {
            let index = list_index(key)?;
            let mut items = l.borrow_mut();
            let index = write_index(index, items.len())?;
            if index < items.len() {
                items[index] = value;
            } else {
                items.push(value);
            }
        },
        Value::String(s) => {
            let index = match key {
                Value::Number(n) => *n,
                _ => Err(format!("cannot index string {} by non-number {}", receiver, key))?,
            };
            // Cloned before borrowing mutably, in case both sides share storage.
            let replacement = match &value {
                Value::String(r) => r.borrow().clone(),
                _ => Err(format!("cannot set part of string to a non-string {}", value))?,
            };
            let mut bytes = s.borrow_mut();
            let index = write_index(index, bytes.len())?;
            let end = (index + replacement.len()).min(bytes.len());
            bytes.splice(index..end, replacement);
        },
        _ => Err(format!("cannot set property {} of a non-composite value {}", key, receiver))?,
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    #[test]
    fn composite_reads() {
        let c = Value::record(vec![("a", n(1.0)), ("2", Value::string("two"))]);
        assert!(get(&c, &Value::string("a")).unwrap().equals(&n(1.0)));
        assert!(get(&c, &n(2.0)).unwrap().equals(&Value::string("two")));
        assert!(matches!(get(&c, &Value::string("zz")).unwrap(), Value::Null));
        assert!(get(&c, &Value::Boolean(true)).is_err());
    }

    #[test]
    fn list_reads() {
        let l = Value::list(vec![n(10.0), n(20.0)]);
        assert!(get(&l, &n(1.0)).unwrap().equals(&n(20.0)));
        assert!(get(&l, &Value::string("0")).unwrap().equals(&n(10.0)));
        assert!(matches!(get(&l, &n(2.0)).unwrap(), Value::Null));
        assert!(matches!(get(&l, &n(-1.0)).unwrap(), Value::Null));
        assert_eq!(get(&l, &Value::string("x")).unwrap_err(), "invalid list index: \"x\"");
    }

    #[test]
    fn string_reads() {
        let s = Value::string("hey");
        assert_eq!(get(&s, &n(1.0)).unwrap().raw(), b"e".to_vec());
        assert!(matches!(get(&s, &n(3.0)).unwrap(), Value::Null));
        assert_eq!(
            get(&n(1.0), &Value::string("x")).unwrap_err(),
            "cannot access property 'x' of a non-list/string/composite value 1",
        );
    }

    #[test]
    fn reads_detach_strings() {
        let l = Value::list(vec![Value::string("ab")]);
        let read = get(&l, &n(0.0)).unwrap();
        set(&read, &n(0.0), Value::string("x")).unwrap();
        assert_eq!(l.to_string(), "['ab']");
    }

    #[test]
    fn walk_shares_strings() {
        let c = Value::record(vec![("name", Value::string("ab"))]);
        let stored = walk(&c, &Value::string("name")).unwrap();
        set(&stored, &n(0.0), Value::string("x")).unwrap();
        assert_eq!(c.to_string(), "{name: 'xb'}");
    }

    #[test]
    fn list_writes() {
        let l = Value::list(vec![n(1.0), n(2.0), n(3.0)]);
        set(&l, &n(0.0), n(9.0)).unwrap();
        set(&l, &n(3.0), n(4.0)).unwrap();
        assert_eq!(l.to_string(), "[9, 2, 3, 4]");
        assert!(set(&l, &n(6.0), n(0.0)).is_err());
        assert!(set(&l, &n(-1.0), n(0.0)).is_err());
        assert!(set(&l, &n(0.5), n(0.0)).is_err());
    }

    #[test]
    fn string_writes() {
        let s = Value::string("hello");
        set(&s, &n(1.0), Value::string("EL")).unwrap();
        assert_eq!(s.raw(), b"hELlo".to_vec());
        set(&s, &n(4.0), Value::string("OOO")).unwrap();
        assert_eq!(s.raw(), b"hELlOOO".to_vec());
        set(&s, &n(7.0), Value::string("!")).unwrap();
        assert_eq!(s.raw(), b"hELlOOO!".to_vec());
        assert!(set(&s, &n(20.0), Value::string("?")).is_err());
        assert!(set(&s, &n(0.0), n(1.0)).is_err());
    }

    #[test]
    fn string_writes_itself() {
        let s = Value::string("ab");
        set(&s, &n(1.0), s.clone()).unwrap();
        assert_eq!(s.raw(), b"aab".to_vec());
    }

    #[test]
    fn composite_writes() {
        let c = Value::record(vec![]);
        set(&c, &Value::string("k"), n(1.0)).unwrap();
        set(&c, &Value::string("k"), n(2.0)).unwrap();
        assert_eq!(c.to_string(), "{k: 2}");
        assert!(set(&Value::Null, &n(0.0), n(1.0)).is_err());
    }

    #[test]
    fn composite_keys_keep_their_bytes() {
        let c = Value::record(vec![]);
        set(&c, &Value::bytes(vec![200]), n(1.0)).unwrap();
        assert!(matches!(get(&c, &Value::bytes(vec![201])).unwrap(), Value::Null));

        set(&c, &Value::bytes(vec![201]), n(2.0)).unwrap();
        assert!(get(&c, &Value::bytes(vec![200])).unwrap().equals(&n(1.0)));
        assert!(get(&c, &Value::bytes(vec![201])).unwrap().equals(&n(2.0)));
        assert_eq!(composite_key(&Value::bytes(vec![0xff, b'a'])).unwrap(), vec![0xff, b'a']);
    }
}
