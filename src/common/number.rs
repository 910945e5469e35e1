//! Number formatting and integer checks.
//! Every number is an IEEE double; these helpers decide
//! when a double may be treated as an integer.

/// True if the number has no fractional part
/// and survives a round trip through a 64-bit integer.
pub fn is_integer(n: f64) -> bool {
    n.is_finite() && n == (n as i64) as f64
}

/// Truncates to an integer, if the number is one.
pub fn as_integer(n: f64) -> Option<i64> {
    if is_integer(n) { Some(n as i64) } else { None }
}

/// Formats a number the way the language prints it.
/// Integral values print without a fractional part.
/// Other values use the shortest representation that round-trips,
/// switching to exponent form for very large or very small magnitudes:
/// ```plain
/// 3.0        -> 3
/// 0.5        -> 0.5
/// 1234567.5  -> 1.2345675e+06
/// 0.00001    -> 1e-05
/// ```
pub fn format(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if let Some(i) = as_integer(n) {
        return i.to_string();
    }

    // rust's `{:e}` yields the shortest round-trip digits, i.e. `1.2345675e6`
    let scientific = format!("{:e}", n);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(split) => split,
        None => return scientific,
    };
    let exponent: i32 = match exponent.parse() {
        Ok(e) => e,
        Err(_) => return scientific,
    };

    if exponent < -4 || exponent >= 6 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(format(4.0), "4");
        assert_eq!(format(-12.0), "-12");
        assert_eq!(format(0.0), "0");
        assert!(is_integer(3.0));
        assert!(!is_integer(3.5));
        assert!(!is_integer(f64::INFINITY));
    }

    #[test]
    fn fractions() {
        assert_eq!(format(0.5), "0.5");
        assert_eq!(format(-2.25), "-2.25");
        assert_eq!(format(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn exponents() {
        assert_eq!(format(1234567.5), "1.2345675e+06");
        assert_eq!(format(0.00001), "1e-05");
        assert_eq!(format(0.0001), "0.0001");
        assert_eq!(format(f64::NAN), "NaN");
        assert_eq!(format(f64::NEG_INFINITY), "-Inf");
    }
}
