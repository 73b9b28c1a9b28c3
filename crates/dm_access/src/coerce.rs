//! Lenient conversions used by the typed getters of [`DataAccessor`].
//!
//! Every function returns a [`CoercionError`] instead of panicking; the
//! accessor turns that into `None` or the caller's default.
//!
//! [`DataAccessor`]: crate::DataAccessor

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::Value;
use thiserror::Error;

/// A value that has no sensible reading as the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot read {found} as {expected}")]
pub struct CoercionError {
    pub expected: &'static str,
    pub found: &'static str,
}

#[cold]
fn fail(expected: &'static str, value: &Value) -> CoercionError {
    CoercionError {
        expected,
        found: kind_name(value),
    }
}

/// Short lowercase name of a value's kind, as used in error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strings pass through; numbers and booleans are formatted.
///
/// ```
/// use dm_access::coerce::to_string;
/// use serde_json::json;
///
/// assert_eq!(to_string(&json!(4.5)).unwrap(), "4.5");
/// assert!(to_string(&json!([1])).is_err());
/// ```
pub fn to_string(value: &Value) -> Result<String, CoercionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(fail("string", value)),
    }
}

/// Integers, integral floats, numeric strings and booleans.
///
/// ```
/// use dm_access::coerce::to_int;
/// use serde_json::json;
///
/// assert_eq!(to_int(&json!(" 42 ")).unwrap(), 42);
/// assert_eq!(to_int(&json!(3.0)).unwrap(), 3);
/// assert!(to_int(&json!(3.5)).is_err());
/// ```
pub fn to_int(value: &Value) -> Result<i64, CoercionError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    Ok(f as i64)
                }
                _ => Err(fail("int", value)),
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(i);
            }
            match trimmed.parse::<f64>() {
                Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
                _ => Err(fail("int", value)),
            }
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        _ => Err(fail("int", value)),
    }
}

/// Numbers, numeric strings and booleans.
pub fn to_float(value: &Value) -> Result<f64, CoercionError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| fail("float", value)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(f),
            _ => Err(fail("float", value)),
        },
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        _ => Err(fail("float", value)),
    }
}

/// Booleans, `0`/`1`, and the usual truthy/falsy words.
///
/// The empty string reads as `false`.
///
/// ```
/// use dm_access::coerce::to_bool;
/// use serde_json::json;
///
/// assert!(to_bool(&json!("Yes")).unwrap());
/// assert!(!to_bool(&json!(0)).unwrap());
/// assert!(to_bool(&json!(2)).is_err());
/// ```
pub fn to_bool(value: &Value) -> Result<bool, CoercionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Ok(false),
            Some(f) if f == 1.0 => Ok(true),
            _ => Err(fail("bool", value)),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            _ => Err(fail("bool", value)),
        },
        _ => Err(fail("bool", value)),
    }
}

/// Sequence elements, or the values of a map in insertion order.
pub fn to_array(value: &Value) -> Result<Vec<Value>, CoercionError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map.values().cloned().collect()),
        _ => Err(fail("array", value)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn int_coercions() {
        assert_eq!(to_int(&json!(7)), Ok(7));
        assert_eq!(to_int(&json!(-2.0)), Ok(-2));
        assert_eq!(to_int(&json!("12")), Ok(12));
        assert_eq!(to_int(&json!("12.0")), Ok(12));
        assert_eq!(to_int(&json!(true)), Ok(1));
        assert_eq!(
            to_int(&json!("twelve")),
            Err(CoercionError {
                expected: "int",
                found: "string"
            })
        );
        assert!(to_int(&json!(null)).is_err());
    }

    #[test]
    fn float_and_string_coercions() {
        assert_eq!(to_float(&json!("2.5")), Ok(2.5));
        assert_eq!(to_float(&json!(false)), Ok(0.0));
        assert!(to_float(&json!({})).is_err());
        assert_eq!(to_string(&json!(true)).unwrap(), "true");
        assert_eq!(to_string(&json!(10)).unwrap(), "10");
        assert!(to_string(&json!(null)).is_err());
    }

    #[test]
    fn bool_words() {
        for word in ["true", "1", "yes", "ON"] {
            assert_eq!(to_bool(&json!(word)), Ok(true), "{word}");
        }
        for word in ["false", "0", "no", "off", ""] {
            assert_eq!(to_bool(&json!(word)), Ok(false), "{word}");
        }
        assert!(to_bool(&json!("maybe")).is_err());
    }

    #[test]
    fn arrays_from_maps() {
        assert_eq!(
            to_array(&json!({ "b": 1, "a": 2 })).unwrap(),
            [json!(1), json!(2)]
        );
        assert_eq!(to_array(&json!([true])).unwrap(), [json!(true)]);
        assert_eq!(to_array(&json!("x")).unwrap_err().to_string(), "cannot read string as array");
    }
}
