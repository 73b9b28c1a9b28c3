//! Filters applied after `|` in an expression.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// A named, pure transformation of a resolved value.
///
/// String filters leave non-strings untouched.
///
/// # Examples
///
/// ```
/// use dm_mapper::Filter;
/// use serde_json::json;
///
/// let upper: Filter = "upper".parse().unwrap();
/// assert_eq!(upper.apply(json!("acme")), json!("ACME"));
/// assert_eq!(Filter::Count.apply(json!([1, 2, 3])), json!(3));
/// assert!("shout".parse::<Filter>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Lower,
    Upper,
    Trim,
    /// Uppercases the first character.
    Ucfirst,
    /// Length of a sequence, map or string. `null` counts as 0, any other
    /// scalar as 1.
    Count,
    First,
    Last,
    /// Map keys, or the indices of a sequence.
    Keys,
    Reverse,
    /// Serializes the value to a JSON string.
    Json,
}

/// A filter name that is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown filter `{0}`")]
pub struct UnknownFilter(pub Box<str>);

impl Filter {
    pub const ALL: [Filter; 10] = [
        Self::Lower,
        Self::Upper,
        Self::Trim,
        Self::Ucfirst,
        Self::Count,
        Self::First,
        Self::Last,
        Self::Keys,
        Self::Reverse,
        Self::Json,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Trim => "trim",
            Self::Ucfirst => "ucfirst",
            Self::Count => "count",
            Self::First => "first",
            Self::Last => "last",
            Self::Keys => "keys",
            Self::Reverse => "reverse",
            Self::Json => "json",
        }
    }

    pub fn apply(self, value: Value) -> Value {
        match (self, value) {
            (Self::Lower, Value::String(s)) => Value::String(s.to_lowercase()),
            (Self::Upper, Value::String(s)) => Value::String(s.to_uppercase()),
            (Self::Trim, Value::String(s)) => Value::String(s.trim().into()),
            (Self::Ucfirst, Value::String(s)) => Value::String(ucfirst(&s)),

            (Self::Count, value) => Value::from(count(&value)),

            (Self::First, Value::Array(items)) => items.into_iter().next().unwrap_or(Value::Null),
            (Self::First, Value::String(s)) => s.chars().next().map_or(Value::Null, |c| c.to_string().into()),
            (Self::Last, Value::Array(mut items)) => items.pop().unwrap_or(Value::Null),
            (Self::Last, Value::String(s)) => s.chars().next_back().map_or(Value::Null, |c| c.to_string().into()),

            (Self::Keys, Value::Object(map)) => map.into_iter().map(|(k, _)| Value::String(k)).collect(),
            (Self::Keys, Value::Array(items)) => (0..items.len()).map(Value::from).collect(),
            (Self::Keys, _) => Value::Null,

            (Self::Reverse, Value::Array(mut items)) => {
                items.reverse();
                Value::Array(items)
            }
            (Self::Reverse, Value::String(s)) => Value::String(s.chars().rev().collect()),

            (Self::Json, value) => Value::String(value.to_string()),

            (_, value) => value,
        }
    }
}

fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn count(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        Value::Bool(_) | Value::Number(_) => 1,
    }
}

impl FromStr for Filter {
    type Err = UnknownFilter;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|filter| filter.name() == name)
            .ok_or_else(|| UnknownFilter(name.into()))
    }
}

impl fmt::Display for Filter {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies `filters` left to right.
pub fn apply_all(filters: &[Filter], value: Value) -> Value {
    filters.iter().fold(value, |value, filter| filter.apply(value))
}
