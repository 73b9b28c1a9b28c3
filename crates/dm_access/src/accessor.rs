use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::{Map, Value};

use crate::coerce::{self, CoercionError};
use crate::path::{IntoPath, Path, PathSyntaxError};
use crate::wildcard::{self, Matches};

// -----------------------------------------------------------------------------
// Resolved

/// The outcome of a read.
///
/// Concrete paths produce [`Resolved::Missing`] or [`Resolved::Single`];
/// paths containing `*` always produce [`Resolved::Wildcard`], possibly empty.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'g> {
    Missing,
    Single(&'g Value),
    Wildcard(Matches<'g>),
}

impl<'g> Resolved<'g> {
    /// Number of values found.
    pub fn len(&self) -> usize {
        match self {
            Self::Missing => 0,
            Self::Single(_) => 1,
            Self::Wildcard(matches) => matches.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The single value of a concrete read.
    #[inline]
    pub fn as_single(&self) -> Option<&'g Value> {
        match self {
            Self::Single(value) => Some(value),
            _ => None,
        }
    }

    /// Every value found, in natural order.
    pub fn values(&self) -> Vec<&'g Value> {
        match self {
            Self::Missing => Vec::new(),
            Self::Single(value) => alloc::vec![*value],
            Self::Wildcard(matches) => matches.values().collect(),
        }
    }

    /// Missing becomes `null`, a single value is cloned, and wildcard
    /// matches become an object keyed by synthetic path.
    pub fn into_value(self) -> Value {
        match self {
            Self::Missing => Value::Null,
            Self::Single(value) => value.clone(),
            Self::Wildcard(matches) => matches.into_value(),
        }
    }
}

// -----------------------------------------------------------------------------
// DataAccessor

/// Read-only view over a borrowed graph.
///
/// Only malformed paths are errors. Absent values read as `None`, and typed
/// getters fall back to `None` (or the default) when the value does not
/// coerce.
///
/// # Examples
///
/// ```
/// use dm_access::DataAccessor;
/// use serde_json::json;
///
/// let graph = json!({ "user": { "age": "30", "tags": { "a": 1, "b": 2 } } });
/// let reader = DataAccessor::new(&graph);
///
/// assert_eq!(reader.get_int("user.age").unwrap(), Some(30));
/// assert_eq!(reader.get_bool_or("user.active", true).unwrap(), true);
/// assert_eq!(reader.get_array("user.tags").unwrap().unwrap().len(), 2);
/// assert!(reader.get("user..age").is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DataAccessor<'g> {
    root: &'g Value,
}

impl<'g> DataAccessor<'g> {
    #[inline]
    pub const fn new(root: &'g Value) -> Self {
        Self { root }
    }

    /// The graph being read.
    #[inline]
    pub const fn root(&self) -> &'g Value {
        self.root
    }

    /// Reads `path`.
    pub fn get(&self, path: impl IntoPath) -> Result<Resolved<'g>, PathSyntaxError> {
        Ok(self.resolve(&path.into_path()?))
    }

    /// Reads an already parsed path.
    pub fn resolve(&self, path: &Path) -> Resolved<'g> {
        if path.has_wildcard() {
            return Resolved::Wildcard(wildcard::resolve(self.root, path));
        }
        let mut node = self.root;
        for segment in path.segments() {
            match wildcard::step(node, segment) {
                Some(next) => node = next,
                None => return Resolved::Missing,
            }
        }
        Resolved::Single(node)
    }

    /// Reads `path` as an owned value; see [`Resolved::into_value`].
    ///
    /// A missing concrete path is `None`, an explicit `null` is `Some(Null)`.
    pub fn get_value(&self, path: impl IntoPath) -> Result<Option<Value>, PathSyntaxError> {
        Ok(match self.get(path)? {
            Resolved::Missing => None,
            other => Some(other.into_value()),
        })
    }

    /// Returns `true` if `path` exists. A wildcard path exists when it matches
    /// at least once.
    pub fn has(&self, path: impl IntoPath) -> Result<bool, PathSyntaxError> {
        Ok(!self.get(path)?.is_empty())
    }

    /// Reads several paths into an ordered map keyed by the path strings.
    /// Missing paths map to `null`.
    pub fn get_many<I, P>(&self, paths: I) -> Result<Map<String, Value>, PathSyntaxError>
    where
        I: IntoIterator<Item = P>,
        P: IntoPath,
    {
        let mut out = Map::new();
        for path in paths {
            let path = path.into_path()?;
            let value = self.resolve(&path).into_value();
            out.insert(path.to_string(), value);
        }
        Ok(out)
    }

    fn typed<T>(
        &self,
        path: impl IntoPath,
        convert: fn(&Value) -> Result<T, CoercionError>,
    ) -> Result<Option<T>, PathSyntaxError> {
        let path = path.into_path()?;
        let Some(value) = self.resolve(&path).as_single() else {
            return Ok(None);
        };
        match convert(value) {
            Ok(v) => Ok(Some(v)),
            Err(err) => {
                log::trace!("`{path}`: {err}");
                Ok(None)
            }
        }
    }

    pub fn get_string(&self, path: impl IntoPath) -> Result<Option<String>, PathSyntaxError> {
        self.typed(path, coerce::to_string)
    }

    pub fn get_int(&self, path: impl IntoPath) -> Result<Option<i64>, PathSyntaxError> {
        self.typed(path, coerce::to_int)
    }

    pub fn get_float(&self, path: impl IntoPath) -> Result<Option<f64>, PathSyntaxError> {
        self.typed(path, coerce::to_float)
    }

    pub fn get_bool(&self, path: impl IntoPath) -> Result<Option<bool>, PathSyntaxError> {
        self.typed(path, coerce::to_bool)
    }

    /// Reads a sequence. Maps give their values; a wildcard path gives the
    /// matched values.
    pub fn get_array(&self, path: impl IntoPath) -> Result<Option<Vec<Value>>, PathSyntaxError> {
        let path = path.into_path()?;
        match self.resolve(&path) {
            Resolved::Missing => Ok(None),
            Resolved::Wildcard(matches) => Ok(Some(matches.values().cloned().collect())),
            Resolved::Single(value) => match coerce::to_array(value) {
                Ok(items) => Ok(Some(items)),
                Err(err) => {
                    log::trace!("`{path}`: {err}");
                    Ok(None)
                }
            },
        }
    }

    pub fn get_string_or(
        &self,
        path: impl IntoPath,
        default: impl Into<String>,
    ) -> Result<String, PathSyntaxError> {
        Ok(self.get_string(path)?.unwrap_or_else(|| default.into()))
    }

    pub fn get_int_or(&self, path: impl IntoPath, default: i64) -> Result<i64, PathSyntaxError> {
        Ok(self.get_int(path)?.unwrap_or(default))
    }

    pub fn get_float_or(&self, path: impl IntoPath, default: f64) -> Result<f64, PathSyntaxError> {
        Ok(self.get_float(path)?.unwrap_or(default))
    }

    pub fn get_bool_or(&self, path: impl IntoPath, default: bool) -> Result<bool, PathSyntaxError> {
        Ok(self.get_bool(path)?.unwrap_or(default))
    }

    pub fn get_array_or(
        &self,
        path: impl IntoPath,
        default: Vec<Value>,
    ) -> Result<Vec<Value>, PathSyntaxError> {
        Ok(self.get_array(path)?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{DataAccessor, Resolved};

    #[test]
    fn concrete_reads() {
        let graph = json!({ "a": { "b": [10, { "c": null }] }, "m": { "0": "zero" } });
        let reader = DataAccessor::new(&graph);

        assert_eq!(reader.get("a.b.0").unwrap(), Resolved::Single(&json!(10)));
        assert_eq!(reader.get_value("a.b.1.c").unwrap(), Some(Value::Null));
        assert_eq!(reader.get_value("a.b.5").unwrap(), None);
        assert_eq!(reader.get_value("a.b.0.deeper").unwrap(), None);
        assert_eq!(reader.get_string("m.0").unwrap().as_deref(), Some("zero"));
        assert!(reader.get("a.x").unwrap().is_missing());
    }

    #[test]
    fn padded_digits_read_as_indices() {
        let graph = json!({ "a": [0, 1, 2, 3, 4, 5, 6, "seventh"], "m": { "7": "key" } });
        let reader = DataAccessor::new(&graph);

        assert_eq!(reader.get("a.007").unwrap(), Resolved::Single(&json!("seventh")));
        assert_eq!(reader.get("a.00").unwrap(), Resolved::Single(&json!(0)));
        assert_eq!(reader.get_string("m.07").unwrap().as_deref(), Some("key"));
    }

    #[test]
    fn wildcard_reads() {
        let graph = json!({ "departments": [
            { "name": "d0" }, { "name": "d1" }, { "name": "d2" }
        ]});
        let reader = DataAccessor::new(&graph);

        let resolved = reader.get("departments.*.name").unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(
            resolved.into_value(),
            json!({
                "departments.0.name": "d0",
                "departments.1.name": "d1",
                "departments.2.name": "d2",
            })
        );
        assert_eq!(
            reader.get_array("departments.*.name").unwrap().unwrap(),
            [json!("d0"), json!("d1"), json!("d2")]
        );
        assert!(!reader.has("departments.*.missing").unwrap());
        // Typed scalar getters only read concrete paths.
        assert_eq!(reader.get_string("departments.*.name").unwrap(), None);
    }

    #[test]
    fn typed_fallbacks() {
        let graph = json!({ "n": "abc", "f": "1.5", "flag": "off" });
        let reader = DataAccessor::new(&graph);

        assert_eq!(reader.get_int("n").unwrap(), None);
        assert_eq!(reader.get_int_or("n", -1).unwrap(), -1);
        assert_eq!(reader.get_float_or("f", 0.0).unwrap(), 1.5);
        assert_eq!(reader.get_bool("flag").unwrap(), Some(false));
        assert_eq!(reader.get_string_or("missing", "dflt").unwrap(), "dflt");
        assert_eq!(reader.get_array_or("n", vec![json!(1)]).unwrap(), [json!(1)]);
        assert!(reader.get_int_or("bad..path", 0).is_err());
    }

    #[test]
    fn get_many_keeps_order() {
        let graph = json!({ "a": 1, "b": 2 });
        let reader = DataAccessor::new(&graph);
        let many = reader.get_many(["b", "a", "c"]).unwrap();
        assert_eq!(Value::Object(many), json!({ "b": 2, "a": 1, "c": null }));
    }
}
