use alloc::string::{String, ToString};
use core::fmt;

use dm_access::{DataAccessor, IntoPath, PathSyntaxError, Value};

/// The target produced by one [`DataMapper::map`] call.
///
/// Read-only; take ownership of the graph with [`into_target`](Self::into_target).
///
/// [`DataMapper::map`]: crate::DataMapper::map
#[derive(Debug, Clone, PartialEq)]
pub struct DataMapperResult {
    target: Value,
}

impl DataMapperResult {
    #[inline]
    pub(crate) fn new(target: Value) -> Self {
        Self { target }
    }

    #[inline]
    pub fn as_value(&self) -> &Value {
        &self.target
    }

    /// Compact JSON.
    #[inline]
    pub fn to_json(&self) -> String {
        self.target.to_string()
    }

    /// Indented JSON.
    #[inline]
    pub fn to_json_pretty(&self) -> String {
        alloc::format!("{:#}", self.target)
    }

    /// Reads one path of the target; see [`DataAccessor::get_value`].
    #[inline]
    pub fn get(&self, path: impl IntoPath) -> Result<Option<Value>, PathSyntaxError> {
        self.reader().get_value(path)
    }

    #[inline]
    pub fn reader(&self) -> DataAccessor<'_> {
        DataAccessor::new(&self.target)
    }

    #[inline]
    pub fn into_target(self) -> Value {
        self.target
    }
}

impl AsRef<Value> for DataMapperResult {
    #[inline]
    fn as_ref(&self) -> &Value {
        &self.target
    }
}

impl From<DataMapperResult> for Value {
    #[inline]
    fn from(result: DataMapperResult) -> Self {
        result.target
    }
}

impl fmt::Display for DataMapperResult {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.target, f)
    }
}
