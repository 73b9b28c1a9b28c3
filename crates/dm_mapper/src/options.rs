use serde::Deserialize;

/// Knobs of a single mapping run.
///
/// Missing fields fall back to the defaults when deserialized.
///
/// # Examples
///
/// ```
/// use dm_mapper::MapperOptions;
///
/// let options: MapperOptions = serde_json::from_str(r#"{ "reindex_wildcard": true }"#).unwrap();
/// assert!(options.skip_null);
/// assert!(options.reindex_wildcard);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Omit target keys whose value resolves to `null`, and expanded
    /// elements that produce nothing.
    pub skip_null: bool,
    /// Number expanded elements `0..n` instead of reusing source keys.
    pub reindex_wildcard: bool,
}

impl MapperOptions {
    pub const DEFAULT: Self = Self {
        skip_null: true,
        reindex_wildcard: false,
    };

    #[inline]
    pub const fn with_skip_null(mut self, skip_null: bool) -> Self {
        self.skip_null = skip_null;
        self
    }

    #[inline]
    pub const fn with_reindex_wildcard(mut self, reindex_wildcard: bool) -> Self {
        self.reindex_wildcard = reindex_wildcard;
        self
    }
}

impl Default for MapperOptions {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::MapperOptions;

    #[test]
    fn ron_config() {
        let options: MapperOptions = ron::from_str("(skip_null: false)").unwrap();
        assert_eq!(options, MapperOptions::DEFAULT.with_skip_null(false));

        let options: MapperOptions = ron::from_str("()").unwrap();
        assert_eq!(options, MapperOptions::default());
    }
}
