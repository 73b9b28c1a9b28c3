use alloc::string::String;
use alloc::vec::Vec;

use dm_access::{DataAccessor, IntoPath, Value};

use crate::error::MapError;
use crate::mapper::TemplateMapper;
use crate::options::MapperOptions;
use crate::result::DataMapperResult;

/// Fluent configuration of one mapping.
///
/// Setters consume and return the builder; only [`map`](Self::map) does any
/// work. The mode is picked in this order:
///
/// 1. a [`template`](Self::template), rendered onto the [`target`](Self::target) if one is set;
/// 2. path [`mappings`](Self::mappings), written onto the target if one is set;
/// 3. otherwise [auto-mapping](TemplateMapper::auto_map), with the target as the shape.
///
/// # Examples
///
/// ```
/// use dm_mapper::DataMapper;
/// use serde_json::json;
///
/// let source = json!({ "user": { "name": "ada", "email": null } });
///
/// let base = DataMapper::source(source)
///     .template(json!({ "name": "{{ user.name | ucfirst }}", "email": "{{ user.email }}" }));
///
/// let result = base.copy().map().unwrap();
/// assert_eq!(result.as_value(), &json!({ "name": "Ada" }));
///
/// let result = base.skip_null(false).map().unwrap();
/// assert_eq!(result.to_json(), r#"{"name":"Ada","email":null}"#);
/// ```
#[derive(Debug, Clone)]
pub struct DataMapper {
    source: Value,
    template: Option<Value>,
    target: Option<Value>,
    mappings: Vec<(String, String)>,
    options: MapperOptions,
}

impl DataMapper {
    /// Starts a mapping from `source`.
    pub fn source(source: Value) -> Self {
        Self {
            source,
            template: None,
            target: None,
            mappings: Vec::new(),
            options: MapperOptions::DEFAULT,
        }
    }

    pub fn template(mut self, template: Value) -> Self {
        self.template = Some(template);
        self
    }

    /// The base written into, or the shape for auto-mapping.
    pub fn target(mut self, target: Value) -> Self {
        self.target = Some(target);
        self
    }

    /// Adds one `target <- source` path pair.
    pub fn mapping(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.mappings.push((target.into(), source.into()));
        self
    }

    pub fn mappings<I, T, S>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        self.mappings
            .extend(mappings.into_iter().map(|(t, s)| (t.into(), s.into())));
        self
    }

    pub fn options(mut self, options: MapperOptions) -> Self {
        self.options = options;
        self
    }

    pub fn skip_null(mut self, skip_null: bool) -> Self {
        self.options.skip_null = skip_null;
        self
    }

    pub fn reindex_wildcard(mut self, reindex_wildcard: bool) -> Self {
        self.options.reindex_wildcard = reindex_wildcard;
        self
    }

    /// A copy of this configuration.
    #[inline]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Runs the mapping.
    pub fn map(&self) -> Result<DataMapperResult, MapError> {
        let mapper = TemplateMapper::new(self.options);

        let target = if let Some(template) = &self.template {
            match &self.target {
                Some(base) => mapper.map_onto(&self.source, template, base.clone())?,
                None => mapper.map(&self.source, template)?,
            }
        } else if !self.mappings.is_empty() {
            let pairs = self.mappings.iter().map(|(t, s)| (t.as_str(), s.as_str()));
            match &self.target {
                Some(base) => mapper.map_paths_onto(&self.source, pairs, base.clone())?,
                None => mapper.map_paths(&self.source, pairs)?,
            }
        } else {
            mapper.auto_map(&self.source, self.target.as_ref())
        };

        Ok(DataMapperResult::new(target))
    }

    /// Reads one path of the source. Wildcard paths give an object keyed by
    /// the matched paths.
    pub fn property(&self, path: impl IntoPath) -> Result<Option<Value>, MapError> {
        Ok(DataAccessor::new(&self.source).get_value(path)?)
    }

    /// Every value of the source matched by `path`.
    pub fn query(&self, path: impl IntoPath) -> Result<Vec<Value>, MapError> {
        let resolved = DataAccessor::new(&self.source).get(path)?;
        Ok(resolved.values().into_iter().cloned().collect())
    }
}
