use alloc::string::{String, ToString};
use alloc::vec::Vec;

use dm_access::wildcard::{self, children};
use dm_access::{DataAccessor, DataMutator, IntoPath, Map, Path, Resolved, Segment, Value};
use dm_utils::hash::HashMap;

use crate::error::MapError;
use crate::options::MapperOptions;
use crate::template::{Expression, Node, Part, Template};

// -----------------------------------------------------------------------------
// TemplateMapper

/// Produces target graphs from a source graph.
///
/// Three ways of describing the target are supported:
///
/// - a [`Template`] (see [`map`](Self::map));
/// - a shape whose keys are matched by name (see [`auto_map`](Self::auto_map));
/// - explicit `(target, source)` path pairs (see [`map_paths`](Self::map_paths)).
///
/// # Examples
///
/// ```
/// use dm_mapper::{MapperOptions, TemplateMapper};
/// use serde_json::json;
///
/// let source = json!({
///     "company": { "name": "Acme" },
///     "departments": [
///         { "name": "R&D", "budget": 10 },
///         { "name": "Ops" },
///     ],
/// });
/// let template = json!({
///     "name": "{{ company.name }}",
///     "departments": { "*": {
///         "label": "{{ departments.*.name | upper }}",
///         "budget": "{{ departments.*.budget }}",
///     }},
/// });
///
/// let mapper = TemplateMapper::new(MapperOptions::default());
/// assert_eq!(
///     mapper.map(&source, &template).unwrap(),
///     json!({
///         "name": "Acme",
///         "departments": [
///             { "label": "R&D", "budget": 10 },
///             { "label": "OPS" },
///         ],
///     }),
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMapper {
    options: MapperOptions,
}

impl TemplateMapper {
    #[inline]
    pub const fn new(options: MapperOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub const fn options(&self) -> MapperOptions {
        self.options
    }

    /// Compiles `template` and renders it against `source`.
    pub fn map(&self, source: &Value, template: &Value) -> Result<Value, MapError> {
        self.map_template(source, &Template::compile(template)?)
    }

    /// Like [`map`](Self::map), writing into `base` instead of an empty target.
    pub fn map_onto(&self, source: &Value, template: &Value, base: Value) -> Result<Value, MapError> {
        self.map_template_onto(source, &Template::compile(template)?, base)
    }

    /// Renders a compiled template.
    ///
    /// If nothing at all is written, the result is an empty map or sequence
    /// following the shape of the template.
    pub fn map_template(&self, source: &Value, template: &Template) -> Result<Value, MapError> {
        let target = self.map_template_onto(source, template, Value::Null)?;
        Ok(if target.is_null() { template.empty_target() } else { target })
    }

    pub fn map_template_onto(
        &self,
        source: &Value,
        template: &Template,
        mut base: Value,
    ) -> Result<Value, MapError> {
        let mut out = DataMutator::new(&mut base);
        Render::new(source, self.options).node(template.root(), &Path::root(), &mut out)?;
        Ok(base)
    }

    /// Copies `source` into the keys of `shape`.
    ///
    /// Each shape key takes the source value under the same key, or else under
    /// a key that only differs in case, `_` or `-` (so `firstName` matches
    /// `first_name`). Nested maps recurse; unmatched keys keep their shape
    /// value. Without a shape the source is copied as is.
    ///
    /// ```
    /// use dm_mapper::TemplateMapper;
    /// use serde_json::json;
    ///
    /// let source = json!({ "first_name": "Ada", "address": { "City": "London", "zip": "N1" } });
    /// let shape = json!({ "firstName": "", "address": { "city": null }, "role": "guest" });
    ///
    /// assert_eq!(
    ///     TemplateMapper::default().auto_map(&source, Some(&shape)),
    ///     json!({ "firstName": "Ada", "address": { "city": "London" }, "role": "guest" }),
    /// );
    /// ```
    pub fn auto_map(&self, source: &Value, shape: Option<&Value>) -> Value {
        let (Some(Value::Object(shape)), Value::Object(fields)) = (shape, source) else {
            return source.clone();
        };

        let mut out = Map::new();
        for (key, shape_value) in shape {
            let picked = fields.get(key).or_else(|| {
                let wanted = normalize_key(key);
                fields
                    .iter()
                    .find(|(candidate, _)| normalize_key(candidate) == wanted)
                    .map(|(_, value)| value)
            });
            let value = match picked {
                None => shape_value.clone(),
                Some(found) if shape_value.is_object() => self.auto_map(found, Some(shape_value)),
                Some(found) => found.clone(),
            };
            if picked.is_some() && value.is_null() && self.options.skip_null {
                continue;
            }
            out.insert(key.clone(), value);
        }
        Value::Object(out)
    }

    /// Writes each source path to its target path.
    ///
    /// Target wildcards are bound, left to right, to the keys matched by the
    /// source wildcards. When the target has fewer wildcards than the source,
    /// the values that land on the same target path are collected into a
    /// sequence.
    ///
    /// ```
    /// use dm_mapper::{MapperOptions, TemplateMapper};
    /// use serde_json::json;
    ///
    /// let source = json!({ "users": [{ "name": "a" }, { "name": "b" }] });
    /// let mapper = TemplateMapper::new(MapperOptions::default());
    ///
    /// let target = mapper
    ///     .map_paths(&source, [("people.*.login", "users.*.name"), ("all", "users.*.name")])
    ///     .unwrap();
    /// assert_eq!(
    ///     target,
    ///     json!({ "people": [{ "login": "a" }, { "login": "b" }], "all": ["a", "b"] }),
    /// );
    /// ```
    pub fn map_paths<I, T, S>(&self, source: &Value, mappings: I) -> Result<Value, MapError>
    where
        I: IntoIterator<Item = (T, S)>,
        T: IntoPath,
        S: IntoPath,
    {
        let target = self.map_paths_onto(source, mappings, Value::Null)?;
        Ok(if target.is_null() { Value::Object(Map::new()) } else { target })
    }

    pub fn map_paths_onto<I, T, S>(
        &self,
        source: &Value,
        mappings: I,
        mut base: Value,
    ) -> Result<Value, MapError>
    where
        I: IntoIterator<Item = (T, S)>,
        T: IntoPath,
        S: IntoPath,
    {
        let mut out = DataMutator::new(&mut base);
        for (target, from) in mappings {
            let target = target.into_path()?;
            let from = from.into_path()?;
            self.map_path(source, &target, &from, &mut out)?;
        }
        Ok(base)
    }

    fn map_path(
        &self,
        source: &Value,
        target: &Path,
        from: &Path,
        out: &mut DataMutator<'_>,
    ) -> Result<(), MapError> {
        let bindable = target.wildcard_count();
        let available = from.wildcard_count();
        if bindable > available {
            return Err(MapError::UnboundWildcard {
                target: target.clone(),
                from: from.clone(),
            });
        }

        if available == 0 {
            let value = DataAccessor::new(source)
                .resolve(from)
                .as_single()
                .cloned()
                .unwrap_or(Value::Null);
            if !(value.is_null() && self.options.skip_null) {
                out.set(target, value)?;
            }
            return Ok(());
        }

        let mut reindexer = Reindexer::default();
        let mut collected: Vec<(Path, Vec<Value>)> = Vec::new();
        for (hit, value) in wildcard::resolve(source, from).iter() {
            if value.is_null() && self.options.skip_null {
                continue;
            }
            let mut keys = from.wildcard_keys(hit);
            keys.truncate(bindable);
            if self.options.reindex_wildcard {
                keys = reindexer.reindex(&keys);
            }
            let bound = target.bind_wildcards(&keys);

            if bindable == available {
                out.set(&bound, value.clone())?;
            } else if let Some((_, values)) = collected.iter_mut().find(|(p, _)| *p == bound) {
                values.push(value.clone());
            } else {
                collected.push((bound, alloc::vec![value.clone()]));
            }
        }
        for (bound, values) in collected {
            out.set(bound, Value::Array(values))?;
        }
        Ok(())
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Assigns contiguous indices per wildcard level, in first-seen order.
#[derive(Default)]
struct Reindexer {
    assigned: HashMap<Vec<Segment>, usize>,
    next: HashMap<Vec<Segment>, usize>,
}

impl Reindexer {
    fn reindex(&mut self, keys: &[Segment]) -> Vec<Segment> {
        (0..keys.len())
            .map(|level| {
                let prefix = &keys[..=level];
                let index = match self.assigned.get(prefix) {
                    Some(&index) => index,
                    None => {
                        let counter = self.next.entry(keys[..level].to_vec()).or_insert(0);
                        let index = *counter;
                        *counter += 1;
                        self.assigned.insert(prefix.to_vec(), index);
                        index
                    }
                };
                Segment::Index(index)
            })
            .collect()
    }
}

// -----------------------------------------------------------------------------
// Rendering

/// A source container whose children drive one repeating node.
struct Group {
    /// The expression path up to and including the wildcard, unbound.
    pattern: Path,
    /// The concrete container in the source.
    container: Path,
    keys: Vec<Segment>,
}

/// State of one template rendering.
struct Render<'s> {
    source: &'s Value,
    options: MapperOptions,
    /// Wildcard patterns bound by the enclosing repeating nodes.
    scope: Vec<(Path, Segment)>,
}

impl<'s> Render<'s> {
    fn new(source: &'s Value, options: MapperOptions) -> Self {
        Self {
            source,
            options,
            scope: Vec::new(),
        }
    }

    /// Renders `node` at `at`. Returns whether anything was written.
    fn node(&mut self, node: &Node, at: &Path, out: &mut DataMutator<'_>) -> Result<bool, MapError> {
        match node {
            Node::Literal(value) => {
                out.set(at, value.clone())?;
                Ok(true)
            }
            Node::Expr(expr) => {
                let value = self.evaluate(expr);
                if value.is_null() && self.options.skip_null {
                    return Ok(false);
                }
                out.set(at, value)?;
                Ok(true)
            }
            Node::Interpolated(parts) => {
                let text = self.interpolate(parts);
                out.set(at, Value::String(text))?;
                Ok(true)
            }
            Node::Map(entries) => {
                if entries.is_empty() {
                    out.set(at, Value::Object(Map::new()))?;
                    return Ok(true);
                }
                let mut wrote = false;
                for (key, child) in entries {
                    wrote |= self.node(child, &at.child(Segment::literal(&**key)), out)?;
                }
                Ok(wrote)
            }
            Node::List(items) => {
                if items.is_empty() {
                    out.set(at, Value::Array(Vec::new()))?;
                    return Ok(true);
                }
                let mut emitted = 0;
                for (index, item) in items.iter().enumerate() {
                    let slot = if self.options.skip_null { emitted } else { index };
                    if self.node(item, &at.child(Segment::Index(slot)), out)? {
                        emitted += 1;
                    }
                }
                Ok(emitted > 0)
            }
            Node::Repeat(inner) => self.repeat(inner, at, out),
        }
    }

    fn repeat(&mut self, inner: &Node, at: &Path, out: &mut DataMutator<'_>) -> Result<bool, MapError> {
        let groups = self.groups(inner);
        let count = groups.first().map_or(0, |group| group.keys.len());
        if groups.iter().any(|group| group.keys.len() != count) {
            return Err(MapError::WildcardCardinalityMismatch {
                at: at.clone(),
                groups: groups
                    .into_iter()
                    .map(|group| (group.container, group.keys.len()))
                    .collect(),
            });
        }
        log::debug!("expanding `{at}` over {count} element(s), {} group(s)", groups.len());

        let mut emitted = 0;
        for i in 0..count {
            let key = if self.options.reindex_wildcard {
                Segment::Index(emitted)
            } else {
                groups[0].keys[i].clone()
            };

            let depth = self.scope.len();
            self.scope.extend(
                groups
                    .iter()
                    .map(|group| (group.pattern.clone(), group.keys[i].clone())),
            );
            let wrote = self.node(inner, &at.child(key), out);
            self.scope.truncate(depth);

            if wrote? {
                emitted += 1;
            }
        }

        if emitted == 0 && !self.options.skip_null {
            out.set(at, Value::Array(Vec::new()))?;
            return Ok(true);
        }
        Ok(emitted > 0)
    }

    /// The wildcard groups a repeating node iterates: for every expression
    /// beneath it, the container in front of its first unbound wildcard.
    fn groups(&self, inner: &Node) -> Vec<Group> {
        let mut expressions = Vec::new();
        inner.expressions(&mut expressions);

        let reader = DataAccessor::new(self.source);
        let mut groups: Vec<Group> = Vec::new();
        for expr in expressions {
            let bound = self.bind(expr.path());
            let Some(at) = bound.first_wildcard() else {
                continue;
            };
            let pattern = expr.path().truncated(at + 1);
            if groups.iter().any(|group| group.pattern == pattern) {
                continue;
            }
            let container = bound.truncated(at);
            let keys = match reader.resolve(&container) {
                Resolved::Single(node) => children(node).map(|(key, _)| key).collect(),
                _ => Vec::new(),
            };
            groups.push(Group {
                pattern,
                container,
                keys,
            });
        }
        groups
    }

    /// Replaces the wildcards of `path` bound by enclosing repeating nodes.
    fn bind(&self, path: &Path) -> Path {
        if self.scope.is_empty() || !path.has_wildcard() {
            return path.clone();
        }
        let mut keys = Vec::new();
        for (at, segment) in path.segments().iter().enumerate() {
            if !segment.is_wildcard() {
                continue;
            }
            let pattern = path.truncated(at + 1);
            match self.scope.iter().rev().find(|(bound, _)| *bound == pattern) {
                Some((_, key)) => keys.push(key.clone()),
                None => break,
            }
        }
        path.bind_wildcards(&keys)
    }

    fn evaluate(&self, expr: &Expression) -> Value {
        expr.evaluate_at(self.source, &self.bind(expr.path()))
    }

    fn interpolate(&self, parts: &[Part]) -> String {
        let mut text = String::new();
        for part in parts {
            match part {
                Part::Text(chunk) => text.push_str(chunk),
                Part::Expr(expr) => match self.evaluate(expr) {
                    Value::Null => {}
                    Value::String(s) => text.push_str(&s),
                    other => text.push_str(&other.to_string()),
                },
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::TemplateMapper;
    use crate::{MapError, MapperOptions};

    fn mapper(skip_null: bool, reindex: bool) -> TemplateMapper {
        TemplateMapper::new(
            MapperOptions::DEFAULT
                .with_skip_null(skip_null)
                .with_reindex_wildcard(reindex),
        )
    }

    #[test]
    fn template_round_trip() {
        let source = json!({ "company": { "name": "Acme" } });
        let target = mapper(true, false)
            .map(&source, &json!({ "name": "{{ company.name }}" }))
            .unwrap();
        assert_eq!(target, json!({ "name": "Acme" }));
    }

    #[test]
    fn skip_null_toggle() {
        let source = json!({ "a": null });
        let template = json!({ "x": "{{ a }}", "y": "{{ missing }}", "z": 1 });

        assert_eq!(mapper(true, false).map(&source, &template).unwrap(), json!({ "z": 1 }));
        assert_eq!(
            mapper(false, false).map(&source, &template).unwrap(),
            json!({ "x": null, "y": null, "z": 1 })
        );
    }

    #[test]
    fn literals_copy_through() {
        let template = json!({ "empty_map": {}, "empty_list": [], "n": null, "s": "text" });
        assert_eq!(mapper(true, false).map(&json!({}), &template).unwrap(), template);
    }

    #[test]
    fn interpolation() {
        let source = json!({ "first": "Ada", "n": 3, "none": null });
        let target = mapper(true, false)
            .map(&source, &json!("{{ first }} has {{ n }} items{{ none }}."))
            .unwrap();
        assert_eq!(target, json!("Ada has 3 items."));
    }

    #[test]
    fn wildcard_outside_repeat_is_a_list() {
        let source = json!({ "d": [{ "n": "a" }, { "n": "b" }] });
        let target = mapper(true, false)
            .map(&source, &json!({ "names": "{{ d.*.n }}" }))
            .unwrap();
        assert_eq!(target, json!({ "names": ["a", "b"] }));
    }

    #[test]
    fn repeat_keeps_or_reindexes_keys() {
        let source = json!({ "rows": [{ "v": 1 }, { "v": null }, { "v": 3 }] });
        let template = json!({ "out": { "*": { "value": "{{ rows.*.v }}" } } });

        assert_eq!(
            mapper(true, false).map(&source, &template).unwrap(),
            json!({ "out": [{ "value": 1 }, null, { "value": 3 }] })
        );
        assert_eq!(
            mapper(true, true).map(&source, &template).unwrap(),
            json!({ "out": [{ "value": 1 }, { "value": 3 }] })
        );
        assert_eq!(
            mapper(false, true).map(&source, &template).unwrap(),
            json!({ "out": [{ "value": 1 }, { "value": null }, { "value": 3 }] })
        );
    }

    #[test]
    fn repeat_over_map_keeps_source_keys() {
        let source = json!({ "teams": { "red": { "size": 2 }, "blue": { "size": 5 } } });
        let template = json!({ "*": "{{ teams.*.size }}" });
        assert_eq!(
            mapper(true, false).map(&source, &template).unwrap(),
            json!({ "red": 2, "blue": 5 })
        );
    }

    #[test]
    fn nested_repeats() {
        let source = json!({ "teams": [
            { "name": "red", "members": [{ "id": 1 }, { "id": 2 }] },
            { "name": "blue", "members": [{ "id": 3 }] },
        ]});
        let template = json!({ "*": {
            "team": "{{ teams.*.name }}",
            "ids": { "*": "{{ teams.*.members.*.id }}" },
        }});
        assert_eq!(
            mapper(true, false).map(&source, &template).unwrap(),
            json!([
                { "team": "red", "ids": [1, 2] },
                { "team": "blue", "ids": [3] },
            ])
        );
    }

    #[test]
    fn sibling_groups_zip() {
        let source = json!({ "keys": ["a", "b"], "vals": [1, 2] });
        let template = json!({ "*": { "k": "{{ keys.* }}", "v": "{{ vals.* }}" } });
        assert_eq!(
            mapper(true, false).map(&source, &template).unwrap(),
            json!([{ "k": "a", "v": 1 }, { "k": "b", "v": 2 }])
        );
    }

    #[test]
    fn cardinality_mismatch() {
        let source = json!({ "a": [1, 2, 3], "b": [1, 2] });
        let template = json!({ "rows": { "*": { "x": "{{ a.* }}", "y": "{{ b.* }}" } } });
        let err = mapper(true, false).map(&source, &template).unwrap_err();
        match err {
            MapError::WildcardCardinalityMismatch { at, groups } => {
                assert_eq!(at.to_string(), "rows");
                let sizes: Vec<_> = groups.iter().map(|(p, n)| (p.to_string(), *n)).collect();
                assert_eq!(sizes, [("a".to_string(), 3), ("b".to_string(), 2)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_repeat() {
        let source = json!({ "rows": [] });
        let template = json!({ "out": { "*": "{{ rows.* }}" } });
        assert_eq!(mapper(true, false).map(&source, &template).unwrap(), json!({}));
        assert_eq!(
            mapper(false, false).map(&source, &template).unwrap(),
            json!({ "out": [] })
        );
    }

    #[test]
    fn map_onto_base() {
        let base = json!({ "kept": true, "name": "old" });
        let target = mapper(true, false)
            .map_onto(&json!({ "n": "new" }), &json!({ "name": "{{ n }}" }), base)
            .unwrap();
        assert_eq!(target, json!({ "kept": true, "name": "new" }));

        assert!(matches!(
            mapper(true, false).map_onto(&json!({ "n": 1 }), &json!({ "a": "{{ n }}" }), json!(5)),
            Err(MapError::Mutation(_))
        ));
    }

    #[test]
    fn auto_map_without_shape_copies() {
        let source = json!({ "a": [1, 2] });
        assert_eq!(mapper(true, false).auto_map(&source, None), source);
        assert_eq!(
            mapper(true, false).auto_map(&json!({ "a": null }), Some(&json!({ "a": 1, "b": null }))),
            json!({ "b": null })
        );
    }

    #[test]
    fn map_paths_reindex_and_errors() {
        let source = json!({ "m": { "x": { "v": 1 }, "y": { "v": null }, "z": { "v": 3 } } });

        assert_eq!(
            mapper(true, true).map_paths(&source, [("out.*", "m.*.v")]).unwrap(),
            json!({ "out": [1, 3] })
        );
        assert_eq!(
            mapper(true, false).map_paths(&source, [("out.*", "m.*.v")]).unwrap(),
            json!({ "out": { "x": 1, "z": 3 } })
        );
        assert_eq!(
            mapper(false, false).map_paths(&source, [("single", "m.y.v")]).unwrap(),
            json!({ "single": null })
        );
        assert_eq!(mapper(true, false).map_paths(&source, [("a", "nope")]).unwrap(), json!({}));

        let err = mapper(true, false).map_paths(&source, [("a.*.*", "m.*")]).unwrap_err();
        assert!(matches!(err, MapError::UnboundWildcard { .. }));
        let none: [(&str, &str); 0] = [];
        assert_eq!(mapper(true, false).map_paths(&source, none).unwrap(), Value::Object(Default::default()));
    }
}
