use alloc::string::ToString;
use alloc::vec::Vec;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::accessor::DataAccessor;
use crate::coerce::kind_name;
use crate::path::{IntoPath, Path, PathSyntaxError, Segment};
use crate::wildcard;

// -----------------------------------------------------------------------------
// Error

/// Sequence indices may run at most this far past the end of a sequence.
///
/// Writing further would pad the sequence with that many `null`s.
pub const MAX_INDEX_PADDING: usize = 1024;

/// A write that could not be performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MutationError {
    #[error(transparent)]
    Path(#[from] PathSyntaxError),
    /// An existing node on the way cannot hold the next segment,
    /// e.g. a string where a map is needed.
    #[error("cannot write `{segment}` into the {found} at `{at}`")]
    IncompatibleNode {
        at: Path,
        segment: Segment,
        found: &'static str,
    },
    /// An index lies more than [`MAX_INDEX_PADDING`] past the end of the
    /// sequence at `at`.
    #[error("index {index} is too far past the end of the sequence of length {len} at `{at}`")]
    IndexOutOfRange { at: Path, index: usize, len: usize },
}

/// Why a single step of a write cannot be taken.
enum Refusal {
    Incompatible(&'static str),
    OutOfRange { index: usize, len: usize },
}

impl Refusal {
    #[cold]
    fn at(self, path: &Path, depth: usize) -> MutationError {
        match self {
            Self::Incompatible(found) => MutationError::IncompatibleNode {
                at: path.truncated(depth),
                segment: path.segments()[depth].clone(),
                found,
            },
            Self::OutOfRange { index, len } => MutationError::IndexOutOfRange {
                at: path.truncated(depth),
                index,
                len,
            },
        }
    }
}

// -----------------------------------------------------------------------------
// DataMutator

/// In-place writer over a borrowed graph.
///
/// # Container creation
///
/// Missing intermediate nodes (and `null` ones) are created on demand: a map
/// for a literal segment, a sequence for an index segment. An index past the
/// end of a sequence pads it with `null`. Existing non-null scalars are never
/// replaced on the way down; that is a [`MutationError::IncompatibleNode`].
///
/// # Examples
///
/// ```
/// use dm_access::DataMutator;
/// use serde_json::json;
///
/// let mut graph = json!({ "user": { "name": "A", "age": 30 } });
/// let mut writer = DataMutator::new(&mut graph);
///
/// writer.set("user.roles.1", json!("admin")).unwrap();
/// writer.merge("user", json!({ "name": "B" })).unwrap();
/// writer.unset("user.age").unwrap();
///
/// assert_eq!(graph, json!({ "user": { "name": "B", "roles": [null, "admin"] } }));
/// ```
#[derive(Debug)]
pub struct DataMutator<'g> {
    root: &'g mut Value,
    prune: bool,
}

impl<'g> DataMutator<'g> {
    #[inline]
    pub fn new(root: &'g mut Value) -> Self {
        Self { root, prune: false }
    }

    /// When enabled, [`unset`](Self::unset) also removes the ancestors it
    /// leaves empty. The root itself is never removed.
    #[inline]
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// The graph being written.
    #[inline]
    pub fn root(&self) -> &Value {
        self.root
    }

    /// A reader over the current state of the graph.
    #[inline]
    pub fn reader(&self) -> DataAccessor<'_> {
        DataAccessor::new(self.root)
    }

    /// Writes `value` at `path`, replacing whatever was there.
    ///
    /// A wildcard writes into every existing child and creates none. Every
    /// child is checked before the first one is written, so a failing
    /// wildcard write leaves the graph untouched.
    pub fn set(&mut self, path: impl IntoPath, value: Value) -> Result<(), MutationError> {
        let path = path.into_path()?;
        if path.has_wildcard() {
            let targets = self.concrete_targets(&path);
            for target in &targets {
                check_path(self.root, target)?;
            }
            for target in &targets {
                *locate(self.root, target)? = value.clone();
            }
            return Ok(());
        }
        *locate(self.root, &path)? = value;
        Ok(())
    }

    /// [`set`](Self::set) for each pair, in order. Stops at the first error.
    pub fn set_many<I, P>(&mut self, entries: I) -> Result<(), MutationError>
    where
        I: IntoIterator<Item = (P, Value)>,
        P: IntoPath,
    {
        for (path, value) in entries {
            self.set(path, value)?;
        }
        Ok(())
    }

    /// Deep-merges `partial` into the node at `path`.
    ///
    /// - map into map: keys extend or override, recursively;
    /// - sequence into sequence: appended;
    /// - map with index keys into sequence: those positions are replaced;
    /// - anything else: `partial` replaces the node.
    ///
    /// ```
    /// use dm_access::DataMutator;
    /// use serde_json::json;
    ///
    /// let mut graph = json!({ "list": ["a", "b"] });
    /// DataMutator::new(&mut graph)
    ///     .merge("list", json!({ "1": "B", "3": "D" }))
    ///     .unwrap();
    /// assert_eq!(graph, json!({ "list": ["a", "B", null, "D"] }));
    /// ```
    pub fn merge(&mut self, path: impl IntoPath, partial: Value) -> Result<(), MutationError> {
        let path = path.into_path()?;
        let targets = if path.has_wildcard() {
            self.concrete_targets(&path)
        } else {
            Vec::from([path])
        };
        for target in &targets {
            check_path(self.root, target)?;
            if let Some(dest) = locate_existing(self.root, target) {
                check_merge(dest, &partial, target)?;
            }
        }
        for target in &targets {
            deep_merge(locate(self.root, target)?, partial.clone());
        }
        Ok(())
    }

    /// The concrete paths a wildcard write reaches: one per existing node
    /// matched up to the last wildcard, followed by the rest of `pattern`.
    fn concrete_targets(&self, pattern: &Path) -> Vec<Path> {
        let segments = pattern.segments();
        let last = segments.iter().rposition(Segment::is_wildcard).unwrap_or(0);
        let rest = Path::from_segments(segments[last + 1..].iter().cloned());
        wildcard::resolve(self.root, &pattern.truncated(last + 1))
            .into_iter()
            .map(|(concrete, _)| concrete.join(&rest))
            .collect()
    }

    /// Removes the node at `path`, returning how many nodes were removed.
    ///
    /// Missing paths are a no-op. Sequence elements after a removed one
    /// shift down.
    pub fn unset(&mut self, path: impl IntoPath) -> Result<usize, PathSyntaxError> {
        self.unset_many([path])
    }

    /// Removes every node addressed by `paths`.
    ///
    /// All paths are parsed before anything is removed, and removal happens
    /// in descending path order so that sibling indices stay valid.
    pub fn unset_many<I, P>(&mut self, paths: I) -> Result<usize, PathSyntaxError>
    where
        I: IntoIterator<Item = P>,
        P: IntoPath,
    {
        let patterns = paths
            .into_iter()
            .map(IntoPath::into_path)
            .collect::<Result<Vec<_>, _>>()?;

        let mut targets = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            if pattern.has_wildcard() {
                targets.extend(wildcard::resolve(self.root, pattern).into_iter().map(|(p, _)| p));
            } else {
                targets.push(pattern.clone());
            }
        }
        targets.sort_unstable_by(|a, b| b.cmp(a));
        targets.dedup();

        let mut removed = 0;
        for target in &targets {
            if remove_in(self.root, target.segments(), self.prune).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// -----------------------------------------------------------------------------
// Traversal

/// Checks that `segment` can be written below `node`, `None` standing for a
/// node that does not exist yet.
fn check_step(node: Option<&Value>, segment: &Segment) -> Result<(), Refusal> {
    let len = match (node, segment) {
        (None | Some(Value::Null), Segment::Index(_)) => 0,
        (None | Some(Value::Null), Segment::Literal(_)) => return Ok(()),
        (Some(Value::Object(_)), Segment::Literal(_) | Segment::Index(_)) => return Ok(()),
        (Some(Value::Array(items)), Segment::Literal(_)) if items.is_empty() => return Ok(()),
        (Some(Value::Array(items)), Segment::Index(_)) => items.len(),
        (Some(node), _) => return Err(Refusal::Incompatible(kind_name(node))),
        (None, Segment::Wildcard) => return Err(Refusal::Incompatible("null")),
    };
    match segment {
        Segment::Index(index) if *index > len.saturating_add(MAX_INDEX_PADDING) => {
            Err(Refusal::OutOfRange { index: *index, len })
        }
        _ => Ok(()),
    }
}

/// Checks, without writing, that [`locate`] would succeed for `path`.
fn check_path(root: &Value, path: &Path) -> Result<(), MutationError> {
    let mut node = Some(root);
    for (depth, segment) in path.segments().iter().enumerate() {
        check_step(node, segment).map_err(|refusal| refusal.at(path, depth))?;
        node = node.and_then(|node| wildcard::step(node, segment));
    }
    Ok(())
}

/// The node at a concrete `path`, if it already exists.
fn locate_existing<'v>(root: &'v Value, path: &Path) -> Option<&'v Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| wildcard::step(node, segment))
}

/// Returns the child for `segment`, creating containers as needed.
///
/// `None` if `node` cannot hold `segment`.
fn slot<'v>(node: &'v mut Value, segment: &Segment) -> Option<&'v mut Value> {
    if node.is_null() {
        *node = match segment {
            Segment::Index(_) => Value::Array(Vec::new()),
            _ => Value::Object(Map::new()),
        };
    }
    let keyed_empty_array = matches!(
        (&*node, segment),
        (Value::Array(items), Segment::Literal(_)) if items.is_empty()
    );
    if keyed_empty_array {
        *node = Value::Object(Map::new());
    }

    match (node, segment) {
        (Value::Object(map), Segment::Literal(key)) => Some(map.entry(&**key).or_insert(Value::Null)),
        (Value::Object(map), Segment::Index(index)) => {
            Some(map.entry(index.to_string()).or_insert(Value::Null))
        }
        (Value::Array(items), Segment::Index(index)) => {
            if *index >= items.len() {
                items.resize(index.checked_add(1)?, Value::Null);
            }
            items.get_mut(*index)
        }
        _ => None,
    }
}

/// Walks a concrete path, creating what is missing.
///
/// The whole path is checked first, so a failing write creates nothing.
fn locate<'v>(mut node: &'v mut Value, path: &Path) -> Result<&'v mut Value, MutationError> {
    check_path(node, path)?;
    for (depth, segment) in path.segments().iter().enumerate() {
        let found = kind_name(node);
        node = match slot(node, segment) {
            Some(child) => child,
            None => return Err(Refusal::Incompatible(found).at(path, depth)),
        };
    }
    Ok(node)
}

/// The indices of a map whose keys all address sequence positions.
fn index_keys(map: &Map<String, Value>) -> Option<Vec<usize>> {
    map.keys()
        .map(|key| match Segment::from_key(key) {
            Segment::Index(index) => Some(index),
            _ => None,
        })
        .collect()
}

/// Checks, without writing, that [`deep_merge`] of `partial` into `dest`
/// keeps every sequence index within [`MAX_INDEX_PADDING`].
fn check_merge(dest: &Value, partial: &Value, at: &Path) -> Result<(), MutationError> {
    match (dest, partial) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                if let Some(existing) = dst.get(key) {
                    check_merge(existing, value, &at.child(Segment::from_key(key)))?;
                }
            }
            Ok(())
        }
        (Value::Array(dst), Value::Object(src)) => {
            let len = dst.len();
            let limit = len.saturating_add(MAX_INDEX_PADDING);
            match index_keys(src).and_then(|indices| indices.into_iter().find(|i| *i > limit)) {
                Some(index) => Err(MutationError::IndexOutOfRange {
                    at: at.clone(),
                    index,
                    len,
                }),
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

/// Merges `partial` into `dest`. Callers run [`check_merge`] first.
fn deep_merge(dest: &mut Value, partial: Value) {
    match (dest, partial) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(dst), Value::Array(src)) => dst.extend(src),
        (Value::Array(dst), Value::Object(src)) if index_keys(&src).is_some() => {
            for (key, value) in src {
                let Segment::Index(index) = Segment::from_key(&key) else {
                    continue;
                };
                if index >= dst.len() {
                    let Some(len) = index.checked_add(1) else {
                        continue;
                    };
                    dst.resize(len, Value::Null);
                }
                dst[index] = value;
            }
        }
        (dest, partial) => *dest = partial,
    }
}

/// Detaches the child `segment` from `node`.
fn take_child(node: &mut Value, segment: &Segment) -> bool {
    match (node, segment) {
        (Value::Object(map), Segment::Literal(key)) => map.shift_remove(&**key).is_some(),
        (Value::Object(map), Segment::Index(index)) => {
            map.shift_remove(&index.to_string()).is_some()
        }
        (Value::Array(items), Segment::Index(index)) if *index < items.len() => {
            items.remove(*index);
            true
        }
        _ => false,
    }
}

fn is_empty_container(node: &Value) -> bool {
    match node {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Removes the node at `rest` below `node`.
///
/// `None` if nothing was removed, otherwise whether `node` is now empty.
fn remove_in(node: &mut Value, rest: &[Segment], prune: bool) -> Option<bool> {
    let (head, tail) = rest.split_first()?;
    if tail.is_empty() {
        if !take_child(node, head) {
            return None;
        }
    } else {
        let child = wildcard::step_mut(node, head)?;
        let emptied = remove_in(child, tail, prune)?;
        if prune && emptied {
            take_child(node, head);
        }
    }
    Some(is_empty_container(node))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{DataMutator, MAX_INDEX_PADDING, MutationError};
    use crate::{DataAccessor, Path, Segment};

    #[test]
    fn read_after_write() {
        let mut graph = Value::Null;
        let cases = [
            ("a.b.c", json!(1)),
            ("a.list.2", json!("x")),
            ("a.b.d", json!({ "deep": [true] })),
            ("m.0", json!(null)),
        ];
        for (path, value) in &cases {
            DataMutator::new(&mut graph).set(*path, value.clone()).unwrap();
        }
        let reader = DataAccessor::new(&graph);
        for (path, value) in &cases {
            assert_eq!(reader.get_value(*path).unwrap().as_ref(), Some(value), "{path}");
        }
        assert_eq!(graph["a"]["list"], json!([null, null, "x"]));
    }

    #[test]
    fn set_is_idempotent() {
        let mut once = json!({ "a": [1] });
        DataMutator::new(&mut once).set("a.3.b", json!(5)).unwrap();
        let mut twice = once.clone();
        DataMutator::new(&mut twice).set("a.3.b", json!(5)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn index_into_map_and_literal_into_empty_list() {
        let mut graph = json!({ "m": { "x": 1 }, "l": [] });
        let mut writer = DataMutator::new(&mut graph);
        writer.set("m.7", json!("seven")).unwrap();
        writer.set("l.key", json!(true)).unwrap();
        assert_eq!(graph, json!({ "m": { "x": 1, "7": "seven" }, "l": { "key": true } }));
    }

    #[test]
    fn refuses_to_descend_into_scalars() {
        let mut graph = json!({ "a": "text", "l": [1] });
        let mut writer = DataMutator::new(&mut graph);

        let err = writer.set("a.b", json!(1)).unwrap_err();
        assert_eq!(
            err,
            MutationError::IncompatibleNode {
                at: Path::parse("a").unwrap(),
                segment: Segment::literal("b"),
                found: "string",
            }
        );
        assert!(writer.set("l.name", json!(1)).is_err());
        assert!(matches!(writer.set("a..b", json!(1)), Err(MutationError::Path(_))));
        assert_eq!(graph, json!({ "a": "text", "l": [1] }));
    }

    #[test]
    fn wildcard_set_and_merge() {
        let mut graph = json!({ "items": [{ "n": 1 }, { "n": 2 }] });
        let mut writer = DataMutator::new(&mut graph);
        writer.set("items.*.seen", json!(true)).unwrap();
        writer.merge("items.*", json!({ "n": 0 })).unwrap();
        assert_eq!(
            graph,
            json!({ "items": [{ "n": 0, "seen": true }, { "n": 0, "seen": true }] })
        );
    }

    #[test]
    fn far_indices_are_refused() {
        let mut graph = json!({ "l": [] });
        let mut writer = DataMutator::new(&mut graph);

        let err = writer.set("l.18446744073709551615", json!(1)).unwrap_err();
        assert_eq!(
            err,
            MutationError::IndexOutOfRange {
                at: Path::parse("l").unwrap(),
                index: usize::MAX,
                len: 0,
            }
        );
        assert!(matches!(
            writer.set("l.100000000000", json!(1)),
            Err(MutationError::IndexOutOfRange { index: 100_000_000_000, .. })
        ));
        assert!(matches!(
            writer.set("fresh.100000000000.x", json!(1)),
            Err(MutationError::IndexOutOfRange { len: 0, .. })
        ));
        assert_eq!(graph, json!({ "l": [] }));

        let edge = format!("l.{MAX_INDEX_PADDING}");
        DataMutator::new(&mut graph).set(edge.as_str(), json!("last")).unwrap();
        let items = graph["l"].as_array().unwrap();
        assert_eq!(items.len(), MAX_INDEX_PADDING + 1);
        assert_eq!(items[MAX_INDEX_PADDING], json!("last"));
    }

    #[test]
    fn merge_refuses_far_index_keys() {
        let mut graph = json!({ "l": ["a"], "m": { "l": [] } });
        let mut writer = DataMutator::new(&mut graph);

        let err = writer.merge("l", json!({ "18446744073709551615": 2 })).unwrap_err();
        assert_eq!(
            err,
            MutationError::IndexOutOfRange {
                at: Path::parse("l").unwrap(),
                index: usize::MAX,
                len: 1,
            }
        );
        assert!(matches!(
            writer.merge("m", json!({ "l": { "0": "x", "99999": "y" } })),
            Err(MutationError::IndexOutOfRange { index: 99_999, .. })
        ));
        assert_eq!(graph, json!({ "l": ["a"], "m": { "l": [] } }));
    }

    #[test]
    fn failing_wildcard_write_changes_nothing() {
        let original = json!({ "items": [{ "a": 1 }, "text", { "a": 3 }] });
        let mut graph = original.clone();
        let mut writer = DataMutator::new(&mut graph);

        let err = writer.set("items.*.x", json!(true)).unwrap_err();
        assert_eq!(
            err,
            MutationError::IncompatibleNode {
                at: Path::parse("items.1").unwrap(),
                segment: Segment::literal("x"),
                found: "string",
            }
        );
        assert!(writer.merge("items.*.a.9999", json!(0)).is_err());
        assert_eq!(graph, original);
    }

    #[test]
    fn wildcard_write_reaches_existing_children_only() {
        let mut graph = json!({ "groups": { "g1": [{}, null], "g2": [] } });
        let mut writer = DataMutator::new(&mut graph);
        writer.set("groups.*.*.seen", json!(1)).unwrap();
        writer.set("absent.*.seen", json!(1)).unwrap();
        assert_eq!(
            graph,
            json!({ "groups": { "g1": [{ "seen": 1 }, { "seen": 1 }], "g2": [] } })
        );
    }

    #[test]
    fn merge_rules() {
        let mut graph = json!({
            "obj": { "a": 1, "nested": { "x": 1 } },
            "arr": [1],
            "scalar": "s",
        });
        let mut writer = DataMutator::new(&mut graph);
        writer.merge("obj", json!({ "b": 2, "nested": { "y": 2 } })).unwrap();
        writer.merge("arr", json!([2, 3])).unwrap();
        writer.merge("scalar", json!({ "now": "map" })).unwrap();
        writer.merge("fresh.path", json!([1])).unwrap();
        assert_eq!(
            graph,
            json!({
                "obj": { "a": 1, "nested": { "x": 1, "y": 2 }, "b": 2 },
                "arr": [1, 2, 3],
                "scalar": { "now": "map" },
                "fresh": { "path": [1] },
            })
        );
    }

    #[test]
    fn unset_precision() {
        let mut graph = json!({ "user": { "name": "A", "age": 30 } });
        let removed = DataMutator::new(&mut graph).unset("user.age").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(graph, json!({ "user": { "name": "A" } }));

        assert_eq!(DataMutator::new(&mut graph).unset("user.missing.x").unwrap(), 0);
        assert_eq!(graph, json!({ "user": { "name": "A" } }));
    }

    #[test]
    fn unset_many_removes_indices_from_the_back() {
        let mut graph = json!({ "l": ["a", "b", "c", "d"] });
        let removed = DataMutator::new(&mut graph)
            .unset_many(["l.1", "l.3"])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(graph, json!({ "l": ["a", "c"] }));

        assert!(DataMutator::new(&mut graph).unset_many(["l.0", "l..x"]).is_err());
        assert_eq!(graph, json!({ "l": ["a", "c"] }));
    }

    #[test]
    fn unset_wildcard_and_pruning() {
        let mut graph = json!({ "a": { "b": { "c": 1 } }, "keep": { "x": [{ "t": 1 }, { "t": 2 }] } });

        DataMutator::new(&mut graph).unset("keep.x.*.t").unwrap();
        assert_eq!(graph["keep"], json!({ "x": [{}, {}] }));

        DataMutator::new(&mut graph)
            .with_pruning(true)
            .unset("a.b.c")
            .unwrap();
        assert_eq!(graph, json!({ "keep": { "x": [{}, {}] } }));

        // The root survives even when emptied.
        let mut single = json!({ "only": { "leaf": 1 } });
        DataMutator::new(&mut single)
            .with_pruning(true)
            .unset("only.leaf")
            .unwrap();
        assert_eq!(single, json!({}));
    }
}
