//! Wildcard resolution.
//!
//! A `*` segment matches every child of the node it is applied to, in
//! natural order: index order for sequences, insertion order for maps.
//! Each match is reported together with its synthetic concrete path, the
//! pattern with every wildcard replaced by the key actually taken.
//!
//! Branches that do not contain the rest of the path are dropped, never
//! padded with `null`.

use alloc::string::ToString;
use alloc::vec::Vec;

use serde_json::{Map, Value};

use crate::path::{Path, Segment};

// -----------------------------------------------------------------------------
// Children

/// Ordered children of a graph node, keyed by the segment that reaches them.
///
/// Scalars have no children.
///
/// # Examples
///
/// ```
/// use dm_access::{Segment, wildcard::children};
/// use serde_json::json;
///
/// let node = json!({ "a": 1, "7": 2 });
/// let keys: Vec<_> = children(&node).map(|(key, _)| key).collect();
/// assert_eq!(keys, [Segment::literal("a"), Segment::Index(7)]);
/// ```
pub fn children(node: &Value) -> Children<'_> {
    match node {
        Value::Array(items) => Children::Array(items.iter().enumerate()),
        Value::Object(map) => Children::Object(map.iter()),
        _ => Children::None,
    }
}

/// Iterator returned by [`children`].
pub enum Children<'g> {
    Array(core::iter::Enumerate<core::slice::Iter<'g, Value>>),
    Object(serde_json::map::Iter<'g>),
    None,
}

impl<'g> Iterator for Children<'g> {
    type Item = (Segment, &'g Value);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Array(iter) => iter.next().map(|(i, v)| (Segment::Index(i), v)),
            Self::Object(iter) => iter.next().map(|(k, v)| (Segment::from_key(k), v)),
            Self::None => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Array(iter) => iter.size_hint(),
            Self::Object(iter) => iter.size_hint(),
            Self::None => (0, Some(0)),
        }
    }
}

/// Follows one concrete segment. Wildcards never match here.
pub fn step<'g>(node: &'g Value, segment: &Segment) -> Option<&'g Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Literal(key)) => map.get(&**key),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

/// Mutable counterpart of [`step`].
pub fn step_mut<'g>(node: &'g mut Value, segment: &Segment) -> Option<&'g mut Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Literal(key)) => map.get_mut(&**key),
        (Value::Object(map), Segment::Index(index)) => map.get_mut(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}

// -----------------------------------------------------------------------------
// Matches

/// The ordered result of resolving a wildcard path.
///
/// # Examples
///
/// ```
/// use dm_access::{Path, wildcard};
/// use serde_json::json;
///
/// let graph = json!({ "departments": [
///     { "name": "R&D" },
///     { "budget": 10 },
///     { "name": "Ops" },
/// ]});
///
/// let path = Path::parse("departments.*.name").unwrap();
/// let matches = wildcard::resolve(&graph, &path);
///
/// // The department without a name is omitted.
/// assert_eq!(matches.len(), 2);
/// assert_eq!(
///     matches.into_value(),
///     json!({ "departments.0.name": "R&D", "departments.2.name": "Ops" }),
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches<'g> {
    entries: Vec<(Path, &'g Value)>,
}

impl<'g> Matches<'g> {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(synthetic path, value)` pairs in natural order.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&Path, &'g Value)> + '_ {
        self.entries.iter().map(|(path, value)| (path, *value))
    }

    /// The synthetic concrete paths.
    #[inline]
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &Path> + '_ {
        self.entries.iter().map(|(path, _)| path)
    }

    /// The matched values.
    #[inline]
    pub fn values(&self) -> impl ExactSizeIterator<Item = &'g Value> + '_ {
        self.entries.iter().map(|(_, value)| *value)
    }

    /// Looks up the value matched at a synthetic path.
    pub fn get(&self, path: &Path) -> Option<&'g Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == path)
            .map(|(_, value)| *value)
    }

    /// Collects the matches into an ordered map keyed by synthetic path.
    pub fn into_value(self) -> Value {
        let map: Map<_, _> = self
            .entries
            .into_iter()
            .map(|(path, value)| (path.to_string(), value.clone()))
            .collect();
        Value::Object(map)
    }
}

impl<'g> IntoIterator for Matches<'g> {
    type Item = (Path, &'g Value);
    type IntoIter = alloc::vec::IntoIter<(Path, &'g Value)>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// -----------------------------------------------------------------------------
// Resolver

/// Resolves `path` against `root`, expanding every wildcard.
///
/// Works for concrete paths too, yielding at most one match.
pub fn resolve<'g>(root: &'g Value, path: &Path) -> Matches<'g> {
    let mut entries = Vec::new();
    let mut prefix = Vec::with_capacity(path.len());
    walk(root, path.segments(), &mut prefix, &mut entries);
    Matches { entries }
}

fn walk<'g>(
    node: &'g Value,
    rest: &[Segment],
    prefix: &mut Vec<Segment>,
    out: &mut Vec<(Path, &'g Value)>,
) {
    let Some((head, tail)) = rest.split_first() else {
        out.push((Path::from_segments(prefix.iter().cloned()), node));
        return;
    };

    if head.is_wildcard() {
        for (key, child) in children(node) {
            prefix.push(key);
            walk(child, tail, prefix, out);
            prefix.pop();
        }
    } else if let Some(child) = step(node, head) {
        prefix.push(head.clone());
        walk(child, tail, prefix, out);
        prefix.pop();
    }
}
