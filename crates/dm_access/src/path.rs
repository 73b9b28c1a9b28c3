//! Provide the [`Path`] type and its segmenter.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use std::sync::{PoisonError, RwLock};

use dm_utils::hash::{FixedHashState, HashMap};
use thiserror::Error;

/// The token matching every child of a node.
pub const WILDCARD: &str = "*";

/// The character separating segments.
pub const SEPARATOR: char = '.';

// -----------------------------------------------------------------------------
// Error

/// A path string that could not be segmented.
///
/// # Examples
///
/// ```
/// use dm_access::Path;
///
/// let err = Path::parse("users..name").unwrap_err();
/// assert_eq!(err.offset(), 6);
/// assert_eq!(err.reason(), "empty segment");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path `{path}` at offset {offset}: {reason}")]
pub struct PathSyntaxError {
    path: Box<str>,
    offset: usize,
    reason: &'static str,
}

impl PathSyntaxError {
    #[cold]
    fn new(path: &str, offset: usize, reason: &'static str) -> Self {
        Self {
            path: path.into(),
            offset,
            reason,
        }
    }

    /// The path that failed to parse.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Byte offset of the offending segment.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// What was wrong with the segment.
    #[inline]
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

// -----------------------------------------------------------------------------
// Segment

/// A single step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// A map key, e.g. `name`.
    Literal(Box<str>),
    /// A sequence index, e.g. `3`. Also addresses the map key `"3"`.
    Index(usize),
    /// `*`, every child of the node.
    Wildcard,
}

/// Parses a canonical index: ASCII digits without a leading zero.
fn parse_index(token: &str) -> Option<usize> {
    let bytes = token.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    token.parse().ok()
}

impl Segment {
    /// Creates a literal segment without validating it.
    #[inline]
    pub fn literal(name: impl Into<Box<str>>) -> Self {
        Self::Literal(name.into())
    }

    /// Classifies a map key found in a graph: canonical numbers become
    /// [`Segment::Index`], everything else a [`Segment::Literal`].
    ///
    /// Unlike parsing, this never fails and never yields a wildcard. A key
    /// such as `"007"` stays a literal so that it still addresses itself.
    pub fn from_key(key: &str) -> Self {
        match parse_index(key) {
            Some(index) => Self::Index(index),
            None => Self::Literal(key.into()),
        }
    }

    fn classify(token: &str) -> Result<Self, &'static str> {
        if token.is_empty() {
            return Err("empty segment");
        }
        if token == WILDCARD {
            return Ok(Self::Wildcard);
        }
        if token.contains('*') {
            return Err("`*` must be a segment on its own");
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token
                .parse()
                .map(Self::Index)
                .map_err(|_| "index does not fit in usize");
        }
        Ok(Self::Literal(token.into()))
    }

    /// Returns `true` for [`Segment::Wildcard`].
    #[inline]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// The map key this segment addresses.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            Self::Literal(name) => Cow::Borrowed(name),
            Self::Index(index) => Cow::Owned(index.to_string()),
            Self::Wildcard => Cow::Borrowed(WILDCARD),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
            Self::Wildcard => f.write_str(WILDCARD),
        }
    }
}

// -----------------------------------------------------------------------------
// Path

/// An immutable, cheaply clonable sequence of [`Segment`]s.
///
/// Parsed paths never contain empty segments. The empty path
/// ([`Path::root`]) addresses the graph itself and can only be built
/// programmatically.
///
/// # Examples
///
/// ```
/// use dm_access::{Path, Segment};
///
/// let path = Path::parse("departments.*.name").unwrap();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.segments()[1], Segment::Wildcard);
///
/// let bound = path.bind_first_wildcard(&Segment::Index(2));
/// assert_eq!(bound.to_string(), "departments.2.name");
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Arc<[Segment]>);

static SEGMENT_MEMO: RwLock<HashMap<Box<str>, Path>> =
    RwLock::new(HashMap::with_hasher(FixedHashState));

impl Path {
    /// The empty path, addressing the root of a graph.
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new().into())
    }

    /// Parses `path`, reusing the result of any earlier parse of the same string.
    ///
    /// Segments are split on `.`: `*` is a wildcard, canonical digits are an
    /// index, anything else is a literal key.
    pub fn parse(path: &str) -> Result<Self, PathSyntaxError> {
        let memo = SEGMENT_MEMO.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = memo.get(path) {
            log::trace!("path memo hit: `{path}`");
            return Ok(hit.clone());
        }
        drop(memo);

        let parsed = Self::parse_uncached(path)?;

        // Two threads may both miss and insert; the values are identical.
        SEGMENT_MEMO
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), parsed.clone());

        Ok(parsed)
    }

    /// Parses `path` without consulting or filling the memo.
    pub fn parse_uncached(path: &str) -> Result<Self, PathSyntaxError> {
        if path.is_empty() {
            return Err(PathSyntaxError::new(path, 0, "empty path"));
        }

        let mut segments = Vec::with_capacity(path.len() / 4 + 1);
        let mut offset = 0;
        for token in path.split(SEPARATOR) {
            let segment = Segment::classify(token)
                .map_err(|reason| PathSyntaxError::new(path, offset, reason))?;
            segments.push(segment);
            offset += token.len() + SEPARATOR.len_utf8();
        }

        Ok(Self(segments.into()))
    }

    /// Builds a path from segments that are trusted to be well formed.
    #[inline]
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self(segments.into_iter().collect())
    }

    /// Returns `true` if both paths share the same allocation.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if any segment is a wildcard.
    #[inline]
    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(Segment::is_wildcard)
    }

    /// Counts the wildcard segments.
    #[inline]
    pub fn wildcard_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_wildcard()).count()
    }

    /// Position of the first wildcard segment.
    #[inline]
    pub fn first_wildcard(&self) -> Option<usize> {
        self.0.iter().position(Segment::is_wildcard)
    }

    /// The concrete part in front of the first wildcard, e.g. `a.b` for `a.b.*.c`.
    pub fn wildcard_prefix(&self) -> Option<Path> {
        self.first_wildcard()
            .map(|at| Self::from_segments(self.0[..at].iter().cloned()))
    }

    /// Splits around the first wildcard: `a.*.b.c` gives `(a, b.c)`.
    pub fn split_at_first_wildcard(&self) -> Option<(Path, Path)> {
        self.first_wildcard().map(|at| {
            (
                Self::from_segments(self.0[..at].iter().cloned()),
                Self::from_segments(self.0[at + 1..].iter().cloned()),
            )
        })
    }

    /// Replaces the first wildcard with `key`. Returns a clone when there is none.
    pub fn bind_first_wildcard(&self, key: &Segment) -> Path {
        match self.first_wildcard() {
            Some(at) => {
                let mut segments = self.0.to_vec();
                segments[at] = key.clone();
                Self(segments.into())
            }
            None => self.clone(),
        }
    }

    /// Replaces wildcards left to right with `keys`; surplus wildcards stay.
    pub fn bind_wildcards(&self, keys: &[Segment]) -> Path {
        let mut keys = keys.iter();
        Self::from_segments(self.0.iter().map(|segment| match segment {
            Segment::Wildcard => keys.next().cloned().unwrap_or(Segment::Wildcard),
            other => other.clone(),
        }))
    }

    /// For a concrete match of this pattern, returns the segments that the
    /// wildcards stood for.
    ///
    /// ```
    /// use dm_access::{Path, Segment};
    ///
    /// let pattern = Path::parse("teams.*.members.*").unwrap();
    /// let hit = Path::parse("teams.2.members.lead").unwrap();
    /// assert_eq!(
    ///     pattern.wildcard_keys(&hit),
    ///     vec![Segment::Index(2), Segment::literal("lead")],
    /// );
    /// ```
    pub fn wildcard_keys(&self, concrete: &Path) -> Vec<Segment> {
        self.0
            .iter()
            .zip(concrete.0.iter())
            .filter(|(pattern, _)| pattern.is_wildcard())
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Appends one segment.
    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(segment);
        Self(segments.into())
    }

    /// Appends every segment of `other`.
    pub fn join(&self, other: &Path) -> Path {
        Self::from_segments(self.0.iter().chain(other.0.iter()).cloned())
    }

    /// The first `len` segments.
    pub fn truncated(&self, len: usize) -> Path {
        Self::from_segments(self.0.iter().take(len).cloned())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            fmt::Display::fmt(first, f)?;
            for segment in iter {
                write!(f, "{SEPARATOR}{segment}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path(\"{self}\")")
    }
}

// -----------------------------------------------------------------------------
// IntoPath

/// Anything that can name a [`Path`]: strings are parsed (through the memo),
/// paths are passed through.
pub trait IntoPath {
    fn into_path(self) -> Result<Path, PathSyntaxError>;
}

impl IntoPath for Path {
    #[inline]
    fn into_path(self) -> Result<Path, PathSyntaxError> {
        Ok(self)
    }
}

impl IntoPath for &Path {
    #[inline]
    fn into_path(self) -> Result<Path, PathSyntaxError> {
        Ok(self.clone())
    }
}

impl IntoPath for &str {
    #[inline]
    fn into_path(self) -> Result<Path, PathSyntaxError> {
        Path::parse(self)
    }
}

impl IntoPath for &String {
    #[inline]
    fn into_path(self) -> Result<Path, PathSyntaxError> {
        Path::parse(self)
    }
}

impl IntoPath for String {
    #[inline]
    fn into_path(self) -> Result<Path, PathSyntaxError> {
        Path::parse(&self)
    }
}
