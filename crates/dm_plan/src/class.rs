use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{TypeId, type_name};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use dm_utils::hash::fingerprint;

use crate::directive::Directive;

// -----------------------------------------------------------------------------
// ClassId

/// Identity of a described type: its [`TypeId`] plus a readable path.
///
/// Equality and hashing only look at the `TypeId`.
#[derive(Clone, Copy)]
pub struct ClassId {
    type_id: TypeId,
    type_path: &'static str,
}

impl ClassId {
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_path: type_name::<T>(),
        }
    }

    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub const fn type_path(&self) -> &'static str {
        self.type_path
    }
}

impl PartialEq for ClassId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassId").field(&self.type_path).finish()
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_path)
    }
}

// -----------------------------------------------------------------------------
// SourceLocation

/// The file a type is declared in, watched by the `mtime` and `hash` policies.
///
/// `file!()` is relative to the workspace root when building inside a
/// workspace and to the package root otherwise, so a location made with
/// [`in_crate`](Self::in_crate) resolves against the manifest directory and
/// each of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    file: PathBuf,
    manifest_dir: Option<PathBuf>,
}

impl SourceLocation {
    /// A location used as given.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            manifest_dir: None,
        }
    }

    /// A location produced by `file!()` inside the crate at `manifest_dir`.
    pub fn in_crate(manifest_dir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            manifest_dir: Some(manifest_dir.into()),
        }
    }

    #[inline]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The path to stat or read.
    ///
    /// Absolute files are returned as is. Relative files are joined to the
    /// manifest directory and its ancestors, and the first existing candidate
    /// wins; when none exists the relative path is returned unchanged.
    pub fn resolve(&self) -> PathBuf {
        if self.file.is_absolute() {
            return self.file.clone();
        }
        self.manifest_dir
            .iter()
            .flat_map(|dir| dir.ancestors())
            .map(|dir| dir.join(&self.file))
            .find(|candidate| candidate.is_file())
            .unwrap_or_else(|| self.file.clone())
    }
}

// -----------------------------------------------------------------------------
// FieldInfo

/// One declared field and its directives, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    name: Box<str>,
    directives: Vec<Directive>,
}

impl FieldInfo {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        Self {
            name: name.into(),
            directives: Vec::new(),
        }
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }
}

// -----------------------------------------------------------------------------
// ClassInfo

/// The result of analysing a type once: where it lives and what its fields
/// ask for.
///
/// # Examples
///
/// ```
/// use dm_plan::{ClassInfo, Directive, FieldInfo};
///
/// let info = ClassInfo::new("app::User")
///     .with_field(FieldInfo::new("name").with_directive(Directive::MapFrom("user.name".into())))
///     .with_field(FieldInfo::new("token").with_directive(Directive::Hidden));
///
/// assert_eq!(info.fields().len(), 2);
/// assert_eq!(info.field("token").unwrap().directives(), [Directive::Hidden]);
/// assert_ne!(info.signature(), ClassInfo::new("app::User").signature());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassInfo {
    type_path: &'static str,
    source: Option<SourceLocation>,
    fields: Vec<FieldInfo>,
}

impl ClassInfo {
    pub const fn new(type_path: &'static str) -> Self {
        Self {
            type_path,
            source: None,
            fields: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    #[inline]
    pub const fn type_path(&self) -> &'static str {
        self.type_path
    }

    #[inline]
    pub fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }

    #[inline]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// A stable hash of the whole description.
    ///
    /// Stands in for the source hash when a type has no source location.
    #[inline]
    pub fn signature(&self) -> u64 {
        fingerprint(self)
    }
}

// -----------------------------------------------------------------------------
// DescribeClass

/// Types that can describe their own construction metadata.
///
/// Usually derived with [`Plan`](crate::derive::Plan). Describing may be
/// slow; [`PlanCache`](crate::PlanCache) calls it once per type and policy
/// period.
///
/// # Examples
///
/// ```
/// use dm_plan::{ClassInfo, DescribeClass, FieldInfo};
///
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl DescribeClass for Point {
///     fn describe() -> ClassInfo {
///         ClassInfo::new("geo::Point")
///             .with_field(FieldInfo::new("x"))
///             .with_field(FieldInfo::new("y"))
///     }
/// }
///
/// assert_eq!(Point::describe().fields()[1].name(), "y");
/// ```
pub trait DescribeClass: 'static {
    fn describe() -> ClassInfo;
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{ClassId, SourceLocation};

    #[test]
    fn class_id_ignores_path() {
        assert_eq!(ClassId::of::<u8>(), ClassId::of::<u8>());
        assert_ne!(ClassId::of::<u8>(), ClassId::of::<u16>());
        assert_eq!(ClassId::of::<u8>().to_string(), "u8");
    }

    #[test]
    fn resolve_against_ancestors() {
        let root = tempfile::tempdir().unwrap();
        let member = root.path().join("crates/member");
        fs::create_dir_all(member.join("src")).unwrap();
        fs::write(member.join("src/lib.rs"), "struct A;").unwrap();

        // workspace build: `file!()` is relative to the workspace root
        let location = SourceLocation::in_crate(&member, "crates/member/src/lib.rs");
        assert_eq!(location.resolve(), member.join("src/lib.rs"));

        // package build: relative to the package root
        let location = SourceLocation::in_crate(&member, "src/lib.rs");
        assert_eq!(location.resolve(), member.join("src/lib.rs"));

        let location = SourceLocation::in_crate(&member, "src/missing.rs");
        assert_eq!(location.resolve(), std::path::Path::new("src/missing.rs"));

        let absolute = member.join("src/lib.rs");
        assert_eq!(SourceLocation::new(&absolute).resolve(), absolute);
    }
}
