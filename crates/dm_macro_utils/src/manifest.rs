use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use proc_macro2::Span;
use toml_edit::{Document, Item, Table};

/// The umbrella crate re-exporting every `dm_*` crate under its short name.
const UMBRELLA: &str = "dm_core";
const PREFIX: &str = "dm_";

/// The caller's `Cargo.toml`, used to spell paths to workspace crates in
/// generated code.
///
/// # Resolution
///
/// For `get_crate_path("dm_plan")`:
///
/// 1. `::dm_plan` if the caller depends on `dm_plan` directly;
/// 2. `::dm_core::plan` if it depends on `dm_core`;
/// 3. the same lookups in `dev-dependencies`;
/// 4. `::dm_plan` otherwise.
///
/// ```rust
/// # use dm_macro_utils::Manifest;
/// let path: syn::Path = Manifest::shared(|m| m.get_crate_path("dm_plan"));
/// ```
#[derive(Debug)]
pub struct Manifest {
    document: Option<Document<Box<str>>>,
    modified: Option<SystemTime>,
}

impl Manifest {
    fn manifest_path() -> Option<PathBuf> {
        env::var_os("CARGO_MANIFEST_DIR").map(|dir| PathBuf::from(dir).join("Cargo.toml"))
    }

    fn load(path: &PathBuf, modified: Option<SystemTime>) -> Self {
        let document = fs::read_to_string(path)
            .ok()
            .and_then(|text| Document::parse(text.into_boxed_str()).ok());
        Self { document, modified }
    }

    fn lookup(deps: &Table, name: &str) -> Option<syn::Path> {
        if deps.contains_key(name) {
            return syn::parse_str(&format!("::{name}")).ok();
        }
        let short = name.strip_prefix(PREFIX)?;
        if deps.contains_key(UMBRELLA) {
            return syn::parse_str(&format!("::{UMBRELLA}::{short}")).ok();
        }
        None
    }

    /// The path under which the caller can reach the crate `name`.
    pub fn get_crate_path(&self, name: &str) -> syn::Path {
        let found = self.document.as_ref().and_then(|document| {
            ["dependencies", "dev-dependencies"]
                .into_iter()
                .find_map(|section| match document.get(section) {
                    Some(Item::Table(deps)) => Self::lookup(deps, name),
                    _ => None,
                })
        });

        found.unwrap_or_else(|| {
            let ident = syn::Ident::new(name, Span::call_site());
            let mut path = syn::Path::from(ident);
            path.leading_colon = Some(Default::default());
            path
        })
    }

    /// Runs `func` on the caller's manifest.
    ///
    /// Parsed manifests are cached per path and reparsed only when the
    /// file's modification time changes.
    pub fn shared<R>(func: impl FnOnce(&Self) -> R) -> R {
        static MANIFESTS: RwLock<BTreeMap<PathBuf, Manifest>> = RwLock::new(BTreeMap::new());

        let Some(path) = Self::manifest_path() else {
            return func(&Self {
                document: None,
                modified: None,
            });
        };
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();

        let cache = MANIFESTS.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(manifest) = cache.get(&path)
            && modified.is_some()
            && manifest.modified == modified
        {
            return func(manifest);
        }
        drop(cache);

        let manifest = Self::load(&path, modified);
        let result = func(&manifest);
        MANIFESTS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, manifest);
        result
    }
}

#[cfg(test)]
mod tests {
    use toml_edit::Document;

    use super::Manifest;

    fn manifest(toml: &str) -> Manifest {
        Manifest {
            document: Some(Document::parse(toml.to_owned().into_boxed_str()).unwrap()),
            modified: None,
        }
    }

    fn path_of(manifest: &Manifest, name: &str) -> String {
        let path = manifest.get_crate_path(name);
        let segments: Vec<_> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        format!("::{}", segments.join("::"))
    }

    #[test]
    fn direct_dependency_wins() {
        let m = manifest("[dependencies]\ndm_plan = \"0.0.1\"\ndm_core = \"0.0.1\"\n");
        assert_eq!(path_of(&m, "dm_plan"), "::dm_plan");
    }

    #[test]
    fn umbrella_and_dev_dependencies() {
        let m = manifest("[dependencies]\ndm_core = \"0.0.1\"\n");
        assert_eq!(path_of(&m, "dm_plan"), "::dm_core::plan");

        let m = manifest("[dev-dependencies]\ndm_plan = { path = \"..\" }\n");
        assert_eq!(path_of(&m, "dm_plan"), "::dm_plan");

        let m = manifest("[dependencies]\nserde = \"1\"\n");
        assert_eq!(path_of(&m, "dm_plan"), "::dm_plan");
        assert_eq!(path_of(&m, "other"), "::other");
    }
}
