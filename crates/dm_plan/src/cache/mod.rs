//! [`PlanCache`] and its shared handle.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dm_utils::TypeIdMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::class::{ClassId, ClassInfo, DescribeClass};
use crate::config::CacheConfig;
use crate::error::{ConstructError, InvalidationError, PlanError};
use crate::hooks::{FieldHooks, NoHooks};
use crate::plan::ConstructionPlan;

// -----------------------------------------------------------------------------
// Modules

mod token;

use token::Token;

// -----------------------------------------------------------------------------
// PlanCache

struct CacheEntry {
    class: ClassId,
    plan: Arc<ConstructionPlan>,
    /// `None` when the source could not be checked at build time; such an
    /// entry is stale on every lookup.
    token: Option<Token>,
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from a valid entry.
    pub hits: u64,
    /// Lookups of types with no entry.
    pub misses: u64,
    /// Lookups that found a stale entry, or one that could not be checked.
    pub rebuilds: u64,
    /// Entries removed by flushing.
    pub flushes: u64,
}

/// Construction plans keyed by type, refreshed according to an
/// [`InvalidationPolicy`](crate::InvalidationPolicy).
///
/// Lookups take a read lock; building happens outside any lock and the
/// result is stored with a short write lock, so two threads missing the same
/// type at once both build and the last one is kept.
///
/// # Examples
///
/// ```
/// use dm_plan::{CacheConfig, ClassId, ClassInfo, DescribeClass, FieldInfo, PlanCache};
///
/// struct Tag;
///
/// impl DescribeClass for Tag {
///     fn describe() -> ClassInfo {
///         ClassInfo::new("Tag").with_field(FieldInfo::new("label"))
///     }
/// }
///
/// let cache = PlanCache::new(CacheConfig::default());
/// let plan = cache.get_or_build::<Tag>().unwrap();
/// assert_eq!(plan.fields()[0].name(), "label");
///
/// assert!(cache.contains(ClassId::of::<Tag>()));
/// assert_eq!(cache.flush_all(), 1);
/// assert!(cache.is_empty());
/// ```
pub struct PlanCache {
    config: CacheConfig,
    entries: RwLock<TypeIdMap<CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    rebuilds: AtomicU64,
    flushes: AtomicU64,
}

impl PlanCache {
    pub const fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(TypeIdMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn config(&self) -> CacheConfig {
        self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, TypeIdMap<CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TypeIdMap<CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The plan of `T`, described and built on a miss or when the cached one
    /// is stale.
    ///
    /// Failing to check a source for changes is not an error: it is logged
    /// and the plan is rebuilt.
    pub fn get_or_build<T: DescribeClass>(&self) -> Result<Arc<ConstructionPlan>, PlanError> {
        let class = ClassId::of::<T>();
        let cached = self
            .read()
            .get(&class.type_id())
            .map(|entry| (entry.plan.clone(), entry.token));

        let Some((plan, stored)) = cached else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return self.build(class, T::describe());
        };

        match self.is_fresh(&plan, stored, T::describe) {
            Ok(true) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(plan);
            }
            Ok(false) => log::debug!("plan of `{class}` is stale"),
            Err(err) => log::warn!("{err}, rebuilding the plan of `{class}`"),
        }
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.build(class, T::describe())
    }

    fn is_fresh(
        &self,
        plan: &ConstructionPlan,
        stored: Option<Token>,
        describe: fn() -> ClassInfo,
    ) -> Result<bool, InvalidationError> {
        let current = Token::compute(self.config.policy, plan.source(), || {
            describe().signature()
        })?;
        Ok(stored == Some(current))
    }

    fn build(&self, class: ClassId, info: ClassInfo) -> Result<Arc<ConstructionPlan>, PlanError> {
        let plan = Arc::new(ConstructionPlan::build(&info)?);
        let token = match Token::compute(self.config.policy, info.source(), || plan.signature()) {
            Ok(token) => Some(token),
            Err(err) => {
                log::warn!("{err}, the plan of `{class}` will be rebuilt on every lookup");
                None
            }
        };
        log::debug!(
            "built plan of `{class}`: {} fields, {:?}",
            plan.len(),
            plan.flags()
        );

        let entry = CacheEntry {
            class,
            plan: plan.clone(),
            token,
        };
        self.write().insert(class.type_id(), entry);
        Ok(plan)
    }

    /// Removes the entry of `class`, or every entry for `None`. Returns the
    /// number of entries removed.
    pub fn flush(&self, class: Option<ClassId>) -> usize {
        let removed = match class {
            Some(class) => usize::from(self.write().remove(&class.type_id()).is_some()),
            None => {
                let mut entries = self.write();
                let len = entries.len();
                entries.clear();
                len
            }
        };
        if removed > 0 {
            self.flushes.fetch_add(removed as u64, Ordering::Relaxed);
            match class {
                Some(class) => log::debug!("flushed plan of `{class}`"),
                None => log::debug!("flushed {removed} plans"),
            }
        }
        removed
    }

    /// Removes the entry of `T`, returning whether there was one.
    #[inline]
    pub fn flush_type<T: 'static>(&self) -> bool {
        self.flush(Some(ClassId::of::<T>())) == 1
    }

    #[inline]
    pub fn flush_all(&self) -> usize {
        self.flush(None)
    }

    /// Whether an entry, possibly stale, exists for `class`.
    #[inline]
    pub fn contains(&self, class: ClassId) -> bool {
        self.read().contains(&class.type_id())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The cached classes, in arbitrary order.
    pub fn classes(&self) -> Vec<ClassId> {
        self.read().values().map(|entry| entry.class).collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    /// Builds `T` from `source` with no casters or validators.
    #[inline]
    pub fn construct<T>(&self, source: &Value) -> Result<T, ConstructError>
    where
        T: DescribeClass + DeserializeOwned,
    {
        self.construct_with(source, &NoHooks)
    }

    /// Hydrates the fields of `T` from `source`, running `hooks`, then
    /// deserializes them.
    pub fn construct_with<T>(&self, source: &Value, hooks: &dyn FieldHooks) -> Result<T, ConstructError>
    where
        T: DescribeClass + DeserializeOwned,
    {
        let plan = self.get_or_build::<T>()?;
        let fields = plan.hydrate(source, hooks)?;
        serde_json::from_value(fields).map_err(|error| ConstructError::Serde {
            class: plan.type_path(),
            error,
        })
    }

    /// Serializes `value` and reshapes it with [`ConstructionPlan::export`].
    pub fn export<T>(&self, value: &T) -> Result<Value, ConstructError>
    where
        T: DescribeClass + Serialize,
    {
        let plan = self.get_or_build::<T>()?;
        let value = serde_json::to_value(value).map_err(|error| ConstructError::Serde {
            class: plan.type_path(),
            error,
        })?;
        Ok(plan.export(value)?)
    }

    /// Builds the plan of every type marked `#[plan(auto_register)]`,
    /// returning how many there are.
    ///
    /// Generic types are never collected. Requires the `auto_register`
    /// feature; without it nothing is built.
    #[cfg(feature = "auto_register")]
    pub fn warm_up(&self) -> Result<usize, PlanError> {
        use crate::__macro_exports::auto_register::__AutoRegisterFunc;

        let mut count = 0;
        for register in inventory::iter::<__AutoRegisterFunc> {
            (register.0)(self)?;
            count += 1;
        }
        log::debug!("warmed up {count} plans");
        Ok(count)
    }

    /// Builds the plan of every type marked `#[plan(auto_register)]`,
    /// returning how many there are.
    ///
    /// Requires the `auto_register` feature; without it nothing is built.
    #[cfg(not(feature = "auto_register"))]
    #[inline(always)]
    pub fn warm_up(&self) -> Result<usize, PlanError> {
        Ok(0)
    }
}

impl Default for PlanCache {
    #[inline]
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCache")
            .field("config", &self.config)
            .field("classes", &self.classes())
            .field("stats", &self.stats())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// PlanCacheArc

/// A [`PlanCache`] shared between threads.
#[derive(Clone, Default)]
pub struct PlanCacheArc {
    /// The wrapped [`PlanCache`].
    pub internal: Arc<PlanCache>,
}

impl PlanCacheArc {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            internal: Arc::new(PlanCache::new(config)),
        }
    }
}

impl Deref for PlanCacheArc {
    type Target = PlanCache;

    #[inline]
    fn deref(&self) -> &PlanCache {
        &self.internal
    }
}

impl fmt::Debug for PlanCacheArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.internal, f)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, OnceLock};
    use std::thread;
    use std::time::{Duration, SystemTime};

    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::{CacheStats, PlanCache, PlanCacheArc};
    use crate::{CacheConfig, ClassId, ClassInfo, DescribeClass, Directive, FieldInfo};
    use crate::{ConstructError, InvalidationPolicy, SourceLocation};

    // One watched type per test, each pointing at its own temporary file.
    macro_rules! watched {
        ($name:ident, $file:ident) => {
            static $file: OnceLock<PathBuf> = OnceLock::new();

            struct $name;

            impl DescribeClass for $name {
                fn describe() -> ClassInfo {
                    let file = $file.get().cloned().unwrap_or_default();
                    ClassInfo::new(stringify!($name))
                        .with_source(SourceLocation::new(file))
                        .with_field(FieldInfo::new("id"))
                }
            }
        };
    }

    watched!(ManualWatched, MANUAL_FILE);
    watched!(MtimeWatched, MTIME_FILE);
    watched!(HashWatched, HASH_FILE);
    watched!(MissingWatched, MISSING_FILE);

    fn touch(file: &PathBuf, secs: u64) {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        File::options()
            .write(true)
            .open(file)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    fn cache(policy: InvalidationPolicy) -> PlanCache {
        PlanCache::new(CacheConfig::new(policy))
    }

    #[test]
    fn manual_until_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("manual.rs");
        fs::write(&file, "struct A;").unwrap();
        MANUAL_FILE.set(file.clone()).unwrap();

        let cache = cache(InvalidationPolicy::Manual);
        let a = cache.get_or_build::<ManualWatched>().unwrap();
        fs::write(&file, "struct B;").unwrap();
        touch(&file, 5_000);
        let b = cache.get_or_build::<ManualWatched>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        assert!(cache.flush_type::<ManualWatched>());
        assert!(!cache.flush_type::<ManualWatched>());
        let c = cache.get_or_build::<ManualWatched>().unwrap();
        assert!(!Arc::ptr_eq(&b, &c));

        let expected = CacheStats {
            hits: 1,
            misses: 2,
            rebuilds: 0,
            flushes: 1,
        };
        assert_eq!(cache.stats(), expected);
    }

    #[test]
    fn mtime_follows_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mtime.rs");
        fs::write(&file, "struct A;").unwrap();
        touch(&file, 1_000_000);
        MTIME_FILE.set(file.clone()).unwrap();

        let cache = cache(InvalidationPolicy::Mtime);
        let a = cache.get_or_build::<MtimeWatched>().unwrap();
        let b = cache.get_or_build::<MtimeWatched>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // new content, same time
        fs::write(&file, "struct B;").unwrap();
        touch(&file, 1_000_000);
        let c = cache.get_or_build::<MtimeWatched>().unwrap();
        assert!(Arc::ptr_eq(&b, &c));

        touch(&file, 2_000_000);
        let d = cache.get_or_build::<MtimeWatched>().unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(cache.stats().rebuilds, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn hash_follows_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hash.rs");
        fs::write(&file, "struct A;").unwrap();
        HASH_FILE.set(file.clone()).unwrap();

        let cache = cache(InvalidationPolicy::Hash);
        let a = cache.get_or_build::<HashWatched>().unwrap();

        // same content, new time
        touch(&file, 3_000_000);
        let b = cache.get_or_build::<HashWatched>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        fs::write(&file, "struct A { id: u32 }").unwrap();
        let c = cache.get_or_build::<HashWatched>().unwrap();
        assert!(!Arc::ptr_eq(&b, &c));
        assert_eq!(cache.stats().rebuilds, 1);
    }

    #[test]
    fn unreadable_source_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        MISSING_FILE.set(dir.path().join("gone.rs")).unwrap();

        let cache = cache(InvalidationPolicy::Mtime);
        let a = cache.get_or_build::<MissingWatched>().unwrap();
        let b = cache.get_or_build::<MissingWatched>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().rebuilds, 1);
        assert_eq!(cache.len(), 1);
    }

    static GROWN: AtomicBool = AtomicBool::new(false);

    struct Unsourced;

    impl DescribeClass for Unsourced {
        fn describe() -> ClassInfo {
            let info = ClassInfo::new("Unsourced").with_field(FieldInfo::new("a"));
            if GROWN.load(Ordering::Relaxed) {
                info.with_field(FieldInfo::new("b"))
            } else {
                info
            }
        }
    }

    #[test]
    fn hash_without_source_uses_signature() {
        let cache = cache(InvalidationPolicy::Hash);
        assert_eq!(cache.get_or_build::<Unsourced>().unwrap().len(), 1);
        assert_eq!(cache.get_or_build::<Unsourced>().unwrap().len(), 1);

        GROWN.store(true, Ordering::Relaxed);
        assert_eq!(cache.get_or_build::<Unsourced>().unwrap().len(), 2);
        assert_eq!(cache.stats().rebuilds, 1);
        assert_eq!(cache.classes(), [ClassId::of::<Unsourced>()]);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Account {
        login: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        visits: u32,
    }

    impl DescribeClass for Account {
        fn describe() -> ClassInfo {
            ClassInfo::new("Account")
                .with_field(
                    FieldInfo::new("login")
                        .with_directive(Directive::MapFrom("user.login".into()))
                        .with_directive(Directive::MapTo("user.name".into())),
                )
                .with_field(FieldInfo::new("token").with_directive(Directive::Hidden))
                .with_field(FieldInfo::new("visits").with_directive(Directive::Computed))
        }
    }

    #[test]
    fn construct_and_export() {
        let cache = PlanCache::default();
        let source = json!({ "user": { "login": "ada" }, "token": "t", "visits": 3 });
        let account: Account = cache.construct(&source).unwrap();
        assert_eq!(
            account,
            Account {
                login: "ada".into(),
                token: Some("t".into()),
                visits: 0,
            }
        );

        let exported = cache.export(&account).unwrap();
        assert_eq!(exported, json!({ "user": { "name": "ada" }, "visits": 0 }));

        let err = cache.construct::<Account>(&json!({ "user": {} })).unwrap_err();
        assert!(matches!(err, ConstructError::Serde { class: "Account", .. }));
    }

    #[test]
    fn shared_between_threads() {
        let cache = PlanCacheArc::new(CacheConfig::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.get_or_build::<Account>().unwrap().len())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 4);
        assert_eq!(cache.len(), 1);
    }
}
