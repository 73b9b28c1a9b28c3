#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// Generated code names this crate `::dm_plan`, including inside it.
extern crate self as dm_plan;

// -----------------------------------------------------------------------------
// Modules

mod cache;
mod class;
mod config;
mod directive;
mod error;
mod flags;
mod hooks;
mod plan;

pub mod derive {
    //! `#[derive(Plan)]`, implementing [`DescribeClass`](crate::DescribeClass).
    pub use dm_plan_derive::Plan;
}

// -----------------------------------------------------------------------------
// Exports

pub use cache::{CacheStats, PlanCache, PlanCacheArc};
pub use class::{ClassId, ClassInfo, DescribeClass, FieldInfo, SourceLocation};
pub use config::{CacheConfig, InvalidationPolicy, UnknownPolicy};
pub use directive::{Directive, ValidationRule};
pub use error::{ConstructError, InvalidationError, PlanError};
pub use flags::PlanFlags;
pub use hooks::{FieldHooks, HookError, NoHooks};
pub use plan::{ConstructionPlan, FieldPlan};

// -----------------------------------------------------------------------------
// Macro support

#[doc(hidden)]
pub mod __macro_exports {
    pub use crate::class::{ClassInfo, DescribeClass, FieldInfo, SourceLocation};
    pub use crate::directive::{Directive, ValidationRule};

    #[cfg(feature = "auto_register")]
    pub mod auto_register {
        pub use inventory;

        use crate::{DescribeClass, PlanCache, PlanError};

        /// One submitted registration, collected by [`PlanCache::warm_up`].
        pub struct __AutoRegisterFunc(pub fn(&PlanCache) -> Result<(), PlanError>);

        inventory::collect!(__AutoRegisterFunc);

        pub trait __RegisterType {
            fn __register(cache: &PlanCache) -> Result<(), PlanError>;
        }

        impl<T: DescribeClass> __RegisterType for T {
            #[inline]
            fn __register(cache: &PlanCache) -> Result<(), PlanError> {
                cache.get_or_build::<T>().map(|_| ())
            }
        }
    }
}
