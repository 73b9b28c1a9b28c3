use alloc::boxed::Box;
use std::io;
use std::path::PathBuf;

use dm_access::{MutationError, PathSyntaxError};
use thiserror::Error;

use crate::hooks::HookError;

/// A class description that cannot be turned into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PlanError {
    #[error("field `{field}` of `{class}`: {error}")]
    Path {
        class: &'static str,
        field: Box<str>,
        error: PathSyntaxError,
    },

    #[error("`{class}` declares field `{field}` more than once")]
    DuplicateField { class: &'static str, field: Box<str> },

    #[error("field `{field}` of `{class}` has more than one `{directive}`")]
    RepeatedDirective {
        class: &'static str,
        field: Box<str>,
        directive: &'static str,
    },

    #[error("field `{field}` of `{class}` exports to a wildcard path")]
    WildcardTarget { class: &'static str, field: Box<str> },
}

/// The watched source of a plan could not be checked.
///
/// Never surfaced by [`PlanCache`](crate::PlanCache): it is logged and the
/// plan is rebuilt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvalidationError {
    #[error("cannot check `{}` for changes: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure of a typed construction or export.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConstructError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("cannot convert `{class}`: {error}")]
    Serde {
        class: &'static str,
        #[source]
        error: serde_json::Error,
    },
}
