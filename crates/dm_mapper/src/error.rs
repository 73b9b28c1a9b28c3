use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use dm_access::{MutationError, Path, PathSyntaxError};
use thiserror::Error;

/// An error raised while compiling a template or producing a target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MapError {
    #[error(transparent)]
    Path(#[from] PathSyntaxError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    /// A `{{ ... }}` expression that does not follow
    /// `path [?? default] [| filter]*`.
    #[error("invalid expression `{expression}`: {reason}")]
    Expression {
        expression: Box<str>,
        reason: Cow<'static, str>,
    },
    /// Wildcard groups expanded by the same `*` node have different sizes.
    #[error("wildcard groups expanded at `{at}` differ in size: {}", describe_groups(.groups))]
    WildcardCardinalityMismatch {
        /// Target path of the repeating node.
        at: Path,
        /// Each source container with its number of children.
        groups: Vec<(Path, usize)>,
    },
    /// A target path has a wildcard that no source wildcard can bind.
    #[error("target `{target}` has more wildcards than source `{from}`")]
    UnboundWildcard { target: Path, from: Path },
}

impl MapError {
    #[cold]
    pub(crate) fn expression(expression: &str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Expression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

fn describe_groups(groups: &[(Path, usize)]) -> String {
    let mut out = String::new();
    for (i, (container, len)) in groups.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "`{container}` has {len}");
    }
    out
}
