#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// The segment memo needs `std::sync`; everything else sticks to `core`/`alloc`.
extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod accessor;
mod mutator;
mod path;

pub mod coerce;
pub mod wildcard;

// -----------------------------------------------------------------------------
// Exports

pub use accessor::{DataAccessor, Resolved};
pub use mutator::{DataMutator, MAX_INDEX_PADDING, MutationError};
pub use path::{IntoPath, Path, PathSyntaxError, SEPARATOR, Segment, WILDCARD};
pub use wildcard::Matches;

/// Re-export of the graph type every operation works on.
pub use serde_json::{Map, Value};
