#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod builder;
mod error;
mod mapper;
mod options;
mod result;

pub mod filter;
pub mod template;

// -----------------------------------------------------------------------------
// Exports

pub use builder::DataMapper;
pub use error::MapError;
pub use filter::Filter;
pub use mapper::TemplateMapper;
pub use options::MapperOptions;
pub use result::DataMapperResult;
pub use template::{Expression, Template};
