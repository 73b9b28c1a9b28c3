#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use dm_access as access;
pub use dm_mapper as mapper;
pub use dm_plan as plan;
pub use dm_utils as utils;
