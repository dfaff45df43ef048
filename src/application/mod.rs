//! Application services layer.

pub mod answers;
pub mod audit;
pub mod completion;
pub mod design;
pub mod duplication;
pub mod error;
pub mod flow;
pub mod pagination;
pub mod permissions;
pub mod remap;
pub mod repos;
pub mod results;
