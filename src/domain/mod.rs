//! Domain layer types and invariants.

pub mod answers;
pub mod duplicate;
pub mod entities;
pub mod error;
pub mod flow;
pub mod graph;
pub mod remapping;
pub mod scales;
pub mod types;
