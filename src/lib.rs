//! Survey builder: branching page flows, survey duplication and answer remapping.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
