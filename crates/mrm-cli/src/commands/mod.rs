//! Command implementations for mrmctl

pub mod catalog;
pub mod config;
pub mod probe;
pub mod simulate;
