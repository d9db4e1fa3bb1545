//! # mrm-dev
//!
//! Development and testing utilities for the model resource manager.
//!
//! This crate provides:
//! - Scripted unload capabilities that record call order and fail on demand
//! - A notification sink that records events
//! - Sample catalogs and configurations
//! - Test logging setup

pub mod mock_adapters;
pub mod utils;

// Re-export commonly used types
pub use mock_adapters::{RecordingSink, ScriptedUnloader, UnloadLog};
pub use utils::{create_test_config, sample_catalog, setup_test_logging};
