//! # mrm-core
//!
//! Core types, traits, and utilities for the model resource manager, the
//! admission and eviction controller that decides which models share a GPU.
//!
//! This crate provides the foundational data structures and interfaces that are
//! shared across all other mrm components. It includes:
//!
//! - Model, precision and allocation types
//! - The checked model lifecycle state machine
//! - Collaborator traits for unloading, probing, catalog lookup and notifications
//! - Configuration schema and loading
//! - Error handling types and utilities

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod state;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{
    Config, HardwareBackend, HardwareConfig, LoggingConfig, ManagerConfig, MetricsConfig,
};
pub use error::{Error, ErrorContext, Result};
pub use events::{ChannelSink, NullSink, ResourceEvent, TracingSink};
pub use registry::StaticModelRegistry;
pub use state::ModelState;
pub use traits::{ModelRegistry, NotificationSink, UnloadCapability, VramProbe};
pub use types::{
    HardwareProfile, MemoryAllocation, ModelMetadata, ModelType, Precision, PriorityTable,
    QuantizationConfig,
};
