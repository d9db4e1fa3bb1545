//! # mrm-metrics
//!
//! Prometheus metrics for the model resource manager: admission outcomes,
//! evictions and ledger usage.

pub mod resource;

pub use resource::{LoadOutcome, ResourceMetrics};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
