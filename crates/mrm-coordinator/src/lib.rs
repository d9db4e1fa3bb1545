//! # mrm-coordinator
//!
//! Admission and eviction for the model resource manager.
//!
//! This crate provides the [`ModelLoadingCoordinator`], which decides whether a
//! model may load, at what precision, and which resident models must be
//! unloaded first, and the [`ResourceManager`] that owns it for the lifetime of
//! an application session.

pub mod coordinator;
pub mod decision;
pub mod manager;

// Re-export commonly used types
pub use coordinator::ModelLoadingCoordinator;
pub use decision::{LedgerSnapshot, LoadDecision, SwapResult};
pub use manager::ResourceManager;

use mrm_core::LoggingConfig;

/// Initialize logging and tracing
///
/// `RUST_LOG` overrides the configured level. Installing a second subscriber
/// is a no-op.
pub fn init_logging(logging_config: &LoggingConfig) -> mrm_core::Result<()> {
    logging_config.validate()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging_config.show_target)
        .with_thread_ids(logging_config.show_thread_ids)
        .with_line_number(logging_config.show_line_numbers);

    let installed = match logging_config.format.as_str() {
        "json" => subscriber.json().try_init(),
        _ => subscriber.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_init_logging_rejects_bad_format() {
        let config = LoggingConfig {
            format: "xml".to_string(),
            ..Default::default()
        };
        assert!(init_logging(&config).is_err());
    }
}
