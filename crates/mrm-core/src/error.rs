//! Error type shared by every mrm crate

use crate::state::ModelState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected configuration value
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Unknown model, capability or type
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Duplicate catalog id
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The lifecycle state machine rejected a transition
    #[error("Invalid transition for {model_id}: {from} -> {to}")]
    InvalidTransition {
        model_id: String,
        from: ModelState,
        to: ModelState,
    },

    /// An unload capability reported a failure
    #[error("Unload of {model_id} failed: {message}")]
    Unload { model_id: String, message: String },

    #[error("Hardware probe error: {0}")]
    HardwareProbe(String),

    /// Ledger and tracker disagree
    #[error("State error: {0}")]
    State(String),

    /// The resource manager no longer accepts requests
    #[error("Resource manager is shut down")]
    ShutDown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Layered configuration could not be built
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn unload(model_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Unload {
            model_id: model_id.into(),
            message: msg.into(),
        }
    }

    pub fn hardware_probe(msg: impl Into<String>) -> Self {
        Self::HardwareProbe(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Worth retrying later
    ///
    /// Only probe failures are transient; an unload failure leaves resource
    /// state uncertain and must not be retried blindly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::HardwareProbe(_) | Error::Io(_))
    }

    /// The caller asked for something invalid
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_)
                | Error::NotFound(_)
                | Error::AlreadyExists(_)
                | Error::InvalidTransition { .. }
                | Error::ShutDown
        )
    }

    /// Stable label for logs
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Unload { .. } => "unload",
            Error::HardwareProbe(_) => "hardware_probe",
            Error::State(_) => "state",
            Error::ShutDown => "shut_down",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

/// Prefix a foreign error with a message while converting it
pub trait ErrorContext<T> {
    fn with_context(self, context: impl Into<String>) -> Result<T>;

    /// Lazily built message
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other(anyhow::anyhow!("{}: {}", context.into(), e.into())))
    }

    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Error::Other(anyhow::anyhow!("{}: {}", f(), e.into())))
    }
}
