//! Configuration management for the model resource manager
//!
//! Provides a unified configuration system that supports YAML files and
//! environment variable overrides on top of built-in defaults.

use crate::{ErrorContext, ModelMetadata, PriorityTable, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Admission behaviour
    pub manager: ManagerConfig,

    /// Capacity probing
    pub hardware: HardwareConfig,

    /// Eviction priority per model type
    pub priorities: PriorityTable,

    /// Known models
    pub catalog: Vec<ModelMetadata>,

    /// Log output
    pub logging: LoggingConfig,

    /// Prometheus metrics
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Configuration file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        if let Ok(config_path) = std::env::var("MRM_CONFIG") {
            builder = builder.add_source(config::File::with_name(&config_path).required(false));
        } else {
            for path in &["./mrm.yaml", "/etc/mrm/config.yaml"] {
                builder = builder.add_source(config::File::with_name(path).required(false));
            }
        }

        // MRM_HARDWARE__STATIC_VRAM_GB=24 -> hardware.static_vram_gb
        builder = builder.add_source(
            config::Environment::with_prefix("MRM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Load configuration from a specific file layered over the defaults
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let shown = path.display().to_string();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path));

        let parsed: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .with_context_fn(|| format!("failed to load {}", shown))?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let parsed: Self = serde_yaml::from_str(yaml)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write as YAML to a file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.hardware.validate()?;
        self.logging.validate()?;
        self.metrics.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.catalog {
            entry.validate()?;
            if !seen.insert(entry.id.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate catalog entry: {}",
                    entry.id
                )));
            }
        }

        Ok(())
    }
}

/// Admission behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Evict lower priority models when a load does not fit
    pub auto_swap: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { auto_swap: true }
    }
}

/// Capacity probe backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareBackend {
    /// Query `nvidia-smi`
    NvidiaSmi,
    /// Read available host memory
    Cpu,
    /// Fixed budget from `static_vram_gb`
    Static,
    /// In-process mock for tests
    Mock,
}

impl HardwareBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            HardwareBackend::NvidiaSmi => "nvidia_smi",
            HardwareBackend::Cpu => "cpu",
            HardwareBackend::Static => "static",
            HardwareBackend::Mock => "mock",
        }
    }
}

impl std::fmt::Display for HardwareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HardwareBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "nvidia_smi" | "nvidia" => Ok(HardwareBackend::NvidiaSmi),
            "cpu" => Ok(HardwareBackend::Cpu),
            "static" => Ok(HardwareBackend::Static),
            "mock" => Ok(HardwareBackend::Mock),
            _ => Err(format!("Unknown hardware backend: {}", s)),
        }
    }
}

/// Hardware probing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Probe backend
    pub backend: HardwareBackend,

    /// GPU index passed to the probe
    pub device_index: u32,

    /// Budget reported by the static and mock backends, in GB
    pub static_vram_gb: f64,

    /// Headroom kept away from models, in GB
    pub reserve_gb: f64,

    /// Report host memory when the GPU probe fails
    pub cpu_fallback: bool,

    /// Path or name of the nvidia-smi binary
    pub nvidia_smi_path: String,
}

impl HardwareConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.reserve_gb.is_finite() || self.reserve_gb < 0.0 {
            return Err(crate::Error::config("reserve_gb must be a non-negative number"));
        }
        if !self.static_vram_gb.is_finite() || self.static_vram_gb < 0.0 {
            return Err(crate::Error::config(
                "static_vram_gb must be a non-negative number",
            ));
        }
        if self.backend == HardwareBackend::NvidiaSmi && self.nvidia_smi_path.trim().is_empty() {
            return Err(crate::Error::config("nvidia_smi_path cannot be empty"));
        }
        Ok(())
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: HardwareBackend::NvidiaSmi,
            device_index: 0,
            static_vram_gb: 0.0,
            reserve_gb: 0.0,
            cpu_fallback: false,
            nvidia_smi_path: "nvidia-smi".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json or text)
    pub format: String,

    /// Include the event target
    pub show_target: bool,

    /// Include thread ids
    pub show_thread_ids: bool,

    /// Include file and line numbers
    pub show_line_numbers: bool,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(crate::Error::config(format!("Unknown log level: {}", other)))
            }
        }
        match self.format.to_lowercase().as_str() {
            "json" | "text" => Ok(()),
            other => Err(crate::Error::config(format!("Unknown log format: {}", other))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            show_target: false,
            show_thread_ids: false,
            show_line_numbers: false,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics
    pub enabled: bool,

    /// Metric name prefix
    pub namespace: String,
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        let valid = !self.namespace.is_empty()
            && self
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.namespace.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(crate::Error::config(format!(
                "Invalid metrics namespace: {:?}",
                self.namespace
            )));
        }
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "mrm".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelType;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.manager.auto_swap);
        assert_eq!(config.hardware.backend, HardwareBackend::NvidiaSmi);
        assert_eq!(config.priorities.get(ModelType::TextToImage), 3);
        assert!(config.catalog.is_empty());
    }

    #[test]
    fn test_catalog_validation() {
        let mut config = Config::default();
        config.catalog = vec![
            ModelMetadata::new("llm-7b", "LLM", 10.0, ModelType::Llm),
            ModelMetadata::new("sd-model", "SD", 8.0, ModelType::TextToImage),
        ];
        assert!(config.validate().is_ok());

        config
            .catalog
            .push(ModelMetadata::new("llm-7b", "Dup", 4.0, ModelType::Llm));
        assert!(config.validate().is_err());

        config.catalog.pop();
        config.catalog[0].size_gb = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hardware_validation() {
        let mut hardware = HardwareConfig::default();
        assert!(hardware.validate().is_ok());

        hardware.reserve_gb = -1.0;
        assert!(hardware.validate().is_err());

        hardware.reserve_gb = 0.5;
        hardware.nvidia_smi_path = String::new();
        assert!(hardware.validate().is_err());

        hardware.backend = HardwareBackend::Static;
        assert!(hardware.validate().is_ok());
    }

    #[test]
    fn test_logging_validation() {
        let mut logging = LoggingConfig::default();
        assert!(logging.validate().is_ok());

        logging.level = "verbose".to_string();
        assert!(logging.validate().is_err());

        logging.level = "DEBUG".to_string();
        logging.format = "xml".to_string();
        assert!(logging.validate().is_err());
    }

    #[test]
    fn test_metrics_namespace_validation() {
        let mut metrics = MetricsConfig::default();
        assert!(metrics.validate().is_ok());

        metrics.namespace = "my-app".to_string();
        assert!(metrics.validate().is_err());

        metrics.namespace = "9lives".to_string();
        assert!(metrics.validate().is_err());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("nvidia-smi".parse::<HardwareBackend>().unwrap(), HardwareBackend::NvidiaSmi);
        assert_eq!("static".parse::<HardwareBackend>().unwrap(), HardwareBackend::Static);
        assert!("rocm".parse::<HardwareBackend>().is_err());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
hardware:
  backend: static
  static_vram_gb: 12.0
catalog:
  - id: sd-model
    name: Stable Diffusion
    size_gb: 8.0
    model_type: text_to_image
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.hardware.backend, HardwareBackend::Static);
        assert_eq!(config.hardware.static_vram_gb, 12.0);
        assert_eq!(config.catalog.len(), 1);
        assert_eq!(config.logging.level, "info");
        assert!(config.manager.auto_swap);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "manager:\n  auto_swap: false\npriorities:\n  llm: 7\nhardware:\n  backend: static\n  static_vram_gb: 24.0\n  reserve_gb: 1.5"
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert!(!config.manager.auto_swap);
        assert_eq!(config.priorities.get(ModelType::Llm), 7);
        assert_eq!(config.priorities.get(ModelType::TextToImage), 3);
        assert_eq!(config.hardware.static_vram_gb, 24.0);
        assert_eq!(config.hardware.reserve_gb, 1.5);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "logging:\n  level: chatty").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config
            .catalog
            .push(ModelMetadata::new("tts-model", "TTS", 6.0, ModelType::Tts));

        let yaml = config.to_yaml().unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, deserialized);

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.hardware, deserialized.hardware);
    }

    #[test]
    fn test_to_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mrm.yaml");
        let config = Config::default();
        config.to_file(&path).unwrap();
        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.metrics.namespace, "mrm");
    }
}
