//! Utility functions for development and testing

use mrm_core::{Config, HardwareBackend, ModelMetadata, ModelType};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Setup test logging with appropriate levels
pub fn setup_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mrm_coordinator=debug,mrm_state=debug,mrm_hardware=debug,mrm_dev=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// One model of every type, sized for a 12 GB card
pub fn sample_catalog() -> Vec<ModelMetadata> {
    vec![
        ModelMetadata::new("sd-model", "Stable Diffusion", 8.0, ModelType::TextToImage),
        ModelMetadata::new("llm-7b", "LLM 7B", 10.0, ModelType::Llm),
        ModelMetadata::new("tts-model", "Text to Speech", 6.0, ModelType::Tts),
        ModelMetadata::new("stt-model", "Speech to Text", 2.0, ModelType::Stt),
    ]
}

/// Configuration with a static VRAM budget, the sample catalog and metrics enabled
pub fn create_test_config(vram_gb: f64) -> Config {
    let mut config = Config::default();
    config.hardware.backend = HardwareBackend::Mock;
    config.hardware.static_vram_gb = vram_gb;
    config.catalog = sample_catalog();
    config.logging.level = "debug".to_string();
    config
}
