//! Core type definitions for the model resource manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Family of model a resident allocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Large language model
    Llm,
    /// Diffusion pipeline producing images from prompts
    TextToImage,
    /// Text-to-speech model
    Tts,
    /// Speech-to-text model
    Stt,
}

impl ModelType {
    /// Every model type, in declaration order
    pub const ALL: [ModelType; 4] = [
        ModelType::Llm,
        ModelType::TextToImage,
        ModelType::Tts,
        ModelType::Stt,
    ];

    /// Stable string tag used in configuration, logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Llm => "llm",
            ModelType::TextToImage => "text_to_image",
            ModelType::Tts => "tts",
            ModelType::Stt => "stt",
        }
    }
}

impl std::str::FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "llm" => Ok(ModelType::Llm),
            "text_to_image" => Ok(ModelType::TextToImage),
            "tts" => Ok(ModelType::Tts),
            "stt" => Ok(ModelType::Stt),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric precision a model is loaded at
///
/// Variants are declared from lowest to highest fidelity so that the derived
/// ordering reads naturally: `Precision::Fp32 > Precision::Int2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Int2,
    Int4,
    Int8,
    Fp16,
    Fp32,
}

impl Precision {
    /// Tiers walked from best quality to smallest footprint
    pub const DESCENDING: [Precision; 5] = [
        Precision::Fp32,
        Precision::Fp16,
        Precision::Int8,
        Precision::Int4,
        Precision::Int2,
    ];

    /// Bits per weight
    pub fn bits(&self) -> u32 {
        match self {
            Precision::Fp32 => 32,
            Precision::Fp16 => 16,
            Precision::Int8 => 8,
            Precision::Int4 => 4,
            Precision::Int2 => 2,
        }
    }

    /// Footprint relative to the declared fp32 size
    pub fn footprint_factor(&self) -> f64 {
        f64::from(self.bits()) / 32.0
    }

    /// Highest fidelity tier
    pub fn highest() -> Self {
        Precision::Fp32
    }

    /// Smallest footprint tier
    pub fn lowest() -> Self {
        Precision::Int2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Fp32 => "fp32",
            Precision::Fp16 => "fp16",
            Precision::Int8 => "int8",
            Precision::Int4 => "int4",
            Precision::Int2 => "int2",
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fp32" => Ok(Precision::Fp32),
            "fp16" => Ok(Precision::Fp16),
            "int8" => Ok(Precision::Int8),
            "int4" => Ok(Precision::Int4),
            "int2" => Ok(Precision::Int2),
            _ => Err(format!("Unknown precision: {}", s)),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry describing a model the manager knows about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model identifier
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Declared uncompressed (fp32) size in GB
    pub size_gb: f64,

    /// Model family
    pub model_type: ModelType,
}

impl ModelMetadata {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        size_gb: f64,
        model_type: ModelType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size_gb,
            model_type,
        }
    }

    /// Validate a catalog entry
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::Error::config("Catalog entry id cannot be empty"));
        }
        if !self.size_gb.is_finite() || self.size_gb < 0.0 {
            return Err(crate::Error::config(format!(
                "Catalog entry {} has invalid size {}",
                self.id, self.size_gb
            )));
        }
        Ok(())
    }
}

/// Precision chosen for one load attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationConfig {
    /// Selected tier
    pub precision: Precision,

    /// Human readable explanation of the choice
    pub description: String,

    /// Footprint relative to the declared size
    pub footprint_factor: f64,
}

impl QuantizationConfig {
    pub fn new(precision: Precision, description: impl Into<String>) -> Self {
        Self {
            precision,
            description: description.into(),
            footprint_factor: precision.footprint_factor(),
        }
    }

    /// Estimated resident size for a model of the given declared size
    pub fn estimated_footprint_gb(&self, size_gb: f64) -> f64 {
        size_gb * self.footprint_factor
    }
}

/// Snapshot of device capacity at query time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// VRAM the manager may hand out, in GB
    pub available_gb: f64,

    /// Name of the probe that produced the figure
    pub source: String,

    /// When the probe ran
    pub probed_at: DateTime<Utc>,
}

impl HardwareProfile {
    pub fn new(available_gb: f64, source: impl Into<String>) -> Self {
        Self {
            available_gb,
            source: source.into(),
            probed_at: Utc::now(),
        }
    }
}

/// One ledger entry: VRAM spoken for by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAllocation {
    pub model_id: String,

    /// Reserved VRAM in GB
    pub vram_allocated_gb: f64,

    /// Tier the reservation was computed for
    pub precision: Precision,

    pub allocated_at: DateTime<Utc>,
}

impl MemoryAllocation {
    pub fn new(model_id: impl Into<String>, vram_allocated_gb: f64, precision: Precision) -> Self {
        Self {
            model_id: model_id.into(),
            vram_allocated_gb,
            precision,
            allocated_at: Utc::now(),
        }
    }
}

/// Static model type to eviction priority table (higher survives)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityTable {
    pub llm: i32,
    pub text_to_image: i32,
    pub tts: i32,
    pub stt: i32,
}

impl PriorityTable {
    /// Priority of a model type
    pub fn get(&self, model_type: ModelType) -> i32 {
        match model_type {
            ModelType::Llm => self.llm,
            ModelType::TextToImage => self.text_to_image,
            ModelType::Tts => self.tts,
            ModelType::Stt => self.stt,
        }
    }

    /// Override the priority of a model type
    pub fn set(&mut self, model_type: ModelType, priority: i32) {
        match model_type {
            ModelType::Llm => self.llm = priority,
            ModelType::TextToImage => self.text_to_image = priority,
            ModelType::Tts => self.tts = priority,
            ModelType::Stt => self.stt = priority,
        }
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            llm: 2,
            text_to_image: 3,
            tts: 1,
            stt: 1,
        }
    }
}
