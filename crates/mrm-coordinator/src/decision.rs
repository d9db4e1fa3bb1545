//! Structured results returned to callers

use mrm_core::{MemoryAllocation, ModelMetadata, ModelState, QuantizationConfig};
use serde::Serialize;

/// Outcome of `prepare_model_loading`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadDecision {
    pub model_id: String,
    pub can_load: bool,
    pub reason: String,
    pub metadata: Option<ModelMetadata>,
    pub quantization: Option<QuantizationConfig>,
    pub allocation: Option<MemoryAllocation>,
    /// Models unloaded while preparing this load, in unload order
    pub swapped_models: Vec<String>,
}

impl LoadDecision {
    pub fn admitted(
        model_id: impl Into<String>,
        reason: impl Into<String>,
        metadata: ModelMetadata,
        quantization: QuantizationConfig,
        allocation: MemoryAllocation,
        swapped_models: Vec<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            can_load: true,
            reason: reason.into(),
            metadata: Some(metadata),
            quantization: Some(quantization),
            allocation: Some(allocation),
            swapped_models,
        }
    }

    /// Allowed without metadata, quantization or allocation
    pub fn unvalidated(
        model_id: impl Into<String>,
        reason: impl Into<String>,
        swapped_models: Vec<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            can_load: true,
            reason: reason.into(),
            metadata: None,
            quantization: None,
            allocation: None,
            swapped_models,
        }
    }

    pub fn refused(
        model_id: impl Into<String>,
        reason: impl Into<String>,
        swapped_models: Vec<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            can_load: false,
            reason: reason.into(),
            metadata: None,
            quantization: None,
            allocation: None,
            swapped_models,
        }
    }
}

/// Outcome of `request_model_swap`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapResult {
    pub success: bool,
    /// Models actually unloaded, in unload order
    pub unloaded_models: Vec<String>,
    pub reason: String,
}

impl SwapResult {
    pub fn succeeded(unloaded_models: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            success: true,
            unloaded_models,
            reason: reason.into(),
        }
    }

    pub fn failed(unloaded_models: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            unloaded_models,
            reason: reason.into(),
        }
    }
}

/// Point-in-time view of the ledger and lifecycle map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    /// Fresh capacity reading
    pub available_gb: f64,
    pub used_gb: f64,
    pub unreserved_gb: f64,
    pub allocations: Vec<MemoryAllocation>,
    /// Every tracked model that is not `Unloaded`
    pub models: Vec<(String, ModelState)>,
}
