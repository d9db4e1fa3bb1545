//! Resource manager metrics

use crate::{MetricsError, Result};
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// How a load request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fit without evicting anything
    Admitted,
    /// Fit after a swap
    AdmittedAfterSwap,
    /// Allowed without metadata
    Unvalidated,
    /// Refused
    Refused,
}

impl LoadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadOutcome::Admitted => "admitted",
            LoadOutcome::AdmittedAfterSwap => "admitted_after_swap",
            LoadOutcome::Unvalidated => "unvalidated",
            LoadOutcome::Refused => "refused",
        }
    }
}

/// Counters and gauges for admissions, swaps and the ledger
#[derive(Debug, Clone)]
pub struct ResourceMetrics {
    registry: Registry,

    /// Load decisions by outcome
    pub load_decisions_total: IntCounterVec,

    /// Models evicted by a swap, by model type
    pub models_swapped_total: IntCounterVec,

    /// Swaps aborted by an unload failure
    pub swap_failures_total: IntCounter,

    /// Sum of the ledger in GB
    pub ledger_used_gb: Gauge,

    /// Last capacity reading in GB
    pub ledger_available_gb: Gauge,
}

impl ResourceMetrics {
    /// Create the metrics and register them in a private registry
    pub fn new(namespace: &str) -> Result<Self> {
        if namespace.is_empty() {
            return Err(MetricsError::Config("namespace cannot be empty".to_string()));
        }

        let metrics = Self {
            registry: Registry::new(),
            load_decisions_total: IntCounterVec::new(
                Opts::new("load_decisions_total", "Load decisions by outcome").namespace(namespace),
                &["outcome"],
            )?,
            models_swapped_total: IntCounterVec::new(
                Opts::new("models_swapped_total", "Models unloaded to make room for another")
                    .namespace(namespace),
                &["model_type"],
            )?,
            swap_failures_total: IntCounter::with_opts(
                Opts::new("swap_failures_total", "Swaps aborted by an unload failure")
                    .namespace(namespace),
            )?,
            ledger_used_gb: Gauge::with_opts(
                Opts::new("ledger_used_gb", "VRAM reserved in the ledger (GB)").namespace(namespace),
            )?,
            ledger_available_gb: Gauge::with_opts(
                Opts::new("ledger_available_gb", "Last observed available VRAM (GB)")
                    .namespace(namespace),
            )?,
        };
        metrics.register(&metrics.registry)?;
        Ok(metrics)
    }

    /// Register all metrics with the given registry
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.load_decisions_total.clone()))?;
        registry.register(Box::new(self.models_swapped_total.clone()))?;
        registry.register(Box::new(self.swap_failures_total.clone()))?;
        registry.register(Box::new(self.ledger_used_gb.clone()))?;
        registry.register(Box::new(self.ledger_available_gb.clone()))?;
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_decision(&self, outcome: LoadOutcome) {
        self.load_decisions_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_swapped(&self, model_type: &str) {
        self.models_swapped_total
            .with_label_values(&[model_type])
            .inc();
    }

    pub fn record_swap_failure(&self) {
        self.swap_failures_total.inc();
    }

    pub fn set_ledger(&self, used_gb: f64, available_gb: f64) {
        self.ledger_used_gb.set(used_gb);
        self.ledger_available_gb.set(available_gb);
    }

    /// Export metrics as Prometheus text format
    pub fn export_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::Export(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| MetricsError::Export(format!("Failed to convert metrics to string: {}", e)))
    }
}
