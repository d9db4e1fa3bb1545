//! Session-scoped resource manager

use crate::coordinator::{ModelLoadingCoordinator, SHUT_DOWN_REASON};
use crate::decision::{LedgerSnapshot, LoadDecision, SwapResult};
use mrm_core::{
    Config, Error, ModelRegistry, ModelType, NotificationSink, Precision, Result,
    StaticModelRegistry, UnloadCapability,
};
use mrm_hardware::HardwareProfiler;
use mrm_metrics::ResourceMetrics;
use mrm_state::{QuantizationStrategy, ResourceBook};
use std::sync::Arc;
use tracing::info;

/// Owns every piece of resource state for one application session
///
/// Construct once at startup, hand [`handle`](Self::handle) to loaders, and
/// call [`shutdown`](Self::shutdown) before exit.
#[derive(Debug)]
pub struct ResourceManager {
    config: Config,
    coordinator: Arc<ModelLoadingCoordinator>,
    metrics: Option<Arc<ResourceMetrics>>,
}

impl ResourceManager {
    /// Wire a manager from explicit collaborators
    pub fn new(
        config: Config,
        profiler: HardwareProfiler,
        registry: Arc<dyn ModelRegistry>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = if config.metrics.enabled {
            let metrics = ResourceMetrics::new(&config.metrics.namespace)
                .map_err(|e| Error::Other(e.into()))?;
            Some(Arc::new(metrics))
        } else {
            None
        };

        let mut coordinator = ModelLoadingCoordinator::new(
            ResourceBook::shared(),
            Arc::new(profiler),
            registry,
            QuantizationStrategy::new(),
            config.priorities.clone(),
            sink,
        );
        if let Some(metrics) = &metrics {
            coordinator = coordinator.with_metrics(Arc::clone(metrics));
        }

        info!(
            auto_swap = config.manager.auto_swap,
            catalog = config.catalog.len(),
            "Resource manager created"
        );

        Ok(Self {
            config,
            coordinator: Arc::new(coordinator),
            metrics,
        })
    }

    /// Build the profiler and catalog registry from configuration
    pub fn from_config(config: Config, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let profiler = HardwareProfiler::from_config(&config.hardware)?;
        let registry = StaticModelRegistry::from_entries(config.catalog.clone())?;
        Self::new(config, profiler, Arc::new(registry), sink)
    }

    pub fn register_unloader(&self, model_type: ModelType, capability: Arc<dyn UnloadCapability>) {
        self.coordinator.register_unloader(model_type, capability);
    }

    /// Shared handle for loaders that report back through callbacks
    pub fn handle(&self) -> Arc<ModelLoadingCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Arc<ResourceMetrics>> {
        self.metrics.as_ref()
    }

    /// Admission with the configured `auto_swap` default
    pub fn load(
        &self,
        model_id: &str,
        model_type: ModelType,
        preferred_quantization: Option<Precision>,
    ) -> LoadDecision {
        self.prepare_model_loading(
            model_id,
            model_type,
            preferred_quantization,
            self.config.manager.auto_swap,
        )
    }

    pub fn prepare_model_loading(
        &self,
        model_id: &str,
        model_type: ModelType,
        preferred_quantization: Option<Precision>,
        auto_swap: bool,
    ) -> LoadDecision {
        self.coordinator
            .prepare_model_loading(model_id, model_type, preferred_quantization, auto_swap)
    }

    pub fn request_model_swap(&self, target_model_id: &str, target_model_type: ModelType) -> SwapResult {
        self.coordinator
            .request_model_swap(target_model_id, target_model_type)
    }

    pub fn ledger_snapshot(&self) -> LedgerSnapshot {
        self.coordinator.ledger_snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.coordinator.is_shut_down()
    }

    /// Unload idle resident models and refuse further admissions
    ///
    /// Later requests get `can_load = false` with the reason
    /// "resource manager is shut down". Calling it twice is harmless.
    pub fn shutdown(&self) -> Vec<String> {
        let unloaded = self.coordinator.shutdown();
        info!(unloaded = ?unloaded, "{}", SHUT_DOWN_REASON);
        unloaded
    }
}
