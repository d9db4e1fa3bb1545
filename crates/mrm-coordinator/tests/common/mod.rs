#![allow(dead_code)]

use mrm_coordinator::ModelLoadingCoordinator;
use mrm_core::{ModelMetadata, ModelState, ModelType, PriorityTable, Precision, StaticModelRegistry};
use mrm_dev::{setup_test_logging, RecordingSink, ScriptedUnloader, UnloadLog};
use mrm_hardware::{HardwareProfiler, MockProbe};
use mrm_state::{QuantizationStrategy, ResourceBook};
use std::collections::HashMap;
use std::sync::Arc;

/// A coordinator wired to a mock probe, scripted unloaders and a recording sink
pub struct Bench {
    pub coordinator: Arc<ModelLoadingCoordinator>,
    pub probe: MockProbe,
    pub log: UnloadLog,
    pub sink: Arc<RecordingSink>,
    pub unloaders: HashMap<ModelType, Arc<ScriptedUnloader>>,
}

impl Bench {
    pub fn new(vram_gb: f64, catalog: Vec<ModelMetadata>) -> Self {
        Self::build(vram_gb, catalog, true)
    }

    /// Bench without any unload capability registered
    pub fn without_unloaders(vram_gb: f64, catalog: Vec<ModelMetadata>) -> Self {
        Self::build(vram_gb, catalog, false)
    }

    fn build(vram_gb: f64, catalog: Vec<ModelMetadata>, with_unloaders: bool) -> Self {
        setup_test_logging();

        let probe = MockProbe::new(vram_gb);
        let profiler = HardwareProfiler::new(Box::new(probe.clone()));
        let registry = StaticModelRegistry::from_entries(catalog).unwrap();
        let sink = Arc::new(RecordingSink::new());

        let coordinator = ModelLoadingCoordinator::new(
            ResourceBook::shared(),
            Arc::new(profiler),
            Arc::new(registry),
            QuantizationStrategy::new(),
            PriorityTable::default(),
            sink.clone(),
        );

        let log = UnloadLog::new();
        let mut unloaders = HashMap::new();
        if with_unloaders {
            for model_type in ModelType::ALL {
                let unloader = Arc::new(ScriptedUnloader::new(model_type.as_str(), log.clone()));
                coordinator.register_unloader(model_type, unloader.clone());
                unloaders.insert(model_type, unloader);
            }
        }

        Self {
            coordinator: Arc::new(coordinator),
            probe,
            log,
            sink,
            unloaders,
        }
    }

    pub fn unloader(&self, model_type: ModelType) -> &Arc<ScriptedUnloader> {
        &self.unloaders[&model_type]
    }

    /// Admit and finish loading a catalog model at full precision
    pub fn make_resident(&self, model_id: &str, model_type: ModelType) {
        let decision = self
            .coordinator
            .prepare_model_loading(model_id, model_type, Some(Precision::Fp32), false);
        assert!(decision.can_load, "{}: {}", model_id, decision.reason);
        let gb = decision.allocation.map(|a| a.vram_allocated_gb).unwrap_or(0.0);
        self.coordinator.complete_loading(model_id, gb).unwrap();
        assert_eq!(self.coordinator.model_state(model_id), ModelState::Loaded);
    }

    pub fn used_gb(&self) -> f64 {
        self.coordinator.ledger_snapshot().used_gb
    }
}

pub fn model(id: &str, size_gb: f64, model_type: ModelType) -> ModelMetadata {
    ModelMetadata::new(id, id, size_gb, model_type)
}
