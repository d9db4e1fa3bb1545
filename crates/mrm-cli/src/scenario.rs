//! Scenario files replayed by `mrmctl simulate`
//!
//! A scenario is a list of loader events fed to a resource manager backed
//! by simulated unloaders:
//!
//! ```yaml
//! name: swap for image generation
//! vram_gb: 12
//! failing_unloads: [stt-model]
//! steps:
//!   - load: { model: tts-model }
//!   - loaded: { model: tts-model, vram_gb: 5.5 }
//!   - load: { model: sd-model, expect: admitted }
//!   - snapshot
//! ```

use crate::output::{gb, Formattable};
use anyhow::{bail, Context, Result};
use mrm_coordinator::{LedgerSnapshot, ResourceManager};
use mrm_core::{Config, HardwareBackend, ModelMetadata, ModelType, Precision};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Fixed device budget; replaces the configured hardware backend
    #[serde(default)]
    pub vram_gb: Option<f64>,
    #[serde(default)]
    pub auto_swap: Option<bool>,
    /// Replaces the configured catalog when non-empty
    #[serde(default)]
    pub catalog: Vec<ModelMetadata>,
    /// Models whose simulated unloader refuses to unload them
    #[serde(default)]
    pub failing_unloads: Vec<String>,
    /// Written as `- load: { ... }` maps; unit steps as bare strings
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Load(LoadStep),
    Loaded(LoadedStep),
    Fail(String),
    Busy(String),
    Idle(String),
    Unload(String),
    Swap(SwapStep),
    Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadStep {
    pub model: String,
    #[serde(default, rename = "type")]
    pub model_type: Option<ModelType>,
    #[serde(default)]
    pub precision: Option<Precision>,
    #[serde(default)]
    pub auto_swap: Option<bool>,
    #[serde(default)]
    pub expect: Option<Expectation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedStep {
    pub model: String,
    /// Measured footprint; defaults to the reservation made at admission
    #[serde(default)]
    pub vram_gb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapStep {
    pub model: String,
    #[serde(default, rename = "type")]
    pub model_type: Option<ModelType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Admitted,
    Refused,
}

/// What happened at one step
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub model: String,
    pub ok: bool,
    /// False when the step declared an expectation that was not met
    pub as_expected: bool,
    pub detail: String,
    pub swapped: Vec<String>,
    pub used_gb: f64,
}

impl Formattable for StepOutcome {
    fn table_headers() -> Vec<String> {
        ["#", "Action", "Model", "Result", "Unloaded", "Used", "Detail"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn table_row(&self) -> Vec<String> {
        let result = match (self.ok, self.as_expected) {
            (_, false) => "UNEXPECTED",
            (true, true) => "ok",
            (false, true) => "refused",
        };
        vec![
            self.index.to_string(),
            self.action.clone(),
            self.model.clone(),
            result.to_string(),
            self.swapped.join(", "),
            gb(self.used_gb),
            self.detail.clone(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        Self::table_headers()
            .into_iter()
            .zip(self.table_row())
            .collect()
    }
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            bail!("scenario has no steps");
        }
        if let Some(vram_gb) = self.vram_gb {
            if !vram_gb.is_finite() || vram_gb < 0.0 {
                bail!("vram_gb must be a non-negative number, got {}", vram_gb);
            }
        }
        Ok(())
    }

    /// Layer the scenario's overrides over a loaded configuration
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(vram_gb) = self.vram_gb {
            config.hardware.backend = HardwareBackend::Static;
            config.hardware.static_vram_gb = vram_gb;
            config.hardware.cpu_fallback = false;
        }
        if let Some(auto_swap) = self.auto_swap {
            config.manager.auto_swap = auto_swap;
        }
        if !self.catalog.is_empty() {
            config.catalog = self.catalog.clone();
        }
        config
    }
}

/// Replays steps in order and records the outcome of each
pub struct ScenarioRunner<'a> {
    manager: &'a ResourceManager,
    types: HashMap<String, ModelType>,
    reserved: HashMap<String, f64>,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(manager: &'a ResourceManager) -> Self {
        let types = manager
            .config()
            .catalog
            .iter()
            .map(|m| (m.id.clone(), m.model_type))
            .collect();
        Self {
            manager,
            types,
            reserved: HashMap::new(),
        }
    }

    pub fn run(&mut self, steps: &[Step]) -> Vec<StepOutcome> {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| self.run_step(i + 1, step))
            .collect()
    }

    fn run_step(&mut self, index: usize, step: &Step) -> StepOutcome {
        let handle = self.manager.handle();

        let (action, model, ok, detail, swapped, as_expected) = match step {
            Step::Load(load) => match self.resolve_type(&load.model, load.model_type) {
                Ok(model_type) => {
                    let auto_swap = load
                        .auto_swap
                        .unwrap_or(self.manager.config().manager.auto_swap);
                    let decision = self.manager.prepare_model_loading(
                        &load.model,
                        model_type,
                        load.precision,
                        auto_swap,
                    );
                    if let Some(allocation) = &decision.allocation {
                        self.types.insert(load.model.clone(), model_type);
                        self.reserved
                            .insert(load.model.clone(), allocation.vram_allocated_gb);
                    } else if decision.can_load {
                        self.types.insert(load.model.clone(), model_type);
                    }
                    let as_expected = match load.expect {
                        Some(Expectation::Admitted) => decision.can_load,
                        Some(Expectation::Refused) => !decision.can_load,
                        None => true,
                    };
                    (
                        "load",
                        load.model.clone(),
                        decision.can_load,
                        decision.reason,
                        decision.swapped_models,
                        as_expected,
                    )
                }
                Err(e) => ("load", load.model.clone(), false, e.to_string(), Vec::new(), true),
            },
            Step::Loaded(loaded) => {
                let vram_gb = loaded
                    .vram_gb
                    .or_else(|| self.reserved.get(&loaded.model).copied())
                    .unwrap_or(0.0);
                let result = handle.complete_loading(&loaded.model, vram_gb);
                let (ok, detail) = describe(result, format!("resident at {}", gb(vram_gb)));
                ("loaded", loaded.model.clone(), ok, detail, Vec::new(), true)
            }
            Step::Fail(model) => {
                let (ok, detail) = describe(handle.fail_loading(model), "load abandoned".into());
                ("fail", model.clone(), ok, detail, Vec::new(), true)
            }
            Step::Busy(model) => {
                let (ok, detail) = describe(handle.mark_busy(model), "serving".into());
                ("busy", model.clone(), ok, detail, Vec::new(), true)
            }
            Step::Idle(model) => {
                let (ok, detail) = describe(handle.mark_idle(model), "idle".into());
                ("idle", model.clone(), ok, detail, Vec::new(), true)
            }
            Step::Unload(model) => {
                let (ok, detail) = describe(handle.unload_model(model), "unloaded".into());
                ("unload", model.clone(), ok, detail, Vec::new(), true)
            }
            Step::Swap(swap) => match self.resolve_type(&swap.model, swap.model_type) {
                Ok(model_type) => {
                    let result = self.manager.request_model_swap(&swap.model, model_type);
                    (
                        "swap",
                        swap.model.clone(),
                        result.success,
                        result.reason,
                        result.unloaded_models,
                        true,
                    )
                }
                Err(e) => ("swap", swap.model.clone(), false, e.to_string(), Vec::new(), true),
            },
            Step::Snapshot => {
                let snapshot = self.manager.ledger_snapshot();
                ("snapshot", String::new(), true, summarize(&snapshot), Vec::new(), true)
            }
        };

        StepOutcome {
            index,
            action: action.to_string(),
            model,
            ok,
            as_expected,
            detail,
            swapped,
            used_gb: self.manager.ledger_snapshot().used_gb,
        }
    }

    fn resolve_type(&self, model_id: &str, declared: Option<ModelType>) -> Result<ModelType> {
        match declared.or_else(|| self.types.get(model_id).copied()) {
            Some(model_type) => Ok(model_type),
            None => bail!("model {} is not in the catalog; give its type", model_id),
        }
    }
}

fn describe(result: mrm_core::Result<()>, success: String) -> (bool, String) {
    match result {
        Ok(()) => (true, success),
        Err(e) => (false, e.to_string()),
    }
}

fn summarize(snapshot: &LedgerSnapshot) -> String {
    let models: Vec<String> = snapshot
        .models
        .iter()
        .map(|(id, state)| format!("{}={}", id, state))
        .collect();
    format!(
        "{} of {} reserved; {}",
        gb(snapshot.used_gb),
        gb(snapshot.available_gb),
        if models.is_empty() {
            "no models".to_string()
        } else {
            models.join(" ")
        }
    )
}
