//! Per-model lifecycle tracking

use chrono::{DateTime, Utc};
use mrm_core::{ModelState, ModelType};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Lifecycle record of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedModel {
    pub state: ModelState,
    pub model_type: Option<ModelType>,
    pub updated_at: DateTime<Utc>,
}

/// Map from model id to lifecycle state and type
///
/// Writes are unconditional. Legality is checked by callers through
/// [`ModelState::validate_transition`] before they call [`set_state`](Self::set_state).
#[derive(Debug, Default)]
pub struct ModelLifecycleTracker {
    models: HashMap<String, TrackedModel>,
}

impl ModelLifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a state, returning the previous one
    ///
    /// A `None` type keeps whatever type was recorded before.
    pub fn set_state(
        &mut self,
        model_id: &str,
        state: ModelState,
        model_type: Option<ModelType>,
    ) -> ModelState {
        let now = Utc::now();
        let previous = match self.models.get_mut(model_id) {
            Some(entry) => {
                let previous = entry.state;
                entry.state = state;
                if model_type.is_some() {
                    entry.model_type = model_type;
                }
                entry.updated_at = now;
                previous
            }
            None => {
                self.models.insert(
                    model_id.to_string(),
                    TrackedModel {
                        state,
                        model_type,
                        updated_at: now,
                    },
                );
                ModelState::Unloaded
            }
        };
        debug!(model_id, from = %previous, to = %state, "Model state set");
        previous
    }

    /// Current state; untracked models are `Unloaded`
    pub fn state(&self, model_id: &str) -> ModelState {
        self.models
            .get(model_id)
            .map(|m| m.state)
            .unwrap_or_default()
    }

    pub fn model_type(&self, model_id: &str) -> Option<ModelType> {
        self.models.get(model_id).and_then(|m| m.model_type)
    }

    pub fn get(&self, model_id: &str) -> Option<&TrackedModel> {
        self.models.get(model_id)
    }

    /// Models in `Loaded` or `Busy`, ordered by id
    pub fn get_active_models(&self) -> Vec<(String, ModelState)> {
        let mut active: Vec<_> = self
            .models
            .iter()
            .filter(|(_, m)| m.state.is_active())
            .map(|(id, m)| (id.clone(), m.state))
            .collect();
        active.sort_by(|a, b| a.0.cmp(&b.0));
        active
    }

    /// Ids of models in a given state, ordered by id
    pub fn models_in(&self, state: ModelState) -> Vec<String> {
        let mut ids: Vec<_> = self
            .models
            .iter()
            .filter(|(_, m)| m.state == state)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_is_unloaded() {
        let tracker = ModelLifecycleTracker::new();
        assert_eq!(tracker.state("anything"), ModelState::Unloaded);
        assert!(tracker.model_type("anything").is_none());
    }

    #[test]
    fn test_set_state_returns_previous_and_keeps_type() {
        let mut tracker = ModelLifecycleTracker::new();
        let prev = tracker.set_state("llm-7b", ModelState::Loading, Some(ModelType::Llm));
        assert_eq!(prev, ModelState::Unloaded);

        let prev = tracker.set_state("llm-7b", ModelState::Loaded, None);
        assert_eq!(prev, ModelState::Loading);
        assert_eq!(tracker.model_type("llm-7b"), Some(ModelType::Llm));
    }

    #[test]
    fn test_writes_are_unconditional() {
        let mut tracker = ModelLifecycleTracker::new();
        tracker.set_state("m", ModelState::Busy, None);
        assert_eq!(tracker.state("m"), ModelState::Busy);
    }

    #[test]
    fn test_active_models() {
        let mut tracker = ModelLifecycleTracker::new();
        tracker.set_state("b", ModelState::Busy, Some(ModelType::Llm));
        tracker.set_state("a", ModelState::Loaded, Some(ModelType::Tts));
        tracker.set_state("c", ModelState::Loading, Some(ModelType::Stt));
        tracker.set_state("d", ModelState::Unloading, Some(ModelType::Stt));
        tracker.set_state("e", ModelState::Unloaded, Some(ModelType::Stt));

        assert_eq!(
            tracker.get_active_models(),
            vec![
                ("a".to_string(), ModelState::Loaded),
                ("b".to_string(), ModelState::Busy)
            ]
        );
        assert_eq!(tracker.models_in(ModelState::Loading), vec!["c".to_string()]);
    }
}
