//! Model lifecycle state machine
//!
//! A model moves `Unloaded -> Loading -> Loaded <-> Busy -> Unloading -> Unloaded`.
//! `Loading -> Unloaded` covers a failed load and `Unloading -> Loaded` an
//! unload the capability refused. Every writer is expected to call
//! [`ModelState::validate_transition`] before storing a new state.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelState {
    /// Not resident, no allocation
    #[default]
    Unloaded,
    /// Admission granted, weights being loaded
    Loading,
    /// Resident and idle
    Loaded,
    /// Resident and serving a request
    Busy,
    /// Weights being released
    Unloading,
}

impl ModelState {
    /// Whether the model counts as resident for `get_active_models`
    pub fn is_active(&self) -> bool {
        matches!(self, ModelState::Loaded | ModelState::Busy)
    }

    /// Whether the model may be picked as an eviction victim
    pub fn is_evictable(&self) -> bool {
        matches!(self, ModelState::Loaded)
    }

    /// Check whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: ModelState) -> bool {
        use ModelState::*;
        matches!(
            (*self, next),
            (Unloaded, Loading)
                | (Loading, Loaded)
                | (Loading, Unloaded)
                | (Loaded, Busy)
                | (Busy, Loaded)
                | (Loaded, Unloading)
                | (Busy, Unloading)
                | (Unloading, Unloaded)
                | (Unloading, Loaded)
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but returns a typed error
    pub fn validate_transition(&self, model_id: &str, next: ModelState) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                model_id: model_id.to_string(),
                from: *self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Loaded => "loaded",
            ModelState::Busy => "busy",
            ModelState::Unloading => "unloading",
        }
    }
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
