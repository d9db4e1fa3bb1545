//! Ledger and lifecycle state behind one lock

use crate::{MemoryAllocator, ModelLifecycleTracker};
use mrm_core::{Error, MemoryAllocation, ModelState, ModelType, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Ledger plus lifecycle map, shared between the coordinator and loader callbacks
pub type SharedResourceBook = Arc<Mutex<ResourceBook>>;

/// The two pieces of mutable resource state
///
/// A model's allocation and its state are always written while holding the
/// same guard, so neither can be observed without the other.
#[derive(Debug, Default)]
pub struct ResourceBook {
    allocator: MemoryAllocator,
    tracker: ModelLifecycleTracker,
}

impl ResourceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedResourceBook {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn allocator(&self) -> &MemoryAllocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut MemoryAllocator {
        &mut self.allocator
    }

    pub fn tracker(&self) -> &ModelLifecycleTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ModelLifecycleTracker {
        &mut self.tracker
    }

    pub fn state(&self, model_id: &str) -> ModelState {
        self.tracker.state(model_id)
    }

    /// Apply a checked state transition, returning the previous state
    pub fn transition(
        &mut self,
        model_id: &str,
        next: ModelState,
        model_type: Option<ModelType>,
    ) -> Result<ModelState> {
        let current = self.tracker.state(model_id);
        current.validate_transition(model_id, next)?;
        Ok(self.tracker.set_state(model_id, next, model_type))
    }

    /// Move a model to `Unloaded` and drop its allocation in one step
    pub fn finish_unload(&mut self, model_id: &str) -> Result<Option<MemoryAllocation>> {
        self.transition(model_id, ModelState::Unloaded, None)?;
        Ok(self.allocator.release(model_id))
    }

    /// Check that allocations and states agree
    ///
    /// Every allocation belongs to a model that is loading, resident or
    /// unloading, and every resident model has an allocation.
    pub fn verify(&self) -> Result<()> {
        for allocation in self.allocator.allocations() {
            if self.tracker.state(&allocation.model_id) == ModelState::Unloaded {
                return Err(Error::state(format!(
                    "allocation for {} has no live state",
                    allocation.model_id
                )));
            }
        }
        for (model_id, state) in self.tracker.get_active_models() {
            if self.allocator.allocation(&model_id).is_none() {
                return Err(Error::state(format!(
                    "{} is {} without an allocation",
                    model_id, state
                )));
            }
        }
        Ok(())
    }
}
