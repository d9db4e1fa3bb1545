//! Collaborator traits
//!
//! The manager never loads or frees weights itself. It reaches the outside
//! world through these interfaces, one implementation per concern, injected
//! at construction time.

use crate::{events::ResourceEvent, ModelMetadata, Result};

/// Releases the resident weights of one model family
///
/// One implementation is registered per [`ModelType`](crate::ModelType).
/// `unload` must block until the memory is actually returned to the device;
/// an `Err` aborts the surrounding swap.
pub trait UnloadCapability: Send + Sync {
    /// Unload the given model and return once its VRAM is free
    fn unload(&self, model_id: &str) -> Result<()>;

    /// Name used in logs
    fn name(&self) -> &str {
        "unloader"
    }
}

/// Reads currently available device memory
pub trait VramProbe: Send + Sync {
    /// Available memory in GB
    fn query_available_gb(&self) -> Result<f64>;

    /// Backend name
    fn name(&self) -> &str;
}

/// Catalog lookup from model id to metadata
pub trait ModelRegistry: Send + Sync {
    /// Look up a model
    fn get(&self, model_id: &str) -> Option<ModelMetadata>;

    /// Every registered model, ordered by id
    fn list(&self) -> Vec<ModelMetadata>;

    fn contains(&self, model_id: &str) -> bool {
        self.get(model_id).is_some()
    }
}

/// Fire-and-forget receiver of resource events
///
/// Implementations must not block and must swallow their own delivery failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: ResourceEvent);
}
