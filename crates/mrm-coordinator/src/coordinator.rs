//! Admission control and eviction
//!
//! Two locks are involved. The admission mutex serialises whole
//! `prepare_model_loading` / `request_model_swap` sequences so two requests
//! can never compute victim lists against the same stale ledger. The book
//! lock guards the ledger and lifecycle map and is only held for short reads
//! and paired writes, never across an unload call, so loader callbacks keep
//! working while a swap is waiting on a capability.
//!
//! Unload capabilities must not request loads or swaps themselves: the
//! admission mutex is held for the whole swap.

use crate::decision::{LedgerSnapshot, LoadDecision, SwapResult};
use mrm_core::{
    Error, HardwareProfile, MemoryAllocation, ModelMetadata, ModelRegistry, ModelState, ModelType,
    NotificationSink, Precision, PriorityTable, QuantizationConfig, ResourceEvent, Result,
    UnloadCapability,
};
use mrm_hardware::HardwareProfiler;
use mrm_metrics::{LoadOutcome, ResourceMetrics};
use mrm_state::{AllocatorStats, QuantizationStrategy, ResourceBook, SharedResourceBook};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub(crate) const SHUT_DOWN_REASON: &str = "resource manager is shut down";

/// Decides which models may occupy the GPU and evicts to make room
pub struct ModelLoadingCoordinator {
    book: SharedResourceBook,
    profiler: Arc<HardwareProfiler>,
    registry: Arc<dyn ModelRegistry>,
    strategy: QuantizationStrategy,
    priorities: PriorityTable,
    unloaders: RwLock<HashMap<ModelType, Arc<dyn UnloadCapability>>>,
    sink: Arc<dyn NotificationSink>,
    metrics: Option<Arc<ResourceMetrics>>,
    admission: Mutex<()>,
    shut_down: AtomicBool,
}

impl ModelLoadingCoordinator {
    pub fn new(
        book: SharedResourceBook,
        profiler: Arc<HardwareProfiler>,
        registry: Arc<dyn ModelRegistry>,
        strategy: QuantizationStrategy,
        priorities: PriorityTable,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            book,
            profiler,
            registry,
            strategy,
            priorities,
            unloaders: RwLock::new(HashMap::new()),
            sink,
            metrics: None,
            admission: Mutex::new(()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ResourceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register the capability that unloads models of one type
    ///
    /// Replaces any capability registered earlier for the same type.
    pub fn register_unloader(&self, model_type: ModelType, capability: Arc<dyn UnloadCapability>) {
        info!(%model_type, unloader = capability.name(), "Registered unload capability");
        self.unloaders.write().insert(model_type, capability);
    }

    /// Types that have an unload capability, in declaration order
    pub fn registered_types(&self) -> Vec<ModelType> {
        let unloaders = self.unloaders.read();
        ModelType::ALL
            .into_iter()
            .filter(|t| unloaders.contains_key(t))
            .collect()
    }

    pub fn priority_of(&self, model_type: ModelType) -> i32 {
        self.priorities.get(model_type)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Decide whether `model_id` may load, evicting lower priority models if needed
    ///
    /// Never returns an error: every failure is reported through
    /// `can_load = false` and a reason. On refusal the model is `Unloaded` and
    /// the ledger is exactly as it was, minus any models a swap unloaded.
    pub fn prepare_model_loading(
        &self,
        model_id: &str,
        model_type: ModelType,
        preferred_quantization: Option<Precision>,
        auto_swap: bool,
    ) -> LoadDecision {
        let _admission = self.admission.lock();

        if self.is_shut_down() {
            return self.refuse_untouched(model_id, SHUT_DOWN_REASON.to_string());
        }

        // Claim the id before anything else so it cannot be loaded twice or
        // picked as its own victim.
        {
            let mut book = self.book.lock();
            let current = book.state(model_id);
            if book
                .transition(model_id, ModelState::Loading, Some(model_type))
                .is_err()
            {
                drop(book);
                return self.refuse_untouched(
                    model_id,
                    format!("model {} is {}; only unloaded models can be loaded", model_id, current),
                );
            }
        }
        self.emit(ResourceEvent::state_changed(
            model_id,
            Some(model_type),
            ModelState::Unloaded,
            ModelState::Loading,
        ));

        let metadata = match self.registry.get(model_id) {
            Some(metadata) => metadata,
            None => return self.admit_unregistered(model_id, model_type),
        };
        if metadata.model_type != model_type {
            warn!(
                model_id,
                requested = %model_type,
                registered = %metadata.model_type,
                "Requested model type differs from catalog"
            );
        }

        let hardware = self.profiler.profile();
        let quantization =
            self.strategy
                .select_quantization(metadata.size_gb, &hardware, preferred_quantization);
        debug!(model_id, precision = %quantization.precision, "{}", quantization.description);

        if let Some(allocation) = self.try_allocate(&metadata, &quantization, &hardware) {
            let reason = format!(
                "allocated {:.2} GB at {}",
                allocation.vram_allocated_gb, allocation.precision
            );
            return self.admit(metadata, quantization, allocation, Vec::new(), reason);
        }

        let needed = quantization.estimated_footprint_gb(metadata.size_gb);
        if !auto_swap {
            let reason = format!(
                "{} and automatic swapping is disabled",
                self.shortfall(model_id, needed, quantization.precision, hardware.available_gb)
            );
            return self.abort_load(model_id, model_type, reason, Vec::new());
        }

        let swap = self.run_swap(model_id, model_type);
        if !swap.success {
            let reason = format!("swap failed: {}", swap.reason);
            return self.abort_load(model_id, model_type, reason, swap.unloaded_models);
        }

        // Single retry against a fresh reading; no further eviction rounds.
        let hardware = self.profiler.profile();
        match self.try_allocate(&metadata, &quantization, &hardware) {
            Some(allocation) => {
                let reason = if swap.unloaded_models.is_empty() {
                    format!(
                        "allocated {:.2} GB at {}",
                        allocation.vram_allocated_gb, allocation.precision
                    )
                } else {
                    format!(
                        "allocated {:.2} GB at {} after unloading {}",
                        allocation.vram_allocated_gb,
                        allocation.precision,
                        swap.unloaded_models.join(", ")
                    )
                };
                self.admit(metadata, quantization, allocation, swap.unloaded_models, reason)
            }
            None => {
                let reason = format!(
                    "{} after swap ({})",
                    self.shortfall(model_id, needed, quantization.precision, hardware.available_gb),
                    swap.reason
                );
                self.abort_load(model_id, model_type, reason, swap.unloaded_models)
            }
        }
    }

    /// Unload every eligible model to make room for `target_model_id`
    pub fn request_model_swap(&self, target_model_id: &str, target_model_type: ModelType) -> SwapResult {
        let _admission = self.admission.lock();

        if self.is_shut_down() {
            return SwapResult::failed(Vec::new(), SHUT_DOWN_REASON);
        }
        self.run_swap(target_model_id, target_model_type)
    }

    /// Victims for a swap, in unload order
    ///
    /// Only `Loaded` models whose type priority is at most the target's are
    /// eligible. Lowest priority goes first; within a priority the model
    /// holding the most VRAM goes first.
    pub fn determine_models_to_unload(
        &self,
        target_model_id: &str,
        target_model_type: ModelType,
    ) -> Vec<String> {
        let target_priority = self.priorities.get(target_model_type);
        let book = self.book.lock();

        let mut candidates: Vec<(String, i32, f64)> = book
            .tracker()
            .models_in(ModelState::Loaded)
            .into_iter()
            .filter(|id| id != target_model_id)
            .filter_map(|id| {
                let model_type = book.tracker().model_type(&id)?;
                let priority = self.priorities.get(model_type);
                (priority <= target_priority).then(|| {
                    let held = book.allocator().allocated_gb(&id);
                    (id, priority, held)
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| b.2.total_cmp(&a.2))
                .then_with(|| a.0.cmp(&b.0))
        });

        candidates.into_iter().map(|(id, _, _)| id).collect()
    }

    /// The loader finished; record the resident size it measured
    pub fn complete_loading(&self, model_id: &str, actual_vram_gb: f64) -> Result<()> {
        let model_type = {
            let mut book = self.book.lock();
            book.transition(model_id, ModelState::Loaded, None)?;
            book.allocator_mut()
                .record_actual(model_id, actual_vram_gb, None);
            self.update_ledger_metrics(&book);
            book.tracker().model_type(model_id)
        };
        info!(model_id, vram_gb = actual_vram_gb, "Model loaded");
        self.emit(ResourceEvent::state_changed(
            model_id,
            model_type,
            ModelState::Loading,
            ModelState::Loaded,
        ));
        Ok(())
    }

    /// The loader gave up; drop the reservation
    pub fn fail_loading(&self, model_id: &str) -> Result<()> {
        let (model_type, released) = {
            let mut book = self.book.lock();
            book.transition(model_id, ModelState::Unloaded, None)?;
            let released = book.allocator_mut().release(model_id);
            self.update_ledger_metrics(&book);
            (book.tracker().model_type(model_id), released)
        };
        warn!(model_id, "Model load failed");
        self.emit_released(model_id, released);
        self.emit(ResourceEvent::state_changed(
            model_id,
            model_type,
            ModelState::Loading,
            ModelState::Unloaded,
        ));
        Ok(())
    }

    /// A request started running on the model
    pub fn mark_busy(&self, model_id: &str) -> Result<()> {
        self.simple_transition(model_id, ModelState::Loaded, ModelState::Busy)
    }

    /// The model finished its request
    pub fn mark_idle(&self, model_id: &str) -> Result<()> {
        self.simple_transition(model_id, ModelState::Busy, ModelState::Loaded)
    }

    /// Owner-initiated unload through the model type's capability
    ///
    /// If the capability fails the model returns to `Loaded` with its
    /// allocation intact.
    pub fn unload_model(&self, model_id: &str) -> Result<()> {
        let (from, model_type, capability) = {
            let mut book = self.book.lock();
            let from = book.state(model_id);
            from.validate_transition(model_id, ModelState::Unloading)?;
            let model_type = book.tracker().model_type(model_id);
            let capability = self.capability_for(model_id, model_type)?;
            book.transition(model_id, ModelState::Unloading, None)?;
            (from, model_type, capability)
        };
        self.emit(ResourceEvent::state_changed(
            model_id,
            model_type,
            from,
            ModelState::Unloading,
        ));

        self.execute_unload(model_id, model_type, capability.as_ref())
    }

    pub fn model_state(&self, model_id: &str) -> ModelState {
        self.book.lock().state(model_id)
    }

    /// Models in `Loaded` or `Busy`
    pub fn active_models(&self) -> Vec<(String, ModelState)> {
        self.book.lock().tracker().get_active_models()
    }

    /// Ledger contents together with a fresh capacity reading
    pub fn ledger_snapshot(&self) -> LedgerSnapshot {
        let available_gb = self.profiler.get_available_vram_gb();
        let book = self.book.lock();
        let allocator = book.allocator();

        let mut models: Vec<(String, ModelState)> = [
            ModelState::Loading,
            ModelState::Loaded,
            ModelState::Busy,
            ModelState::Unloading,
        ]
        .into_iter()
        .flat_map(|state| {
            book.tracker()
                .models_in(state)
                .into_iter()
                .map(move |id| (id, state))
        })
        .collect();
        models.sort_by(|a, b| a.0.cmp(&b.0));

        LedgerSnapshot {
            available_gb,
            used_gb: allocator.used_gb(),
            unreserved_gb: allocator.unreserved_gb(available_gb),
            allocations: allocator.allocations(),
            models,
        }
    }

    pub fn allocator_stats(&self) -> Arc<AllocatorStats> {
        self.book.lock().allocator().stats()
    }

    /// Check that the ledger and lifecycle map agree
    pub fn verify(&self) -> Result<()> {
        self.book.lock().verify()
    }

    /// Stop admitting and unload every idle resident model
    ///
    /// Best effort: unload failures are logged and the model stays resident.
    /// Returns the ids that were unloaded.
    pub fn shutdown(&self) -> Vec<String> {
        let _admission = self.admission.lock();
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Resource manager already shut down");
            return Vec::new();
        }
        info!("Shutting down resource manager");

        let resident = self.book.lock().tracker().models_in(ModelState::Loaded);
        let mut unloaded = Vec::new();
        for model_id in resident {
            match self.evict(&model_id) {
                Ok(true) => unloaded.push(model_id),
                Ok(false) => debug!(model_id = %model_id, "Model no longer idle, skipped"),
                Err(e) => error!(model_id = %model_id, error = %e, "Unload during shutdown failed"),
            }
        }

        let busy = self.active_models();
        if !busy.is_empty() {
            warn!(remaining = busy.len(), "Models still resident after shutdown");
        }
        unloaded
    }

    fn run_swap(&self, target_model_id: &str, target_model_type: ModelType) -> SwapResult {
        let victims = self.determine_models_to_unload(target_model_id, target_model_type);

        if victims.is_empty() {
            debug!(target_model = target_model_id, "No eligible models to unload");
            let result = SwapResult::succeeded(Vec::new(), "no eligible models to unload");
            self.emit_swap(target_model_id, &result);
            return result;
        }

        info!(
            target_model = target_model_id,
            victims = ?victims,
            "Unloading models to make room"
        );

        let mut unloaded = Vec::with_capacity(victims.len());
        for victim in victims {
            match self.evict(&victim) {
                Ok(true) => unloaded.push(victim),
                Ok(false) => debug!(model_id = %victim, "Victim changed state before unload, skipped"),
                Err(e) => {
                    error!(
                        target_model = target_model_id,
                        model_id = %victim,
                        error = %e,
                        category = e.category(),
                        "Swap aborted"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_swap_failure();
                    }
                    let result =
                        SwapResult::failed(unloaded, format!("failed to unload {}: {}", victim, e));
                    self.emit_swap(target_model_id, &result);
                    return result;
                }
            }
        }

        let reason = format!("unloaded {}", unloaded.join(", "));
        let result = SwapResult::succeeded(unloaded, reason);
        self.emit_swap(target_model_id, &result);
        result
    }

    /// Unload one victim if it is still idle; `Ok(false)` means it was skipped
    fn evict(&self, model_id: &str) -> Result<bool> {
        let (model_type, capability) = {
            let mut book = self.book.lock();
            if book.state(model_id) != ModelState::Loaded {
                return Ok(false);
            }
            let model_type = book.tracker().model_type(model_id);
            let capability = self.capability_for(model_id, model_type)?;
            book.transition(model_id, ModelState::Unloading, None)?;
            (model_type, capability)
        };
        self.emit(ResourceEvent::state_changed(
            model_id,
            model_type,
            ModelState::Loaded,
            ModelState::Unloading,
        ));

        self.execute_unload(model_id, model_type, capability.as_ref())?;
        if let (Some(metrics), Some(model_type)) = (&self.metrics, model_type) {
            metrics.record_swapped(model_type.as_str());
        }
        Ok(true)
    }

    /// Call the capability for a model already in `Unloading` and settle its state
    fn execute_unload(
        &self,
        model_id: &str,
        model_type: Option<ModelType>,
        capability: &dyn UnloadCapability,
    ) -> Result<()> {
        debug!(model_id, unloader = capability.name(), "Invoking unload capability");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| capability.unload(model_id)))
            .unwrap_or_else(|payload| {
                Err(Error::unload(
                    model_id,
                    format!("unloader panicked: {}", panic_message(payload.as_ref())),
                ))
            });
        if let Err(e) = outcome {
            {
                let mut book = self.book.lock();
                book.transition(model_id, ModelState::Loaded, None)?;
            }
            self.emit(ResourceEvent::state_changed(
                model_id,
                model_type,
                ModelState::Unloading,
                ModelState::Loaded,
            ));
            return Err(match e {
                Error::Unload { .. } => e,
                other => Error::unload(model_id, other.to_string()),
            });
        }

        let released = {
            let mut book = self.book.lock();
            let released = book.finish_unload(model_id)?;
            self.update_ledger_metrics(&book);
            released
        };
        info!(model_id, "Model unloaded");
        self.emit_released(model_id, released);
        self.emit(ResourceEvent::state_changed(
            model_id,
            model_type,
            ModelState::Unloading,
            ModelState::Unloaded,
        ));
        Ok(())
    }

    fn capability_for(
        &self,
        model_id: &str,
        model_type: Option<ModelType>,
    ) -> Result<Arc<dyn UnloadCapability>> {
        let model_type = model_type
            .ok_or_else(|| Error::not_found(format!("model type of {} is unknown", model_id)))?;
        self.unloaders
            .read()
            .get(&model_type)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!("no unload capability registered for {}", model_type))
            })
    }

    fn try_allocate(
        &self,
        metadata: &ModelMetadata,
        quantization: &QuantizationConfig,
        hardware: &HardwareProfile,
    ) -> Option<MemoryAllocation> {
        let allocation = {
            let mut book = self.book.lock();
            if book.state(&metadata.id) != ModelState::Loading {
                warn!(model_id = %metadata.id, "Load was cancelled while being admitted");
                return None;
            }
            let allocation = book.allocator_mut().allocate(
                &metadata.id,
                metadata.size_gb,
                quantization,
                hardware.available_gb,
            );
            self.update_ledger_metrics(&book);
            allocation
        }?;

        self.emit(ResourceEvent::Allocated {
            model_id: metadata.id.clone(),
            vram_gb: allocation.vram_allocated_gb,
            precision: allocation.precision,
        });
        Some(allocation)
    }

    fn admit(
        &self,
        metadata: ModelMetadata,
        quantization: QuantizationConfig,
        allocation: MemoryAllocation,
        swapped_models: Vec<String>,
        reason: String,
    ) -> LoadDecision {
        let outcome = if swapped_models.is_empty() {
            LoadOutcome::Admitted
        } else {
            LoadOutcome::AdmittedAfterSwap
        };
        self.record_outcome(outcome);
        info!(model_id = %metadata.id, swapped = ?swapped_models, "{}", reason);

        let model_id = metadata.id.clone();
        LoadDecision::admitted(model_id, reason, metadata, quantization, allocation, swapped_models)
    }

    fn admit_unregistered(&self, model_id: &str, model_type: ModelType) -> LoadDecision {
        warn!(model_id, %model_type, "Model is not registered; loading without validation");

        let mut swapped = Vec::new();
        if !self.active_models().is_empty() {
            let swap = self.run_swap(model_id, model_type);
            if !swap.success {
                let reason = format!("swap for unregistered model failed: {}", swap.reason);
                return self.abort_load(model_id, model_type, reason, swap.unloaded_models);
            }
            swapped = swap.unloaded_models;
        }

        self.record_outcome(LoadOutcome::Unvalidated);
        LoadDecision::unvalidated(
            model_id,
            format!("model {} is not registered; no validation performed", model_id),
            swapped,
        )
    }

    /// Terminal failure: put the model back to `Unloaded`
    fn abort_load(
        &self,
        model_id: &str,
        model_type: ModelType,
        reason: String,
        swapped_models: Vec<String>,
    ) -> LoadDecision {
        let reverted = {
            let mut book = self.book.lock();
            book.transition(model_id, ModelState::Unloaded, None)
        };
        match reverted {
            Ok(_) => self.emit(ResourceEvent::state_changed(
                model_id,
                Some(model_type),
                ModelState::Loading,
                ModelState::Unloaded,
            )),
            Err(e) => warn!(model_id, error = %e, "Could not reset refused model"),
        }

        warn!(model_id, "Load refused: {}", reason);
        self.record_outcome(LoadOutcome::Refused);
        self.emit(ResourceEvent::LoadRefused {
            model_id: model_id.to_string(),
            reason: reason.clone(),
        });
        LoadDecision::refused(model_id, reason, swapped_models)
    }

    /// Refusal that never touched any state
    fn refuse_untouched(&self, model_id: &str, reason: String) -> LoadDecision {
        info!(model_id, "Load refused: {}", reason);
        self.record_outcome(LoadOutcome::Refused);
        self.emit(ResourceEvent::LoadRefused {
            model_id: model_id.to_string(),
            reason: reason.clone(),
        });
        LoadDecision::refused(model_id, reason, Vec::new())
    }

    fn shortfall(&self, model_id: &str, needed_gb: f64, precision: Precision, available_gb: f64) -> String {
        let unreserved = self.book.lock().allocator().unreserved_gb(available_gb);
        format!(
            "insufficient VRAM for {}: needs {:.2} GB at {}, {:.2} GB unreserved of {:.2} GB",
            model_id, needed_gb, precision, unreserved, available_gb
        )
    }

    fn simple_transition(&self, model_id: &str, from: ModelState, to: ModelState) -> Result<()> {
        let model_type = {
            let mut book = self.book.lock();
            let current = book.state(model_id);
            if current != from {
                return Err(Error::InvalidTransition {
                    model_id: model_id.to_string(),
                    from: current,
                    to,
                });
            }
            book.transition(model_id, to, None)?;
            book.tracker().model_type(model_id)
        };
        self.emit(ResourceEvent::state_changed(model_id, model_type, from, to));
        Ok(())
    }

    fn record_outcome(&self, outcome: LoadOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(outcome);
        }
    }

    fn update_ledger_metrics(&self, book: &ResourceBook) {
        if let Some(metrics) = &self.metrics {
            let allocator = book.allocator();
            metrics.set_ledger(allocator.used_gb(), allocator.last_observed_available_gb());
        }
    }

    fn emit(&self, event: ResourceEvent) {
        self.sink.notify(event);
    }

    fn emit_released(&self, model_id: &str, released: Option<MemoryAllocation>) {
        if let Some(allocation) = released {
            self.emit(ResourceEvent::Released {
                model_id: model_id.to_string(),
                vram_gb: allocation.vram_allocated_gb,
            });
        }
    }

    fn emit_swap(&self, target_model_id: &str, result: &SwapResult) {
        self.emit(ResourceEvent::SwapCompleted {
            target_model_id: target_model_id.to_string(),
            unloaded_models: result.unloaded_models.clone(),
            success: result.success,
        });
    }
}

impl std::fmt::Debug for ModelLoadingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoadingCoordinator")
            .field("profiler", &self.profiler)
            .field("priorities", &self.priorities)
            .field("unloaders", &self.registered_types())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
