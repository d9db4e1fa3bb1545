//! Resident allocation ledger

use mrm_core::{MemoryAllocation, Precision, QuantizationConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Slack for floating point comparisons, in GB
const EPSILON_GB: f64 = 1e-9;

/// Owns the record of how much VRAM each model holds
///
/// The ledger is pessimistic: it is compared against live hardware only when
/// an allocation is requested.
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    allocations: HashMap<String, MemoryAllocation>,
    last_observed_available_gb: f64,
    stats: Arc<AllocatorStats>,
}

/// Allocator statistics
#[derive(Debug, Default)]
pub struct AllocatorStats {
    pub attempts: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub releases: AtomicU64,
}

impl AllocatorStats {
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

impl MemoryAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the quantized footprint of a model
    ///
    /// All or nothing: on failure the ledger is untouched. A model that already
    /// holds an allocation cannot take a second one.
    pub fn allocate(
        &mut self,
        model_id: &str,
        size_gb: f64,
        quantization: &QuantizationConfig,
        available_gb: f64,
    ) -> Option<MemoryAllocation> {
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);

        if self.allocations.contains_key(model_id) {
            warn!(model_id, "Model already holds an allocation");
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let footprint = quantization.estimated_footprint_gb(size_gb);
        let unreserved = self.unreserved_gb(available_gb);

        if footprint > unreserved + EPSILON_GB {
            debug!(
                model_id,
                footprint_gb = footprint,
                unreserved_gb = unreserved,
                "Allocation does not fit"
            );
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let allocation = MemoryAllocation::new(model_id, footprint, quantization.precision);
        self.allocations
            .insert(model_id.to_string(), allocation.clone());
        self.last_observed_available_gb = available_gb;
        self.stats.successes.fetch_add(1, Ordering::Relaxed);

        info!(
            model_id,
            vram_gb = footprint,
            precision = %quantization.precision,
            used_gb = self.used_gb(),
            available_gb,
            "Allocated VRAM"
        );
        Some(allocation)
    }

    /// Remove a model's ledger entry; unknown ids are a no-op
    pub fn release(&mut self, model_id: &str) -> Option<MemoryAllocation> {
        let released = self.allocations.remove(model_id);
        match &released {
            Some(allocation) => {
                self.stats.releases.fetch_add(1, Ordering::Relaxed);
                info!(model_id, vram_gb = allocation.vram_allocated_gb, "Released VRAM");
            }
            None => debug!(model_id, "Release of unknown allocation ignored"),
        }
        released
    }

    /// Replace the reservation with the size the loader actually measured
    ///
    /// Inserts an entry when none exists, which is how models that skipped
    /// validation become visible to the ledger.
    pub fn record_actual(&mut self, model_id: &str, actual_gb: f64, precision: Option<Precision>) {
        let actual_gb = if actual_gb.is_finite() { actual_gb.max(0.0) } else { 0.0 };
        match self.allocations.get_mut(model_id) {
            Some(existing) => {
                debug!(
                    model_id,
                    reserved_gb = existing.vram_allocated_gb,
                    actual_gb,
                    "Recording actual resident size"
                );
                existing.vram_allocated_gb = actual_gb;
                if let Some(precision) = precision {
                    existing.precision = precision;
                }
            }
            None => {
                debug!(model_id, actual_gb, "Recording untracked resident model");
                self.allocations.insert(
                    model_id.to_string(),
                    MemoryAllocation::new(
                        model_id,
                        actual_gb,
                        precision.unwrap_or_else(Precision::highest),
                    ),
                );
            }
        }
    }

    pub fn allocation(&self, model_id: &str) -> Option<&MemoryAllocation> {
        self.allocations.get(model_id)
    }

    /// VRAM held by a model, `0.0` when it has no entry
    pub fn allocated_gb(&self, model_id: &str) -> f64 {
        self.allocations
            .get(model_id)
            .map(|a| a.vram_allocated_gb)
            .unwrap_or(0.0)
    }

    /// Every entry, ordered by model id
    pub fn allocations(&self) -> Vec<MemoryAllocation> {
        let mut all: Vec<_> = self.allocations.values().cloned().collect();
        all.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        all
    }

    /// Sum of all reservations
    pub fn used_gb(&self) -> f64 {
        self.allocations.values().map(|a| a.vram_allocated_gb).sum()
    }

    /// Capacity not yet spoken for, given a fresh hardware reading
    pub fn unreserved_gb(&self, available_gb: f64) -> f64 {
        (available_gb - self.used_gb()).max(0.0)
    }

    pub fn last_observed_available_gb(&self) -> f64 {
        self.last_observed_available_gb
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn stats(&self) -> Arc<AllocatorStats> {
        Arc::clone(&self.stats)
    }
}
