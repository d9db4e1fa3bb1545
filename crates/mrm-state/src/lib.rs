//! # mrm-state
//!
//! Resource state for the model resource manager.
//!
//! This crate provides:
//! - The quantization policy that picks a precision tier per load
//! - The allocation ledger (`MemoryAllocator`) with admission checks
//! - The per-model lifecycle map (`ModelLifecycleTracker`)
//! - `ResourceBook`, which keeps both behind a single lock
//!
//! ## Example
//!
//! ```rust
//! use mrm_core::{HardwareProfile, ModelState, ModelType};
//! use mrm_state::{QuantizationStrategy, ResourceBook};
//!
//! let mut book = ResourceBook::new();
//! let hardware = HardwareProfile::new(12.0, "static");
//! let quantization = QuantizationStrategy::new().select_quantization(8.0, &hardware, None);
//!
//! book.transition("sd-model", ModelState::Loading, Some(ModelType::TextToImage)).unwrap();
//! let allocation = book
//!     .allocator_mut()
//!     .allocate("sd-model", 8.0, &quantization, hardware.available_gb)
//!     .unwrap();
//! assert_eq!(allocation.vram_allocated_gb, 8.0);
//! ```

pub mod allocator;
pub mod book;
pub mod quantization;
pub mod tracker;

// Re-export commonly used types
pub use allocator::{AllocatorStats, MemoryAllocator};
pub use book::{ResourceBook, SharedResourceBook};
pub use quantization::QuantizationStrategy;
pub use tracker::{ModelLifecycleTracker, TrackedModel};
