//! # mrm-hardware
//!
//! Capacity probing for the model resource manager.
//!
//! This crate provides:
//! - A [`HardwareProfiler`] that never fails: it degrades to a CPU reading or
//!   `0.0` when the GPU cannot be queried
//! - Probe backends for `nvidia-smi`, host memory, a fixed budget and a mock
//!
//! ## Supported Backends
//!
//! - **nvidia-smi**: total device memory of one NVIDIA GPU
//! - **CPU**: available host memory via `sysinfo`, used as a degraded fallback
//! - **Static**: a configured budget, useful for shared or virtualised GPUs
//!
//! ## Example
//!
//! ```rust
//! use mrm_hardware::{HardwareProfiler, StaticProbe};
//!
//! let profiler = HardwareProfiler::new(Box::new(StaticProbe::new(24.0))).with_reserve_gb(2.0);
//! assert_eq!(profiler.get_available_vram_gb(), 22.0);
//! ```

use thiserror::Error;

pub mod cpu;
pub mod mock;
pub mod nvidia_smi;
pub mod profiler;

pub use cpu::CpuMemoryProbe;
pub use mock::{MockProbe, StaticProbe};
pub use nvidia_smi::NvidiaSmiProbe;
pub use profiler::{create_probe, HardwareProfiler};

/// Result type for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors raised by individual probe backends
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Probe command failed: {0}")]
    CommandFailed(String),

    #[error("Unparseable probe output: {0}")]
    Parse(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProbeError> for mrm_core::Error {
    fn from(err: ProbeError) -> Self {
        mrm_core::Error::HardwareProbe(err.to_string())
    }
}

const MIB_PER_GB: f64 = 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
