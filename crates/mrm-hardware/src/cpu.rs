//! Host memory probe used when no GPU answers

use crate::{ProbeError, Result, BYTES_PER_GB};
use mrm_core::VramProbe;
use parking_lot::Mutex;
use sysinfo::System;

/// Reports the host's available memory through `sysinfo`
pub struct CpuMemoryProbe {
    system: Mutex<System>,
}

impl CpuMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for CpuMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuMemoryProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuMemoryProbe").finish_non_exhaustive()
    }
}

impl VramProbe for CpuMemoryProbe {
    fn query_available_gb(&self) -> mrm_core::Result<f64> {
        let available = {
            let mut system = self.system.lock();
            system.refresh_memory();
            system.available_memory()
        };
        Ok(available_gb(available)?)
    }

    fn name(&self) -> &str {
        "cpu"
    }
}

/// Convert a `sysinfo` byte count to GB; zero means the platform gave no figure
pub fn available_gb(bytes: u64) -> Result<f64> {
    if bytes == 0 {
        return Err(ProbeError::DeviceNotFound(
            "host reported no available memory".to_string(),
        ));
    }
    Ok(bytes as f64 / BYTES_PER_GB)
}
