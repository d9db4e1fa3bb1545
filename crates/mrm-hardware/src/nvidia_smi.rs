//! nvidia-smi backed probe

use crate::{ProbeError, Result, MIB_PER_GB};
use mrm_core::VramProbe;
use std::process::Command;
use tracing::debug;

/// Reads the memory budget of one NVIDIA GPU through `nvidia-smi`
///
/// The figure is `memory.total`: resident models are tracked by the ledger,
/// so subtracting their usage here would count them twice.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    binary: String,
    device_index: u32,
}

impl NvidiaSmiProbe {
    pub fn new(binary: impl Into<String>, device_index: u32) -> Self {
        Self {
            binary: binary.into(),
            device_index,
        }
    }

    fn run(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--query-gpu=memory.total")
            .arg("--format=csv,noheader,nounits")
            .arg("-i")
            .arg(self.device_index.to_string())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VramProbe for NvidiaSmiProbe {
    fn query_available_gb(&self) -> mrm_core::Result<f64> {
        let stdout = self.run()?;
        let gb = parse_memory_mib(&stdout)?;
        debug!(device = self.device_index, vram_gb = gb, "nvidia-smi reading");
        Ok(gb)
    }

    fn name(&self) -> &str {
        "nvidia_smi"
    }
}

/// Parse the first line of `--format=csv,noheader,nounits` output (MiB) into GB
pub fn parse_memory_mib(output: &str) -> Result<f64> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| ProbeError::DeviceNotFound("nvidia-smi returned no rows".to_string()))?;

    let mib: f64 = line
        .parse()
        .map_err(|_| ProbeError::Parse(format!("expected MiB value, got {:?}", line)))?;

    Ok(mib / MIB_PER_GB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory() {
        assert_eq!(parse_memory_mib("12288\n").unwrap(), 12.0);
        assert_eq!(parse_memory_mib("\n  24576  \n8192\n").unwrap(), 24.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_memory_mib("[N/A]"), Err(ProbeError::Parse(_))));
        assert!(matches!(parse_memory_mib(""), Err(ProbeError::DeviceNotFound(_))));
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let probe = NvidiaSmiProbe::new("/nonexistent/nvidia-smi", 0);
        let err = probe.query_available_gb().unwrap_err();
        assert!(matches!(err, mrm_core::Error::HardwareProbe(_)));
    }
}
