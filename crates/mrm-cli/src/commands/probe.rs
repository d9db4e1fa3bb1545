//! Hardware probing

use crate::output::{gb, Formattable, OutputFormatter};
use anyhow::Result;
use mrm_core::{HardwareConfig, HardwareProfile};
use mrm_hardware::HardwareProfiler;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ProbeReport {
    backend: String,
    reserve_gb: f64,
    #[serde(flatten)]
    profile: HardwareProfile,
}

impl Formattable for ProbeReport {
    fn table_headers() -> Vec<String> {
        ["Backend", "Source", "Available", "Reserve", "Probed at"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.backend.clone(),
            self.profile.source.clone(),
            gb(self.profile.available_gb),
            gb(self.reserve_gb),
            self.profile.probed_at.to_rfc3339(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        Self::table_headers()
            .into_iter()
            .zip(self.table_row())
            .collect()
    }
}

/// Query the configured backend once and report the managed budget
pub fn probe_hardware(hardware: &HardwareConfig, formatter: &OutputFormatter) -> Result<()> {
    let profiler = HardwareProfiler::from_config(hardware)?;
    let report = ProbeReport {
        backend: profiler.backend_name().to_string(),
        reserve_gb: hardware.reserve_gb,
        profile: profiler.profile(),
    };

    formatter.print_item(&report)?;
    if report.profile.source == "none" {
        formatter.print_warning("No probe answered; admission would see 0 GB")?;
    }
    Ok(())
}
