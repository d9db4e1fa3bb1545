//! Precision selection policy

use mrm_core::{HardwareProfile, Precision, QuantizationConfig};
use tracing::debug;

/// Picks the precision a model should load at
///
/// Stateless: the result depends only on the declared size, the hardware
/// snapshot and the caller's preference.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizationStrategy;

impl QuantizationStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Select the precision for a model of `size_gb` declared (fp32) gigabytes
    ///
    /// A preferred tier is honoured when its footprint fits. Otherwise the best
    /// fitting tier wins, and when nothing fits the smallest tier is returned:
    /// making room is the swap path's job, not this one's.
    pub fn select_quantization(
        &self,
        size_gb: f64,
        hardware: &HardwareProfile,
        preferred: Option<Precision>,
    ) -> QuantizationConfig {
        let available = hardware.available_gb;
        let fits = |p: Precision| size_gb * p.footprint_factor() <= available;

        if let Some(preferred) = preferred {
            if fits(preferred) {
                debug!(%preferred, size_gb, available, "honouring preferred precision");
                return QuantizationConfig::new(
                    preferred,
                    describe(preferred, size_gb, "requested"),
                );
            }
            debug!(%preferred, size_gb, available, "preferred precision does not fit");
        }

        let chosen = Precision::DESCENDING
            .into_iter()
            .find(|p| fits(*p));

        match chosen {
            Some(precision) => {
                let reason = if precision == Precision::highest() {
                    "full precision fits"
                } else {
                    "highest precision that fits"
                };
                QuantizationConfig::new(precision, describe(precision, size_gb, reason))
            }
            None => {
                let lowest = Precision::lowest();
                QuantizationConfig::new(
                    lowest,
                    describe(lowest, size_gb, "does not fit at any precision"),
                )
            }
        }
    }
}

fn describe(precision: Precision, size_gb: f64, reason: &str) -> String {
    format!(
        "{} ({}-bit, ~{:.2} GB): {}",
        precision,
        precision.bits(),
        size_gb * precision.footprint_factor(),
        reason
    )
}
