//! Hardware profiler delegating to a probe backend

use crate::{CpuMemoryProbe, MockProbe, NvidiaSmiProbe, StaticProbe};
use mrm_core::{HardwareBackend, HardwareConfig, HardwareProfile, VramProbe};
use tracing::{debug, info, warn};

/// Answers "how much VRAM may the manager hand out right now"
///
/// Never fails. A broken primary probe falls back to the secondary probe if
/// one is configured, and otherwise reports `0.0`.
pub struct HardwareProfiler {
    primary: Box<dyn VramProbe>,
    fallback: Option<Box<dyn VramProbe>>,
    reserve_gb: f64,
}

impl HardwareProfiler {
    pub fn new(primary: Box<dyn VramProbe>) -> Self {
        Self {
            primary,
            fallback: None,
            reserve_gb: 0.0,
        }
    }

    /// Build the profiler described by a hardware configuration
    pub fn from_config(config: &HardwareConfig) -> mrm_core::Result<Self> {
        config.validate()?;
        info!("Creating hardware profiler for backend: {:?}", config.backend);

        let mut profiler = Self::new(create_probe(config)).with_reserve_gb(config.reserve_gb);
        if config.cpu_fallback && config.backend != HardwareBackend::Cpu {
            profiler = profiler.with_fallback(Box::new(CpuMemoryProbe::new()));
        }
        Ok(profiler)
    }

    pub fn with_fallback(mut self, fallback: Box<dyn VramProbe>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Headroom subtracted from every reading
    pub fn with_reserve_gb(mut self, reserve_gb: f64) -> Self {
        self.reserve_gb = sanitize(reserve_gb);
        self
    }

    /// Name of the primary backend
    pub fn backend_name(&self) -> &str {
        self.primary.name()
    }

    /// Available VRAM in GB; `0.0` when nothing can be measured
    pub fn get_available_vram_gb(&self) -> f64 {
        self.profile().available_gb
    }

    /// Take a capacity snapshot
    pub fn profile(&self) -> HardwareProfile {
        let (raw, source) = self.read_raw();
        let available = (sanitize(raw) - self.reserve_gb).max(0.0);
        debug!(source = %source, raw_gb = raw, available_gb = available, "hardware profile");
        HardwareProfile::new(available, source)
    }

    fn read_raw(&self) -> (f64, String) {
        match self.primary.query_available_gb() {
            Ok(gb) => return (gb, self.primary.name().to_string()),
            Err(e) => warn!(
                backend = self.primary.name(),
                error = %e,
                retryable = e.is_retryable(),
                "VRAM probe failed"
            ),
        }

        if let Some(fallback) = &self.fallback {
            match fallback.query_available_gb() {
                Ok(gb) => {
                    warn!(
                        backend = fallback.name(),
                        available_gb = gb,
                        "Reporting fallback memory reading"
                    );
                    return (gb, fallback.name().to_string());
                }
                Err(e) => warn!(backend = fallback.name(), error = %e, "Fallback probe failed"),
            }
        }

        (0.0, "none".to_string())
    }
}

impl std::fmt::Debug for HardwareProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareProfiler")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|p| p.name().to_string()))
            .field("reserve_gb", &self.reserve_gb)
            .finish()
    }
}

/// Create a backend-specific probe
pub fn create_probe(config: &HardwareConfig) -> Box<dyn VramProbe> {
    match config.backend {
        HardwareBackend::NvidiaSmi => Box::new(NvidiaSmiProbe::new(
            config.nvidia_smi_path.clone(),
            config.device_index,
        )),
        HardwareBackend::Cpu => Box::new(CpuMemoryProbe::new()),
        HardwareBackend::Static => Box::new(StaticProbe::new(config.static_vram_gb)),
        HardwareBackend::Mock => Box::new(MockProbe::new(config.static_vram_gb)),
    }
}

fn sanitize(gb: f64) -> f64 {
    if gb.is_finite() && gb > 0.0 {
        gb
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_subtracted() {
        let profiler = HardwareProfiler::new(Box::new(StaticProbe::new(12.0))).with_reserve_gb(1.5);
        assert_eq!(profiler.get_available_vram_gb(), 10.5);

        let profiler = HardwareProfiler::new(Box::new(StaticProbe::new(1.0))).with_reserve_gb(4.0);
        assert_eq!(profiler.get_available_vram_gb(), 0.0);
    }

    #[test]
    fn test_failure_reports_zero() {
        let profiler = HardwareProfiler::new(Box::new(MockProbe::failing("no driver")));
        let profile = profiler.profile();
        assert_eq!(profile.available_gb, 0.0);
        assert_eq!(profile.source, "none");
    }

    #[test]
    fn test_fallback_used_on_failure() {
        let primary = MockProbe::failing("no driver");
        let profiler = HardwareProfiler::new(Box::new(primary.clone()))
            .with_fallback(Box::new(StaticProbe::new(6.0)));

        let profile = profiler.profile();
        assert_eq!(profile.available_gb, 6.0);
        assert_eq!(profile.source, "static");

        primary.set_available_gb(16.0);
        let profile = profiler.profile();
        assert_eq!(profile.available_gb, 16.0);
        assert_eq!(profile.source, "mock");
    }

    #[test]
    fn test_bogus_readings_clamped() {
        let probe = MockProbe::new(f64::NAN);
        let profiler = HardwareProfiler::new(Box::new(probe.clone()));
        assert_eq!(profiler.get_available_vram_gb(), 0.0);

        probe.set_available_gb(-3.0);
        assert_eq!(profiler.get_available_vram_gb(), 0.0);

        probe.set_available_gb(f64::INFINITY);
        assert_eq!(profiler.get_available_vram_gb(), 0.0);
    }

    #[test]
    fn test_from_config() {
        let config = HardwareConfig {
            backend: HardwareBackend::Static,
            static_vram_gb: 24.0,
            reserve_gb: 2.0,
            ..Default::default()
        };
        let profiler = HardwareProfiler::from_config(&config).unwrap();
        assert_eq!(profiler.backend_name(), "static");
        assert_eq!(profiler.get_available_vram_gb(), 22.0);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = HardwareConfig {
            reserve_gb: -1.0,
            ..Default::default()
        };
        assert!(HardwareProfiler::from_config(&config).is_err());
    }

    #[test]
    fn test_missing_nvidia_smi_never_panics() {
        let config = HardwareConfig {
            backend: HardwareBackend::NvidiaSmi,
            nvidia_smi_path: "/nonexistent/nvidia-smi".to_string(),
            ..Default::default()
        };
        let profiler = HardwareProfiler::from_config(&config).unwrap();
        assert_eq!(profiler.get_available_vram_gb(), 0.0);
    }
}
