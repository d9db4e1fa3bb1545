//! Fixed and scriptable probes

use mrm_core::{Error, VramProbe};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Always reports the same budget
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    available_gb: f64,
}

impl StaticProbe {
    pub fn new(available_gb: f64) -> Self {
        Self { available_gb }
    }
}

impl VramProbe for StaticProbe {
    fn query_available_gb(&self) -> mrm_core::Result<f64> {
        Ok(self.available_gb)
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Probe whose reading can be changed, or made to fail, while in use
///
/// Clones share state, so a test can keep a handle after boxing one into a
/// profiler.
#[derive(Debug, Clone)]
pub struct MockProbe {
    reading: Arc<Mutex<Result<f64, String>>>,
    queries: Arc<AtomicU64>,
}

impl MockProbe {
    pub fn new(available_gb: f64) -> Self {
        Self {
            reading: Arc::new(Mutex::new(Ok(available_gb))),
            queries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A probe that fails every query
    pub fn failing(message: impl Into<String>) -> Self {
        let probe = Self::new(0.0);
        probe.fail_with(message);
        probe
    }

    pub fn set_available_gb(&self, available_gb: f64) {
        *self.reading.lock() = Ok(available_gb);
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        *self.reading.lock() = Err(message.into());
    }

    /// Number of queries answered so far
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

impl VramProbe for MockProbe {
    fn query_available_gb(&self) -> mrm_core::Result<f64> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.reading.lock().clone().map_err(Error::hardware_probe)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_probe() {
        assert_eq!(StaticProbe::new(12.0).query_available_gb().unwrap(), 12.0);
    }

    #[test]
    fn test_mock_probe_shared_state() {
        let probe = MockProbe::new(8.0);
        let handle = probe.clone();

        assert_eq!(probe.query_available_gb().unwrap(), 8.0);
        handle.set_available_gb(4.0);
        assert_eq!(probe.query_available_gb().unwrap(), 4.0);

        handle.fail_with("driver reset");
        assert!(probe.query_available_gb().is_err());
        assert_eq!(handle.query_count(), 3);
    }
}
