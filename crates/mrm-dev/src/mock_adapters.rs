//! Mock collaborators for testing the resource manager

use mrm_core::{Error, NotificationSink, ResourceEvent, Result, UnloadCapability};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Ordered record of unload calls, shareable between several unloaders
#[derive(Debug, Clone, Default)]
pub struct UnloadLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl UnloadLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, model_id: &str) {
        self.calls.lock().push(model_id.to_string());
    }

    /// Model ids in the order their unload was invoked
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// Unload capability that records calls and fails on demand
#[derive(Debug)]
pub struct ScriptedUnloader {
    name: String,
    log: UnloadLog,
    failing: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl ScriptedUnloader {
    pub fn new(name: impl Into<String>, log: UnloadLog) -> Self {
        Self {
            name: name.into(),
            log,
            failing: Mutex::new(HashSet::new()),
            delay: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Block for `delay` inside every unload, simulating weight teardown
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make unloads of `model_id` fail
    pub fn fail_on(&self, model_id: impl Into<String>) {
        self.failing.lock().insert(model_id.into());
    }

    /// Let unloads of `model_id` succeed again
    pub fn heal(&self, model_id: &str) {
        self.failing.lock().remove(model_id);
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl UnloadCapability for ScriptedUnloader {
    fn unload(&self, model_id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.log.push(model_id);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if self.failing.lock().contains(model_id) {
            debug!(unloader = %self.name, model_id, "Scripted unload failure");
            return Err(Error::unload(model_id, format!("{} refused to unload", self.name)));
        }

        info!(unloader = %self.name, model_id, "Simulated unload");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sink that keeps every event for later inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ResourceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResourceEvent> {
        self.events.lock().clone()
    }

    /// Events of one kind, see [`ResourceEvent::kind`]
    pub fn events_of(&self, kind: &str) -> Vec<ResourceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: ResourceEvent) {
        self.events.lock().push(event);
    }
}
