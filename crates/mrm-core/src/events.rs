//! Resource events broadcast to a notification sink

use crate::{ModelState, ModelType, NotificationSink, Precision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// Something observable happened to the ledger or a model's lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResourceEvent {
    StateChanged {
        model_id: String,
        model_type: Option<ModelType>,
        from: ModelState,
        to: ModelState,
        at: DateTime<Utc>,
    },
    Allocated {
        model_id: String,
        vram_gb: f64,
        precision: Precision,
    },
    Released {
        model_id: String,
        vram_gb: f64,
    },
    SwapCompleted {
        target_model_id: String,
        unloaded_models: Vec<String>,
        success: bool,
    },
    LoadRefused {
        model_id: String,
        reason: String,
    },
}

impl ResourceEvent {
    pub fn state_changed(
        model_id: impl Into<String>,
        model_type: Option<ModelType>,
        from: ModelState,
        to: ModelState,
    ) -> Self {
        ResourceEvent::StateChanged {
            model_id: model_id.into(),
            model_type,
            from,
            to,
            at: Utc::now(),
        }
    }

    /// Model the event is about
    pub fn model_id(&self) -> &str {
        match self {
            ResourceEvent::StateChanged { model_id, .. }
            | ResourceEvent::Allocated { model_id, .. }
            | ResourceEvent::Released { model_id, .. }
            | ResourceEvent::LoadRefused { model_id, .. } => model_id,
            ResourceEvent::SwapCompleted {
                target_model_id, ..
            } => target_model_id,
        }
    }

    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceEvent::StateChanged { .. } => "state_changed",
            ResourceEvent::Allocated { .. } => "allocated",
            ResourceEvent::Released { .. } => "released",
            ResourceEvent::SwapCompleted { .. } => "swap_completed",
            ResourceEvent::LoadRefused { .. } => "load_refused",
        }
    }
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _event: ResourceEvent) {}
}

/// Writes every event to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: ResourceEvent) {
        info!(
            event = event.kind(),
            model_id = %event.model_id(),
            "{}",
            serde_json::to_string(&event).unwrap_or_default()
        );
    }
}

/// Forwards events into a tokio channel
///
/// A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<ResourceEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<ResourceEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ResourceEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: ResourceEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.notify(ResourceEvent::Allocated {
            model_id: "llm-7b".to_string(),
            vram_gb: 10.0,
            precision: Precision::Fp32,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.model_id(), "llm-7b");
        assert_eq!(event.kind(), "allocated");
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.notify(ResourceEvent::LoadRefused {
            model_id: "sd-model".to_string(),
            reason: "no room".to_string(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = ResourceEvent::state_changed(
            "tts-model",
            Some(ModelType::Tts),
            ModelState::Loaded,
            ModelState::Unloading,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "state_changed");
        assert_eq!(json["from"], "loaded");
        assert_eq!(json["to"], "unloading");
        assert_eq!(json["model_type"], "tts");
    }

    #[test]
    fn test_swap_event_model_id_is_target() {
        let event = ResourceEvent::SwapCompleted {
            target_model_id: "sd-model".to_string(),
            unloaded_models: vec!["tts-model".to_string()],
            success: true,
        };
        assert_eq!(event.model_id(), "sd-model");
        NullSink.notify(event.clone());
        TracingSink.notify(event);
    }
}
