//! Lifecycle event notifications
//!
//! The manager publishes a [`ModuleEvent`] after every recorded transition.
//! Subscribers receive events over a `tokio::sync::broadcast` channel; a slow
//! subscriber lags (and is told so by the channel) instead of blocking the
//! manager.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of buffered events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ModuleEvent {
    /// Instance constructed and registered
    Loaded { module: String },
    /// Transitioned to ENABLED
    Enabled { module: String },
    /// Transitioned to DISABLED
    Disabled { module: String },
    /// Transitioned to FAILED
    Failed { module: String, error: String },
    /// Reload hook ran; `error` is set when it failed
    Reloaded {
        module: String,
        error: Option<String>,
    },
    /// System-wide health flag flipped
    HealthChanged { healthy: bool, tps: f64 },
}

/// Broadcast publisher for module events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<ModuleEvent>,
}

impl EventPublisher {
    /// Create a publisher with the given per-subscriber buffer
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<ModuleEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ModuleEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!(?event, "No event subscribers");
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
