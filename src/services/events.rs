//! Event system for registry operations
//!
//! Services emit an event after every successful write. Useful for:
//! - Audit logging
//! - Invalidating access decisions cached by message brokers
//! - Real-time notifications

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Registry events emitted by services
#[derive(Debug, Clone, PartialEq)]
pub enum ThingsEvent {
    // Thing events
    ThingsSaved {
        owner: String,
        ids: Vec<String>,
    },
    ThingUpdated {
        id: String,
    },
    ThingKeyUpdated {
        id: String,
    },
    ThingRemoved {
        id: String,
    },

    // Channel events
    ChannelsSaved {
        owner: String,
        ids: Vec<String>,
    },
    ChannelUpdated {
        id: String,
    },
    ChannelRemoved {
        id: String,
    },

    // Connection events
    Connected {
        owner: String,
        channel_ids: Vec<String>,
        thing_ids: Vec<String>,
    },
    Disconnected {
        channel_id: String,
        thing_id: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &ThingsEvent);
}

/// Event bus for broadcasting registry events
pub struct EventBus {
    sender: broadcast::Sender<ThingsEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: ThingsEvent) {
        trace!(event = ?event, "Emitting registry event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<ThingsEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &ThingsEvent) {
        match event {
            ThingsEvent::ThingsSaved { owner, ids } => {
                info!(owner = %owner, count = ids.len(), "Things saved");
            }
            ThingsEvent::ChannelsSaved { owner, ids } => {
                info!(owner = %owner, count = ids.len(), "Channels saved");
            }
            ThingsEvent::ThingRemoved { id } => {
                debug!(id = %id, "Thing removed");
            }
            ThingsEvent::ChannelRemoved { id } => {
                debug!(id = %id, "Channel removed");
            }
            ThingsEvent::Connected {
                owner,
                channel_ids,
                thing_ids,
            } => {
                info!(
                    owner = %owner,
                    channels = channel_ids.len(),
                    things = thing_ids.len(),
                    "Connections created"
                );
            }
            ThingsEvent::Disconnected {
                channel_id,
                thing_id,
            } => {
                info!(channel = %channel_id, thing = %thing_id, "Connection removed");
            }
            _ => {
                trace!(event = ?event, "Registry event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
