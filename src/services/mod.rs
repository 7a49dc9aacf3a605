//! Service layer for elohim-things
//!
//! Services are the public contract of the registry. Each wraps repository
//! operations with:
//! - Input validation
//! - Transaction boundaries
//! - Event emission for audit/notifications
//!
//! ## Architecture
//!
//! ```text
//! API layer (external)
//!     ↓
//! Service Layer (validation, transactions, events)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod events;
pub mod thing_service;
pub mod channel_service;
pub mod connection_service;
pub mod access_service;

// Re-exports
pub use events::{EventBus, EventListener, ThingsEvent};
pub use thing_service::ThingService;
pub use channel_service::ChannelService;
pub use connection_service::ConnectionService;
pub use access_service::AccessService;

use crate::config::Config;
use crate::db::ThingsDb;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds all services with a shared database.
pub struct Services {
    pub things: Arc<ThingService>,
    pub channels: Arc<ChannelService>,
    pub connections: Arc<ConnectionService>,
    pub access: Arc<AccessService>,
    pub events: Arc<EventBus>,
    pub db: Arc<ThingsDb>,
}

impl Services {
    /// Create all services with shared database
    pub fn new(db: Arc<ThingsDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            things: Arc::new(ThingService::new(db.clone(), events.clone(), config.max_name_len)),
            channels: Arc::new(ChannelService::new(db.clone(), events.clone(), config.max_name_len)),
            connections: Arc::new(ConnectionService::new(db.clone(), events.clone())),
            access: Arc::new(AccessService::new(db.clone())),
            events,
            db,
        }
    }

    /// Open the configured database and build services over it
    pub fn open(config: &Config) -> Result<Self, crate::error::ThingsError> {
        let db = Arc::new(ThingsDb::open(config)?);
        Ok(Self::new(db, config))
    }

    /// In-memory database with default settings (for testing)
    pub fn in_memory() -> Result<Self, crate::error::ThingsError> {
        let db = Arc::new(ThingsDb::open_in_memory()?);
        Ok(Self::new(db, &Config::default()))
    }
}
