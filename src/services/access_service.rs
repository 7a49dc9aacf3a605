//! Access service - authorization decisions for message traffic
//!
//! Read-only and uncached: every call re-reads the connections table.

use std::sync::Arc;

use crate::db::{access, ThingsDb};
use crate::error::ThingsError;

pub struct AccessService {
    db: Arc<ThingsDb>,
}

impl AccessService {
    pub fn new(db: Arc<ThingsDb>) -> Self {
        Self { db }
    }

    /// Device-authenticated check. Returns the thing ID on success; any
    /// failure means access denied.
    pub fn has_thing(&self, channel_id: &str, thing_key: &str) -> Result<String, ThingsError> {
        self.db.with_conn(|conn| access::has_thing(conn, channel_id, thing_key))
    }

    /// Server-side check by thing ID
    pub fn has_thing_by_id(&self, channel_id: &str, thing_id: &str) -> Result<(), ThingsError> {
        self.db.with_conn(|conn| access::has_thing_by_id(conn, channel_id, thing_id))
    }

    /// `has_thing_by_id` folded to a decision
    pub fn can_access_by_id(&self, channel_id: &str, thing_id: &str) -> Result<bool, ThingsError> {
        match self.has_thing_by_id(channel_id, thing_id) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
