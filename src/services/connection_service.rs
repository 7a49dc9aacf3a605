//! Connection service - connects and disconnects things and channels

use std::sync::Arc;

use crate::db::{connections, OwnerContext, ThingsDb};
use crate::error::ThingsError;

use super::events::{EventBus, ThingsEvent};

pub struct ConnectionService {
    db: Arc<ThingsDb>,
    events: Arc<EventBus>,
}

impl ConnectionService {
    pub fn new(db: Arc<ThingsDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Connect every listed channel to every listed thing in one transaction.
    ///
    /// `NotFound` if any listed end is missing or not owned by `ctx`, also
    /// when the other list is empty. `Conflict` if any pair is already
    /// connected. Either way nothing is written.
    pub fn connect(
        &self,
        ctx: &OwnerContext,
        channel_ids: &[String],
        thing_ids: &[String],
    ) -> Result<(), ThingsError> {
        if channel_ids.is_empty() && thing_ids.is_empty() {
            return Ok(());
        }

        self.db.with_tx_deadline(ctx.deadline, |tx| {
            connections::connect(tx, ctx, channel_ids, thing_ids)
        })?;

        if channel_ids.is_empty() || thing_ids.is_empty() {
            return Ok(());
        }

        self.events.emit(ThingsEvent::Connected {
            owner: ctx.owner.clone(),
            channel_ids: channel_ids.to_vec(),
            thing_ids: thing_ids.to_vec(),
        });
        Ok(())
    }

    /// Remove one connection; `NotFound` when there is nothing to remove
    pub fn disconnect(&self, ctx: &OwnerContext, channel_id: &str, thing_id: &str) -> Result<(), ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| {
            connections::disconnect(conn, ctx, channel_id, thing_id)
        })?;

        self.events.emit(ThingsEvent::Disconnected {
            channel_id: channel_id.to_string(),
            thing_id: thing_id.to_string(),
        });
        Ok(())
    }
}
