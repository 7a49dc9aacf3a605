//! Channel service - lifecycle and queries for channels

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{channels, Channel, OwnerContext, Page, PageQuery, ThingsDb};
use crate::error::ThingsError;
use crate::validation;

use super::events::{EventBus, ThingsEvent};

/// Channel service for business logic
pub struct ChannelService {
    db: Arc<ThingsDb>,
    events: Arc<EventBus>,
    max_name_len: usize,
}

impl ChannelService {
    pub fn new(db: Arc<ThingsDb>, events: Arc<EventBus>, max_name_len: usize) -> Self {
        Self {
            db,
            events,
            max_name_len,
        }
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Save a batch of channels for `ctx`, all or nothing
    pub fn save(&self, ctx: &OwnerContext, channels: Vec<Channel>) -> Result<Vec<Channel>, ThingsError> {
        if channels.is_empty() {
            return Ok(vec![]);
        }

        let prepared = channels
            .into_iter()
            .map(|channel| self.prepare(ctx, channel))
            .collect::<Result<Vec<_>, _>>()?;

        let saved = self.db.with_tx_deadline(ctx.deadline, |tx| channels::save(tx, &prepared))?;

        self.events.emit(ThingsEvent::ChannelsSaved {
            owner: ctx.owner.clone(),
            ids: saved.iter().map(|c| c.id.clone()).collect(),
        });

        Ok(saved)
    }

    /// Update name and metadata. `NotFound` unless `channel.owner` owns it.
    pub fn update(&self, channel: &Channel) -> Result<(), ThingsError> {
        validation::validate_name("channel", channel.name.as_deref(), self.max_name_len)?;
        validation::validate_metadata("channel", channel.metadata.as_ref())?;

        self.db.with_tx(|tx| channels::update(tx, channel))?;

        self.events.emit(ThingsEvent::ChannelUpdated { id: channel.id.clone() });
        Ok(())
    }

    /// Remove a channel and its connections. Succeeds if it is already gone.
    pub fn remove(&self, ctx: &OwnerContext, id: &str) -> Result<(), ThingsError> {
        let removed = self.db.with_conn_deadline(ctx.deadline, |conn| channels::remove(conn, ctx, id))?;

        if removed {
            self.events.emit(ThingsEvent::ChannelRemoved { id: id.to_string() });
        }
        Ok(())
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn retrieve_by_id(&self, ctx: &OwnerContext, id: &str) -> Result<Channel, ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| channels::retrieve_by_id(conn, ctx, id))
    }

    pub fn retrieve_all(&self, ctx: &OwnerContext, query: &PageQuery) -> Result<Page<Channel>, ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| channels::retrieve_all(conn, ctx, query))
    }

    /// Channels connected (or not connected) to `thing_id`
    pub fn retrieve_by_thing(
        &self,
        ctx: &OwnerContext,
        thing_id: &str,
        query: &PageQuery,
        connected: bool,
    ) -> Result<Page<Channel>, ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| {
            channels::retrieve_by_thing(conn, ctx, thing_id, query, connected)
        })
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn prepare(&self, ctx: &OwnerContext, mut channel: Channel) -> Result<Channel, ThingsError> {
        if ctx.owner.is_empty() {
            return Err(ThingsError::MalformedEntity("owner is required".into()));
        }

        if channel.owner.is_empty() {
            channel.owner = ctx.owner.clone();
        } else if channel.owner != ctx.owner {
            return Err(ThingsError::MalformedEntity(format!(
                "channel {} belongs to a different owner",
                channel.id
            )));
        }

        if channel.id.is_empty() {
            channel.id = Uuid::new_v4().to_string();
        }

        channel.id = validation::validate_id("channel", &channel.id)?;
        validation::validate_name("channel", channel.name.as_deref(), self.max_name_len)?;
        validation::validate_metadata("channel", channel.metadata.as_ref())?;

        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MAX_NAME_LEN;

    fn service() -> ChannelService {
        let db = Arc::new(ThingsDb::open_in_memory().unwrap());
        ChannelService::new(db, Arc::new(EventBus::new()), MAX_NAME_LEN)
    }

    #[test]
    fn test_save_cases() {
        let svc = service();
        let ctx = OwnerContext::new("channel-save@example.com");
        let chs: Vec<Channel> = (0..5)
            .map(|_| Channel {
                id: Uuid::new_v4().to_string(),
                ..Default::default()
            })
            .collect();
        let id = chs[0].id.clone();

        assert!(svc.save(&ctx, chs.clone()).is_ok());

        let err = svc.save(&ctx, chs).unwrap_err();
        assert!(matches!(err, ThingsError::Conflict(_)), "create channels that already exist");

        let invalid_id = Channel {
            id: "invalid".into(),
            ..Default::default()
        };
        let err = svc.save(&ctx, vec![invalid_id]).unwrap_err();
        assert!(matches!(err, ThingsError::MalformedEntity(_)), "create channel with invalid ID");

        let invalid_name = Channel {
            id,
            name: Some("x".repeat(MAX_NAME_LEN + 1)),
            ..Default::default()
        };
        let err = svc.save(&ctx, vec![invalid_name]).unwrap_err();
        assert!(matches!(err, ThingsError::MalformedEntity(_)), "create channel with invalid name");
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let svc = service();
        let ctx = OwnerContext::new("noop@example.com");
        assert!(svc.save(&ctx, vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_update_rejects_long_name() {
        let svc = service();
        let ctx = OwnerContext::new("update@example.com");
        let saved = svc.save(&ctx, vec![Channel::default()]).unwrap();

        let mut channel = saved[0].clone();
        channel.name = Some("x".repeat(MAX_NAME_LEN + 1));
        let err = svc.update(&channel).unwrap_err();
        assert!(matches!(err, ThingsError::MalformedEntity(_)));
    }
}
