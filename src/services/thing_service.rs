//! Thing service - lifecycle and queries for things
//!
//! Wraps the thing repository with validation, transaction boundaries and
//! event emission.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{things, OwnerContext, Page, PageQuery, Thing, ThingsDb};
use crate::error::ThingsError;
use crate::validation;

use super::events::{EventBus, ThingsEvent};

/// Thing service for business logic
pub struct ThingService {
    db: Arc<ThingsDb>,
    events: Arc<EventBus>,
    max_name_len: usize,
}

impl ThingService {
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

    /// Save a batch of things for `ctx`.
    ///
    /// Empty IDs are generated and empty owners are filled in. The whole batch
    /// is validated before the store is touched, then written in one
    /// transaction; any malformed item or collision fails the call with
    /// nothing saved.
    pub fn save(&self, ctx: &OwnerContext, things: Vec<Thing>) -> Result<Vec<Thing>, ThingsError> {
        if things.is_empty() {
            return Ok(vec![]);
        }

        let prepared = things
            .into_iter()
            .map(|thing| self.prepare(ctx, thing))
            .collect::<Result<Vec<_>, _>>()?;

        let saved = self.db.with_tx_deadline(ctx.deadline, |tx| things::save(tx, &prepared))?;

        self.events.emit(ThingsEvent::ThingsSaved {
            owner: ctx.owner.clone(),
            ids: saved.iter().map(|t| t.id.clone()).collect(),
        });

        Ok(saved)
    }

    /// Update name and metadata. `NotFound` unless `thing.owner` owns it.
    pub fn update(&self, thing: &Thing) -> Result<(), ThingsError> {
        validation::validate_name("thing", thing.name.as_deref(), self.max_name_len)?;
        validation::validate_metadata("thing", thing.metadata.as_ref())?;

        self.db.with_tx(|tx| things::update(tx, thing))?;

        self.events.emit(ThingsEvent::ThingUpdated { id: thing.id.clone() });
        Ok(())
    }

    /// Replace the secret key of a thing
    pub fn update_key(&self, ctx: &OwnerContext, id: &str, key: &str) -> Result<(), ThingsError> {
        validation::validate_key(Some(key))?;

        self.db.with_tx_deadline(ctx.deadline, |tx| things::update_key(tx, ctx, id, key))?;

        self.events.emit(ThingsEvent::ThingKeyUpdated { id: id.to_string() });
        Ok(())
    }

    /// Remove a thing and its connections. Succeeds if it is already gone.
    pub fn remove(&self, ctx: &OwnerContext, id: &str) -> Result<(), ThingsError> {
        let removed = self.db.with_conn_deadline(ctx.deadline, |conn| things::remove(conn, ctx, id))?;

        if removed {
            self.events.emit(ThingsEvent::ThingRemoved { id: id.to_string() });
        }
        Ok(())
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn retrieve_by_id(&self, ctx: &OwnerContext, id: &str) -> Result<Thing, ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| things::retrieve_by_id(conn, ctx, id))
    }

    /// Resolve a secret key to a thing ID
    pub fn identify(&self, key: &str) -> Result<String, ThingsError> {
        self.db.with_conn(|conn| things::retrieve_by_key(conn, key))
    }

    pub fn retrieve_all(&self, ctx: &OwnerContext, query: &PageQuery) -> Result<Page<Thing>, ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| things::retrieve_all(conn, ctx, query))
    }

    pub fn retrieve_by_channel(
        &self,
        ctx: &OwnerContext,
        channel_id: &str,
        query: &PageQuery,
        connected: bool,
    ) -> Result<Page<Thing>, ThingsError> {
        self.db.with_conn_deadline(ctx.deadline, |conn| {
            things::retrieve_by_channel(conn, ctx, channel_id, query, connected)
        })
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn prepare(&self, ctx: &OwnerContext, mut thing: Thing) -> Result<Thing, ThingsError> {
        if ctx.owner.is_empty() {
            return Err(ThingsError::MalformedEntity("owner is required".into()));
        }

        if thing.owner.is_empty() {
            thing.owner = ctx.owner.clone();
        } else if thing.owner != ctx.owner {
            return Err(ThingsError::MalformedEntity(format!(
                "thing {} belongs to a different owner",
                thing.id
            )));
        }

        if thing.id.is_empty() {
            thing.id = Uuid::new_v4().to_string();
        }

        thing.id = validation::validate_id("thing", &thing.id)?;
        validation::validate_key(thing.key.as_deref())?;
        validation::validate_name("thing", thing.name.as_deref(), self.max_name_len)?;
        validation::validate_metadata("thing", thing.metadata.as_ref())?;

        Ok(thing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MAX_NAME_LEN;

    fn service() -> ThingService {
        let db = Arc::new(ThingsDb::open_in_memory().unwrap());
        ThingService::new(db, Arc::new(EventBus::new()), MAX_NAME_LEN)
    }

    #[test]
    fn test_save_generates_id_and_owner() {
        let svc = service();
        let ctx = OwnerContext::new("gen@example.com");

        let saved = svc.save(&ctx, vec![Thing::default()]).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(validation::is_valid_id(&saved[0].id));
        assert_eq!(saved[0].owner, "gen@example.com");

        let got = svc.retrieve_by_id(&ctx, &saved[0].id).unwrap();
        assert_eq!(got, saved[0]);
    }

    #[test]
    fn test_save_rejects_foreign_owner() {
        let svc = service();
        let ctx = OwnerContext::new("me@example.com");
        let thing = Thing {
            owner: "you@example.com".into(),
            ..Default::default()
        };

        let err = svc.save(&ctx, vec![thing]).unwrap_err();
        assert!(matches!(err, ThingsError::MalformedEntity(_)));
    }

    #[test]
    fn test_malformed_item_aborts_batch() {
        let svc = service();
        let ctx = OwnerContext::new("batch@example.com");
        let good = Thing {
            id: Uuid::new_v4().to_string(),
            ..Default::default()
        };
        let bad = Thing {
            id: "invalid".into(),
            ..Default::default()
        };

        let err = svc.save(&ctx, vec![good.clone(), bad]).unwrap_err();
        assert!(matches!(err, ThingsError::MalformedEntity(_)));
        assert!(svc.retrieve_by_id(&ctx, &good.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_emits_once() {
        let db = Arc::new(ThingsDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let svc = ThingService::new(db, events.clone(), MAX_NAME_LEN);
        let ctx = OwnerContext::new("rm@example.com");
        let saved = svc.save(&ctx, vec![Thing::default()]).unwrap();

        let mut rx = events.subscribe();
        svc.remove(&ctx, &saved[0].id).unwrap();
        svc.remove(&ctx, &saved[0].id).unwrap();

        assert_eq!(rx.try_recv().unwrap(), ThingsEvent::ThingRemoved { id: saved[0].id.clone() });
        assert!(rx.try_recv().is_err());
    }
}
