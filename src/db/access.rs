//! Access checks on the message path
//!
//! Both checks are single indexed lookups: `things.key` is unique and
//! `connections` is keyed by `(channel_id, thing_id)`. Nothing is cached.
//! An unknown key, an unknown thing and a missing connection all come back as
//! the same `NotFound`.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::trace;

use super::context::not_found;
use crate::error::{classify, ThingsError};
use crate::validation::canonical_id;

/// Check that the thing holding `thing_key` is connected to `channel_id`.
/// Returns the thing's ID.
pub fn has_thing(conn: &Connection, channel_id: &str, thing_key: &str) -> Result<String, ThingsError> {
    let Some(channel) = canonical_id(channel_id) else {
        return Err(denied(channel_id));
    };

    let thing_id: Option<String> = conn
        .query_row(
            "SELECT c.thing_id FROM connections c
             INNER JOIN things t ON t.id = c.thing_id
             WHERE t.key = ? AND c.channel_id = ?",
            params![thing_key, channel],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| classify(e, "access check"))?;

    trace!(channel = %channel_id, allowed = thing_id.is_some(), "Access check by key");
    thing_id.ok_or_else(|| denied(channel_id))
}

/// Check that `thing_id` is connected to `channel_id`
pub fn has_thing_by_id(conn: &Connection, channel_id: &str, thing_id: &str) -> Result<(), ThingsError> {
    let (Some(channel), Some(thing)) = (canonical_id(channel_id), canonical_id(thing_id)) else {
        return Err(denied(channel_id));
    };

    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM connections WHERE channel_id = ? AND thing_id = ?",
            params![channel, thing],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| classify(e, "access check"))?;

    trace!(channel = %channel_id, thing = %thing_id, allowed = found.is_some(), "Access check by id");
    found.map(|_| ()).ok_or_else(|| denied(channel_id))
}

fn denied(channel_id: &str) -> ThingsError {
    not_found("connection to channel", channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Channel, Thing};
    use crate::db::{channels, connections, things, OwnerContext, ThingsDb};
    use uuid::Uuid;

    #[test]
    fn test_key_and_id_checks_agree() {
        let db = ThingsDb::open_in_memory().unwrap();
        let ctx = OwnerContext::new("access@example.com");
        let channel = Channel {
            id: Uuid::new_v4().to_string(),
            owner: ctx.owner.clone(),
            ..Default::default()
        };
        let thing = Thing {
            id: Uuid::new_v4().to_string(),
            owner: ctx.owner.clone(),
            key: Some("device-secret".into()),
            ..Default::default()
        };
        db.with_tx(|tx| {
            channels::save(tx, &[channel.clone()])?;
            things::save(tx, &[thing.clone()])?;
            connections::connect(tx, &ctx, &[channel.id.clone()], &[thing.id.clone()])
        })
        .unwrap();

        let id = db.with_conn(|conn| has_thing(conn, &channel.id, "device-secret")).unwrap();
        assert_eq!(id, thing.id);
        db.with_conn(|conn| has_thing_by_id(conn, &channel.id, &thing.id)).unwrap();

        let unknown_key = db.with_conn(|conn| has_thing(conn, &channel.id, "guess")).unwrap_err();
        let unknown_channel = db
            .with_conn(|conn| has_thing(conn, &Uuid::new_v4().to_string(), "device-secret"))
            .unwrap_err();
        assert!(unknown_key.is_not_found());
        assert!(unknown_channel.is_not_found());

        let malformed = db.with_conn(|conn| has_thing_by_id(conn, &channel.id, "wrong")).unwrap_err();
        assert!(malformed.is_not_found());
    }
}
