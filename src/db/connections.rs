//! Thing <-> channel connection operations
//!
//! A connection row records the owner of both ends. The composite foreign
//! keys in the schema keep it consistent with the entity tables and remove it
//! when either end is removed.

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use super::context::{not_found, OwnerContext};
use super::entity::ensure_owned;
use super::models::{Channel, Thing};
use crate::error::{classify, ThingsError};
use crate::validation::canonical_id;

/// Connect every channel in `channel_ids` to every thing in `thing_ids`.
///
/// All listed ends must exist and belong to the caller (`NotFound`
/// otherwise), even when the other list is empty and there is nothing to
/// pair. No pair may already be connected (`Conflict`). Run inside a
/// transaction: the first failure aborts the call and nothing is written.
pub fn connect(
    conn: &Connection,
    ctx: &OwnerContext,
    channel_ids: &[String],
    thing_ids: &[String],
) -> Result<(), ThingsError> {
    let channel_ids = channel_ids
        .iter()
        .map(|channel_id| {
            ensure_owned::<Channel>(conn, ctx, channel_id).inspect_err(|_| {
                warn!(owner = %ctx.owner, channel = %channel_id, "Connect refused: channel not owned");
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let thing_ids = thing_ids
        .iter()
        .map(|thing_id| {
            ensure_owned::<Thing>(conn, ctx, thing_id).inspect_err(|_| {
                warn!(owner = %ctx.owner, thing = %thing_id, "Connect refused: thing not owned");
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO connections (channel_id, channel_owner, thing_id, thing_owner)
             VALUES (?, ?, ?, ?)",
        )
        .map_err(|e| classify(e, "connect"))?;

    for channel_id in &channel_ids {
        for thing_id in &thing_ids {
            stmt.execute(params![channel_id, ctx.owner, thing_id, ctx.owner])
                .map_err(|e| classify(e, &format!("connection {} -> {}", thing_id, channel_id)))?;

            debug!(channel = %channel_id, thing = %thing_id, "Connected");
        }
    }

    Ok(())
}

/// Remove one connection.
///
/// `NotFound` when the caller does not own both ends or the pair is not
/// connected; the two cases are not told apart.
pub fn disconnect(
    conn: &Connection,
    ctx: &OwnerContext,
    channel_id: &str,
    thing_id: &str,
) -> Result<(), ThingsError> {
    let missing = || not_found("connection", &format!("{} -> {}", thing_id, channel_id));
    let (Some(channel), Some(thing)) = (canonical_id(channel_id), canonical_id(thing_id)) else {
        return Err(missing());
    };

    let rows = conn
        .execute(
            "DELETE FROM connections
             WHERE channel_id = ? AND channel_owner = ? AND thing_id = ? AND thing_owner = ?",
            params![channel, ctx.owner, thing, ctx.owner],
        )
        .map_err(|e| classify(e, "disconnect"))?;

    if rows == 0 {
        return Err(missing());
    }

    debug!(channel = %channel_id, thing = %thing_id, "Disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{channels, things, ThingsDb};
    use uuid::Uuid;

    const OWNER: &str = "connect-owner@example.com";

    struct Fixture {
        db: ThingsDb,
        ctx: OwnerContext,
        channel_id: String,
        thing_id: String,
    }

    fn fixture() -> Fixture {
        let db = ThingsDb::open_in_memory().unwrap();
        let channel = Channel {
            id: Uuid::new_v4().to_string(),
            owner: OWNER.into(),
            ..Default::default()
        };
        let thing = Thing {
            id: Uuid::new_v4().to_string(),
            owner: OWNER.into(),
            key: Some(Uuid::new_v4().to_string()),
            ..Default::default()
        };
        db.with_tx(|tx| {
            channels::save(tx, &[channel.clone()])?;
            things::save(tx, &[thing.clone()])
        })
        .unwrap();

        Fixture {
            db,
            ctx: OwnerContext::new(OWNER),
            channel_id: channel.id,
            thing_id: thing.id,
        }
    }

    #[test]
    fn test_connect_then_conflict() {
        let f = fixture();
        let chs = vec![f.channel_id.clone()];
        let ths = vec![f.thing_id.clone()];

        f.db.with_tx(|tx| connect(tx, &f.ctx, &chs, &ths)).unwrap();
        let err = f.db.with_tx(|tx| connect(tx, &f.ctx, &chs, &ths)).unwrap_err();
        assert!(matches!(err, ThingsError::Conflict(_)));
        assert_eq!(f.db.stats().unwrap().connection_count, 1);
    }

    #[test]
    fn test_connect_wrong_owner() {
        let f = fixture();
        let stranger = OwnerContext::new("stranger@example.com");
        let chs = vec![f.channel_id.clone()];
        let ths = vec![f.thing_id.clone()];

        let err = f.db.with_tx(|tx| connect(tx, &stranger, &chs, &ths)).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.db.stats().unwrap().connection_count, 0);
    }

    #[test]
    fn test_connect_partial_batch_rolls_back() {
        let f = fixture();
        let chs = vec![f.channel_id.clone()];
        let ths = vec![f.thing_id.clone(), Uuid::new_v4().to_string()];

        let err = f.db.with_tx(|tx| connect(tx, &f.ctx, &chs, &ths)).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.db.stats().unwrap().connection_count, 0);
    }

    #[test]
    fn test_disconnect_twice() {
        let f = fixture();
        let chs = vec![f.channel_id.clone()];
        let ths = vec![f.thing_id.clone()];
        f.db.with_tx(|tx| connect(tx, &f.ctx, &chs, &ths)).unwrap();

        f.db.with_conn(|conn| disconnect(conn, &f.ctx, &f.channel_id, &f.thing_id)).unwrap();
        let err = f.db
            .with_conn(|conn| disconnect(conn, &f.ctx, &f.channel_id, &f.thing_id))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_removal_cascades() {
        let f = fixture();
        let chs = vec![f.channel_id.clone()];
        let ths = vec![f.thing_id.clone()];
        f.db.with_tx(|tx| connect(tx, &f.ctx, &chs, &ths)).unwrap();

        f.db.with_conn(|conn| things::remove(conn, &f.ctx, &f.thing_id)).unwrap();
        assert_eq!(f.db.stats().unwrap().connection_count, 0);
    }
}
