//! Channel CRUD operations

use rusqlite::{params, Connection};
use tracing::debug;

use super::context::OwnerContext;
use super::entity;
use super::models::{metadata_to_value, Channel, Page, PageQuery, Thing};
use crate::error::{classify, ThingsError};

/// Insert channels. Run inside a transaction to get all-or-nothing batches.
pub fn save(conn: &Connection, channels: &[Channel]) -> Result<Vec<Channel>, ThingsError> {
    let mut stmt = conn
        .prepare_cached("INSERT INTO channels (id, owner, name, metadata) VALUES (?, ?, ?, ?)")
        .map_err(|e| classify(e, "save channels"))?;

    for channel in channels {
        stmt.execute(params![
            channel.id,
            channel.owner,
            channel.name,
            metadata_to_value(&channel.metadata),
        ])
        .map_err(|e| classify(e, &format!("channel {}", channel.id)))?;

        debug!(id = %channel.id, owner = %channel.owner, "Channel saved");
    }

    Ok(channels.to_vec())
}

/// Update name and metadata of a channel owned by `channel.owner`
pub fn update(conn: &Connection, channel: &Channel) -> Result<(), ThingsError> {
    let ctx = OwnerContext::new(channel.owner.clone());
    let id = entity::ensure_owned::<Channel>(conn, &ctx, &channel.id)?;

    conn.execute(
        "UPDATE channels SET name = ?, metadata = ?, updated_at = datetime('now')
         WHERE id = ? AND owner = ?",
        params![channel.name, metadata_to_value(&channel.metadata), id, channel.owner],
    )
    .map_err(|e| classify(e, &format!("update channel {}", channel.id)))?;

    Ok(())
}

/// Get a channel by ID - scoped by owner
pub fn retrieve_by_id(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<Channel, ThingsError> {
    entity::retrieve_by_id(conn, ctx, id)
}

/// List the caller's channels
pub fn retrieve_all(conn: &Connection, ctx: &OwnerContext, query: &PageQuery) -> Result<Page<Channel>, ThingsError> {
    entity::retrieve_all(conn, ctx, query)
}

/// List the caller's channels that are (or are not) connected to a thing
pub fn retrieve_by_thing(
    conn: &Connection,
    ctx: &OwnerContext,
    thing_id: &str,
    query: &PageQuery,
    connected: bool,
) -> Result<Page<Channel>, ThingsError> {
    entity::retrieve_by_connection::<Channel, Thing>(conn, ctx, thing_id, query, connected)
}

/// Delete a channel and its connections - scoped by owner, idempotent
pub fn remove(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<bool, ThingsError> {
    entity::remove::<Channel>(conn, ctx, id)
}
