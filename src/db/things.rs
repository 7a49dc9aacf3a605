//! Thing CRUD operations
//!
//! Things carry a secret key that is unique across all owners. Callers
//! validate input first (see `crate::validation`); these functions only talk
//! to the store and classify what it says.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::context::{not_found, OwnerContext};
use super::entity;
use super::models::{metadata_to_value, Channel, Page, PageQuery, Thing};
use crate::error::{classify, ThingsError};

/// Insert things. Run inside a transaction to get all-or-nothing batches.
pub fn save(conn: &Connection, things: &[Thing]) -> Result<Vec<Thing>, ThingsError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO things (id, owner, key, name, metadata) VALUES (?, ?, ?, ?, ?)",
        )
        .map_err(|e| classify(e, "save things"))?;

    for thing in things {
        stmt.execute(params![
            thing.id,
            thing.owner,
            thing.key,
            thing.name,
            metadata_to_value(&thing.metadata),
        ])
        .map_err(|e| classify(e, &format!("thing {}", thing.id)))?;

        debug!(id = %thing.id, owner = %thing.owner, "Thing saved");
    }

    Ok(things.to_vec())
}

/// Update name and metadata of a thing owned by `thing.owner`
pub fn update(conn: &Connection, thing: &Thing) -> Result<(), ThingsError> {
    let ctx = OwnerContext::new(thing.owner.clone());
    let id = entity::ensure_owned::<Thing>(conn, &ctx, &thing.id)?;

    conn.execute(
        "UPDATE things SET name = ?, metadata = ?, updated_at = datetime('now')
         WHERE id = ? AND owner = ?",
        params![thing.name, metadata_to_value(&thing.metadata), id, thing.owner],
    )
    .map_err(|e| classify(e, &format!("update thing {}", thing.id)))?;

    Ok(())
}

/// Replace the secret key of a thing
pub fn update_key(conn: &Connection, ctx: &OwnerContext, id: &str, key: &str) -> Result<(), ThingsError> {
    let canonical = entity::ensure_owned::<Thing>(conn, ctx, id)?;

    conn.execute(
        "UPDATE things SET key = ?, updated_at = datetime('now') WHERE id = ? AND owner = ?",
        params![key, canonical, ctx.owner],
    )
    .map_err(|e| classify(e, &format!("key of thing {}", id)))?;

    Ok(())
}

/// Get a thing by ID - scoped by owner
pub fn retrieve_by_id(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<Thing, ThingsError> {
    entity::retrieve_by_id(conn, ctx, id)
}

/// Resolve a secret key to the thing's ID
pub fn retrieve_by_key(conn: &Connection, key: &str) -> Result<String, ThingsError> {
    conn.query_row("SELECT id FROM things WHERE key = ?", params![key], |row| row.get(0))
        .optional()
        .map_err(|e| classify(e, "identify thing"))?
        .ok_or_else(|| not_found("thing", "with given key"))
}

/// List the caller's things
pub fn retrieve_all(conn: &Connection, ctx: &OwnerContext, query: &PageQuery) -> Result<Page<Thing>, ThingsError> {
    entity::retrieve_all(conn, ctx, query)
}

/// List the caller's things that are (or are not) connected to a channel
pub fn retrieve_by_channel(
    conn: &Connection,
    ctx: &OwnerContext,
    channel_id: &str,
    query: &PageQuery,
    connected: bool,
) -> Result<Page<Thing>, ThingsError> {
    entity::retrieve_by_connection::<Thing, Channel>(conn, ctx, channel_id, query, connected)
}

/// Delete a thing and its connections - scoped by owner, idempotent
pub fn remove(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<bool, ThingsError> {
    entity::remove::<Thing>(conn, ctx, id)
}
