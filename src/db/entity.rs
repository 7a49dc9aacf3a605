//! Owner-scoped operations shared by things and channels

use rusqlite::{params, Connection, OptionalExtension, ToSql};
use tracing::debug;

use super::context::{authorize, not_found, OwnerContext};
use super::models::{Entity, Page, PageQuery};
use crate::error::{classify, ThingsError};
use crate::validation::canonical_id;

/// Comma separated column list qualified by alias `e`
fn select_columns<E: Entity>() -> String {
    E::COLUMNS
        .iter()
        .map(|c| format!("e.{}", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Owner recorded for `id`, `None` when there is no such row.
/// `id` must already be canonical.
pub fn record_owner<E: Entity>(conn: &Connection, id: &str) -> Result<Option<String>, ThingsError> {
    let sql = format!("SELECT owner FROM {} WHERE id = ?", E::TABLE);
    conn.query_row(&sql, params![id], |row| row.get(0))
        .optional()
        .map_err(|e| classify(e, &format!("lookup {} {}", E::KIND, id)))
}

/// Fail with `NotFound` unless `id` exists and belongs to the caller.
/// Returns the canonical id to use in follow-up statements.
pub fn ensure_owned<E: Entity>(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<String, ThingsError> {
    let Some(canonical) = canonical_id(id) else {
        return Err(not_found(E::KIND, id));
    };
    let owner = record_owner::<E>(conn, &canonical)?;
    authorize(ctx, owner.as_deref(), E::KIND, id)?;
    Ok(canonical)
}

/// Get an entity by ID - scoped by owner
pub fn retrieve_by_id<E: Entity>(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<E, ThingsError> {
    let Some(canonical) = canonical_id(id) else {
        return Err(not_found(E::KIND, id));
    };

    let sql = format!("SELECT {} FROM {} e WHERE e.id = ?", select_columns::<E>(), E::TABLE);
    let found: Option<(String, E)> = conn
        .query_row(&sql, params![canonical], |row| Ok((row.get(1)?, E::from_row(row)?)))
        .optional()
        .map_err(|e| classify(e, &format!("retrieve {} {}", E::KIND, id)))?;

    match found {
        Some((owner, entity)) => {
            authorize(ctx, Some(&owner), E::KIND, id)?;
            Ok(entity)
        }
        None => Err(not_found(E::KIND, id)),
    }
}

/// Delete an entity - scoped by owner, idempotent
///
/// Connections referencing the entity go with it (`ON DELETE CASCADE`).
pub fn remove<E: Entity>(conn: &Connection, ctx: &OwnerContext, id: &str) -> Result<bool, ThingsError> {
    let Some(canonical) = canonical_id(id) else {
        return Ok(false);
    };

    let sql = format!("DELETE FROM {} WHERE id = ? AND owner = ?", E::TABLE);
    let rows = conn
        .execute(&sql, params![canonical, ctx.owner])
        .map_err(|e| classify(e, &format!("remove {} {}", E::KIND, id)))?;

    debug!(kind = E::KIND, id = %id, removed = rows > 0, "Remove");
    Ok(rows > 0)
}

/// Filtered listing of the caller's entities
pub fn retrieve_all<E: Entity>(conn: &Connection, ctx: &OwnerContext, query: &PageQuery) -> Result<Page<E>, ThingsError> {
    let from = format!("{} e", E::TABLE);
    let conditions = vec!["e.owner = ?".to_string()];
    let params: Vec<Box<dyn ToSql>> = vec![Box::new(ctx.owner.clone())];

    page_of::<E>(conn, &from, conditions, params, query)
}

/// Listing of the caller's entities by connection membership.
///
/// `E` is the listed kind, `O` the kind `other_id` refers to. With
/// `connected` the result is the entities connected to `other_id`, without it
/// the ones that are not.
pub fn retrieve_by_connection<E: Entity, O: Entity>(
    conn: &Connection,
    ctx: &OwnerContext,
    other_id: &str,
    query: &PageQuery,
    connected: bool,
) -> Result<Page<E>, ThingsError> {
    let Some(other_id) = canonical_id(other_id) else {
        return Err(not_found(O::KIND, other_id));
    };

    let membership = format!(
        "SELECT {own} FROM connections WHERE {other} = ?",
        own = E::CONNECTION_COLUMN,
        other = O::CONNECTION_COLUMN,
    );

    let from = format!("{} e", E::TABLE);
    let conditions = vec![
        "e.owner = ?".to_string(),
        if connected {
            format!("e.id IN ({})", membership)
        } else {
            format!("e.id NOT IN ({})", membership)
        },
    ];
    let params: Vec<Box<dyn ToSql>> = vec![Box::new(ctx.owner.clone()), Box::new(other_id)];

    page_of::<E>(conn, &from, conditions, params, query)
}

/// Count and fetch one window of `from` under `conditions` plus the query's
/// name and metadata filters, ordered by id.
fn page_of<E: Entity>(
    conn: &Connection,
    from: &str,
    mut conditions: Vec<String>,
    mut params: Vec<Box<dyn ToSql>>,
    query: &PageQuery,
) -> Result<Page<E>, ThingsError> {
    if let Some(name) = query.name_filter() {
        conditions.push("e.name = ?".to_string());
        params.push(Box::new(name.to_string()));
    }

    if let Some(metadata) = query.metadata_filter() {
        conditions.push("metadata_contains(e.metadata, ?)".to_string());
        params.push(Box::new(serde_json::Value::Object(metadata.clone())));
    }

    let where_clause = conditions.join(" AND ");
    let context = format!("list {}", E::TABLE);

    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", from, where_clause);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let total: i64 = conn
        .query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))
        .map_err(|e| classify(e, &context))?;

    let select_sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY e.id LIMIT ? OFFSET ?",
        select_columns::<E>(),
        from,
        where_clause
    );
    debug!("Executing query: {}", select_sql);

    params.push(Box::new(sql_int(query.limit)));
    params.push(Box::new(sql_int(query.offset)));
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&select_sql).map_err(|e| classify(e, &context))?;
    let items = stmt
        .query_map(param_refs.as_slice(), |row| E::from_row(row))
        .map_err(|e| classify(e, &context))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| classify(e, &context))?;

    Ok(Page {
        total: total as u64,
        offset: query.offset,
        limit: query.limit,
        items,
    })
}
