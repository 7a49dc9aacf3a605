//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::ThingsError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), ThingsError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
pub fn get_schema_version(conn: &Connection) -> Result<i32, ThingsError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| ThingsError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), ThingsError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| ThingsError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| ThingsError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), ThingsError> {
    conn.execute_batch(ENTITIES_SCHEMA)
        .map_err(|e| ThingsError::Internal(format!("Failed to create entity tables: {}", e)))?;

    conn.execute_batch(CONNECTIONS_SCHEMA)
        .map_err(|e| ThingsError::Internal(format!("Failed to create connections table: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| ThingsError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), ThingsError> {
    // No released version predates v1 yet
    info!(from_version, "No migration steps required");
    set_schema_version(conn, SCHEMA_VERSION)
}

/// Things and channels
///
/// `UNIQUE (id, owner)` is the target of the composite foreign keys in
/// `connections`, so a connection row can only reference entities of the
/// owner recorded on it.
const ENTITIES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS things (
    id TEXT PRIMARY KEY NOT NULL,
    owner TEXT NOT NULL,
    key TEXT UNIQUE,
    name TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (id, owner)
);

CREATE TABLE IF NOT EXISTS channels (
    id TEXT PRIMARY KEY NOT NULL,
    owner TEXT NOT NULL,
    name TEXT,
    metadata TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (id, owner)
);
"#;

/// Thing <-> channel relation
const CONNECTIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS connections (
    channel_id TEXT NOT NULL,
    channel_owner TEXT NOT NULL,
    thing_id TEXT NOT NULL,
    thing_owner TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (channel_id, thing_id),
    FOREIGN KEY (channel_id, channel_owner) REFERENCES channels (id, owner)
        ON DELETE CASCADE ON UPDATE CASCADE,
    FOREIGN KEY (thing_id, thing_owner) REFERENCES things (id, owner)
        ON DELETE CASCADE ON UPDATE CASCADE
);
"#;

/// Owner scans for listings, reverse lookups for the access path
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_things_owner ON things (owner, id);
CREATE INDEX IF NOT EXISTS idx_channels_owner ON channels (owner, id);
CREATE INDEX IF NOT EXISTS idx_things_owner_name ON things (owner, name);
CREATE INDEX IF NOT EXISTS idx_channels_owner_name ON channels (owner, name);
CREATE INDEX IF NOT EXISTS idx_connections_thing ON connections (thing_id, channel_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in ["things", "channels", "connections"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }
}
