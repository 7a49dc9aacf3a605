//! SQLite database module for things, channels and their connections
//!
//! ## Tables
//!
//! - `things` - Endpoints (id, owner, unique secret key, name, metadata JSON)
//! - `channels` - Topics (id, owner, name, metadata JSON)
//! - `connections` - Thing <-> channel relation, cascading on entity removal
//!
//! Repository functions live in the submodules and take a `&Connection`, so
//! they run the same inside or outside a transaction.

pub mod schema;
pub mod context;
pub mod models;
pub mod metadata;
pub mod entity;
pub mod things;
pub mod channels;
pub mod connections;
pub mod access;

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{classify, ThingsError};

/// VM instructions between deadline checks
const DEADLINE_CHECK_OPS: i32 = 1000;

/// SQLite database for things and channels
pub struct ThingsDb {
    conn: Mutex<Connection>,
}

impl ThingsDb {
    /// Open or create the database described by `config`
    pub fn open(config: &Config) -> Result<Self, ThingsError> {
        std::fs::create_dir_all(&config.storage_dir)?;
        Self::open_path(&config.db_path(), Duration::from_millis(config.busy_timeout_ms))
    }

    /// Open or create a database file
    pub fn open_path(db_path: &Path, busy_timeout: Duration) -> Result<Self, ThingsError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| ThingsError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // WAL for concurrent readers on the access path
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| ThingsError::Internal(format!("Failed to set PRAGMA: {}", e)))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| ThingsError::Internal(format!("Failed to set busy timeout: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ThingsError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| ThingsError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ThingsError> {
        // Cascading removal of connections depends on this
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ThingsError::Internal(format!("Failed to enable foreign keys: {}", e)))?;

        metadata::register_functions(&conn)
            .map_err(|e| ThingsError::Internal(format!("Failed to register SQL functions: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read-only closure against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ThingsError>
    where
        F: FnOnce(&Connection) -> Result<T, ThingsError>,
    {
        self.with_conn_deadline(None, f)
    }

    /// `with_conn` bounded by `deadline`.
    ///
    /// The deadline only starts counting once the lock is held, and only
    /// statements run by `f` are aborted. An expired deadline fails with
    /// `Cancelled` before `f` runs.
    pub fn with_conn_deadline<F, T>(&self, deadline: Option<Instant>, f: F) -> Result<T, ThingsError>
    where
        F: FnOnce(&Connection) -> Result<T, ThingsError>,
    {
        self.with_conn_mut(|conn| {
            set_deadline(conn, deadline)?;
            let result = f(conn);
            set_deadline(conn, None)?;
            result
        })
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, ThingsError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ThingsError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| ThingsError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Run `f` inside one transaction.
    ///
    /// Commits when `f` returns `Ok`. Any error, including a failed commit,
    /// leaves nothing behind: the transaction rolls back when dropped.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, ThingsError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, ThingsError>,
    {
        self.with_tx_deadline(None, f)
    }

    /// `with_tx` bounded by `deadline`. A statement still running when the
    /// deadline passes is aborted, the call fails with `Cancelled` and the
    /// transaction rolls back.
    pub fn with_tx_deadline<F, T>(&self, deadline: Option<Instant>, f: F) -> Result<T, ThingsError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, ThingsError>,
    {
        self.with_conn_mut(|conn| {
            set_deadline(conn, deadline)?;
            let result = run_tx(conn, f);
            set_deadline(conn, None)?;
            result
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, ThingsError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, ThingsError> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get::<_, i64>(0))
                    .map(|n| n as u64)
                    .map_err(|e| ThingsError::Internal(format!("Query failed: {}", e)))
            };

            Ok(DbStats {
                thing_count: count("things")?,
                channel_count: count("channels")?,
                connection_count: count("connections")?,
            })
        })
    }
}

fn run_tx<F, T>(conn: &mut Connection, f: F) -> Result<T, ThingsError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, ThingsError>,
{
    let tx = conn.transaction()
        .map_err(|e| classify(e, "begin transaction"))?;
    let value = f(&tx)?;
    tx.commit().map_err(|e| classify(e, "commit"))?;
    Ok(value)
}

/// Install (or with `None`, clear) the progress handler that aborts
/// statements once `deadline` has passed.
fn set_deadline(conn: &Connection, deadline: Option<Instant>) -> Result<(), ThingsError> {
    match deadline {
        Some(deadline) => {
            if Instant::now() >= deadline {
                return Err(ThingsError::Cancelled("deadline exceeded".into()));
            }
            conn.progress_handler(DEADLINE_CHECK_OPS, Some(move || Instant::now() >= deadline));
        }
        None => conn.progress_handler(0, None::<fn() -> bool>),
    }
    Ok(())
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub thing_count: u64,
    pub channel_count: u64,
    pub connection_count: u64,
}

// Re-exports
pub use context::OwnerContext;
pub use models::{Channel, Entity, Metadata, Page, PageQuery, Thing};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_empty_stats() {
        let db = ThingsDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.thing_count, 0);
        assert_eq!(stats.channel_count, 0);
        assert_eq!(stats.connection_count, 0);
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let db = ThingsDb::open_in_memory().unwrap();

        let result: Result<(), ThingsError> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO channels (id, owner) VALUES ('c1', 'owner')",
                [],
            )
            .map_err(|e| classify(e, "insert"))?;
            Err(ThingsError::Conflict("abort".into()))
        });
        assert!(result.is_err());

        assert_eq!(db.stats().unwrap().channel_count, 0);
    }

    const SLOW_COUNT: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 1000000000)
         SELECT count(*) FROM c";

    #[test]
    fn test_deadline_aborts_running_batch() {
        let db = ThingsDb::open_in_memory().unwrap();
        let deadline = Instant::now() + Duration::from_millis(50);

        let result: Result<i64, ThingsError> = db.with_tx_deadline(Some(deadline), |tx| {
            tx.execute("INSERT INTO channels (id, owner) VALUES ('c1', 'owner')", [])
                .map_err(|e| classify(e, "insert"))?;
            tx.query_row(SLOW_COUNT, [], |row| row.get(0))
                .map_err(|e| classify(e, "count"))
        });

        assert!(matches!(result, Err(ThingsError::Cancelled(_))));
        assert_eq!(db.stats().unwrap().channel_count, 0);

        // The deadline belonged to that call only
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 100000)
                     SELECT count(*) FROM c",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| classify(e, "count"))
            })
            .unwrap();
        assert_eq!(count, 100000);
    }

    #[test]
    fn test_expired_deadline_skips_work() {
        let db = ThingsDb::open_in_memory().unwrap();
        let expired = Instant::now() - Duration::from_millis(1);

        let mut ran = false;
        let result = db.with_tx_deadline(Some(expired), |_| {
            ran = true;
            Ok(())
        });
        assert!(matches!(result, Err(ThingsError::Cancelled(_))));
        assert!(!ran);

        let result = db.with_conn_deadline(Some(expired), |_| Ok(()));
        assert!(matches!(result, Err(ThingsError::Cancelled(_))));
    }

    #[test]
    fn test_open_on_disk_reopens_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            storage_dir: dir.path().join("nested"),
            ..Default::default()
        };

        {
            let db = ThingsDb::open(&config).unwrap();
            db.with_conn(|conn| {
                conn.execute("INSERT INTO channels (id, owner) VALUES ('c1', 'o')", [])
                    .map_err(|e| classify(e, "insert"))
            })
            .unwrap();
        }

        let db = ThingsDb::open(&config).unwrap();
        assert_eq!(db.stats().unwrap().channel_count, 1);
    }
}
