use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use tracing::info;

use super::schema;
use crate::error::{Result, SyncError};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Opens (creating if needed) the database file and initializes the schema.
pub fn open(db_path: &Path) -> Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SyncError::Database(format!("Failed to create db dir: {e}")))?;
    }

    info!("Opening sync database at {:?}", db_path);

    // Pragmas are per connection, so they run on every pooled connection.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )
    });

    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    schema::initialize_schema(&conn)?;

    Ok(pool)
}

/// Single-connection in-memory database (tests, ephemeral sessions).
///
/// Each SQLite memory connection is its own database, so the pool is pinned
/// to one connection that is never recycled.
pub fn in_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)?;

    let conn = pool.get()?;
    schema::initialize_schema(&conn)?;

    Ok(pool)
}
