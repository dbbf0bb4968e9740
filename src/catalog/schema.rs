use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use super::{Result, StoreError};

/// Current schema version.  Increment when adding new migrations.
const SCHEMA_VERSION: u32 = 1;

/// Apply all pending migrations to `conn`.
///
/// Migrations are idempotent: tables are created with `IF NOT EXISTS` and the
/// `meta` table tracks which version has been applied so we only run new ones.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current_version = get_meta(conn, "schema_version")?
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        debug!(version = current_version, "catalog schema up to date");
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
    debug!(version = SCHEMA_VERSION, "catalog schema migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1: initial tables
// ---------------------------------------------------------------------------

fn migrate_v1(conn: &Connection) -> Result<()> {
    // `seq` records insertion order and breaks distance ties; updates keep it.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rooms (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            id                  TEXT    NOT NULL UNIQUE,
            name                TEXT    NOT NULL,
            city                TEXT    NOT NULL,
            description         TEXT    NOT NULL,
            amenities           TEXT    NOT NULL DEFAULT '[]',
            price               REAL    NOT NULL,
            capacity            INTEGER NOT NULL,
            beds                INTEGER NOT NULL,
            room_type           TEXT,
            has_kitchen         INTEGER NOT NULL DEFAULT 0,
            available_from      TEXT,
            available_to        TEXT,
            embedding_hash      TEXT    NOT NULL,
            embedding_dimension INTEGER NOT NULL,
            embedding           BLOB    NOT NULL,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL
        );",
    )?;

    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_rooms_price ON rooms(price);")?;

    Ok(())
}

/// Record the embedding model and dimension the catalog is built with, or
/// verify them against an existing catalog.
pub fn ensure_embedding_profile(conn: &Connection, model: &str, dimensions: usize) -> Result<()> {
    match get_meta(conn, "embedding_dimensions")? {
        Some(stored) => {
            let stored: usize = stored.parse().map_err(|_| {
                StoreError::InvalidDbValue(format!("embedding_dimensions = {stored:?}"))
            })?;
            if stored != dimensions {
                return Err(StoreError::DimensionMismatch {
                    expected: stored,
                    actual: dimensions,
                });
            }
        }
        None => set_meta(conn, "embedding_dimensions", &dimensions.to_string())?,
    }

    match get_meta(conn, "embedding_model")? {
        Some(stored) if stored != model => Err(StoreError::ModelMismatch {
            stored,
            configured: model.to_string(),
        }),
        Some(_) => Ok(()),
        None => set_meta(conn, "embedding_model", model),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()?)
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_meta(&conn, "schema_version").unwrap();
        assert_eq!(version.as_deref(), Some("1"));
    }

    #[test]
    fn embedding_profile_is_pinned() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        ensure_embedding_profile(&conn, "hashing-trigram-v1", 384).unwrap();
        ensure_embedding_profile(&conn, "hashing-trigram-v1", 384).unwrap();

        assert!(matches!(
            ensure_embedding_profile(&conn, "hashing-trigram-v1", 128),
            Err(StoreError::DimensionMismatch {
                expected: 384,
                actual: 128
            })
        ));
        assert!(matches!(
            ensure_embedding_profile(&conn, "other-model", 384),
            Err(StoreError::ModelMismatch { .. })
        ));
    }
}
