// src/store/schema.rs — Schema + migrations

use rusqlite::{params, Connection};
use tracing::info;

use crate::infra::errors::HarvestError;

/// A database migration with version, name, and SQL statements.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub up: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "kv_cache",
        up: "CREATE TABLE kv_cache (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                written_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX idx_kv_cache_expires ON kv_cache(expires_at);",
    },
    Migration {
        version: 2,
        name: "documents",
        up: "CREATE TABLE documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );",
    },
];

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), HarvestError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            "Applying migration {}: {}",
            migration.version, migration.name
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.up)?;
        tx.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    Ok(())
}
