// src/store/db.rs — Shared SQLite connection
//
// One connection serves both the cache table and the document table.
// rusqlite is blocking, so every call hops onto the blocking pool.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::schema;
use crate::infra::errors::HarvestError;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::wrap(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, HarvestError>
    where
        F: FnOnce(&Connection) -> Result<T, HarvestError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| HarvestError::Other(anyhow::anyhow!("database lock poisoned")))?;
            f(&guard)
        })
        .await
        .map_err(|e| HarvestError::Other(anyhow::anyhow!("database task failed: {e}")))?
    }
}
