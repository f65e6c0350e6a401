// src/cache/sqlite.rs — SQLite-backed key-value store
//
// Expiry is stored as Unix seconds; an expired row reads as a miss and is
// left for `purge_expired`.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::time::Duration;

use super::KeyValueStore;
use crate::infra::errors::HarvestError;
use crate::store::Database;

#[derive(Clone)]
pub struct SqliteKv {
    db: Database,
}

impl SqliteKv {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Delete expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, HarvestError> {
        let now = Utc::now().timestamp();
        self.db
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM kv_cache WHERE expires_at <= ?1", [now])?)
            })
            .await
    }
}

fn unavailable(e: HarvestError) -> HarvestError {
    match e {
        HarvestError::CacheUnavailable(_) => e,
        other => HarvestError::CacheUnavailable(other.to_string()),
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HarvestError> {
        let key = key.to_string();
        let now = Utc::now().timestamp();
        let row: Option<(Vec<u8>, i64)> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value, expires_at FROM kv_cache WHERE key = ?1",
                        [key],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()?)
            })
            .await
            .map_err(unavailable)?;

        Ok(row.and_then(|(value, expires_at)| (expires_at > now).then_some(value)))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), HarvestError> {
        let key = key.to_string();
        let now = Utc::now().timestamp();
        let expires_at = now + ttl.as_secs() as i64;
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv_cache (key, value, written_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        written_at = excluded.written_at,
                        expires_at = excluded.expires_at",
                    params![key, value, now, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv() -> SqliteKv {
        SqliteKv::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let kv = kv();
        let day = Duration::from_secs(86_400);
        kv.set("product:B01", b"one".to_vec(), day).await.unwrap();
        kv.set("product:B01", b"two".to_vec(), day).await.unwrap();
        assert_eq!(kv.get("product:B01").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(kv.get("product:B02").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_is_miss_and_purged() {
        let kv = kv();
        kv.set("stale", b"x".to_vec(), Duration::ZERO).await.unwrap();
        kv.set("fresh", b"y".to_vec(), Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(kv.get("stale").await.unwrap(), None);
        assert_eq!(kv.purge_expired().await.unwrap(), 1);
        assert_eq!(kv.get("fresh").await.unwrap(), Some(b"y".to_vec()));
    }
}
