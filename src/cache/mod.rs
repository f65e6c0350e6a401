// src/cache/mod.rs — Cache-aside layer over a key-value store
//
// Lookups happen strictly before any upstream attempt for an item; hits cost
// no quota. Writes are best-effort: a failed write is reported to the caller
// as a soft warning and never fails the item.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::infra::config::CacheConfig;
use crate::infra::errors::HarvestError;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

/// Minimal key-value collaborator: `get` and `set` with a TTL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HarvestError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), HarvestError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
}

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn KeyValueStore>,
    key_prefix: String,
    ttl: Duration,
}

impl CacheAside {
    pub fn new(store: Arc<dyn KeyValueStore>, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self::new(store, config.key_prefix.clone(), config.ttl())
    }

    pub fn key_for(&self, item_key: &str) -> String {
        format!("{}{}", self.key_prefix, item_key)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A miss is not an error. Store connectivity and deserialization
    /// failures are `HarvestError::CacheUnavailable`; callers treat them as a
    /// miss but log them separately.
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        item_key: &str,
    ) -> Result<CacheLookup<T>, HarvestError> {
        let key = self.key_for(item_key);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(CacheLookup::Miss),
            Err(HarvestError::CacheUnavailable(msg)) => {
                return Err(HarvestError::CacheUnavailable(msg))
            }
            Err(e) => return Err(HarvestError::CacheUnavailable(e.to_string())),
        };

        serde_json::from_slice(&bytes)
            .map(CacheLookup::Hit)
            .map_err(|e| HarvestError::CacheUnavailable(format!("corrupt entry '{key}': {e}")))
    }

    /// Write-through with the configured TTL.
    pub async fn store<T: Serialize + Sync>(
        &self,
        item_key: &str,
        value: &T,
    ) -> Result<(), HarvestError> {
        let key = self.key_for(item_key);
        let bytes = serde_json::to_vec(value).map_err(|e| HarvestError::CacheWriteFailed {
            key: key.clone(),
            message: e.to_string(),
        })?;

        self.store
            .set(&key, bytes, self.ttl)
            .await
            .map_err(|e| HarvestError::CacheWriteFailed {
                key,
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
    }

    fn cache(mock: MockKeyValueStore) -> CacheAside {
        CacheAside::new(Arc::new(mock), "product:", Duration::from_secs(86_400))
    }

    #[tokio::test]
    async fn test_hit_deserializes() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .withf(|key| key == "product:B01")
            .times(1)
            .returning(|_| Ok(Some(br#"{"name":"widget"}"#.to_vec())));

        let hit = cache(mock).lookup::<Item>("B01").await.unwrap();
        assert_eq!(
            hit,
            CacheLookup::Hit(Item {
                name: "widget".into()
            })
        );
    }

    #[tokio::test]
    async fn test_miss_is_not_an_error() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get().returning(|_| Ok(None));

        let miss = cache(mock).lookup::<Item>("B02").await.unwrap();
        assert_eq!(miss, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_unavailable() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get().returning(|_| Ok(Some(b"not json".to_vec())));

        let err = cache(mock).lookup::<Item>("B03").await.unwrap_err();
        assert!(matches!(err, HarvestError::CacheUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connectivity_error_is_unavailable() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .returning(|_| Err(HarvestError::Transport("connection refused".into())));

        let err = cache(mock).lookup::<Item>("B04").await.unwrap_err();
        assert!(matches!(err, HarvestError::CacheUnavailable(m) if m.contains("refused")));
    }

    #[tokio::test]
    async fn test_store_uses_prefix_and_ttl() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_set()
            .withf(|key, value, ttl| {
                key == "product:B05"
                    && value.as_slice() == br#"{"name":"gear"}"#
                    && *ttl == Duration::from_secs(86_400)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        cache(mock)
            .store("B05", &Item {
                name: "gear".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_is_soft_error() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_set()
            .returning(|_, _, _| Err(HarvestError::CacheUnavailable("disk full".into())));

        let err = cache(mock)
            .store("B06", &Item { name: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::CacheWriteFailed { key, .. } if key == "product:B06"));
    }
}
