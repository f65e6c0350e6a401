// src/cache/memory.rs — In-process key-value store with expiry

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::KeyValueStore;
use crate::infra::errors::HarvestError;

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> HarvestError {
        HarvestError::CacheUnavailable("memory cache lock poisoned".into())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HarvestError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), HarvestError> {
        let mut entries = self.entries.lock().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }
}
