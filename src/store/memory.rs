// src/store/memory.rs — In-process document store

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::DocumentStore;
use crate::infra::errors::HarvestError;

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        let docs = self.docs.lock().ok()?;
        docs.get(&(collection.to_string(), id.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> Result<(), HarvestError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| HarvestError::Other(anyhow::anyhow!("document map poisoned")))?;
        docs.insert((collection.to_string(), id.to_string()), document.clone());
        Ok(())
    }
}
