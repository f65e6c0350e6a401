// src/store/mod.rs — Document persistence

pub mod db;
pub mod memory;
pub mod persister;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;

use crate::infra::errors::HarvestError;

pub use db::Database;
pub use memory::MemoryDocumentStore;
pub use persister::{PersistFailure, PersistReport, Persister};
pub use sqlite::SqliteDocumentStore;

/// Document store collaborator. Upserts are idempotent per `(collection, id)`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, collection: &str, id: &str, document: &Value)
        -> Result<(), HarvestError>;
}
