// src/store/sqlite.rs — SQLite-backed document store

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::{Database, DocumentStore};
use crate::infra::errors::HarvestError;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, HarvestError> {
        let collection = collection.to_string();
        let id = id.to_string();
        let body: Option<String> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                        params![collection, id],
                        |r| r.get(0),
                    )
                    .optional()?)
            })
            .await?;

        body.map(|b| serde_json::from_str(&b).map_err(|e| HarvestError::Decode(e.to_string())))
            .transpose()
    }

    pub async fn count(&self, collection: &str) -> Result<usize, HarvestError> {
        let collection = collection.to_string();
        self.db
            .call(move |conn| {
                let n: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                    [collection],
                    |r| r.get(0),
                )?;
                Ok(n as usize)
            })
            .await
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        document: &Value,
    ) -> Result<(), HarvestError> {
        let collection = collection.to_string();
        let id = id.to_string();
        let body = document.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, body, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(collection, id) DO UPDATE SET
                        body = excluded.body,
                        updated_at = excluded.updated_at",
                    params![collection, id, body, now],
                )?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_replaces_document() {
        let store = SqliteDocumentStore::new(Database::open_in_memory().unwrap());
        store
            .upsert("products", "B01", &json!({"price": 100}))
            .await
            .unwrap();
        store
            .upsert("products", "B01", &json!({"price": 90}))
            .await
            .unwrap();

        assert_eq!(store.count("products").await.unwrap(), 1);
        let doc = store.get("products", "B01").await.unwrap().unwrap();
        assert_eq!(doc["price"], 90);
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = SqliteDocumentStore::new(Database::open_in_memory().unwrap());
        store.upsert("a", "X", &json!(1)).await.unwrap();
        store.upsert("b", "X", &json!(2)).await.unwrap();

        assert_eq!(store.get("a", "X").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("b", "X").await.unwrap(), Some(json!(2)));
        assert_eq!(store.get("c", "X").await.unwrap(), None);
    }
}
