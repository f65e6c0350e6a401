// src/cli/components.rs — Wire configured components into a Harvester

use std::sync::Arc;
use tracing::{debug, info};

use crate::budget::{BudgetHandle, Clock, SystemClock};
use crate::cache::{CacheAside, KeyValueStore, MemoryKv, SqliteKv};
use crate::catalog::CatalogClient;
use crate::fetch::{HarvestSettings, Harvester};
use crate::infra::config::{Backend, Config};
use crate::infra::paths;
use crate::store::{Database, DocumentStore, MemoryDocumentStore, SqliteDocumentStore};
use crate::upstream::{HttpTransport, RetryController, RetryPolicy};

/// Build a harvester from configuration. Opens the SQLite database only when
/// a backend needs it.
pub async fn build_harvester(config: &Config) -> anyhow::Result<Harvester> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let budget = BudgetHandle::from_config(&config.budget, clock);

    let transport = Arc::new(HttpTransport::new(&config.api)?);
    let retry = RetryController::with_policy(transport, budget, RetryPolicy::from(&config.retry));
    let catalog = CatalogClient::new(retry, config.api.detail.clone());

    let needs_db =
        config.cache.backend == Backend::Sqlite || config.store.backend == Backend::Sqlite;
    let db = if needs_db {
        paths::ensure_dirs()?;
        let path = paths::db_path();
        info!("Opening database at {}", path.display());
        Some(Database::open(&path)?)
    } else {
        None
    };

    let kv: Arc<dyn KeyValueStore> = match (&config.cache.backend, &db) {
        (Backend::Sqlite, Some(db)) => {
            let kv = SqliteKv::new(db.clone());
            let purged = kv.purge_expired().await?;
            debug!(purged, "Expired cache entries removed");
            Arc::new(kv)
        }
        _ => Arc::new(MemoryKv::new()),
    };
    let cache = CacheAside::from_config(kv, &config.cache);

    let store: Arc<dyn DocumentStore> = match (&config.store.backend, &db) {
        (Backend::Sqlite, Some(db)) => Arc::new(SqliteDocumentStore::new(db.clone())),
        _ => Arc::new(MemoryDocumentStore::new()),
    };

    Ok(Harvester::new(
        catalog,
        cache,
        store,
        HarvestSettings::from_config(config),
    ))
}
