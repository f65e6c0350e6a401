// src/fetch/pipeline.rs — Bounded-concurrency cache-aside fetch over item keys
//
// Workers are capped by a semaphore. Each worker sends exactly one
// `FetchResult` to a single aggregating receiver, so the result list is only
// ever touched by one task. Results arrive in completion order.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use super::{DetailSource, FetchResult, FetchWarning, Source};
use crate::cache::{CacheAside, CacheLookup};
use crate::catalog::ProductDetails;
use crate::infra::errors::{FailureKind, FailureReason};

#[derive(Clone)]
pub struct FetchPipeline {
    source: Arc<dyn DetailSource>,
    cache: CacheAside,
    concurrency: usize,
}

impl FetchPipeline {
    pub fn new(source: Arc<dyn DetailSource>, cache: CacheAside, concurrency: usize) -> Self {
        Self {
            source,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every distinct key. Returns one result per distinct key once all
    /// of them are terminal; a failing item never stops its siblings.
    pub async fn run(&self, keys: &[String]) -> Vec<FetchResult> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = keys
            .iter()
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<FetchResult>(unique.len());
        let mut handles = Vec::with_capacity(unique.len());

        for key in &unique {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let cache = self.cache.clone();
            let tx = tx.clone();
            let key = key.clone();

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = fetch_one(source.as_ref(), &cache, &key).await;
                let _ = tx.send(result).await;
            }));
        }
        drop(tx);

        let mut results = Vec::with_capacity(unique.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Fetch worker aborted");
            }
        }

        // A worker that died before reporting still owes its key a result.
        let reported: HashSet<String> = results.iter().map(|r| r.item_key.clone()).collect();
        for key in unique.into_iter().filter(|k| !reported.contains(k)) {
            results.push(FetchResult::failure(
                key,
                FailureReason {
                    kind: FailureKind::Internal,
                    message: "worker stopped before reporting a result".into(),
                },
            ));
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let from_cache = results.iter().filter(|r| r.source == Source::Cache).count();
        info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            from_cache,
            "Pipeline finished"
        );
        results
    }
}

async fn fetch_one(source: &dyn DetailSource, cache: &CacheAside, key: &str) -> FetchResult {
    let mut warnings = Vec::new();

    match cache.lookup::<ProductDetails>(key).await {
        Ok(CacheLookup::Hit(details)) => {
            debug!(asin = key, "Cache hit");
            return FetchResult::success(key, details, Source::Cache);
        }
        Ok(CacheLookup::Miss) => debug!(asin = key, "Cache miss"),
        Err(e) => {
            warn!(asin = key, error = %e, "Cache read failed, fetching upstream");
            warnings.push(FetchWarning::CacheReadFailed {
                message: e.to_string(),
            });
        }
    }

    match source.fetch_detail(key).await {
        Ok(details) => {
            if let Err(e) = cache.store(key, &details).await {
                warn!(asin = key, error = %e, "Cache write failed");
                warnings.push(FetchWarning::CacheWriteFailed {
                    message: e.to_string(),
                });
            }
            FetchResult::success(key, details, Source::Upstream).with_warnings(warnings)
        }
        Err(e) => {
            error!(asin = key, error = %e, "Item fetch failed");
            FetchResult::failure(key, FailureReason::from(&e)).with_warnings(warnings)
        }
    }
}
