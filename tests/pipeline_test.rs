// tests/pipeline_test.rs — Integration test: cache-aside pipeline over the catalog client

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use catalog_harvester::cache::{CacheAside, KeyValueStore, MemoryKv, SqliteKv};
use catalog_harvester::catalog::{ProductDetails, SimplifiedProduct};
use catalog_harvester::fetch::{FetchPipeline, Source};
use catalog_harvester::infra::errors::FailureKind;
use catalog_harvester::store::Database;
use common::{asins, harness, product_ok, status, Harness};
use pretty_assertions::assert_eq;

const DAY: Duration = Duration::from_secs(86_400);

fn pipeline(h: &Harness, kv: Arc<dyn KeyValueStore>) -> FetchPipeline {
    FetchPipeline::new(
        Arc::new(h.catalog.clone()),
        CacheAside::new(kv, "product:", DAY),
        5,
    )
}

fn asin_of(req: &catalog_harvester::upstream::UpstreamRequest) -> String {
    req.query_value("asin").unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_cache_hit_makes_no_upstream_call() {
    let h = harness(300, |req, now| Ok(product_ok(now, 290, &asin_of(req))));
    let kv = Arc::new(MemoryKv::new());
    let cached = ProductDetails {
        products: vec![SimplifiedProduct {
            asin: "B0CACHED".into(),
            title: "cached copy".into(),
            ..Default::default()
        }],
    };
    kv.set("product:B0CACHED", serde_json::to_vec(&cached).unwrap(), DAY)
        .await
        .unwrap();

    let before = h.catalog.budget().snapshot().await;
    let results = pipeline(&h, kv).run(&["B0CACHED".to_string()]).await;

    assert_eq!(h.transport.call_count(), 0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, Source::Cache);
    assert_eq!(results[0].details(), Some(&cached));
    assert_eq!(h.catalog.budget().snapshot().await, before);
}

#[tokio::test]
async fn test_partial_failures_keep_every_result() {
    let bad: HashSet<String> = ["F000", "F004", "F008"].iter().map(|s| s.to_string()).collect();
    let h = harness(300, move |req, now| {
        let asin = asin_of(req);
        if bad.contains(&asin) {
            Ok(status(now, 404, 290))
        } else {
            Ok(product_ok(now, 290, &asin))
        }
    });

    let keys = asins("F", 10);
    let results = pipeline(&h, Arc::new(MemoryKv::new())).run(&keys).await;

    assert_eq!(results.len(), 10);
    let returned: HashSet<&str> = results.iter().map(|r| r.item_key.as_str()).collect();
    assert_eq!(returned.len(), 10);

    let mut failed: Vec<_> = results
        .iter()
        .filter_map(|r| r.failure_reason().map(|f| (r.item_key.clone(), f.clone())))
        .collect();
    failed.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(failed.len(), 3);
    assert_eq!(
        failed.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
        vec!["F000", "F004", "F008"]
    );
    for (_, reason) in &failed {
        assert_eq!(reason.kind, FailureKind::Protocol);
        assert!(reason.message.contains("404"));
    }
    assert_eq!(results.iter().filter(|r| r.is_success()).count(), 7);
}

#[tokio::test]
async fn test_successes_are_cached_failures_are_not() {
    let h = harness(300, |req, now| {
        let asin = asin_of(req);
        if asin == "C001" {
            Ok(status(now, 500, 290))
        } else {
            Ok(product_ok(now, 290, &asin))
        }
    });
    let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKv::new(Database::open_in_memory().unwrap()));
    let pipeline = pipeline(&h, kv);
    let keys = asins("C", 4);

    pipeline.run(&keys).await;
    assert_eq!(h.transport.product_calls(), 4);

    let again = pipeline.run(&keys).await;
    // Only the failed key goes upstream a second time
    assert_eq!(h.transport.product_calls(), 5);
    let from_cache = again.iter().filter(|r| r.source == Source::Cache).count();
    assert_eq!(from_cache, 3);
}

#[tokio::test]
async fn test_drained_budget_slows_but_completes() {
    // Server keeps reporting a nearly empty bucket
    let h = harness(300, |req, now| Ok(product_ok(now, 11, &asin_of(req))));
    let keys = asins("D", 6);

    let results = pipeline(&h, Arc::new(MemoryKv::new())).run(&keys).await;

    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.is_success()));
    assert!(!h.clock.sleeps().is_empty());
}
