// tests/retry_test.rs — Integration test: retry controller against the shared budget

mod common;

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use catalog_harvester::infra::errors::HarvestError;
use catalog_harvester::upstream::{Method, RawResponse};
use common::{finder_ok, harness, product_ok, rate_limited, status};

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[tokio::test]
async fn test_three_rate_limits_exhaust_quota() {
    let hints = [0, 0, 500];
    let seen = AtomicUsize::new(0);
    let h = harness(300, move |_, now| {
        let i = seen.fetch_add(1, Ordering::SeqCst);
        Ok(rate_limited(now, 0, hints[i.min(2)]))
    });

    let err = h.catalog.product("B01").await.unwrap_err();

    assert!(matches!(
        err,
        HarvestError::QuotaExhausted {
            attempts: 3,
            refill_in_ms: 500
        }
    ));
    assert_eq!(h.transport.call_count(), 3);
    // Empty bucket: local estimate (12 tokens at 12s each) plus 2^n seconds
    let sleeps = h.clock.sleeps();
    assert_eq!(sleeps, vec![secs(145), secs(146)]);
    assert!(sleeps[0] < sleeps[1]);
}

#[tokio::test]
async fn test_rate_limit_backoff_doubles_then_succeeds() {
    let seen = AtomicUsize::new(0);
    let h = harness(300, move |_, now| {
        match seen.fetch_add(1, Ordering::SeqCst) {
            0 | 1 => Ok(rate_limited(now, 200, 0)),
            _ => Ok(product_ok(now, 198, "B02")),
        }
    });

    let details = h.catalog.product("B02").await.unwrap();

    assert_eq!(details.products[0].asin, "B02");
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(h.clock.sleeps(), vec![secs(1), secs(2)]);
}

#[tokio::test]
async fn test_server_hint_dominates_small_estimate() {
    let seen = AtomicUsize::new(0);
    let h = harness(300, move |_, now| {
        match seen.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(rate_limited(now, 200, 7_000)),
            _ => Ok(product_ok(now, 190, "B03")),
        }
    });

    h.catalog.product("B03").await.unwrap();
    assert_eq!(h.clock.sleeps(), vec![secs(8)]);
}

#[tokio::test]
async fn test_transport_error_is_retried() {
    let seen = AtomicUsize::new(0);
    let h = harness(300, move |_, now| {
        match seen.fetch_add(1, Ordering::SeqCst) {
            0 => Err(HarvestError::Transport("connection reset".into())),
            _ => Ok(product_ok(now, 250, "B04")),
        }
    });

    h.catalog.product("B04").await.unwrap();
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.clock.sleeps(), vec![secs(1)]);
}

#[tokio::test]
async fn test_unparseable_body_exhausts_retries() {
    let h = harness(300, |_, _| Ok(RawResponse::new(200, "<html>gateway</html>")));

    let err = h.catalog.product("B05").await.unwrap_err();

    assert!(matches!(err, HarvestError::RetryExhausted { attempts: 3, .. }));
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(h.clock.sleeps(), vec![secs(1), secs(2)]);
}

#[tokio::test]
async fn test_protocol_error_is_not_retried() {
    let h = harness(300, |_, now| Ok(status(now, 404, 280)));

    let err = h.catalog.product("B06").await.unwrap_err();

    assert!(matches!(err, HarvestError::Protocol { status: 404, .. }));
    assert_eq!(h.transport.call_count(), 1);
    assert!(h.clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_low_budget_blocks_before_first_attempt() {
    let h = harness(5, |_, now| Ok(product_ok(now, 250, "B07")));

    h.catalog.product("B07").await.unwrap();

    // cost 2 + safety 10 = 12 needed, 7 missing at 12s per token
    assert_eq!(h.clock.sleeps(), vec![secs(84)]);
    assert_eq!(h.catalog.budget().snapshot().await.tokens_left, 250);
}

#[tokio::test]
async fn test_server_tokens_override_local_estimate() {
    let h = harness(300, |_, now| Ok(product_ok(now, 42, "B08")));

    h.catalog.product("B08").await.unwrap();
    assert_eq!(h.catalog.budget().snapshot().await.tokens_left, 42);
}

#[tokio::test]
async fn test_discovery_posts_filter_with_page_size() {
    let h = harness(300, |_, now| {
        Ok(finder_ok(now, 280, &["A1".to_string(), "A2".to_string()]))
    });

    let found = h
        .catalog
        .find_products(&json!({"current_SALES_lte": 5000}), 50)
        .await
        .unwrap();

    assert_eq!(found, vec!["A1", "A2"]);
    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Post);
    assert_eq!(calls[0].path, "query");
    let body = calls[0].body.as_ref().unwrap();
    assert_eq!(body["perPage"], 50);
    assert_eq!(body["current_SALES_lte"], 5000);
}

#[tokio::test]
async fn test_discovery_rejects_non_object_filter() {
    let h = harness(300, |_, now| Ok(finder_ok(now, 280, &[])));
    let err = h.catalog.find_products(&json!([1, 2]), 10).await.unwrap_err();
    assert!(matches!(err, HarvestError::Config(_)));
    assert_eq!(h.transport.call_count(), 0);
}
