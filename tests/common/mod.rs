// tests/common/mod.rs — Scripted catalog transport and response builders
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use catalog_harvester::budget::{BudgetHandle, Clock, ManualClock, TokenBudget};
use catalog_harvester::catalog::CatalogClient;
use catalog_harvester::infra::config::{BudgetConfig, DetailParams};
use catalog_harvester::infra::errors::HarvestError;
use catalog_harvester::upstream::{CatalogTransport, RawResponse, RetryController, UpstreamRequest};

/// Virtual start time for every test clock.
pub const START_MS: i64 = 1_700_000_000_000;

pub type RawResponseResult = Result<RawResponse, HarvestError>;

type Handler = dyn Fn(&UpstreamRequest, i64) -> RawResponseResult + Send + Sync;

/// Answers each request through a handler that sees the request and the
/// current virtual time. Every request is logged.
pub struct ScriptedTransport {
    clock: Arc<ManualClock>,
    handler: Box<Handler>,
    calls: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(clock: Arc<ManualClock>, handler: F) -> Arc<Self>
    where
        F: Fn(&UpstreamRequest, i64) -> Result<RawResponse, HarvestError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            clock,
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn product_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.path == "product")
            .count()
    }
}

#[async_trait]
impl CatalogTransport for ScriptedTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, HarvestError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.handler)(request, self.clock.now_ms())
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub transport: Arc<ScriptedTransport>,
    pub catalog: CatalogClient,
}

/// Catalog client over a scripted transport, a manual clock and a budget
/// starting at `initial_tokens`.
pub fn harness<F>(initial_tokens: i64, handler: F) -> Harness
where
    F: Fn(&UpstreamRequest, i64) -> Result<RawResponse, HarvestError> + Send + Sync + 'static,
{
    let clock = Arc::new(ManualClock::new(START_MS));
    let transport = ScriptedTransport::new(clock.clone(), handler);
    let budget = TokenBudget::new(&BudgetConfig::default(), START_MS).with_tokens(initial_tokens);
    let budget = BudgetHandle::new(budget, clock.clone() as Arc<dyn Clock>);
    let retry = RetryController::new(transport.clone(), budget);
    Harness {
        clock,
        transport,
        catalog: CatalogClient::new(retry, DetailParams::default()),
    }
}

fn quota(now: i64, tokens_left: i64, refill_in: i64) -> Value {
    json!({
        "timestamp": now,
        "tokensLeft": tokens_left,
        "refillIn": refill_in,
        "refillRate": 5,
        "tokensConsumed": 2,
        "processingTimeInMs": 12
    })
}

fn with_quota(mut payload: Value, now: i64, tokens_left: i64) -> String {
    if let (Some(obj), Value::Object(q)) = (payload.as_object_mut(), quota(now, tokens_left, 0)) {
        obj.extend(q);
    }
    payload.to_string()
}

pub fn product_ok(now: i64, tokens_left: i64, asin: &str) -> RawResponse {
    let payload = json!({
        "products": [{
            "asin": asin,
            "title": format!("Item {asin}"),
            "brand": "Acme",
            "categories": [1055398],
            "rootCategory": 1055398,
            "salesRanks": {"1055398": [0, 120, 60, 95]},
            "stats": {"buyBoxPrice": 1999},
            "offers": [{"sellerId": "S1", "condition": 1, "isPrime": true,
                        "isAmazon": false, "isFBA": true, "stockCSV": [0, 4]}]
        }]
    });
    RawResponse::new(200, with_quota(payload, now, tokens_left))
}

pub fn finder_ok(now: i64, tokens_left: i64, asins: &[String]) -> RawResponse {
    let payload = json!({ "asinList": asins, "totalResults": asins.len() });
    RawResponse::new(200, with_quota(payload, now, tokens_left))
}

pub fn rate_limited(now: i64, tokens_left: i64, refill_in: i64) -> RawResponse {
    RawResponse::new(429, quota(now, tokens_left, refill_in).to_string())
}

pub fn status(now: i64, code: u16, tokens_left: i64) -> RawResponse {
    RawResponse::new(code, quota(now, tokens_left, 0).to_string())
}

pub fn asins(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i:03}")).collect()
}
