// src/upstream/mod.rs — Upstream catalog API exchange

pub mod envelope;
pub mod http;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;

use crate::infra::errors::HarvestError;

pub use envelope::{ApiResponse, QuotaEnvelope};
pub use http::HttpTransport;
pub use retry::{RetryController, RetryPolicy};

/// A single request/response exchange with the catalog API.
///
/// Implementations return `Ok` for every HTTP status, including 429; only
/// connection, timeout and body-read failures are `Err(HarvestError::Transport)`.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, HarvestError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `product`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}
