// src/upstream/envelope.rs — Quota metadata carried by every response

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Authoritative quota state reported by the upstream on every response,
/// successful or rate-limited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaEnvelope {
    /// Server time, Unix milliseconds.
    pub timestamp: i64,
    pub tokens_left: i64,
    /// Milliseconds until the next refill.
    #[serde(default)]
    pub refill_in: i64,
    /// Tokens per minute.
    #[serde(default)]
    pub refill_rate: i64,
    #[serde(default)]
    pub token_flow_reduction: f64,
    #[serde(default)]
    pub tokens_consumed: i64,
    #[serde(default)]
    pub processing_time_in_ms: i64,
}

/// Envelope plus a typed payload from the same JSON object.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "P: DeserializeOwned")]
pub struct ApiResponse<P> {
    #[serde(flatten)]
    pub quota: QuotaEnvelope,
    #[serde(flatten)]
    pub payload: P,
}
