// src/upstream/retry.rs — Budget-aware retry controller for upstream calls
//
// One logical call runs as a small state machine:
//
//   Attempting ──2xx──────────────▶ Done(Ok)
//       │ ──429, attempts left────▶ Backoff (server hint / local estimate + 2^n s)
//       │ ──429, no attempts──────▶ Done(QuotaExhausted)
//       │ ──transport/parse error─▶ Backoff (base * 2^n) or Done(RetryExhausted)
//       │ ──other status──────────▶ Done(Protocol)   (never retried)
//   Backoff ──sleep───────────────▶ Attempting
//
// Every parsed response, including 429s, reconciles the shared budget.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::envelope::{ApiResponse, QuotaEnvelope};
use super::{CatalogTransport, RawResponse, UpstreamRequest};
use crate::budget::BudgetHandle;
use crate::infra::config::RetryConfig;
use crate::infra::errors::HarvestError;

/// Longest body excerpt carried in a protocol error.
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,
    /// Base delay for transport/parse failures, scaled by 2^attempt.
    pub transient_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            transient_backoff: Duration::from_millis(config.transient_backoff_ms),
        }
    }
}

/// Bookkeeping for the attempt that just failed.
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    pub attempt_index: u32,
    pub max_attempts: u32,
    pub last_error: String,
    pub server_refill_hint_ms: i64,
}

impl RetryAttempt {
    fn has_remaining(&self) -> bool {
        self.attempt_index + 1 < self.max_attempts
    }
}

enum AttemptOutcome<P> {
    Success(ApiResponse<P>),
    RateLimited(QuotaEnvelope),
    Transient(HarvestError),
    Fatal(HarvestError),
}

enum RetryState<P> {
    Attempting { attempt_index: u32 },
    Backoff { attempt: RetryAttempt, delay: Duration },
    Done(Result<ApiResponse<P>, HarvestError>),
}

/// 2^n seconds.
fn exponential_term(attempt_index: u32) -> Duration {
    Duration::from_secs(1u64 << attempt_index.min(16))
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

fn classify<P: DeserializeOwned>(
    result: Result<RawResponse, HarvestError>,
) -> AttemptOutcome<P> {
    let raw = match result {
        Ok(raw) => raw,
        Err(e) if e.is_retriable() => return AttemptOutcome::Transient(e),
        Err(e) => return AttemptOutcome::Fatal(e),
    };

    if raw.is_rate_limited() {
        return match serde_json::from_str::<QuotaEnvelope>(&raw.body) {
            Ok(quota) => AttemptOutcome::RateLimited(quota),
            Err(e) => AttemptOutcome::Transient(HarvestError::Decode(format!("429 body: {e}"))),
        };
    }

    if !raw.is_success() {
        return AttemptOutcome::Fatal(HarvestError::Protocol {
            status: raw.status,
            message: excerpt(&raw.body),
        });
    }

    match serde_json::from_str::<ApiResponse<P>>(&raw.body) {
        Ok(parsed) => AttemptOutcome::Success(parsed),
        Err(e) => AttemptOutcome::Transient(HarvestError::Decode(e.to_string())),
    }
}

/// Wraps a transport with bounded retries, pacing every call through the
/// shared token budget.
#[derive(Clone)]
pub struct RetryController {
    transport: Arc<dyn CatalogTransport>,
    budget: BudgetHandle,
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(transport: Arc<dyn CatalogTransport>, budget: BudgetHandle) -> Self {
        Self::with_policy(transport, budget, RetryPolicy::default())
    }

    pub fn with_policy(
        transport: Arc<dyn CatalogTransport>,
        budget: BudgetHandle,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            budget,
            policy,
        }
    }

    pub fn budget(&self) -> &BudgetHandle {
        &self.budget
    }

    /// Execute one logical call costing `cost` tokens. Exactly one terminal
    /// outcome is produced; retries never exceed `max_attempts`.
    pub async fn execute<P: DeserializeOwned>(
        &self,
        request: &UpstreamRequest,
        cost: i64,
    ) -> Result<ApiResponse<P>, HarvestError> {
        self.budget.acquire(cost).await;

        let mut state = RetryState::Attempting { attempt_index: 0 };
        loop {
            state = match state {
                RetryState::Attempting { attempt_index } => {
                    info!(
                        path = %request.path,
                        attempt = attempt_index + 1,
                        max_attempts = self.policy.max_attempts,
                        "Sending upstream request"
                    );
                    let outcome = classify::<P>(self.transport.send(request).await);
                    self.transition(attempt_index, cost, outcome).await
                }
                RetryState::Backoff { attempt, delay } => {
                    warn!(
                        path = %request.path,
                        attempt = attempt.attempt_index + 1,
                        max_attempts = attempt.max_attempts,
                        refill_hint_ms = attempt.server_refill_hint_ms,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        attempt.last_error
                    );
                    self.budget.clock().sleep(delay).await;
                    RetryState::Attempting {
                        attempt_index: attempt.attempt_index + 1,
                    }
                }
                RetryState::Done(result) => return result,
            };
        }
    }

    async fn transition<P>(
        &self,
        attempt_index: u32,
        cost: i64,
        outcome: AttemptOutcome<P>,
    ) -> RetryState<P> {
        match outcome {
            AttemptOutcome::Success(response) => {
                self.budget
                    .reconcile(response.quota.tokens_left, response.quota.timestamp)
                    .await;
                info!(
                    consumed = response.quota.tokens_consumed,
                    tokens_left = response.quota.tokens_left,
                    refill_in_ms = response.quota.refill_in,
                    "Upstream call succeeded"
                );
                RetryState::Done(Ok(response))
            }
            AttemptOutcome::RateLimited(quota) => {
                self.budget.reconcile(quota.tokens_left, quota.timestamp).await;
                let attempt = RetryAttempt {
                    attempt_index,
                    max_attempts: self.policy.max_attempts,
                    last_error: format!("HTTP 429, {} tokens left", quota.tokens_left),
                    server_refill_hint_ms: quota.refill_in,
                };
                if !attempt.has_remaining() {
                    warn!(
                        attempts = attempt_index + 1,
                        refill_in_ms = quota.refill_in,
                        "Max retries reached after 429"
                    );
                    return RetryState::Done(Err(HarvestError::QuotaExhausted {
                        attempts: attempt_index + 1,
                        refill_in_ms: quota.refill_in,
                    }));
                }

                let hint = Duration::from_millis(quota.refill_in.max(0) as u64);
                let estimate = self.budget.estimate_refill(cost).await;
                let delay = hint.max(estimate) + exponential_term(attempt_index);
                RetryState::Backoff { attempt, delay }
            }
            AttemptOutcome::Transient(err) => {
                let attempt = RetryAttempt {
                    attempt_index,
                    max_attempts: self.policy.max_attempts,
                    last_error: err.to_string(),
                    server_refill_hint_ms: 0,
                };
                if !attempt.has_remaining() {
                    return RetryState::Done(Err(HarvestError::RetryExhausted {
                        attempts: attempt_index + 1,
                        last_error: attempt.last_error,
                    }));
                }
                let delay = self.policy.transient_backoff * (1u32 << attempt_index.min(16));
                RetryState::Backoff { attempt, delay }
            }
            AttemptOutcome::Fatal(err) => {
                warn!("Upstream call failed without retry: {err}");
                RetryState::Done(Err(err))
            }
        }
    }
}
