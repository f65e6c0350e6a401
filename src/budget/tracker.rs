// src/budget/tracker.rs — Token budget tracking against the upstream quota
//
// The local estimate refills linearly between exchanges and is overwritten by
// the server-reported value after every real response. A single async mutex
// serializes recompute/check/reserve so two callers cannot both spend the
// same tokens. Waiting for a refill never holds the mutex.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::clock::Clock;
use crate::infra::config::BudgetConfig;

/// Spendable request units, recomputed over wall-clock time.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    tokens_left: i64,
    capacity: i64,
    refill_rate_per_minute: f64,
    safety_threshold: i64,
    last_update_ms: i64,
}

/// Point-in-time copy of the budget, taken after a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub tokens_left: i64,
    pub capacity: i64,
    pub refill_rate_per_minute: f64,
    pub safety_threshold: i64,
    pub last_update_ms: i64,
}

impl BudgetSnapshot {
    /// Tokens spendable without dipping into the safety margin.
    pub fn available(&self) -> i64 {
        self.tokens_left - self.safety_threshold
    }
}

impl TokenBudget {
    pub fn new(config: &BudgetConfig, now_ms: i64) -> Self {
        Self {
            tokens_left: config.initial_tokens.clamp(0, config.capacity),
            capacity: config.capacity,
            refill_rate_per_minute: config.refill_rate_per_minute,
            safety_threshold: config.safety_threshold,
            last_update_ms: now_ms,
        }
    }

    pub fn with_tokens(mut self, tokens_left: i64) -> Self {
        self.tokens_left = tokens_left;
        self
    }

    pub fn tokens_left(&self) -> i64 {
        self.tokens_left
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn safety_threshold(&self) -> i64 {
        self.safety_threshold
    }

    pub fn last_update_ms(&self) -> i64 {
        self.last_update_ms
    }

    fn ms_per_token(&self) -> f64 {
        60_000.0 / self.refill_rate_per_minute
    }

    /// Credit tokens for the time elapsed since the last update and clamp to
    /// `[0, capacity]`. Returns the number of whole tokens credited.
    ///
    /// Only whole tokens are credited; the unconverted remainder of the
    /// elapsed time is carried into the next call so frequent recomputes do
    /// not starve the refill. A full bucket drops the remainder.
    pub fn recompute(&mut self, now_ms: i64) -> i64 {
        let elapsed_ms = now_ms - self.last_update_ms;
        if elapsed_ms <= 0 {
            self.tokens_left = self.tokens_left.clamp(0, self.capacity);
            return 0;
        }

        // elapsed seconds * (rate / 60), truncated
        let recovered = (elapsed_ms as f64 * self.refill_rate_per_minute / 60_000.0) as i64;
        self.tokens_left = (self.tokens_left + recovered).clamp(0, self.capacity);

        if self.tokens_left >= self.capacity {
            self.last_update_ms = now_ms;
        } else {
            // Advance by the credited time only, never to `now`, so the
            // sub-token remainder survives into the next recompute.
            let consumed_ms = (recovered as f64 * self.ms_per_token()).round() as i64;
            self.last_update_ms += consumed_ms.min(elapsed_ms);
        }

        if recovered > 0 {
            debug!(
                tokens_left = self.tokens_left,
                recovered, "Recomputed token budget"
            );
        }
        recovered
    }

    /// Adopt the server's view verbatim.
    pub fn reconcile(&mut self, server_tokens_left: i64, server_timestamp_ms: i64) {
        self.tokens_left = server_tokens_left;
        self.last_update_ms = server_timestamp_ms;
    }

    /// How long to wait before `required` tokens are available. A positive
    /// server refill hint takes precedence over the local estimate.
    pub fn wait_for(&self, required: i64, refill_hint_ms: i64) -> Duration {
        if self.tokens_left >= required {
            return Duration::ZERO;
        }
        if refill_hint_ms > 0 {
            return Duration::from_millis(refill_hint_ms as u64);
        }
        self.estimate_refill(required)
    }

    /// Local estimate of the time until `required` tokens are held, ignoring
    /// server hints. Zero when already satisfied.
    pub fn estimate_refill(&self, required: i64) -> Duration {
        let missing = (required - self.tokens_left).max(0);
        let seconds = missing as f64 * (60.0 / self.refill_rate_per_minute);
        Duration::from_secs_f64(seconds)
    }

    /// Deduct a local reservation; the next server exchange overrides it.
    pub fn reserve(&mut self, cost: i64) {
        self.tokens_left = (self.tokens_left - cost).max(0);
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            tokens_left: self.tokens_left,
            capacity: self.capacity,
            refill_rate_per_minute: self.refill_rate_per_minute,
            safety_threshold: self.safety_threshold,
            last_update_ms: self.last_update_ms,
        }
    }
}

/// Shared, cloneable handle to the process-wide budget.
#[derive(Clone)]
pub struct BudgetHandle {
    inner: Arc<Mutex<TokenBudget>>,
    clock: Arc<dyn Clock>,
}

impl BudgetHandle {
    pub fn new(budget: TokenBudget, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(budget)),
            clock,
        }
    }

    pub fn from_config(config: &BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        let budget = TokenBudget::new(config, clock.now_ms());
        Self::new(budget, clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn snapshot(&self) -> BudgetSnapshot {
        let mut budget = self.inner.lock().await;
        budget.recompute(self.clock.now_ms());
        budget.snapshot()
    }

    pub async fn reconcile(&self, server_tokens_left: i64, server_timestamp_ms: i64) {
        let mut budget = self.inner.lock().await;
        budget.reconcile(server_tokens_left, server_timestamp_ms);
        debug!(
            tokens_left = server_tokens_left,
            timestamp = server_timestamp_ms,
            "Budget reconciled from server"
        );
    }

    /// Block the caller until `required` tokens should be available, then
    /// recompute. Returns the time waited. The lock is released while sleeping.
    pub async fn await_availability(&self, required: i64, refill_hint_ms: i64) -> Duration {
        let wait = {
            let mut budget = self.inner.lock().await;
            budget.recompute(self.clock.now_ms());
            budget.wait_for(required, refill_hint_ms)
        };
        if wait.is_zero() {
            return wait;
        }

        self.sleep_for_refill(required, wait).await;
        self.inner.lock().await.recompute(self.clock.now_ms());
        wait
    }

    /// Gate an upstream call costing `cost`: wait until `cost + safety` tokens
    /// are estimated, then reserve `cost`. The check and the reservation
    /// happen under one lock; sleeps happen outside it, so siblings can
    /// reconcile meanwhile and the check is repeated after every sleep.
    pub async fn acquire(&self, cost: i64) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let (required, wait) = {
                let mut budget = self.inner.lock().await;
                budget.recompute(self.clock.now_ms());
                let required = cost + budget.safety_threshold();
                let wait = budget.wait_for(required, 0);
                if wait.is_zero() {
                    budget.reserve(cost);
                    return waited;
                }
                (required, wait)
            };

            self.sleep_for_refill(required, wait).await;
            waited += wait;
        }
    }

    /// Local time-to-refill estimate for `cost` plus the safety margin.
    pub async fn estimate_refill(&self, cost: i64) -> Duration {
        let mut budget = self.inner.lock().await;
        budget.recompute(self.clock.now_ms());
        let required = cost + budget.safety_threshold();
        budget.estimate_refill(required)
    }

    async fn sleep_for_refill(&self, required: i64, wait: Duration) {
        info!(
            required,
            wait_ms = wait.as_millis() as u64,
            "Tokens insufficient, waiting for refill"
        );
        self.clock.sleep(wait).await;
    }
}
