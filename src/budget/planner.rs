// src/budget/planner.rs — Request shaping under quota pressure
//
// Shrinks request sizes as the budget drains so an operation degrades to
// slow, single-item progress instead of failing outright.

use tracing::debug;

use super::cost::{DISCOVERY_BASE_COST, DISCOVERY_ITEMS_PER_TOKEN};
use super::tracker::BudgetSnapshot;

/// `min((tokens_left - safety) / cost_per_item, requested_max)`, floored at 1.
pub fn calculate_dynamic_batch_size(
    tokens_left: i64,
    safety_threshold: i64,
    cost_per_item: i64,
    requested_max: usize,
) -> usize {
    let available = tokens_left - safety_threshold;
    if available <= 0 || cost_per_item <= 0 {
        return 1;
    }
    let affordable = (available / cost_per_item) as usize;
    affordable.min(requested_max).max(1)
}

#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    snapshot: BudgetSnapshot,
}

impl BatchPlanner {
    pub fn new(snapshot: BudgetSnapshot) -> Self {
        Self { snapshot }
    }

    /// Items to admit into the next wave of detail fetches.
    pub fn detail_batch(&self, cost_per_item: i64, requested_max: usize) -> usize {
        let size = calculate_dynamic_batch_size(
            self.snapshot.tokens_left,
            self.snapshot.safety_threshold,
            cost_per_item,
            requested_max,
        );
        debug!(
            size,
            available = self.snapshot.available(),
            "Planned detail batch"
        );
        size
    }

    /// Discovery page size whose cost fits the spendable budget. Discovery is
    /// charged `base + ceil(n / 100)`, so only the per-hundred part scales.
    pub fn discovery_page(&self, requested: usize) -> usize {
        let spendable = self.snapshot.available() - DISCOVERY_BASE_COST;
        let per_token = DISCOVERY_ITEMS_PER_TOKEN as usize;
        let size = if spendable <= 0 {
            1
        } else {
            let affordable = spendable as usize * per_token;
            requested.min(affordable).max(1)
        };
        debug!(size, requested, "Planned discovery page");
        size
    }
}
