// src/budget/cost.rs — Token cost of upstream calls

/// Flat charge for any discovery (finder) query.
pub const DISCOVERY_BASE_COST: i64 = 10;

/// Items per additional discovery token.
pub const DISCOVERY_ITEMS_PER_TOKEN: i64 = 100;

/// Worst case per product: assumes the upstream has to refresh it.
pub const DETAIL_COST_PER_ITEM: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Discovery { items_requested: usize },
    Detail { items_in_call: usize },
}

impl RequestKind {
    pub fn cost(&self) -> i64 {
        match *self {
            RequestKind::Discovery { items_requested } => discovery_cost(items_requested),
            RequestKind::Detail { items_in_call } => detail_cost(items_in_call),
        }
    }
}

/// `10 + ceil(n / 100)`
pub fn discovery_cost(items_requested: usize) -> i64 {
    let n = items_requested as i64;
    DISCOVERY_BASE_COST + (n + DISCOVERY_ITEMS_PER_TOKEN - 1) / DISCOVERY_ITEMS_PER_TOKEN
}

pub fn detail_cost(items_in_call: usize) -> i64 {
    items_in_call as i64 * DETAIL_COST_PER_ITEM
}
