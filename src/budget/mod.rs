// src/budget/mod.rs — Upstream quota accounting

pub mod clock;
pub mod cost;
pub mod planner;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cost::{detail_cost, discovery_cost, RequestKind, DETAIL_COST_PER_ITEM};
pub use planner::{calculate_dynamic_batch_size, BatchPlanner};
pub use tracker::{BudgetHandle, BudgetSnapshot, TokenBudget};
