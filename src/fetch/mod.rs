// src/fetch/mod.rs — Per-item fetch results and the detail source seam

pub mod operation;
pub mod pipeline;

use async_trait::async_trait;
use serde::Serialize;

use crate::catalog::{CatalogClient, ProductDetails};
use crate::infra::errors::{FailureReason, HarvestError};

pub use operation::{
    CategoryReport, DiscoveryRequest, HarvestSettings, Harvester, OperationReport,
};
pub use pipeline::FetchPipeline;

/// Where a successful item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Success(ProductDetails),
    Failure(FailureReason),
}

/// Soft problems that did not fail the item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchWarning {
    CacheReadFailed { message: String },
    CacheWriteFailed { message: String },
}

/// Terminal outcome for one item key in one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    pub item_key: String,
    pub outcome: FetchOutcome,
    pub source: Source,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<FetchWarning>,
}

impl FetchResult {
    pub fn success(item_key: impl Into<String>, details: ProductDetails, source: Source) -> Self {
        Self {
            item_key: item_key.into(),
            outcome: FetchOutcome::Success(details),
            source,
            warnings: Vec::new(),
        }
    }

    pub fn failure(item_key: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            item_key: item_key.into(),
            outcome: FetchOutcome::Failure(reason),
            source: Source::Upstream,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<FetchWarning>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success(_))
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        match &self.outcome {
            FetchOutcome::Success(details) => Some(details),
            FetchOutcome::Failure(_) => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.outcome {
            FetchOutcome::Failure(reason) => Some(reason),
            FetchOutcome::Success(_) => None,
        }
    }
}

/// Upstream detail fetch for one item key, already wrapped in retries.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, item_key: &str) -> Result<ProductDetails, HarvestError>;
}

#[async_trait]
impl DetailSource for CatalogClient {
    async fn fetch_detail(&self, item_key: &str) -> Result<ProductDetails, HarvestError> {
        self.product(item_key).await
    }
}
