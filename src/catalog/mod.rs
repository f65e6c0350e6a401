// src/catalog/mod.rs — Catalog operations: discovery and detail fetch

pub mod model;

use serde_json::Value;
use tracing::info;

use crate::budget::{detail_cost, discovery_cost, BudgetHandle};
use crate::infra::config::DetailParams;
use crate::infra::errors::HarvestError;
use crate::upstream::{ApiResponse, RetryController, UpstreamRequest};

pub use model::{FinderPayload, ProductDetails, ProductPayload, SimplifiedProduct};

const FINDER_PATH: &str = "query";
const PRODUCT_PATH: &str = "product";

/// Typed catalog calls on top of the retry controller.
#[derive(Clone)]
pub struct CatalogClient {
    retry: RetryController,
    detail_params: DetailParams,
}

impl CatalogClient {
    pub fn new(retry: RetryController, detail_params: DetailParams) -> Self {
        Self {
            retry,
            detail_params,
        }
    }

    pub fn budget(&self) -> &BudgetHandle {
        self.retry.budget()
    }

    /// Discovery: item keys matching `filter`, at most `page_size` of them.
    pub async fn find_products(
        &self,
        filter: &Value,
        page_size: usize,
    ) -> Result<Vec<String>, HarvestError> {
        let mut selection = filter.clone();
        match selection.as_object_mut() {
            Some(obj) => {
                obj.insert("perPage".into(), Value::from(page_size));
            }
            None => {
                return Err(HarvestError::Config(
                    "discovery filter must be a JSON object".into(),
                ))
            }
        }

        let request = UpstreamRequest::post(FINDER_PATH, selection);
        let response: ApiResponse<FinderPayload> = self
            .retry
            .execute(&request, discovery_cost(page_size))
            .await?;

        info!(
            consumed = response.quota.tokens_consumed,
            tokens_left = response.quota.tokens_left,
            refill_in_ms = response.quota.refill_in,
            found = response.payload.asin_list.len(),
            total = response.payload.total_results,
            "Discovery complete"
        );
        Ok(response.payload.asin_list)
    }

    /// Detail fetch for a single item key.
    pub async fn product(&self, asin: &str) -> Result<ProductDetails, HarvestError> {
        let request = UpstreamRequest::get(PRODUCT_PATH)
            .with_query("asin", asin)
            .with_query_pairs(self.detail_params.to_query());

        let response: ApiResponse<ProductPayload> =
            self.retry.execute(&request, detail_cost(1)).await?;

        info!(
            asin,
            consumed = response.quota.tokens_consumed,
            tokens_left = response.quota.tokens_left,
            refill_in_ms = response.quota.refill_in,
            "Product request complete"
        );
        Ok(ProductDetails::from(response.payload))
    }
}
