// src/fetch/operation.rs — Category fan-out: discover, fetch in waves, persist

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{FetchPipeline, FetchResult};
use crate::budget::{BatchPlanner, BudgetSnapshot, DETAIL_COST_PER_ITEM};
use crate::cache::CacheAside;
use crate::catalog::CatalogClient;
use crate::infra::config::Config;
use crate::infra::errors::{FailureReason, HarvestError};
use crate::store::{DocumentStore, PersistReport, Persister};

/// Knobs for one harvester instance.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub concurrency: usize,
    pub max_wave: usize,
    pub collection: String,
    pub queue_capacity: usize,
}

impl HarvestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.pipeline.concurrency,
            max_wave: config.pipeline.max_wave,
            collection: config.store.collection.clone(),
            queue_capacity: config.store.queue_capacity,
        }
    }
}

/// One inbound trigger: a discovery filter fanned out over categories.
#[derive(Debug, Clone)]
pub struct DiscoveryRequest {
    pub filter: Value,
    /// Empty means a single discovery with the filter as given.
    pub categories: Vec<String>,
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: Option<String>,
    pub page_size: usize,
    pub discovered: usize,
    pub waves: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_error: Option<FailureReason>,
    pub results: Vec<FetchResult>,
}

impl CategoryReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub run_id: String,
    pub categories: Vec<CategoryReport>,
    pub persistence: PersistReport,
    pub budget: BudgetSnapshot,
}

pub struct Harvester {
    catalog: CatalogClient,
    pipeline: FetchPipeline,
    store: Arc<dyn DocumentStore>,
    settings: HarvestSettings,
}

impl Harvester {
    pub fn new(
        catalog: CatalogClient,
        cache: CacheAside,
        store: Arc<dyn DocumentStore>,
        settings: HarvestSettings,
    ) -> Self {
        let pipeline = FetchPipeline::new(Arc::new(catalog.clone()), cache, settings.concurrency);
        Self {
            catalog,
            pipeline,
            store,
            settings,
        }
    }

    /// Detail fetch only, no discovery and no persistence.
    pub async fn fetch_items(&self, keys: &[String]) -> Vec<FetchResult> {
        self.pipeline.run(keys).await
    }

    /// Run discovery and detail fetch for every category, persisting each
    /// successful item. A category whose discovery fails is reported and the
    /// rest still run.
    pub async fn run(&self, request: &DiscoveryRequest) -> Result<OperationReport, HarvestError> {
        if !request.filter.is_object() {
            return Err(HarvestError::Config(
                "discovery filter must be a JSON object".into(),
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            categories = request.categories.len(),
            "Harvest started"
        );

        let mut persister = Persister::spawn(Arc::clone(&self.store), self.settings.queue_capacity);
        let mut categories = Vec::new();

        if request.categories.is_empty() {
            categories.push(
                self.harvest_category(&run_id, request, None, &mut persister)
                    .await,
            );
        }
        for category in &request.categories {
            categories.push(
                self.harvest_category(&run_id, request, Some(category.as_str()), &mut persister)
                    .await,
            );
        }

        let persistence = persister.finish().await;
        let budget = self.catalog.budget().snapshot().await;

        let items: usize = categories.iter().map(|c| c.results.len()).sum();
        info!(
            run_id = %run_id,
            items,
            persisted = persistence.written,
            persist_failures = persistence.failures.len(),
            tokens_left = budget.tokens_left,
            "Harvest finished"
        );

        Ok(OperationReport {
            run_id,
            categories,
            persistence,
            budget,
        })
    }

    async fn harvest_category(
        &self,
        run_id: &str,
        request: &DiscoveryRequest,
        category: Option<&str>,
        persister: &mut Persister,
    ) -> CategoryReport {
        let filter = category_filter(&request.filter, category);
        let planner = BatchPlanner::new(self.catalog.budget().snapshot().await);
        let page_size = planner.discovery_page(request.page_size);

        let mut report = CategoryReport {
            category: category.map(str::to_string),
            page_size,
            discovered: 0,
            waves: 0,
            discovery_error: None,
            results: Vec::new(),
        };

        let found = match self.catalog.find_products(&filter, page_size).await {
            Ok(found) => found,
            Err(e) => {
                error!(run_id, category, error = %e, "Discovery failed");
                report.discovery_error = Some(FailureReason::from(&e));
                return report;
            }
        };

        let mut seen = HashSet::new();
        let keys: Vec<String> = found.into_iter().filter(|k| seen.insert(k.clone())).collect();
        report.discovered = keys.len();

        let mut remaining = keys.as_slice();
        while !remaining.is_empty() {
            let snapshot = self.catalog.budget().snapshot().await;
            let wave = BatchPlanner::new(snapshot)
                .detail_batch(DETAIL_COST_PER_ITEM, self.settings.max_wave)
                .min(remaining.len());
            let (batch, rest) = remaining.split_at(wave);
            remaining = rest;
            report.waves += 1;

            info!(run_id, category, wave = report.waves, size = batch.len(), "Fetching wave");
            report.results.extend(self.pipeline.run(batch).await);
        }

        for result in &report.results {
            let Some(details) = result.details() else {
                continue;
            };
            let document = json!({
                "asin": result.item_key,
                "runId": run_id,
                "category": category,
                "source": result.source,
                "fetchedAt": Utc::now().to_rfc3339(),
                "details": details,
            });
            persister
                .submit(&self.settings.collection, &result.item_key, document)
                .await;
        }

        if report.failed() > 0 {
            warn!(
                run_id,
                category,
                failed = report.failed(),
                succeeded = report.succeeded(),
                "Category finished with failures"
            );
        }
        report
    }
}

/// Scope a discovery filter to one category, ranking by that category.
pub fn category_filter(filter: &Value, category: Option<&str>) -> Value {
    let mut scoped = filter.clone();
    if let (Some(category), Some(obj)) = (category, scoped.as_object_mut()) {
        obj.insert("rootCategory".into(), Value::from(category));
        obj.insert("salesRankReference".into(), Value::from(category));
    }
    scoped
}
