// src/infra/config.rs — Configuration loading (TOML + environment overrides)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::HarvestError;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Account key. Usually supplied through HARVESTER_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    pub domain: String,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub detail: DetailParams,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.keepa.com".into(),
            api_key: None,
            domain: "1".into(),
            timeout_seconds: 60,
            detail: DetailParams::default(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Query parameters sent with every product (detail) request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailParams {
    pub stats: u32,
    pub update: i32,
    pub history: u8,
    pub days: u32,
    pub code_limit: u32,
    pub offers: u32,
    pub only_live_offers: u8,
    pub rental: u8,
    pub videos: u8,
    pub aplus: u8,
    pub rating: u8,
    pub buybox: u8,
    pub stock: u8,
}

impl Default for DetailParams {
    fn default() -> Self {
        Self {
            stats: 90,
            update: -1,
            history: 1,
            days: 90,
            code_limit: 10,
            offers: 20,
            only_live_offers: 1,
            rental: 0,
            videos: 0,
            aplus: 0,
            rating: 0,
            buybox: 1,
            stock: 1,
        }
    }
}

impl DetailParams {
    pub fn to_query(&self) -> Vec<(String, String)> {
        vec![
            ("stats".into(), self.stats.to_string()),
            ("update".into(), self.update.to_string()),
            ("history".into(), self.history.to_string()),
            ("days".into(), self.days.to_string()),
            ("code-limit".into(), self.code_limit.to_string()),
            ("offers".into(), self.offers.to_string()),
            ("only-live-offers".into(), self.only_live_offers.to_string()),
            ("rental".into(), self.rental.to_string()),
            ("videos".into(), self.videos.to_string()),
            ("aplus".into(), self.aplus.to_string()),
            ("rating".into(), self.rating.to_string()),
            ("buybox".into(), self.buybox.to_string()),
            ("stock".into(), self.stock.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub capacity: i64,
    pub refill_rate_per_minute: f64,
    pub safety_threshold: i64,
    /// Local estimate at process start, before any server exchange.
    pub initial_tokens: i64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            capacity: 300,
            refill_rate_per_minute: 5.0,
            safety_threshold: 10,
            initial_tokens: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Base delay for transport/parse failures, scaled by 2^attempt.
    pub transient_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transient_backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub concurrency: usize,
    pub discovery_page_size: usize,
    /// Upper bound on items admitted per wave of detail fetches.
    pub max_wave: usize,
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            discovery_page_size: 50,
            max_wave: 100,
            categories: default_categories(),
        }
    }
}

fn default_categories() -> Vec<String> {
    [
        "1055398",
        "3760901",
        "3760911",
        "16310101",
        "165796011",
        "2619533011",
        "3375251",
        "228013",
        "1064954",
        "172282",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: Backend,
    pub ttl_hours: u64,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            ttl_hours: 24,
            key_prefix: "product:".into(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: Backend,
    pub collection: String,
    pub queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            collection: "products".into(),
            queue_capacity: 64,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults, then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|k| std::env::var(k).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|k| std::env::var(k).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply HARVESTER_* overrides. Unparseable numbers are ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("HARVESTER_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(domain) = get("HARVESTER_DOMAIN") {
            self.api.domain = domain;
        }
        if let Some(url) = get("HARVESTER_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(raw) = get("HARVESTER_MAX_RETRIES") {
            match raw.parse() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => tracing::warn!("Ignoring invalid HARVESTER_MAX_RETRIES={raw}"),
            }
        }
        if let Some(raw) = get("HARVESTER_CONCURRENCY") {
            match raw.parse() {
                Ok(n) => self.pipeline.concurrency = n,
                Err(_) => tracing::warn!("Ignoring invalid HARVESTER_CONCURRENCY={raw}"),
            }
        }
        if let Some(raw) = get("HARVESTER_CATEGORIES") {
            self.pipeline.categories = raw
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), HarvestError> {
        if self.budget.capacity <= 0 {
            return Err(HarvestError::Config("budget.capacity must be positive".into()));
        }
        if self.budget.refill_rate_per_minute <= 0.0 {
            return Err(HarvestError::Config(
                "budget.refill_rate_per_minute must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(HarvestError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.pipeline.concurrency == 0 {
            return Err(HarvestError::Config("pipeline.concurrency must be at least 1".into()));
        }
        if self.store.queue_capacity == 0 {
            return Err(HarvestError::Config("store.queue_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
