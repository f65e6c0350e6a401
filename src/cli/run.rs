// src/cli/run.rs — Command handlers

use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use super::components::build_harvester;
use crate::fetch::DiscoveryRequest;
use crate::infra::config::Config;

/// `harvester run`: discovery per category, detail fetch, persistence.
pub async fn run_harvest(
    config: &Config,
    filter_path: Option<&Path>,
    categories: Vec<String>,
    page_size: Option<usize>,
) -> anyhow::Result<()> {
    let filter = match filter_path {
        Some(path) => load_filter(path)?,
        None => Value::Object(Default::default()),
    };
    let categories = if categories.is_empty() {
        config.pipeline.categories.clone()
    } else {
        categories
    };
    let request = DiscoveryRequest {
        filter,
        categories,
        page_size: page_size.unwrap_or(config.pipeline.discovery_page_size),
    };

    let harvester = build_harvester(config).await?;
    let report = harvester.run(&request).await?;
    print_json(&report)
}

/// `harvester product`: pipeline only, one result per distinct key.
pub async fn run_products(config: &Config, asins: &[String]) -> anyhow::Result<()> {
    let harvester = build_harvester(config).await?;
    let results = harvester.fetch_items(asins).await;
    print_json(&results)
}

/// `harvester config`: effective configuration as TOML, key redacted.
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.api.api_key.is_some() {
        shown.api.api_key = Some("********".into());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

pub fn load_filter(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read filter {}: {e}", path.display()))?;
    let filter: Value = serde_json::from_str(&content)?;
    if !filter.is_object() {
        anyhow::bail!("Filter {} must contain a JSON object", path.display());
    }
    Ok(filter)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_filter_requires_object() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("filter.json");
        std::fs::write(&good, r#"{"current_SALES_lte": 10000}"#).unwrap();
        assert_eq!(load_filter(&good).unwrap()["current_SALES_lte"], 10000);

        let bad = dir.path().join("list.json");
        std::fs::write(&bad, "[1, 2]").unwrap();
        assert!(load_filter(&bad).is_err());
        assert!(load_filter(&dir.path().join("missing.json")).is_err());
    }
}
