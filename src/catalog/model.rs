// src/catalog/model.rs — Catalog payloads and their simplified form
//
// Raw product records are large; only the fields downstream consumers read
// are decoded. History arrays are flat `[time, value, time, value, ...]`
// pairs with times in catalog minutes.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Offset between catalog minutes and Unix minutes.
const CATALOG_EPOCH_OFFSET_MINUTES: i64 = 21_564_000;

/// Payload of a discovery (finder) response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinderPayload {
    #[serde(default)]
    pub asin_list: Vec<String>,
    #[serde(default)]
    pub total_results: i64,
}

/// Payload of a product (detail) response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(default)]
    pub products: Vec<RawProduct>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<i64>>,
    #[serde(default)]
    pub root_category: i64,
    #[serde(default)]
    pub sales_ranks: Option<HashMap<String, Vec<i64>>>,
    #[serde(default)]
    pub stats: Option<RawStats>,
    #[serde(default)]
    pub offers: Option<Vec<RawOffer>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStats {
    #[serde(default)]
    pub buy_box_price: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOffer {
    #[serde(default)]
    pub seller_id: String,
    #[serde(default)]
    pub condition: i64,
    #[serde(default)]
    pub is_prime: bool,
    #[serde(default)]
    pub is_amazon: bool,
    #[serde(rename = "isFBA", default)]
    pub is_fba: bool,
    #[serde(rename = "stockCSV", default)]
    pub stock_csv: Option<Vec<i64>>,
}

/// What gets cached and persisted for one item key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub products: Vec<SimplifiedProduct>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedProduct {
    pub asin: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub categories: Vec<i64>,
    #[serde(default)]
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_box_price: Option<i64>,
    #[serde(default)]
    pub sales_ranks: BTreeMap<String, i64>,
    #[serde(default)]
    pub offers: Vec<SimplifiedOffer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedOffer {
    #[serde(rename = "sellerId")]
    pub seller_id: String,
    pub condition: i64,
    #[serde(rename = "isPrime")]
    pub is_prime: bool,
    #[serde(rename = "isAmazon")]
    pub is_amazon: bool,
    #[serde(rename = "isFBA")]
    pub is_fba: bool,
    #[serde(rename = "stockCSV", default, skip_serializing_if = "Option::is_none")]
    pub stock_csv: Option<BTreeMap<String, i64>>,
}

/// Render a catalog-minute timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn catalog_minutes_to_string(minutes: i64) -> Option<String> {
    let millis = minutes
        .checked_add(CATALOG_EPOCH_OFFSET_MINUTES)?
        .checked_mul(60_000)?;
    DateTime::from_timestamp_millis(millis).map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Turn a flat `[time, value, ...]` history into `time -> value`. Empty or
/// odd-length histories yield `None`.
pub fn history_to_map(history: &[i64]) -> Option<BTreeMap<String, i64>> {
    if history.is_empty() || history.len() % 2 != 0 {
        return None;
    }
    let map = history
        .chunks_exact(2)
        .filter_map(|pair| catalog_minutes_to_string(pair[0]).map(|t| (t, pair[1])))
        .collect();
    Some(map)
}

impl RawProduct {
    pub fn simplify(&self) -> SimplifiedProduct {
        let root = self.root_category.to_string();
        let sales_ranks = self
            .sales_ranks
            .as_ref()
            .and_then(|ranks| ranks.get(&root))
            .and_then(|history| history_to_map(history))
            .unwrap_or_default();

        let buy_box_price = self
            .stats
            .as_ref()
            .map(|s| s.buy_box_price)
            .filter(|p| *p != 0);

        let offers = self
            .offers
            .iter()
            .flatten()
            .map(|o| SimplifiedOffer {
                seller_id: o.seller_id.clone(),
                condition: o.condition,
                is_prime: o.is_prime,
                is_amazon: o.is_amazon,
                is_fba: o.is_fba,
                stock_csv: o.stock_csv.as_deref().and_then(history_to_map),
            })
            .collect();

        SimplifiedProduct {
            asin: self.asin.clone(),
            title: self.title.clone().unwrap_or_default(),
            categories: self.categories.clone().unwrap_or_default(),
            brand: self.brand.clone().unwrap_or_default(),
            buy_box_price,
            sales_ranks,
            offers,
        }
    }
}

impl From<ProductPayload> for ProductDetails {
    fn from(payload: ProductPayload) -> Self {
        Self {
            products: payload.products.iter().map(RawProduct::simplify).collect(),
        }
    }
}
