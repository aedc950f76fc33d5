//! Product records as produced by extraction and held in the store

mod price;

pub use price::{amount_from_value, parse_price_text, Price, DEFAULT_CURRENCY};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// A merchant offer listed on a product page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "price::flexible_amount")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

/// One harvested product listing
///
/// Fields the crate doesn't model are kept in `extra` and written back out
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Option<Price>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub brand: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, alias = "retailer", deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub specifications: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub merchants: Vec<Merchant>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProductRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Returns the record's natural identity, if it has one
    ///
    /// An explicit id wins; otherwise the last non-empty path segment of the URL.
    pub fn natural_id(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        last_path_segment(&self.url)
    }

    /// Returns the identity used as the store's primary key
    ///
    /// Falls back to a generated id when the record has no natural identity.
    pub fn resolve_id(&self) -> String {
        self.natural_id().unwrap_or_else(synthetic_id)
    }

    /// Current price amount, if known
    pub fn current_price(&self) -> Option<f64> {
        self.price.as_ref().and_then(|p| p.current)
    }

    /// Lowest price among merchant offers
    pub fn lowest_merchant_price(&self) -> Option<f64> {
        self.merchants
            .iter()
            .filter_map(|m| m.price)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Last non-empty path segment of a URL, ignoring query and fragment
pub fn last_path_segment(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.split('/').filter(|s| !s.is_empty()).last())
            .map(str::to_string),
    }
}

static SYNTHETIC_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generates a unique id for records that have none
pub fn synthetic_id() -> String {
    let seq = SYNTHETIC_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("gen-{}-{}", Utc::now().timestamp_millis(), seq)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_price<'de, D>(deserializer: D) -> Result<Option<Price>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Price::from_value(&value))
}
