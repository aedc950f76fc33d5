//! Query surface over the product store
//!
//! Results are normalized into [`ProductView`]s and grouped by source.

use crate::product::{ProductRecord, DEFAULT_CURRENCY};
use crate::storage::{ProductFilter, ProductStore, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

const UNKNOWN_SOURCE: &str = "unknown";
const UNKNOWN_MERCHANT: &str = "Unknown";

/// Search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub filter: ProductFilter,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filter: ProductFilter::default(),
            limit: 100,
            offset: 0,
        }
    }
}

impl SearchQuery {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            filter: ProductFilter {
                query: Some(query.into()),
                ..ProductFilter::default()
            },
            ..Self::default()
        }
    }
}

/// A merchant offer with every field filled in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantView {
    pub name: String,
    pub price: Option<f64>,
    pub url: String,
}

/// Uniform shape of a product for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub url: String,
    pub image: String,
    pub images: Vec<String>,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub currency: String,
    pub description: String,
    pub brand: String,
    pub category: String,
    pub source: String,
    pub specifications: BTreeMap<String, String>,
    pub merchants: Vec<MerchantView>,
}

impl From<&ProductRecord> for ProductView {
    fn from(record: &ProductRecord) -> Self {
        let price = record.current_price();
        let merchants = record
            .merchants
            .iter()
            .map(|merchant| MerchantView {
                name: if merchant.name.is_empty() {
                    UNKNOWN_MERCHANT.to_string()
                } else {
                    merchant.name.clone()
                },
                price: merchant.price.or(price),
                url: merchant.url.clone(),
            })
            .collect();

        Self {
            id: record.resolve_id(),
            name: record.title.clone(),
            url: record.url.clone(),
            image: record.images.first().cloned().unwrap_or_default(),
            images: record.images.clone(),
            price,
            original_price: record.price.as_ref().and_then(|p| p.original),
            currency: record
                .price
                .as_ref()
                .map(|p| p.currency.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            description: record.description.clone(),
            brand: record.brand.clone(),
            category: record.category.clone(),
            source: if record.source.is_empty() {
                UNKNOWN_SOURCE.to_string()
            } else {
                record.source.clone()
            },
            specifications: record.specifications.clone(),
            merchants,
        }
    }
}

/// Search results grouped by source
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: Option<String>,
    pub results: BTreeMap<String, Vec<ProductView>>,
    pub total_products: u64,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: f64,
}

impl SearchResponse {
    /// Number of products on this page of results
    pub fn page_len(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }
}

/// Runs a search against the store
///
/// `total_products` counts every match, not just the returned page.
pub fn search(store: &dyn ProductStore, query: &SearchQuery) -> StorageResult<SearchResponse> {
    let started = Instant::now();
    let (records, total_products) = store.find(&query.filter, query.limit, query.offset)?;

    let mut results: BTreeMap<String, Vec<ProductView>> = BTreeMap::new();
    for record in &records {
        let view = ProductView::from(record);
        results.entry(view.source.clone()).or_default().push(view);
    }

    Ok(SearchResponse {
        query: query.filter.query.clone(),
        results,
        total_products,
        timestamp: Utc::now(),
        duration_ms: started.elapsed().as_secs_f64() * 1000.0,
    })
}

/// Looks up a single product by id
pub fn product_details(store: &dyn ProductStore, id: &str) -> StorageResult<Option<ProductView>> {
    Ok(store.get_by_id(id)?.as_ref().map(ProductView::from))
}
