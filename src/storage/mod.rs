//! Storage module for persisting harvested products
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Upsert-by-identity with a full-text index kept in step
//! - Filtered, paginated lookup and aggregate statistics
//! - Maintenance (per-source purge, single deletes, backups)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{fts_query, SqliteProductStore};
pub use traits::{ProductStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Store handle shared between the scheduler's worker and the CLI
pub type SharedStore = Arc<Mutex<dyn ProductStore + Send>>;

/// Opens or creates the product store at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteProductStore> {
    SqliteProductStore::new(path)
}

/// Result of writing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Identity the record was stored under
    pub id: String,
    /// False when an existing row was updated
    pub inserted: bool,
}

/// Lookup predicate for `ProductStore::find`
///
/// All set fields must hold. `query` is matched against title, description,
/// brand, and category through the full-text index; every word must occur.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

/// Aggregate view of the store
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_products: u64,
    pub by_source: Vec<(String, u64)>,
    pub top_categories: Vec<(String, u64)>,
    pub top_brands: Vec<(String, u64)>,
    pub size_bytes: u64,
    pub last_updated: Option<DateTime<Utc>>,
}
