//! Storage traits and error types
//!
//! This module defines the trait interface for product store backends and
//! associated error types.

use crate::product::ProductRecord;
use crate::storage::{DatabaseStats, ProductFilter, UpsertOutcome};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for product store implementations
///
/// Every write keeps the product row and its full-text entry in step: both
/// change inside the same transaction or neither does.
pub trait ProductStore {
    // ===== Ingestion =====

    /// Inserts or updates one record, reporting whether it was new
    fn try_upsert(&mut self, record: &ProductRecord) -> StorageResult<UpsertOutcome>;

    /// Inserts or updates one record
    ///
    /// Failures are logged and reported as `false`.
    fn upsert(&mut self, record: &ProductRecord) -> bool {
        match self.try_upsert(record) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to upsert product {}: {}", record.url, e);
                false
            }
        }
    }

    /// Upserts a batch in one transaction
    ///
    /// A record that can't be written is rolled back on its own and counted as
    /// a failure. Returns `(succeeded, failed)`. An error means the batch as a
    /// whole could not be committed and nothing was written.
    fn bulk_upsert(&mut self, records: &[ProductRecord]) -> StorageResult<(usize, usize)>;

    // ===== Lookup =====

    /// Filtered, paginated lookup, newest first
    ///
    /// Returns the requested page and the total number of matches.
    fn find(
        &self,
        filter: &ProductFilter,
        limit: usize,
        offset: usize,
    ) -> StorageResult<(Vec<ProductRecord>, u64)>;

    fn get_by_id(&self, id: &str) -> StorageResult<Option<ProductRecord>>;

    fn stats(&self) -> StorageResult<DatabaseStats>;

    // ===== Maintenance =====

    /// Deletes every product of a source, returning how many were removed
    fn delete_by_source(&mut self, source: &str) -> StorageResult<usize>;

    /// Deletes one product, returning whether it existed
    fn delete_product(&mut self, id: &str) -> StorageResult<bool>;

    /// Writes a consistent copy of the store to `path`
    fn backup_to(&self, path: &Path) -> StorageResult<()>;
}
