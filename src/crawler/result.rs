//! Batch and run summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Whether a run may reuse previously fetched responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// First run for the source; everything is fetched from the network
    Fresh,
    /// A previous run completed; the fetch engine may serve cached responses
    Incremental,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// Counts for one batch of URLs run through the attempt engine
///
/// `failed` and `rate_limited` describe the final state after the last round;
/// every URL in `rate_limited` is also counted in `failed`. Records whose
/// artifact could not be written still count as `succeeded` and are also
/// counted in `artifact_failures`.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlBatchResult {
    pub source: String,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rate_limited: usize,
    pub extraction_misses: usize,
    pub artifact_failures: usize,
    pub total_attempts: usize,
    pub retry_rounds: u32,
    pub duration: Duration,
    pub run_dir: PathBuf,
    pub cache_mode: CacheMode,
}

/// Persisted record of one run, written as `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub source: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub duration_formatted: String,
    pub cache_mode: CacheMode,
    pub urls_processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rate_limited: usize,
    pub extraction_misses: usize,
    #[serde(default)]
    pub artifact_failures: usize,
    pub total_attempts: usize,
    pub products_found: usize,
    pub retry_rounds: u32,
    pub run_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_success: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_failure: Option<usize>,
}

impl RunSummary {
    pub fn from_batch(
        result: &CrawlBatchResult,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        products_found: usize,
    ) -> Self {
        Self {
            source: result.source.clone(),
            start_time,
            end_time,
            duration_seconds: result.duration.as_secs_f64(),
            duration_formatted: format_duration(result.duration),
            cache_mode: result.cache_mode,
            urls_processed: result.attempted,
            succeeded: result.succeeded,
            failed: result.failed,
            rate_limited: result.rate_limited,
            extraction_misses: result.extraction_misses,
            artifact_failures: result.artifact_failures,
            total_attempts: result.total_attempts,
            products_found,
            retry_rounds: result.retry_rounds,
            run_dir: result.run_dir.clone(),
            database_success: None,
            database_failure: None,
        }
    }

    /// Attaches store ingestion counts
    pub fn with_database_counts(mut self, success: usize, failure: usize) -> Self {
        self.database_success = Some(success);
        self.database_failure = Some(failure);
        self
    }
}

/// Formats a duration as `H:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
