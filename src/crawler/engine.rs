//! Attempt engine
//!
//! Runs a batch of URLs through the fetch engine and the source's extractor,
//! retrying whatever did not produce a record in up to `max_retries` further
//! rounds.

use crate::crawler::artifacts::RunArtifacts;
use crate::crawler::fetcher::{FetchEngine, FetchOutcome};
use crate::crawler::result::{CrawlBatchResult, RunSummary};
use crate::product::ProductRecord;
use crate::sources::{Source, SourceAdapter};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Why a URL has not produced a record (yet)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Miss {
    RateLimited,
    Failed,
    Extraction,
}

/// Result of [`CrawlEngine::run_batch`]
///
/// `unwritten` holds the records whose artifact could not be written; they
/// are also in `records`.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub result: CrawlBatchResult,
    pub summary: RunSummary,
    pub records: Vec<ProductRecord>,
    pub unwritten: Vec<ProductRecord>,
}

/// Drives fetch, extraction and retry rounds for one source
#[derive(Clone)]
pub struct CrawlEngine {
    fetcher: Arc<dyn FetchEngine>,
    retry_base_delay: Duration,
}

impl CrawlEngine {
    pub fn new(fetcher: Arc<dyn FetchEngine>, retry_base_delay: Duration) -> Self {
        Self {
            fetcher,
            retry_base_delay,
        }
    }

    /// Crawls `urls` for `source` and writes the run's artifacts
    ///
    /// Round `r` (1-based) waits `retry_base_delay * r` and then fetches with
    /// the delay window widened by `r + 1`. The source's own profile is never
    /// changed. The summary and the completion marker are written even when
    /// some URLs or artifact writes failed; write errors are logged and
    /// counted, never returned.
    pub async fn run_batch(
        &self,
        urls: &[String],
        source: &Source,
        adapter: &dyn SourceAdapter,
        run: &RunArtifacts,
    ) -> BatchOutcome {
        let start_time = Utc::now();
        let started = Instant::now();
        let mode = run.cache_mode();

        let mut seen = HashSet::new();
        let unique: Vec<String> = urls
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect();

        info!(
            "Crawling {} URLs for {} ({} mode, concurrency {})",
            unique.len(),
            source.name,
            mode,
            source.concurrency
        );

        let mut records = Vec::new();
        let mut unwritten = Vec::new();
        let mut misses: HashMap<String, Miss> = HashMap::new();
        let mut extraction_misses = 0;
        let mut total_attempts = 0;
        let mut pending = unique.clone();
        let mut window = source.rate.clone();
        let mut round: u32 = 0;

        while !pending.is_empty() {
            let outcomes = self
                .fetcher
                .fetch_many(&pending, source.concurrency, &window, mode)
                .await;
            total_attempts += pending.len();

            let wanted: HashSet<&str> = pending.iter().map(String::as_str).collect();
            let mut answered: HashSet<String> = HashSet::new();

            for outcome in outcomes {
                if !wanted.contains(outcome.url.as_str()) || !answered.insert(outcome.url.clone())
                {
                    debug!("Ignoring unexpected fetch result for {}", outcome.url);
                    continue;
                }

                match classify(&outcome, source) {
                    Ok(document) => match adapter.extract(document, &outcome.url) {
                        Some(mut record) => {
                            if record.url.is_empty() {
                                record.url = outcome.url.clone();
                            }
                            if record.source.is_empty() {
                                record.source = source.name.clone();
                            }
                            if let Err(e) = run.write_product(&record) {
                                error!("Failed to write artifact for {}: {}", outcome.url, e);
                                unwritten.push(record.clone());
                            }
                            misses.remove(&outcome.url);
                            records.push(record);
                        }
                        None => {
                            debug!("No product extracted from {}", outcome.url);
                            extraction_misses += 1;
                            misses.insert(outcome.url.clone(), Miss::Extraction);
                        }
                    },
                    Err(miss) => {
                        debug!(
                            "Fetch failed for {}: {}",
                            outcome.url,
                            outcome.error_message.as_deref().unwrap_or("unknown error")
                        );
                        misses.insert(outcome.url.clone(), miss);
                    }
                }
            }

            for url in &pending {
                if !answered.contains(url) {
                    misses.insert(url.clone(), Miss::Failed);
                }
            }

            pending.retain(|url| misses.contains_key(url));
            if pending.is_empty() || round >= source.rate.max_retries {
                break;
            }

            round += 1;
            let pause = self.retry_base_delay.saturating_mul(round);
            warn!(
                "{}: retrying {} URLs (round {}/{}) after {:?}",
                source.name,
                pending.len(),
                round,
                source.rate.max_retries,
                pause
            );
            tokio::time::sleep(pause).await;
            window = source.rate.widened(round + 1);
        }

        let rate_limited = misses.values().filter(|m| **m == Miss::RateLimited).count();
        let result = CrawlBatchResult {
            source: source.name.clone(),
            attempted: unique.len(),
            succeeded: records.len(),
            failed: misses.len(),
            rate_limited,
            extraction_misses,
            artifact_failures: unwritten.len(),
            total_attempts,
            retry_rounds: round,
            duration: started.elapsed(),
            run_dir: run.run_dir().to_path_buf(),
            cache_mode: mode,
        };

        let summary = RunSummary::from_batch(&result, start_time, Utc::now(), records.len());
        if let Err(e) = run.write_summary(&summary) {
            error!("Failed to write run summary for {}: {}", source.name, e);
        }
        if let Err(e) = run.write_completion_marker(&summary) {
            error!("Failed to write completion marker for {}: {}", source.name, e);
        }

        info!(
            "{}: {} of {} URLs produced products ({} failed, {} rate limited) in {}",
            source.name,
            result.succeeded,
            result.attempted,
            result.failed,
            result.rate_limited,
            summary.duration_formatted
        );

        BatchOutcome {
            result,
            summary,
            records,
            unwritten,
        }
    }
}

fn classify<'a>(outcome: &'a FetchOutcome, source: &Source) -> std::result::Result<&'a str, Miss> {
    match (&outcome.document, outcome.success) {
        (Some(document), true) => Ok(document.as_str()),
        _ => match outcome.status_code {
            Some(status) if source.rate.is_rate_limited(status) => Err(Miss::RateLimited),
            _ => Err(Miss::Failed),
        },
    }
}
