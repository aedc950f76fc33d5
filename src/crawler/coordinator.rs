//! Crawler coordinator - one complete run for one source
//!
//! A run resolves the source, discovers product URLs from its sitemap, hands
//! them to the attempt engine, and finally ingests the run's artifacts into
//! the product store.

use crate::config::Config;
use crate::crawler::engine::CrawlEngine;
use crate::crawler::fetcher::{FetchEngine, HttpFetchEngine};
use crate::crawler::result::{CacheMode, RunSummary};
use crate::crawler::scheduler::JobRunner;
use crate::crawler::sitemap::parse_sitemap;
use crate::crawler::RunArtifacts;
use crate::sources::{Source, SourceAdapter, SourceRegistry};
use crate::state::CrawlJob;
use crate::storage::{open_store, SharedStore};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Main crawler coordinator structure
pub struct Coordinator {
    registry: Arc<SourceRegistry>,
    store: SharedStore,
    fetcher: Arc<dyn FetchEngine>,
    engine: CrawlEngine,
    output_dir: PathBuf,
}

impl Coordinator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        store: SharedStore,
        fetcher: Arc<dyn FetchEngine>,
        output_dir: impl Into<PathBuf>,
        retry_base_delay: Duration,
    ) -> Self {
        Self {
            engine: CrawlEngine::new(Arc::clone(&fetcher), retry_base_delay),
            registry,
            store,
            fetcher,
            output_dir: output_dir.into(),
        }
    }

    /// Builds the registry, opens the store, and sets up the HTTP fetch engine
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = SourceRegistry::from_config(config)?;
        let store = open_store(Path::new(&config.scheduler.database_path))?;
        let fetcher = HttpFetchEngine::from_config(config)?;
        let retry_base_delay =
            Duration::try_from_secs_f64(config.scheduler.retry_base_delay).unwrap_or_default();

        Ok(Self::new(
            Arc::new(registry),
            Arc::new(Mutex::new(store)),
            Arc::new(fetcher),
            &config.scheduler.output_dir,
            retry_base_delay,
        ))
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs one complete crawl of `source_name`
    ///
    /// `max_urls` and `concurrency` override the source's own settings for this
    /// run only.
    pub async fn run_once(
        &self,
        source_name: &str,
        max_urls: Option<usize>,
        concurrency: Option<usize>,
    ) -> Result<RunSummary> {
        let resolved = self.registry.resolve(source_name)?;
        let mut source = Source::clone(&resolved.source);
        if let Some(max_urls) = max_urls {
            source.max_urls = max_urls;
        }
        if let Some(concurrency) = concurrency {
            source.concurrency = concurrency.max(1);
        }

        tracing::info!("Starting run for {}", source.name);

        let urls = self.discover_urls(&source, resolved.adapter.as_ref()).await?;
        let run = RunArtifacts::create(&self.output_dir, &source)?;
        let batch = self
            .engine
            .run_batch(&urls, &source, resolved.adapter.as_ref(), &run)
            .await;

        let records = match run.load_products(&source.name) {
            Ok(mut records) => {
                records.extend(batch.unwritten.iter().cloned());
                records
            }
            Err(e) => {
                tracing::error!(
                    "Failed to read artifacts of {}, ingesting in-memory records: {}",
                    source.name,
                    e
                );
                batch.records.clone()
            }
        };
        let total = records.len();
        let store = Arc::clone(&self.store);
        let ingest = tokio::task::spawn_blocking(move || {
            let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
            store.bulk_upsert(&records)
        })
        .await;

        let (stored, rejected) = match ingest {
            Ok(Ok(counts)) => counts,
            Ok(Err(e)) => {
                tracing::error!("Failed to store products for {}: {}", source.name, e);
                (0, total)
            }
            Err(e) => {
                tracing::error!("Store task for {} did not finish: {}", source.name, e);
                (0, total)
            }
        };

        let summary = batch.summary.with_database_counts(stored, rejected);
        if let Err(e) = run.write_summary(&summary) {
            tracing::error!("Failed to update run summary for {}: {}", source.name, e);
        }

        tracing::info!(
            "Run for {} finished: {} products, {} stored, {} rejected",
            source.name,
            summary.products_found,
            stored,
            rejected
        );

        Ok(summary)
    }

    /// Runs every enabled source once, in registry order
    pub async fn run_all(&self, max_urls: Option<usize>) -> Vec<(String, Result<RunSummary>)> {
        let mut results = Vec::new();
        for source in self.registry.sources() {
            if !source.enabled {
                tracing::debug!("Skipping disabled source {}", source.name);
                continue;
            }
            let result = self.run_once(&source.name, max_urls, None).await;
            if let Err(e) = &result {
                tracing::error!("Run for {} failed: {}", source.name, e);
            }
            results.push((source.name.clone(), result));
        }
        results
    }

    /// Collects candidate product URLs from the source's sitemap
    ///
    /// A sitemap index is followed one level deep; child sitemaps that fail
    /// are skipped. The result holds only URLs the adapter accepts, without
    /// duplicates, in sitemap order, and at most `max_urls` of them.
    pub async fn discover_urls(
        &self,
        source: &Source,
        adapter: &dyn SourceAdapter,
    ) -> Result<Vec<String>> {
        let root = self
            .fetcher
            .fetch(&source.sitemap_url, &source.rate, CacheMode::Fresh)
            .await;
        let Some(body) = root.document.filter(|_| root.success) else {
            return Err(HarvestError::Discovery {
                url: source.sitemap_url.clone(),
                message: root
                    .error_message
                    .unwrap_or_else(|| "empty response".to_string()),
            });
        };

        let sitemap = parse_sitemap(&body);
        if sitemap.is_index() {
            tracing::debug!(
                "{} is a sitemap index with {} children",
                source.sitemap_url,
                sitemap.children.len()
            );
        }
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        let mut accept = |candidates: Vec<String>, urls: &mut Vec<String>| {
            for url in candidates {
                if urls.len() >= source.max_urls {
                    break;
                }
                if adapter.accepts(&url) && seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        };

        accept(sitemap.urls, &mut urls);

        for child in &sitemap.children {
            if urls.len() >= source.max_urls {
                break;
            }
            let outcome = self
                .fetcher
                .fetch(child, &source.rate, CacheMode::Fresh)
                .await;
            match outcome.document.filter(|_| outcome.success) {
                Some(body) => accept(parse_sitemap(&body).urls, &mut urls),
                None => tracing::warn!(
                    "Skipping child sitemap {}: {}",
                    child,
                    outcome.error_message.as_deref().unwrap_or("empty response")
                ),
            }
        }

        tracing::info!(
            "Discovered {} product URLs for {} from {}",
            urls.len(),
            source.name,
            source.sitemap_url
        );
        Ok(urls)
    }
}

#[async_trait]
impl JobRunner for Coordinator {
    async fn run_job(&self, job: &CrawlJob) -> Result<RunSummary> {
        self.run_once(&job.source_name, Some(job.max_urls), job.concurrency)
            .await
    }
}
