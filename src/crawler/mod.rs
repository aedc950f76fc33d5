//! Crawler module for sitemap discovery, fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with robots.txt, pacing and backoff
//! - Sitemap parsing and selector-based product extraction
//! - The retrying attempt engine and its on-disk run artifacts
//! - Per-source run coordination and periodic job scheduling

mod artifacts;
mod coordinator;
mod engine;
mod extract;
mod fetcher;
mod response_cache;
mod result;
mod scheduler;
mod sitemap;

pub use artifacts::{read_completion_marker, CompletionMarker, RunArtifacts};
pub use coordinator::Coordinator;
pub use engine::{BatchOutcome, CrawlEngine};
pub use extract::SelectorAdapter;
pub use fetcher::{
    build_http_client, user_agent_string, FetchEngine, FetchOutcome, HttpFetchEngine,
};
pub use response_cache::ResponseCache;
pub use result::{format_duration, CacheMode, CrawlBatchResult, RunSummary};
pub use scheduler::{JobRunner, JobScheduler};
pub use sitemap::{parse_sitemap, SitemapDocument};
