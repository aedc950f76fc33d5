//! Source registry
//!
//! A source is one retailer: where its sitemap lives, which URLs are product
//! pages, how hard it may be hit, and how its pages turn into records. Sources
//! are immutable once loaded; the registry hands out shared handles to them.

mod profile;

pub use profile::RateProfile;

use crate::config::{Config, SourceConfig};
use crate::crawler::SelectorAdapter;
use crate::product::ProductRecord;
use crate::url::UrlFilter;
use crate::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Static description of a crawl source
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub sitemap_url: String,
    pub filter: UrlFilter,
    pub concurrency: usize,
    pub rate: RateProfile,
    pub max_urls: usize,
    pub interval: Duration,
    pub enabled: bool,
    pub currency: String,
}

impl Source {
    pub fn from_config(config: &SourceConfig) -> Self {
        let hours = Duration::try_from_secs_f64(config.interval_hours * 3600.0)
            .unwrap_or(Duration::from_secs(24 * 3600));

        Self {
            name: config.name.clone(),
            sitemap_url: config.sitemap.clone(),
            filter: UrlFilter::new(config.url_patterns.clone(), config.allowed_domain.clone()),
            concurrency: config.concurrency.max(1),
            rate: RateProfile::from_config(&config.rate_limit),
            max_urls: config.max_urls,
            interval: hours,
            enabled: config.enabled,
            currency: config.currency.clone(),
        }
    }

    /// Name used for the source's artifact directory
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }
}

/// Per-source page handling
pub trait SourceAdapter: Send + Sync {
    /// Returns true if `url` is a product page of this source
    fn accepts(&self, url: &str) -> bool;

    /// Extracts a product from a fetched page, or `None` on an extraction miss
    fn extract(&self, document: &str, url: &str) -> Option<ProductRecord>;
}

/// A source together with its adapter
#[derive(Clone)]
pub struct ResolvedSource {
    pub source: Arc<Source>,
    pub adapter: Arc<dyn SourceAdapter>,
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("source", &self.source.name)
            .finish_non_exhaustive()
    }
}

struct Entry {
    source: Arc<Source>,
    adapter: Option<Arc<dyn SourceAdapter>>,
}

/// Catalog of known sources, looked up case-insensitively by name
#[derive(Default)]
pub struct SourceRegistry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configuration, one selector adapter per source
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let mut registry = Self::new();
        for source_config in &config.sources {
            let source = Source::from_config(source_config);
            let adapter = SelectorAdapter::new(
                &source_config.selectors,
                source.filter.clone(),
                &source.name,
                &source.currency,
            )?;
            registry.register(source, Arc::new(adapter));
        }
        Ok(registry)
    }

    /// Adds a source with its adapter, replacing any source of the same name
    pub fn register(&mut self, source: Source, adapter: Arc<dyn SourceAdapter>) {
        self.insert(source, Some(adapter));
    }

    /// Adds a source that has no adapter yet
    pub fn register_source(&mut self, source: Source) {
        self.insert(source, None);
    }

    fn insert(&mut self, source: Source, adapter: Option<Arc<dyn SourceAdapter>>) {
        let key = source.name.to_lowercase();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(
            key,
            Entry {
                source: Arc::new(source),
                adapter,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<Source>> {
        self.entries
            .get(&name.to_lowercase())
            .map(|entry| Arc::clone(&entry.source))
    }

    /// Looks up a source and its adapter
    pub fn resolve(&self, name: &str) -> ConfigResult<ResolvedSource> {
        let entry = self
            .entries
            .get(&name.to_lowercase())
            .ok_or_else(|| ConfigError::UnknownSource(name.to_string()))?;
        let adapter = entry
            .adapter
            .as_ref()
            .ok_or_else(|| ConfigError::MissingExtractor(entry.source.name.clone()))?;

        Ok(ResolvedSource {
            source: Arc::clone(&entry.source),
            adapter: Arc::clone(adapter),
        })
    }

    /// Sources in registration order
    pub fn sources(&self) -> Vec<Arc<Source>> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .map(|entry| Arc::clone(&entry.source))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
