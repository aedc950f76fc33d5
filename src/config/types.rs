use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Shelf-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// Scheduler and persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-job checks
    #[serde(rename = "check-interval", default = "default_check_interval")]
    pub check_interval: u64,

    /// Root directory for run artifacts
    #[serde(rename = "output-dir")]
    pub output_dir: String,

    /// Path to the SQLite product store
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Base sleep before a retry round, multiplied by the round number (seconds)
    #[serde(rename = "retry-base-delay", default = "default_retry_base_delay")]
    pub retry_base_delay: f64,

    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// How long a fetched page may be served to incremental runs (hours)
    #[serde(rename = "response-cache-hours", default = "default_response_cache_hours")]
    pub response_cache_hours: f64,

    /// Upper bound on cached page bodies (MiB); 0 disables the cache
    #[serde(rename = "response-cache-mb", default = "default_response_cache_mb")]
    pub response_cache_mb: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// A retailer to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    /// Sitemap (or sitemap index) URL used to discover product pages
    pub sitemap: String,

    /// Path fragments a product URL must contain (any of)
    #[serde(rename = "url-patterns", default)]
    pub url_patterns: Vec<String>,

    /// Host pattern (e.g. "*.example.com") product URLs must match
    #[serde(rename = "allowed-domain", default)]
    pub allowed_domain: Option<String>,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(rename = "interval-hours", default = "default_interval_hours")]
    pub interval_hours: f64,

    #[serde(rename = "max-urls", default = "default_max_urls")]
    pub max_urls: usize,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Pacing and retry policy for a source
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Lower bound of the per-request delay window (seconds)
    #[serde(rename = "min-delay", default = "default_min_delay")]
    pub min_delay: f64,

    /// Upper bound of the per-request delay window (seconds)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: f64,

    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Ceiling for the per-host backoff delay (seconds)
    #[serde(rename = "max-backoff", default = "default_max_backoff")]
    pub max_backoff: f64,

    #[serde(rename = "rate-limit-codes", default = "default_rate_limit_codes")]
    pub rate_limit_codes: Vec<u16>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            max_backoff: default_max_backoff(),
            rate_limit_codes: default_rate_limit_codes(),
        }
    }
}

/// CSS selectors for the product page extractor
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_title_selector")]
    pub title: String,
    #[serde(default = "default_description_selector")]
    pub description: String,
    #[serde(default = "default_price_selector")]
    pub price: String,
    #[serde(rename = "original-price", default)]
    pub original_price: Option<String>,
    #[serde(default = "default_brand_selector")]
    pub brand: String,
    /// Breadcrumb links; the second-to-last one is the category
    #[serde(default = "default_breadcrumb_selector")]
    pub breadcrumb: String,
    #[serde(default = "default_image_selector")]
    pub image: String,
    /// Specification table rows, each with a `th` key and `td` value
    #[serde(rename = "spec-row", default = "default_spec_row_selector")]
    pub spec_row: String,
    #[serde(default = "default_merchant_selector")]
    pub merchant: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: default_title_selector(),
            description: default_description_selector(),
            price: default_price_selector(),
            original_price: None,
            brand: default_brand_selector(),
            breadcrumb: default_breadcrumb_selector(),
            image: default_image_selector(),
            spec_row: default_spec_row_selector(),
            merchant: default_merchant_selector(),
            extra: BTreeMap::new(),
        }
    }
}

fn default_check_interval() -> u64 {
    60
}

fn default_retry_base_delay() -> f64 {
    5.0
}

fn default_request_timeout() -> u64 {
    30
}

fn default_response_cache_hours() -> f64 {
    48.0
}

fn default_response_cache_mb() -> u64 {
    256
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    6
}

fn default_interval_hours() -> f64 {
    24.0
}

fn default_max_urls() -> usize {
    500
}

fn default_currency() -> String {
    "ZAR".to_string()
}

fn default_min_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    3.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_backoff() -> f64 {
    120.0
}

fn default_rate_limit_codes() -> Vec<u16> {
    vec![429, 503, 403, 520, 521, 522]
}

fn default_title_selector() -> String {
    "h1.product-name".to_string()
}

fn default_description_selector() -> String {
    ".description-content".to_string()
}

fn default_price_selector() -> String {
    ".product-price .amount".to_string()
}

fn default_brand_selector() -> String {
    ".brand-title a".to_string()
}

fn default_breadcrumb_selector() -> String {
    ".breadcrumb li a".to_string()
}

fn default_image_selector() -> String {
    ".thumb-container img".to_string()
}

fn default_spec_row_selector() -> String {
    ".specifications-table tr".to_string()
}

fn default_merchant_selector() -> String {
    ".merchant-offer".to_string()
}
