//! HTTP fetch engine
//!
//! The attempt engine only sees the [`FetchEngine`] trait. The HTTP
//! implementation handles everything per request:
//! - user agent and timeouts on the shared client
//! - robots.txt permission and `Crawl-delay`
//! - per-host pacing with a jittered delay plus rate-limit backoff
//! - a response cache that incremental runs may read from

use crate::config::{Config, UserAgentConfig};
use crate::crawler::response_cache::ResponseCache;
use crate::crawler::result::CacheMode;
use crate::robots::{fetch_robots, origin_of, ParsedRobots, RobotsCache};
use crate::sources::RateProfile;
use crate::state::HostState;
use crate::url::parse_http_url;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Result of fetching one URL
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub url: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub document: Option<String>,
    pub error_message: Option<String>,
}

impl FetchOutcome {
    pub fn ok(url: impl Into<String>, status_code: u16, document: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: true,
            status_code: Some(status_code),
            document: Some(document.into()),
            error_message: None,
        }
    }

    pub fn failure(
        url: impl Into<String>,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            success: false,
            status_code,
            document: None,
            error_message: Some(error.into()),
        }
    }
}

/// Fetches batches of URLs
///
/// Implementations return at most one outcome per input URL, in any order.
/// `concurrency` caps in-flight requests and `profile` is the delay window in
/// force for this call.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    async fn fetch_many(
        &self,
        urls: &[String],
        concurrency: usize,
        profile: &RateProfile,
        mode: CacheMode,
    ) -> Vec<FetchOutcome>;

    async fn fetch(&self, url: &str, profile: &RateProfile, mode: CacheMode) -> FetchOutcome {
        self.fetch_many(&[url.to_string()], 1, profile, mode)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| FetchOutcome::failure(url, None, "no response"))
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent has the form `Name/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(48 * 3600);
const DEFAULT_RESPONSE_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// [`FetchEngine`] backed by reqwest
pub struct HttpFetchEngine {
    client: Client,
    robots_agent: String,
    respect_robots: bool,
    robots: tokio::sync::Mutex<RobotsCache>,
    hosts: Mutex<HashMap<String, HostState>>,
    responses: Mutex<ResponseCache>,
}

impl HttpFetchEngine {
    pub fn new(client: Client, robots_agent: impl Into<String>, respect_robots: bool) -> Self {
        Self {
            client,
            robots_agent: robots_agent.into(),
            respect_robots,
            robots: tokio::sync::Mutex::new(RobotsCache::new()),
            hosts: Mutex::new(HashMap::new()),
            responses: Mutex::new(ResponseCache::new(
                DEFAULT_RESPONSE_TTL,
                DEFAULT_RESPONSE_CACHE_BYTES,
            )),
        }
    }

    /// Replaces the response cache with one holding bodies for at most `ttl`
    /// and `max_bytes` in total
    pub fn with_response_cache(mut self, ttl: Duration, max_bytes: usize) -> Self {
        self.responses = Mutex::new(ResponseCache::new(ttl, max_bytes));
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.scheduler.request_timeout),
        )?;
        let ttl = Duration::try_from_secs_f64(config.scheduler.response_cache_hours * 3600.0)
            .unwrap_or(DEFAULT_RESPONSE_TTL);
        let max_bytes = config.scheduler.response_cache_mb.saturating_mul(1024 * 1024);
        let max_bytes = usize::try_from(max_bytes).unwrap_or(usize::MAX);
        Ok(Self::new(
            client,
            config.user_agent.crawler_name.clone(),
            config.scheduler.respect_robots,
        )
        .with_response_cache(ttl, max_bytes))
    }

    /// Number of responses held for incremental runs
    pub fn cached_responses(&self) -> usize {
        lock(&self.responses).len()
    }

    async fn robots_for(&self, url: &::url::Url) -> ParsedRobots {
        let origin = origin_of(url);
        let mut cache = self.robots.lock().await;
        if let Some(robots) = cache.get_fresh(&origin) {
            return robots.clone();
        }
        let robots = fetch_robots(&self.client, url).await;
        cache.insert(origin, robots.clone());
        robots
    }

    async fn fetch_one(&self, url: String, profile: &RateProfile, mode: CacheMode) -> FetchOutcome {
        let parsed = match parse_http_url(&url) {
            Ok(parsed) => parsed,
            Err(e) => return FetchOutcome::failure(url, None, e.to_string()),
        };

        if mode == CacheMode::Incremental {
            let cached = lock(&self.responses)
                .get(&url, Instant::now())
                .map(str::to_string);
            if let Some(body) = cached {
                trace!("Cache hit for {}", url);
                return FetchOutcome::ok(url, 200, body);
            }
        }

        let mut delay = profile.sample_delay();
        if self.respect_robots {
            let robots = self.robots_for(&parsed).await;
            if !robots.is_allowed(parsed.as_str(), &self.robots_agent) {
                debug!("Blocked by robots.txt: {}", url);
                return FetchOutcome::failure(url, None, "disallowed by robots.txt");
            }
            if let Some(crawl_delay) = robots.crawl_delay(&self.robots_agent) {
                if let Ok(crawl_delay) = Duration::try_from_secs_f64(crawl_delay) {
                    delay = delay.max(crawl_delay);
                }
            }
        }

        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        let wait = lock(&self.hosts)
            .entry(host.clone())
            .or_default()
            .reserve(delay, Instant::now());
        if !wait.is_zero() {
            trace!("Waiting {:?} before {}", wait, url);
            tokio::time::sleep(wait).await;
        }

        let response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection refused".to_string()
                } else {
                    e.to_string()
                };
                return FetchOutcome::failure(url, None, message);
            }
        };

        let status = response.status().as_u16();
        {
            let mut hosts = lock(&self.hosts);
            let state = hosts.entry(host.clone()).or_default();
            if profile.is_rate_limited(status) {
                state.record_rate_limited(profile);
                warn!(
                    "Rate limited by {} (HTTP {}), backing off {:?}",
                    host,
                    status,
                    state.backoff.unwrap_or_default()
                );
            } else {
                state.record_success();
            }
        }

        if !response.status().is_success() {
            return FetchOutcome::failure(url, Some(status), format!("HTTP {}", status));
        }

        match response.text().await {
            Ok(body) => {
                lock(&self.responses).insert(url.clone(), body.clone(), Instant::now());
                FetchOutcome::ok(url, status, body)
            }
            Err(e) => FetchOutcome::failure(url, Some(status), e.to_string()),
        }
    }
}

#[async_trait]
impl FetchEngine for HttpFetchEngine {
    async fn fetch_many(
        &self,
        urls: &[String],
        concurrency: usize,
        profile: &RateProfile,
        mode: CacheMode,
    ) -> Vec<FetchOutcome> {
        stream::iter(urls.iter().cloned())
            .map(|url| self.fetch_one(url, profile, mode))
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
