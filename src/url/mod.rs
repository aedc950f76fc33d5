//! URL handling module for Shelf-Harvest
//!
//! This module provides host extraction, wildcard host matching, and the
//! per-source URL acceptance filter used to pick product pages out of a sitemap.

mod domain;
mod matcher;

use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::extract_domain;
pub use matcher::matches_wildcard;

/// Decides which discovered URLs belong to a source's product catalogue
///
/// A URL is accepted when it is http(s), its host matches the allowed-domain
/// pattern (if one is set), and its path contains any of the configured
/// patterns (or no patterns are configured).
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    patterns: Vec<String>,
    allowed_domain: Option<String>,
}

impl UrlFilter {
    pub fn new(patterns: Vec<String>, allowed_domain: Option<String>) -> Self {
        Self {
            patterns: patterns.into_iter().filter(|p| !p.is_empty()).collect(),
            allowed_domain: allowed_domain.map(|d| d.to_lowercase()),
        }
    }

    /// Accepts every http(s) URL
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn allowed_domain(&self) -> Option<&str> {
        self.allowed_domain.as_deref()
    }

    pub fn accepts(&self, url: &str) -> bool {
        match parse_http_url(url) {
            Ok(parsed) => self.accepts_parsed(&parsed),
            Err(_) => false,
        }
    }

    fn accepts_parsed(&self, url: &Url) -> bool {
        if let Some(pattern) = &self.allowed_domain {
            match extract_domain(url) {
                Some(host) if matches_wildcard(pattern, &host) => {}
                _ => return false,
            }
        }

        if self.patterns.is_empty() {
            return true;
        }

        let path = url.path();
        self.patterns.iter().any(|p| path.contains(p.as_str()))
    }
}

/// Parses a URL and requires an http or https scheme with a host
pub fn parse_http_url(input: &str) -> UrlResult<Url> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::InvalidScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
