use crate::config::types::{
    Config, RateLimitConfig, SchedulerConfig, SelectorConfig, SourceConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Largest accepted `backoff-factor`
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scheduler_config(&config.scheduler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates scheduler configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.check_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "check_interval must be >= 1s, got {}s",
            config.check_interval
        )));
    }

    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if !(config.retry_base_delay >= 0.0) {
        return Err(ConfigError::Validation(format!(
            "retry_base_delay must be >= 0, got {}",
            config.retry_base_delay
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    if !(config.response_cache_hours >= 0.0 && config.response_cache_hours.is_finite()) {
        return Err(ConfigError::Validation(format!(
            "response-cache-hours must be a finite value >= 0, got {}",
            config.response_cache_hours
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates every source entry and rejects duplicate names
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for source in sources {
        if source.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        let sitemap = Url::parse(&source.sitemap).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid sitemap URL '{}': {}", source.sitemap, e))
        })?;

        if sitemap.scheme() != "https" && sitemap.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "Sitemap URL '{}' must use http or https",
                source.sitemap
            )));
        }

        if let Some(pattern) = &source.allowed_domain {
            validate_domain_pattern(pattern)?;
        }

        if source.concurrency < 1 || source.concurrency > 100 {
            return Err(ConfigError::Validation(format!(
                "concurrency for '{}' must be between 1 and 100, got {}",
                source.name, source.concurrency
            )));
        }

        if !(source.interval_hours > 0.0) {
            return Err(ConfigError::Validation(format!(
                "interval_hours for '{}' must be > 0, got {}",
                source.name, source.interval_hours
            )));
        }

        if source.max_urls < 1 {
            return Err(ConfigError::Validation(format!(
                "max_urls for '{}' must be >= 1",
                source.name
            )));
        }

        validate_rate_limit(&source.name, &source.rate_limit)?;
        validate_selectors(&source.selectors)?;
    }

    Ok(())
}

/// Validates the pacing window and backoff settings of a source
fn validate_rate_limit(name: &str, config: &RateLimitConfig) -> Result<(), ConfigError> {
    if !(config.min_delay >= 0.0) || !(config.max_delay >= config.min_delay) {
        return Err(ConfigError::Validation(format!(
            "rate-limit window for '{}' must satisfy 0 <= min-delay <= max-delay, got ({}, {})",
            name, config.min_delay, config.max_delay
        )));
    }

    if !(1.0..=MAX_BACKOFF_FACTOR).contains(&config.backoff_factor) {
        return Err(ConfigError::Validation(format!(
            "backoff-factor for '{}' must be between 1.0 and {}, got {}",
            name, MAX_BACKOFF_FACTOR, config.backoff_factor
        )));
    }

    if !(config.max_backoff >= config.max_delay) {
        return Err(ConfigError::Validation(format!(
            "max-backoff for '{}' must be >= max-delay",
            name
        )));
    }

    Ok(())
}

/// Every configured selector must parse
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    let mut fields: Vec<(&str, &str)> = vec![
        ("title", config.title.as_str()),
        ("description", config.description.as_str()),
        ("price", config.price.as_str()),
        ("brand", config.brand.as_str()),
        ("breadcrumb", config.breadcrumb.as_str()),
        ("image", config.image.as_str()),
        ("spec-row", config.spec_row.as_str()),
        ("merchant", config.merchant.as_str()),
    ];
    if let Some(original) = &config.original_price {
        fields.push(("original-price", original.as_str()));
    }
    for (field, selector) in &config.extra {
        fields.push((field.as_str(), selector.as_str()));
    }

    for (field, selector) in fields {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field: field.to_string(),
                selector: selector.to_string(),
            });
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
