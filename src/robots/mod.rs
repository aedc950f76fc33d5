//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::Client;
use tracing::debug;
use url::Url;

/// Origin key (`scheme://host[:port]`) used for caching robots.txt
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Fetches and parses robots.txt for the origin of `url`
///
/// A missing file, an error status, or a network failure all yield
/// `ParsedRobots::allow_all()`.
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let robots_url = match url.join("/robots.txt") {
        Ok(u) => u,
        Err(_) => return ParsedRobots::allow_all(),
    };

    match client.get(robots_url.as_str()).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(body) => ParsedRobots::from_content(&body),
            Err(e) => {
                debug!("Unreadable robots.txt at {}: {}", robots_url, e);
                ParsedRobots::allow_all()
            }
        },
        Ok(response) => {
            debug!(
                "No robots.txt at {} (HTTP {}), allowing all",
                robots_url,
                response.status()
            );
            ParsedRobots::allow_all()
        }
        Err(e) => {
            debug!("Failed to fetch {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
