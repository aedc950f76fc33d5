//! Page bodies kept for incremental runs
//!
//! Entries expire after a fixed age, and the oldest entries are evicted once
//! the stored bodies exceed a byte budget.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CachedResponse {
    body: String,
    stored_at: Instant,
}

/// Bounded, age-limited cache of response bodies keyed by URL
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CachedResponse>,
    order: VecDeque<(String, Instant)>,
    ttl: Duration,
    max_bytes: usize,
    bytes: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_bytes,
            bytes: 0,
        }
    }

    /// Returns the body stored for `url` unless it has expired
    pub fn get(&self, url: &str, now: Instant) -> Option<&str> {
        self.entries
            .get(url)
            .filter(|cached| now.saturating_duration_since(cached.stored_at) <= self.ttl)
            .map(|cached| cached.body.as_str())
    }

    /// Stores `body` for `url`, then drops expired and over-budget entries
    ///
    /// A body larger than the whole budget is not stored.
    pub fn insert(&mut self, url: impl Into<String>, body: String, now: Instant) {
        let url = url.into();
        self.remove(&url);

        if body.len() <= self.max_bytes {
            self.bytes += body.len();
            self.order.push_back((url.clone(), now));
            self.entries.insert(
                url,
                CachedResponse {
                    body,
                    stored_at: now,
                },
            );
        }

        self.evict(now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of the stored bodies
    pub fn size_bytes(&self) -> usize {
        self.bytes
    }

    fn remove(&mut self, url: &str) {
        if let Some(old) = self.entries.remove(url) {
            self.bytes -= old.body.len();
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some((url, stored_at)) = self.order.front() {
            let expired = now.saturating_duration_since(*stored_at) > self.ttl;
            let current = self
                .entries
                .get(url)
                .is_some_and(|cached| cached.stored_at == *stored_at);

            // Queue entries left behind by a later insert of the same URL
            if !current {
                self.order.pop_front();
                continue;
            }
            if !expired && self.bytes <= self.max_bytes {
                break;
            }

            if let Some((url, _)) = self.order.pop_front() {
                self.remove(&url);
            }
        }
    }
}
