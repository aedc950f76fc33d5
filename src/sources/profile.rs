use crate::config::RateLimitConfig;
use std::time::Duration;

/// Pacing and retry policy applied to one source
#[derive(Debug, Clone, PartialEq)]
pub struct RateProfile {
    /// Lower bound of the per-request delay window
    pub min_delay: Duration,
    /// Upper bound of the per-request delay window
    pub max_delay: Duration,
    /// Maximum number of retry rounds in a batch
    pub max_retries: u32,
    /// Multiplier for per-host backoff after a rate-limit response
    pub backoff_factor: f64,
    /// Ceiling for per-host backoff
    pub max_backoff: Duration,
    /// Response statuses that mean "slow down"
    pub rate_limit_codes: Vec<u16>,
}

impl RateProfile {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            min_delay: secs(config.min_delay),
            max_delay: secs(config.max_delay),
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            max_backoff: secs(config.max_backoff),
            rate_limit_codes: config.rate_limit_codes.clone(),
        }
    }

    /// Returns true if `status` is one of the rate-limit codes
    pub fn is_rate_limited(&self, status: u16) -> bool {
        self.rate_limit_codes.contains(&status)
    }

    /// Returns a copy whose delay window is scaled by `factor`
    ///
    /// The receiver is left untouched, so the original window applies again
    /// as soon as the widened copy is dropped.
    pub fn widened(&self, factor: u32) -> Self {
        Self {
            min_delay: self.min_delay.saturating_mul(factor),
            max_delay: self.max_delay.saturating_mul(factor),
            max_backoff: self.max_backoff.max(self.max_delay.saturating_mul(factor)),
            ..self.clone()
        }
    }

    /// Picks a delay uniformly from the window
    pub fn sample_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let spread = (self.max_delay - self.min_delay).as_millis() as u64;
        self.min_delay + Duration::from_millis(fastrand::u64(0..=spread))
    }
}

impl Default for RateProfile {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
