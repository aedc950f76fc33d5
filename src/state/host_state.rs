use crate::sources::RateProfile;
use std::time::{Duration, Instant};

/// Tracks pacing for one host during fetching
///
/// A host that answers with a rate-limit status gets an extra backoff delay
/// that grows by the profile's backoff factor on every further rate-limit
/// response, up to the profile's ceiling. A successful response halves it.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host
    pub request_count: u32,

    /// When the last request to this host was started
    pub last_request_time: Option<Instant>,

    /// Extra delay imposed after rate-limit responses
    pub backoff: Option<Duration>,

    /// Consecutive rate-limit responses
    pub rate_limit_streak: u32,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how long to wait before the next request may start
    ///
    /// `delay` is the sampled politeness delay; any active backoff is added to it.
    /// The last request time may lie in the future when a slot was reserved.
    pub fn time_until_next_request(&self, delay: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + delay + self.backoff.unwrap_or_default();
        let wait = ready_at.saturating_duration_since(now);
        (!wait.is_zero()).then_some(wait)
    }

    /// Reserves the next request slot and returns how long to wait for it
    pub fn reserve(&mut self, delay: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(delay, now).unwrap_or_default();
        self.record_request(now + wait);
        wait
    }

    /// Records that a request was started (or is scheduled to start) at `at`
    pub fn record_request(&mut self, at: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(at);
    }

    /// Escalates the backoff after a rate-limit response
    pub fn record_rate_limited(&mut self, profile: &RateProfile) {
        self.rate_limit_streak += 1;
        let next = match self.backoff {
            Some(current) => {
                Duration::try_from_secs_f64(current.as_secs_f64() * profile.backoff_factor)
                    .unwrap_or(profile.max_backoff)
            }
            None => profile.max_delay.max(Duration::from_millis(1)),
        };
        self.backoff = Some(next.min(profile.max_backoff));
    }

    /// Relaxes the backoff after a non-rate-limited response
    pub fn record_success(&mut self) {
        self.rate_limit_streak = 0;
        self.backoff = match self.backoff {
            Some(current) if current > Duration::from_millis(100) => Some(current / 2),
            _ => None,
        };
    }

    /// Returns true if the host is currently under backoff
    pub fn is_backing_off(&self) -> bool {
        self.backoff.is_some()
    }
}
