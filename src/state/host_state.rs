use std::time::Duration;

use tokio::time::Instant;

/// Longest spacing or penalty a host can be given
pub const MAX_HOST_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Tracks request spacing for one host
///
/// This structure holds what the rate limiter needs to decide how long the
/// next request to the host must wait.
#[derive(Debug, Clone)]
pub struct HostRateState {
    pub host: String,

    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,

    /// Minimum spacing: configured rate limit, raised by robots.txt crawl-delay
    pub min_delay: Duration,

    /// Set after a 429; no request before this instant
    pub penalty_until: Option<Instant>,
}

impl HostRateState {
    pub fn new(host: &str, min_delay: Duration) -> Self {
        Self {
            host: host.to_string(),
            last_request_time: None,
            min_delay,
            penalty_until: None,
        }
    }

    /// Raises the minimum spacing to `delay` if it is longer than the current one
    pub fn raise_min_delay(&mut self, delay: Duration) {
        self.min_delay = self.min_delay.max(delay.min(MAX_HOST_DELAY));
    }

    /// Pushes the next permitted request at least `delay` past `now`
    ///
    /// `delay` is capped at [`MAX_HOST_DELAY`].
    pub fn penalize(&mut self, delay: Duration, now: Instant) {
        let Some(until) = now.checked_add(delay.min(MAX_HOST_DELAY)) else {
            return;
        };
        self.penalty_until = Some(match self.penalty_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let spacing_ready = self
            .last_request_time
            .and_then(|last| last.checked_add(self.min_delay));
        let ready_at = match (spacing_ready, self.penalty_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }?;

        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Records that a request was made to this host
    pub fn record_request(&mut self, now: Instant) {
        self.last_request_time = Some(now);
    }
}
