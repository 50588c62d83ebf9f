//! Per-host politeness delays
//!
//! Every host gets its own async mutex. `await_turn` holds that mutex while it
//! sleeps, so the wait decision and the recording of the new request time
//! happen atomically: two callers for one host are serialized, while callers
//! for different hosts never block each other. A wait ends early with
//! [`CrawlerError::Cancelled`] once the run's cancellation token fires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::state::HostRateState;
use crate::CrawlerError;

/// Enforces `max(rate_limit, crawl_delay)` between requests to the same host
#[derive(Debug)]
pub struct RateLimiter {
    base_delay: Duration,
    hosts: Mutex<HashMap<String, Arc<AsyncMutex<HostRateState>>>>,
    cancel: CancellationToken,
}

impl RateLimiter {
    /// Creates a limiter with the configured minimum spacing
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            hosts: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Makes pending waits end as soon as `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn host_state(&self, host: &str) -> Arc<AsyncMutex<HostRateState>> {
        let mut hosts = match self.hosts.lock() {
            Ok(hosts) => hosts,
            Err(poisoned) => poisoned.into_inner(),
        };
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(HostRateState::new(host, self.base_delay))))
            .clone()
    }

    /// Waits until a request to `host` is permitted, then records it
    ///
    /// # Returns
    ///
    /// How long the caller was made to wait, or `CrawlerError::Cancelled` if
    /// the run was stopped during the wait (no request is recorded then)
    pub async fn await_turn(&self, host: &str) -> Result<Duration, CrawlerError> {
        let state = self.host_state(host);
        let mut state = state.lock().await;

        let waited = match state.time_until_next_request(Instant::now()) {
            Some(wait) => {
                trace!("Waiting {:?} before next request to {}", wait, host);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.cancel.cancelled() => {
                        debug!("Wait for {} interrupted by cancellation", host);
                        return Err(CrawlerError::Cancelled);
                    }
                }
                wait
            }
            None => Duration::ZERO,
        };

        state.record_request(Instant::now());
        Ok(waited)
    }

    /// Applies a robots.txt crawl-delay; never lowers the configured spacing
    pub async fn set_crawl_delay(&self, host: &str, delay: Duration) {
        let state = self.host_state(host);
        state.lock().await.raise_min_delay(delay);
    }

    /// Delays the next request to `host` by at least `delay` (used after a 429)
    pub async fn penalize(&self, host: &str, delay: Duration) {
        let state = self.host_state(host);
        state.lock().await.penalize(delay, Instant::now());
    }
}
