//! Per-run robots.txt cache
//!
//! Each host's robots.txt is fetched once, on the first query for that host,
//! and kept for the rest of the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::robots::RobotsRuleset;
use crate::url::{host_key, robots_url};

/// Lazily populated map of host key to ruleset
#[derive(Debug)]
pub struct RobotsCache {
    client: Client,
    agent: String,
    entries: Mutex<HashMap<String, Arc<RobotsRuleset>>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - The crawl's HTTP client; its timeout applies to robots.txt too
    /// * `agent` - Product token matched against `User-agent` lines
    pub fn new(client: Client, agent: &str) -> Self {
        Self {
            client,
            agent: agent.to_string(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached ruleset for the host of `url` without fetching
    fn cached(&self, url: &Url) -> Option<Arc<RobotsRuleset>> {
        let host = host_key(url)?;
        let entries = self.entries.lock().ok()?;
        entries.get(&host).cloned()
    }

    /// Returns the ruleset for the host of `url`, fetching it on first use
    ///
    /// Never fails: anything other than a successful robots.txt response
    /// yields an allow-all ruleset.
    pub async fn ruleset(&self, url: &Url) -> Arc<RobotsRuleset> {
        let host = host_key(url).unwrap_or_default();
        if let Some(existing) = self.cached(url) {
            return existing;
        }

        let fetched = Arc::new(self.fetch(url, &host).await);

        match self.entries.lock() {
            Ok(mut entries) => entries.entry(host).or_insert(fetched).clone(),
            Err(_) => fetched,
        }
    }

    async fn fetch(&self, url: &Url, host: &str) -> RobotsRuleset {
        let Some(location) = robots_url(url) else {
            return RobotsRuleset::allow_all(host, &self.agent);
        };

        let response = match self.client.get(location.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("robots.txt fetch failed for {}: {} (allowing all)", host, e);
                return RobotsRuleset::allow_all(host, &self.agent);
            }
        };

        if !response.status().is_success() {
            debug!(
                "robots.txt for {} returned {} (allowing all)",
                host,
                response.status()
            );
            return RobotsRuleset::allow_all(host, &self.agent);
        }

        match response.text().await {
            Ok(body) => {
                let ruleset = RobotsRuleset::from_content(host, &self.agent, &body);
                debug!(
                    "robots.txt for {}: {} disallow rules, crawl delay {:?}",
                    host,
                    ruleset.disallow_patterns().len(),
                    ruleset.crawl_delay()
                );
                ruleset
            }
            Err(e) => {
                warn!("robots.txt body unreadable for {}: {} (allowing all)", host, e);
                RobotsRuleset::allow_all(host, &self.agent)
            }
        }
    }
}
