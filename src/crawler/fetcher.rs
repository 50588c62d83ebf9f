//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for page content, including:
//! - Building HTTP clients with proper user agent strings
//! - Manual redirect handling confined to the crawl domain
//! - Waiting on the rate limiter before every request, redirect hops included
//! - Error classification into [`CrawlerError`] variants
//!
//! Retries are the coordinator's business; one call here is one attempt.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::config::UserAgentConfig;
use crate::crawler::RateLimiter;
use crate::url::{host_key, UrlNormalizer};
use crate::CrawlerError;

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Canonical URL after redirects; equal to the requested URL when none
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// Number of redirect hops followed
    pub redirects: u32,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled on the client; [`Fetcher`] follows them itself so
/// every hop can be checked against the crawl domain.
///
/// # Example
///
/// ```no_run
/// use rag_crawler::config::UserAgentConfig;
/// use rag_crawler::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "DocsBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Single-attempt page fetcher
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    normalizer: UrlNormalizer,
    max_redirects: u32,
}

impl Fetcher {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        normalizer: UrlNormalizer,
        max_redirects: u32,
    ) -> Self {
        Self {
            client,
            limiter,
            normalizer,
            max_redirects,
        }
    }

    /// Fetches `url`, following same-domain redirects
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Timeout, connection failure | `Network` (transient) |
    /// | HTTP 5xx | `HttpStatus` (transient) |
    /// | HTTP 429 | `RateLimited` with `Retry-After` if given |
    /// | Other non-2xx | `HttpStatus` |
    /// | More than `max_redirects` hops or a loop | `RedirectLimit` |
    /// | Redirect leaving the crawl | `RedirectOffDomain` |
    /// | Non-HTML content type | `Extraction` |
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, CrawlerError> {
        let mut current = url.clone();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(current.to_string());
        let mut redirects = 0u32;

        loop {
            let response = self.send(&current).await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| CrawlerError::HttpStatus {
                        url: current.to_string(),
                        status: status.as_u16(),
                    })?;

                redirects += 1;
                if redirects > self.max_redirects {
                    return Err(CrawlerError::RedirectLimit {
                        url: url.to_string(),
                    });
                }

                let next = self.normalizer.classify_redirect(&location, &current).map_err(|reason| {
                    debug!("Redirect {} -> {} rejected: {:?}", current, location, reason);
                    CrawlerError::RedirectOffDomain {
                        url: url.to_string(),
                        location: location.clone(),
                    }
                })?;

                if !seen.insert(next.clone()) {
                    debug!("Redirect loop at {}", next);
                    return Err(CrawlerError::RedirectLimit {
                        url: url.to_string(),
                    });
                }

                trace!("Redirect {} -> {}", current, next);
                current = Url::parse(&next)?;
                continue;
            }

            return self.read_page(current, response, redirects).await;
        }
    }

    async fn send(&self, url: &Url) -> Result<Response, CrawlerError> {
        if let Some(host) = host_key(url) {
            self.limiter.await_turn(&host).await?;
        }

        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, e))
    }

    async fn read_page(
        &self,
        url: Url,
        response: Response,
        redirects: u32,
    ) -> Result<FetchedPage, CrawlerError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlerError::RateLimited {
                url: url.to_string(),
                retry_after: retry_after(&response),
            });
        }

        if !status.is_success() {
            return Err(CrawlerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = &content_type {
            if !is_html(ct) {
                return Err(CrawlerError::Extraction {
                    url: url.to_string(),
                    message: format!("expected HTML, got {}", ct),
                });
            }
        }

        let body = response.text().await.map_err(|e| network_error(&url, e))?;

        Ok(FetchedPage {
            final_url: url,
            status: status.as_u16(),
            content_type,
            body,
            redirects,
        })
    }
}

fn network_error(url: &Url, e: reqwest::Error) -> CrawlerError {
    CrawlerError::Network {
        url: url.to_string(),
        message: e.to_string(),
        timeout: e.is_timeout(),
    }
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
