//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Loading or discarding the checkpoint and deciding between resume and a new pass
//! - Gating every target on robots.txt and the per-host rate limiter
//! - Fetching with retries, extracting, converting and fingerprinting
//! - Saving only changed pages and queueing discovered links
//! - Checkpointing and honoring cancellation between targets

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Config;
use crate::content::{to_markdown, ContentExtractor};
use crate::crawler::fetcher::{build_http_client, FetchedPage, Fetcher};
use crate::crawler::parser::discover_links;
use crate::crawler::RateLimiter;
use crate::output::CrawlStats;
use crate::robots::RobotsCache;
use crate::state::{fingerprint, has_changed, CrawlState, CrawlTarget, TargetState};
use crate::storage::{ContentStore, JsonStateStore, MarkdownStore, PageRecord, StateStore};
use crate::url::{canonicalize, host_key, UrlNormalizer};
use crate::{CrawlerError, Result};

/// Main crawler coordinator structure
///
/// Owns the single [`CrawlState`] of the session; everything that mutates it
/// goes through `&mut self`.
pub struct Coordinator {
    config: Arc<Config>,
    seed: CrawlTarget,
    normalizer: UrlNormalizer,
    fetcher: Fetcher,
    robots: RobotsCache,
    limiter: Arc<RateLimiter>,
    extractor: ContentExtractor,
    state_store: JsonStateStore,
    content_store: MarkdownStore,
    state: CrawlState,
    stats: CrawlStats,
    cancel: CancellationToken,
    /// 429 requeues per target in this run
    requeues: HashMap<String, u32>,
    since_checkpoint: u32,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fresh` - Discard any existing checkpoint before loading
    /// * `cancel` - Stops the run between targets when triggered
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run; the frontier is resumed or seeded
    /// * `Err(CrawlerError::StateCorruption)` - The checkpoint could not be trusted
    pub fn new(config: Config, fresh: bool, cancel: CancellationToken) -> Result<Self> {
        let seed_url = canonicalize(&Url::parse(&config.crawler.seed_url)?)?;
        let seed = CrawlTarget::seed(seed_url.as_str());
        let normalizer = UrlNormalizer::from_config(&config.crawler)?;

        let client = build_http_client(
            &config.user_agent,
            config.crawler.request_timeout_duration(),
        )?;
        let limiter = Arc::new(
            RateLimiter::new(config.crawler.rate_limit_duration())
                .with_cancellation(cancel.clone()),
        );
        let fetcher = Fetcher::new(
            client.clone(),
            Arc::clone(&limiter),
            normalizer.clone(),
            config.crawler.max_redirects,
        );
        let robots = RobotsCache::new(client, &config.user_agent.crawler_name);

        let state_store = JsonStateStore::new(&config.output.state_path);
        if fresh {
            tracing::info!(
                "Discarding checkpoint at {}",
                state_store.path().display()
            );
            state_store.discard()?;
        }

        let mut state = state_store.load()?;
        if state.frontier.is_empty() {
            if state.is_drained() {
                tracing::info!(
                    "Previous pass finished ({} pages visited), starting a new pass from {}",
                    state.visited.len(),
                    seed.url
                );
            } else {
                tracing::info!("No pending work, seeding frontier with {}", seed.url);
            }
            state.begin_pass(seed.clone());
        } else {
            tracing::info!(
                "Resuming crawl: {} queued, {} visited, {} fingerprints",
                state.frontier.len(),
                state.visited.len(),
                state.fingerprints.len()
            );
        }

        Ok(Self {
            extractor: ContentExtractor::for_mode(config.crawler.extraction),
            content_store: MarkdownStore::new(&config.output.content_dir),
            config: Arc::new(config),
            seed,
            normalizer,
            fetcher,
            robots,
            limiter,
            state_store,
            state,
            stats: CrawlStats::default(),
            cancel,
            requeues: HashMap::new(),
            since_checkpoint: 0,
        })
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Runs the main crawl loop
    ///
    /// Processes targets in FIFO order until the frontier drains, `max-pages`
    /// targets were processed, or the cancellation token fires. The state is
    /// checkpointed every `checkpoint-interval` targets and once more at the end.
    pub async fn run(&mut self) -> Result<CrawlStats> {
        tracing::info!(
            "Starting crawl of {} (max depth {}, extraction: {})",
            self.seed.url,
            self.config.crawler.max_depth,
            self.extractor.strategy_name()
        );

        let start_time = Instant::now();
        let max_pages = self.config.crawler.max_pages;
        let mut processed: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Stop requested, checkpointing and exiting");
                break;
            }

            if max_pages > 0 && processed >= max_pages {
                tracing::info!(
                    "Reached max-pages ({}), {} targets left for the next run",
                    max_pages,
                    self.state.frontier.len()
                );
                break;
            }

            if !self.process_next().await? {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            }
            processed += 1;
            self.since_checkpoint += 1;

            if self.since_checkpoint >= self.config.crawler.checkpoint_interval {
                self.checkpoint()?;
            }

            // Progress reporting every 10 targets
            if processed % 10 == 0 {
                let elapsed = start_time.elapsed();
                let rate = processed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
                tracing::info!(
                    "Progress: {} targets processed ({} saved, {} unchanged, {} errors), {} in frontier, {:.2} targets/sec",
                    processed,
                    self.stats.pages_saved,
                    self.stats.pages_skipped_unchanged,
                    self.stats.errors,
                    self.state.frontier.len(),
                    rate
                );
            }
        }

        self.checkpoint()?;
        self.stats.duration = start_time.elapsed();

        tracing::info!(
            "Crawl finished: {} crawled, {} saved, {} unchanged, {} errors in {:?}",
            self.stats.pages_crawled,
            self.stats.pages_saved,
            self.stats.pages_skipped_unchanged,
            self.stats.errors,
            self.stats.duration
        );

        Ok(self.stats.clone())
    }

    /// Processes the next eligible target from the frontier
    ///
    /// Already visited and too-deep entries are dropped on the way. Returns
    /// `false` once the frontier is empty. Does not checkpoint.
    pub async fn process_next(&mut self) -> Result<bool> {
        while let Some(target) = self.state.pop() {
            if self.state.is_visited(&target.url) {
                tracing::trace!("Already visited: {}", target.url);
                continue;
            }

            if target.depth > self.config.crawler.max_depth {
                tracing::debug!("Depth {} exceeds limit: {}", target.depth, target.url);
                continue;
            }

            self.process_target(target).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Takes one target through its lifecycle
    ///
    /// Per-target failures are counted and logged, never returned; an `Err`
    /// here means the run itself cannot continue.
    async fn process_target(&mut self, target: CrawlTarget) -> Result<()> {
        tracing::debug!("Processing {} (depth {})", target.url, target.depth);
        let status = TargetState::Queued;

        let url = match Url::parse(&target.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Unparseable frontier URL {}: {}", target.url, e);
                self.stats.errors += 1;
                self.state.mark_visited(&target.url);
                return Ok(());
            }
        };

        if self.config.crawler.respect_robots && !self.robots_allow(&url).await {
            tracing::info!("Disallowed by robots.txt: {}", target.url);
            self.stats.pages_disallowed += 1;
            self.state.mark_visited(&target.url);
            return Ok(());
        }

        let status = status.transition(TargetState::Fetching)?;
        let page = match self.fetch_with_retries(&url).await {
            Ok(page) => page,
            Err(CrawlerError::RateLimited { retry_after, .. }) => {
                return self.handle_rate_limited(target, status, &url, retry_after).await;
            }
            Err(e)
                if matches!(e, CrawlerError::Cancelled)
                    || (e.is_transient() && self.cancel.is_cancelled()) =>
            {
                tracing::info!("Stop requested while retrying {}, requeueing", target.url);
                status.transition(TargetState::Queued)?;
                self.state.requeue(target);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", target.url, e);
                return self.fail(&target, status);
            }
        };
        self.stats.pages_crawled += 1;

        let final_url = page.final_url.to_string();
        if final_url != target.url {
            if self.state.is_visited(&final_url) {
                tracing::debug!(
                    "{} redirected to already visited {}",
                    target.url,
                    final_url
                );
                self.state.mark_visited(&target.url);
                return Ok(());
            }
            self.state.mark_visited(&final_url);
        }

        let extracted = match self.extractor.extract(&page.body, &page.final_url) {
            Ok(extracted) => extracted,
            Err(e) => {
                tracing::warn!("{}", e);
                return self.fail(&target, status);
            }
        };
        let status = status.transition(TargetState::Extracted)?;

        let body = to_markdown(&extracted.main_html, &page.final_url);
        let hash = fingerprint(&body);
        let status = status.transition(TargetState::Converted)?;

        let status = if has_changed(&final_url, &hash, &self.state)
            || !self.record_intact(&final_url, &hash)
        {
            let record = PageRecord::new(
                &final_url,
                &extracted.title,
                &hash,
                extracted.word_count,
                extracted.headings.clone(),
                body,
            );
            match self.content_store.save(&record) {
                Ok(path) => {
                    self.state.record_fingerprint(&final_url, &hash);
                    self.stats.pages_saved += 1;
                    self.stats.total_words += extracted.word_count as u64;
                    tracing::info!(
                        "Saved {} -> {} ({} words)",
                        final_url,
                        path.display(),
                        extracted.word_count
                    );
                    status.transition(TargetState::Saved)?
                }
                Err(e) => {
                    tracing::error!("Failed to save {}: {}", final_url, e);
                    self.stats.errors += 1;
                    status.transition(TargetState::Failed)?
                }
            }
        } else {
            tracing::debug!("Unchanged: {}", final_url);
            self.stats.pages_skipped_unchanged += 1;
            status.transition(TargetState::SkippedUnchanged)?
        };

        if target.depth < self.config.crawler.max_depth {
            self.queue_links(&target, &extracted.main_html, &page);
        }

        self.state.mark_visited(&target.url);
        tracing::trace!("{} finished as {}", target.url, status);
        Ok(())
    }

    /// Looks up robots.txt for the target's host and applies its crawl-delay
    async fn robots_allow(&self, url: &Url) -> bool {
        let rules = self.robots.ruleset(url).await;
        if let (Some(delay), Some(host)) = (rules.crawl_delay(), host_key(url)) {
            self.limiter
                .set_crawl_delay(&host, self.server_delay(delay, "Crawl-delay"))
                .await;
        }
        rules.is_allowed(url.as_str())
    }

    /// Fetches with exponential backoff for transient failures
    async fn fetch_with_retries(&self, url: &Url) -> Result<FetchedPage> {
        let max_retries = self.config.crawler.max_retries;
        let mut attempt = 0;

        loop {
            match self.fetcher.fetch(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    attempt += 1;
                    let delay = self.config.crawler.retry_delay(attempt);
                    tracing::warn!(
                        "{} (retry {}/{} in {:?})",
                        e,
                        attempt,
                        max_retries,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a 429'd target to the back of the frontier and slows its host
    async fn handle_rate_limited(
        &mut self,
        target: CrawlTarget,
        status: TargetState,
        url: &Url,
        retry_after: Option<Duration>,
    ) -> Result<()> {
        let count = self.requeues.entry(target.url.clone()).or_insert(0);
        *count += 1;
        let count = *count;

        if count > self.config.crawler.max_rate_limit_requeues {
            tracing::warn!(
                "Giving up on {} after {} rate-limited attempts",
                target.url,
                count
            );
            return self.fail(&target, status);
        }

        let delay = match retry_after {
            Some(delay) => self.server_delay(delay, "Retry-After"),
            None => self.config.crawler.rate_limit_backoff_duration(),
        };
        if let Some(host) = host_key(url) {
            self.limiter.penalize(&host, delay).await;
        }

        status.transition(TargetState::Queued)?;
        tracing::info!(
            "Rate limited on {}, requeued (host paused for {:?})",
            target.url,
            delay
        );
        self.state.requeue(target);
        self.stats.pages_requeued += 1;
        Ok(())
    }

    /// Whether the saved record for an unchanged page is still on disk and
    /// still describes this page
    fn record_intact(&self, url: &str, hash: &str) -> bool {
        match self.content_store.load(url) {
            Ok(Some(record)) if record.source_url == url && record.content_hash == hash => true,
            Ok(Some(record)) => {
                tracing::warn!(
                    "Record for {} holds {} ({}), rewriting",
                    url,
                    record.source_url,
                    record.content_hash
                );
                false
            }
            Ok(None) => {
                tracing::info!("Record for unchanged {} is missing, rewriting", url);
                false
            }
            Err(e) => {
                tracing::warn!("Record for {} unreadable, rewriting: {}", url, e);
                false
            }
        }
    }

    /// Clamps a wait requested by the server to `max-server-delay`
    fn server_delay(&self, requested: Duration, source: &str) -> Duration {
        let max = self.config.crawler.max_server_delay_duration();
        if requested > max {
            tracing::warn!(
                "{} of {:?} exceeds max-server-delay, using {:?}",
                source,
                requested,
                max
            );
            max
        } else {
            requested
        }
    }

    fn queue_links(&mut self, parent: &CrawlTarget, main_html: &str, page: &FetchedPage) {
        let discovered = discover_links(main_html, &page.final_url, &self.normalizer);
        for link in &discovered.cross_domain {
            tracing::trace!("Not following cross-domain link {}", link);
        }

        let mut queued = 0;
        for link in &discovered.links {
            if self.state.enqueue(CrawlTarget::child(link, parent)) {
                queued += 1;
            }
        }

        tracing::debug!(
            "{}: {} links found, {} queued, {} cross-domain, {} filtered",
            parent.url,
            discovered.links.len(),
            queued,
            discovered.cross_domain.len(),
            discovered.rejected
        );
    }

    fn fail(&mut self, target: &CrawlTarget, status: TargetState) -> Result<()> {
        status.transition(TargetState::Failed)?;
        self.stats.errors += 1;
        self.state.mark_visited(&target.url);
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        self.state_store.checkpoint(&self.state)?;
        self.since_checkpoint = 0;
        tracing::debug!(
            "Checkpoint written: {} queued, {} visited",
            self.state.frontier.len(),
            self.state.visited.len()
        );
        Ok(())
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire crawl process:
///
/// 1. Load the checkpoint (or discard it with `fresh`)
/// 2. Resume the pending frontier, or start a new pass from the seed
/// 3. Main crawl loop:
///    a. Pop the next target
///    b. Check robots.txt
///    c. Wait for the host's rate limit, then fetch (retrying transient failures)
///    d. Extract, convert and fingerprint the main content
///    e. Save the record if the fingerprint changed
///    f. Queue same-domain links one level deeper
/// 4. Checkpoint and return the run's statistics
///
/// # Example
///
/// ```no_run
/// use rag_crawler::config::load_config;
/// use rag_crawler::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let stats = run_crawl(config, false, CancellationToken::new()).await?;
/// println!("{} pages saved", stats.pages_saved);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    fresh: bool,
    cancel: CancellationToken,
) -> Result<CrawlStats> {
    let mut coordinator = Coordinator::new(config, fresh, cancel)?;
    coordinator.run().await
}
