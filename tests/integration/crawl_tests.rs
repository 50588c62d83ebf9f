//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use rag_crawler::config::{Config, CrawlerConfig, ExtractionMode, OutputConfig, UserAgentConfig};
use rag_crawler::crawler::Coordinator;
use rag_crawler::storage::{ContentStore, MarkdownStore};
use rag_crawler::{CrawlStats, CrawlerError};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `seed` into `dir`
fn create_test_config(seed: &str, max_depth: u32, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            seed_url: seed.to_string(),
            max_depth,
            rate_limit: 0.0,
            request_timeout: 5,
            max_retries: 1,
            retry_backoff: 0.0,
            rate_limit_backoff: 0.0,
            max_rate_limit_requeues: 3,
            max_server_delay: 300.0,
            max_redirects: 5,
            respect_robots: true,
            checkpoint_interval: 1,
            max_pages: 0,
            extraction: ExtractionMode::Density,
            excluded_patterns: vec!["/login".to_string(), "/admin".to_string()],
            allowed_extensions: vec!["html".to_string()],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            content_dir: dir.join("content"),
            state_path: dir.join("state.json"),
        },
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/html; charset=utf-8")
}

/// A page whose main content is `paragraphs`, wrapped in site chrome
fn page(title: &str, paragraphs: &str) -> String {
    format!(
        r#"<html><head><title>{title} | Example Docs</title></head><body>
        <nav><a href="/nav-only">Nav link</a></nav>
        <main>
            <h1>{title}</h1>
            {paragraphs}
        </main>
        <footer>Copyright Example</footer>
        </body></html>"#
    )
}

fn docs_page() -> String {
    page(
        "Documentation",
        r#"<p>Welcome to the documentation. This page explains how the project is organised.</p>
           <p>Start with the <a href="/docs/install">install guide</a> or read about it
           <a href="https://other.org/x">somewhere else</a> entirely.</p>"#,
    )
}

fn install_page(step: &str) -> String {
    page(
        "Install",
        &format!(
            "<p>Download the release archive and unpack it somewhere on your path.</p><p>{}</p>",
            step
        ),
    )
}

/// Mounts robots.txt, `/docs` and `/docs/install`
async fn mount_site(server: &MockServer, install_step: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/install"))
        .respond_with(html(install_page(install_step)))
        .mount(server)
        .await;
}

async fn crawl(config: Config, fresh: bool) -> (CrawlStats, Coordinator) {
    let mut coordinator =
        Coordinator::new(config, fresh, CancellationToken::new()).expect("Failed to create coordinator");
    let stats = coordinator.run().await.expect("Crawl failed");
    (stats, coordinator)
}

fn saved_files(dir: &Path) -> BTreeSet<String> {
    match std::fs::read_dir(dir.join("content")) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect(),
        Err(_) => BTreeSet::new(),
    }
}

#[tokio::test]
async fn test_single_domain_crawl() {
    let server = MockServer::start().await;
    mount_site(&server, "Run the installer.").await;
    Mock::given(method("GET"))
        .and(path("/nav-only"))
        .respond_with(html(page("Nav", "<p>never</p>")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, coordinator) = crawl(create_test_config(&seed, 1, dir.path()), false).await;

    assert_eq!(stats.pages_crawled, 2);
    assert_eq!(stats.pages_saved, 2);
    assert_eq!(stats.errors, 0);
    assert!(coordinator.state().frontier.is_empty());
    assert!(coordinator
        .state()
        .visited
        .iter()
        .all(|url| !url.contains("other.org")));
    assert_eq!(saved_files(dir.path()).len(), 2);

    let store = MarkdownStore::new(dir.path().join("content"));
    let record = store
        .load(&format!("{}/docs/install", server.uri()))
        .unwrap()
        .expect("install page saved");
    assert_eq!(record.title, "Install");
    assert!(record.body.contains("Run the installer."));
    assert!(!record.body.contains("Copyright"));
    assert_eq!(record.content_hash.len(), 64);
}

#[tokio::test]
async fn test_robots_fetched_once_per_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/install"))
        .respond_with(html(install_page("Run it.")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, _) = crawl(create_test_config(&seed, 1, dir.path()), false).await;
    assert_eq!(stats.pages_crawled, 2);
}

#[tokio::test]
async fn test_unchanged_recrawl_saves_nothing() {
    let server = MockServer::start().await;
    mount_site(&server, "Run the installer.").await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let config = create_test_config(&seed, 1, dir.path());

    let (first, _) = crawl(config.clone(), false).await;
    assert_eq!(first.pages_saved, 2);

    let (second, coordinator) = crawl(config, false).await;
    assert_eq!(second.pages_crawled, 2);
    assert_eq!(second.pages_saved, 0);
    assert_eq!(second.pages_skipped_unchanged, 2);
    assert_eq!(coordinator.state().fingerprints.len(), 2);
}

#[tokio::test]
async fn test_changed_page_is_saved_again() {
    let server = MockServer::start().await;
    mount_site(&server, "Run the installer.").await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let config = create_test_config(&seed, 1, dir.path());
    crawl(config.clone(), false).await;

    server.reset().await;
    mount_site(&server, "Run the new installer with --quiet.").await;

    let (stats, _) = crawl(config, false).await;
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.pages_skipped_unchanged, 1);

    let store = MarkdownStore::new(dir.path().join("content"));
    let record = store
        .load(&format!("{}/docs/install", server.uri()))
        .unwrap()
        .unwrap();
    assert!(record.body.contains("--quiet"));
}

#[tokio::test]
async fn test_rate_limited_target_is_requeued() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let mut config = create_test_config(&seed, 0, dir.path());
    config.crawler.max_retries = 0;

    let (stats, _) = crawl(config, false).await;
    assert_eq!(stats.pages_requeued, 1);
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_rate_limit_requeues_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let mut config = create_test_config(&seed, 0, dir.path());
    config.crawler.max_rate_limit_requeues = 2;

    let (stats, coordinator) = crawl(config, false).await;
    assert_eq!(stats.pages_requeued, 2);
    assert_eq!(stats.errors, 1);
    assert!(coordinator.state().frontier.is_empty());
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, _) = crawl(create_test_config(&seed, 0, dir.path()), false).await;
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_not_found_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, coordinator) = crawl(create_test_config(&seed, 0, dir.path()), false).await;
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.pages_saved, 0);
    assert!(coordinator.state().is_visited(&seed));
}

#[tokio::test]
async fn test_robots_disallow_is_respected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /docs/install"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/install"))
        .respond_with(html(install_page("never fetched")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, _) = crawl(create_test_config(&seed, 1, dir.path()), false).await;
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.pages_disallowed, 1);
}

#[tokio::test]
async fn test_robots_failure_does_not_halt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/install"))
        .respond_with(html(install_page("Run it.")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, _) = crawl(create_test_config(&seed, 1, dir.path()), false).await;
    assert_eq!(stats.pages_saved, 2);
    assert_eq!(stats.pages_disallowed, 0);
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    let server = MockServer::start().await;
    mount_site(&server, "Run the installer.").await;
    let seed = format!("{}/docs", server.uri());

    let full_dir = TempDir::new().unwrap();
    crawl(create_test_config(&seed, 1, full_dir.path()), false).await;

    let resumed_dir = TempDir::new().unwrap();
    let mut limited = create_test_config(&seed, 1, resumed_dir.path());
    limited.crawler.max_pages = 1;
    let (first, coordinator) = crawl(limited, false).await;
    assert_eq!(first.pages_saved, 1);
    assert_eq!(coordinator.state().frontier.len(), 1);
    drop(coordinator);

    let (second, coordinator) =
        crawl(create_test_config(&seed, 1, resumed_dir.path()), false).await;
    assert_eq!(second.pages_saved, 1);
    assert!(coordinator.state().frontier.is_empty());

    assert_eq!(saved_files(full_dir.path()), saved_files(resumed_dir.path()));
}

#[tokio::test]
async fn test_cancelled_run_checkpoints_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut coordinator =
        Coordinator::new(create_test_config(&seed, 1, dir.path()), false, cancel).unwrap();
    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.pages_crawled, 0);

    let state = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(value["frontier"][0]["url"], seed.as_str());
}

#[tokio::test]
async fn test_corrupt_state_requires_fresh() {
    let server = MockServer::start().await;
    mount_site(&server, "Run the installer.").await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("state.json"), "{ truncated").unwrap();
    let seed = format!("{}/docs", server.uri());
    let config = create_test_config(&seed, 1, dir.path());

    let result = Coordinator::new(config.clone(), false, CancellationToken::new());
    assert!(matches!(result, Err(CrawlerError::StateCorruption { .. })));

    let (stats, _) = crawl(config, true).await;
    assert_eq!(stats.pages_saved, 2);
}

#[tokio::test]
async fn test_redirect_target_is_saved_under_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/docs"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/start", server.uri());
    let (stats, coordinator) = crawl(create_test_config(&seed, 0, dir.path()), false).await;
    assert_eq!(stats.pages_saved, 1);
    assert!(coordinator
        .state()
        .fingerprint(&format!("{}/docs", server.uri()))
        .is_some());
    assert!(coordinator.state().is_visited(&seed));
}

#[tokio::test]
async fn test_absurd_server_delays_are_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1e12\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "18446744073709551615"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(docs_page()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let mut config = create_test_config(&seed, 0, dir.path());
    config.crawler.max_server_delay = 0.2;

    let (stats, _) = tokio::time::timeout(Duration::from_secs(20), crawl(config, false))
        .await
        .expect("crawl stalled on a server-supplied delay");
    assert_eq!(stats.pages_requeued, 1);
    assert_eq!(stats.pages_saved, 1);
}

#[tokio::test]
async fn test_cancel_interrupts_rate_limit_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let mut config = create_test_config(&seed, 0, dir.path());
    config.crawler.max_server_delay = 3600.0;

    let cancel = CancellationToken::new();
    let mut coordinator = Coordinator::new(config, false, cancel.clone()).unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
    });

    let stats = tokio::time::timeout(Duration::from_secs(20), coordinator.run())
        .await
        .expect("rate limit wait ignored cancellation")
        .unwrap();
    assert_eq!(stats.pages_requeued, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(coordinator.state().frontier.len(), 1);
    assert!(!coordinator.state().is_visited(&seed));
}

#[tokio::test]
async fn test_visited_only_grows_within_a_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(page(
            "Documentation",
            r#"<p>Read the <a href="/docs/moved">moved guide</a> and the
               <a href="/docs/missing">missing page</a> before you start with the project.</p>
               <p>Everything else in this documentation builds on those two pages.</p>"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/docs/install"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/install"))
        .respond_with(html(install_page("Run the installer.")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let mut coordinator = Coordinator::new(
        create_test_config(&seed, 1, dir.path()),
        false,
        CancellationToken::new(),
    )
    .unwrap();

    let mut previous = coordinator.state().visited.clone();
    let mut steps = 0;
    while coordinator.process_next().await.unwrap() {
        let current = coordinator.state().visited.clone();
        assert!(
            current.is_superset(&previous),
            "visited lost entries at step {}",
            steps
        );
        assert!(current.len() > previous.len());
        previous = current;
        steps += 1;
    }

    assert_eq!(steps, 3);
    for page_path in ["/docs", "/docs/moved", "/docs/install", "/docs/missing"] {
        assert!(
            previous.contains(&format!("{}{}", server.uri(), page_path)),
            "{} not visited",
            page_path
        );
    }
    assert_eq!(coordinator.stats().pages_saved, 2);
    assert_eq!(coordinator.stats().errors, 1);
}

#[tokio::test]
async fn test_missing_record_is_restored_on_recrawl() {
    let server = MockServer::start().await;
    mount_site(&server, "Run the installer.").await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let config = create_test_config(&seed, 1, dir.path());
    crawl(config.clone(), false).await;

    let store = MarkdownStore::new(dir.path().join("content"));
    let install = format!("{}/docs/install", server.uri());
    std::fs::remove_file(store.path_for(&install)).unwrap();

    let (stats, _) = crawl(config, false).await;
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.pages_skipped_unchanged, 1);
    assert!(store.load(&install).unwrap().is_some());
}

#[tokio::test]
async fn test_http_and_https_links_are_one_page() {
    let server = MockServer::start().await;
    let https_twin = server.uri().replacen("http://", "https://", 1);
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(html(page(
            "Documentation",
            &format!(
                r#"<p>Start with the <a href="/docs/install">install guide</a> or the
                   <a href="{}/docs/install">same guide over TLS</a> if you prefer.</p>"#,
                https_twin
            ),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/install"))
        .respond_with(html(install_page("Run the installer.")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let seed = format!("{}/docs", server.uri());
    let (stats, coordinator) = crawl(create_test_config(&seed, 1, dir.path()), false).await;
    assert_eq!(stats.pages_saved, 2);
    assert_eq!(saved_files(dir.path()).len(), 2);
    assert!(coordinator
        .state()
        .visited
        .iter()
        .all(|url| !url.starts_with("https://")));
}
