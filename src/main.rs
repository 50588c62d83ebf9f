//! rag-crawler main entry point
//!
//! This is the command-line interface for the rag-crawler documentation crawler.

use clap::Parser;
use rag_crawler::config::{load_config_with_hash, Config};
use rag_crawler::crawler::run_crawl;
use rag_crawler::output::{print_state_summary, print_statistics, StateSummary};
use rag_crawler::storage::{JsonStateStore, StateStore};
use rag_crawler::CrawlerError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// rag-crawler: a polite documentation crawler for RAG ingestion
///
/// rag-crawler walks one site breadth-first from a seed URL while respecting
/// robots.txt and rate limits, and writes the main content of every new or
/// changed page as a Markdown file with YAML front matter.
#[derive(Parser, Debug)]
#[command(name = "rag-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A polite documentation crawler for RAG ingestion", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the saved crawl state and start over
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the resolved settings without crawling
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show a summary of the saved crawl state and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,

    /// Override the configured maximum link depth
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Ignore robots.txt (only for sites you operate)
    #[arg(long)]
    no_robots: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(depth) = cli.max_depth {
        config.crawler.max_depth = depth;
    }
    if cli.no_robots {
        tracing::warn!("robots.txt compliance disabled from the command line");
        config.crawler.respect_robots = false;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.status {
        handle_status(&config)?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("rag_crawler=info,warn"),
            1 => EnvFilter::new("rag_crawler=debug,info"),
            2 => EnvFilter::new("rag_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the resolved configuration
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let crawler = &config.crawler;
    println!("=== rag-crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", crawler.seed_url);
    println!("  Max depth: {}", crawler.max_depth);
    println!("  Rate limit: {}s between requests", crawler.rate_limit);
    println!("  Request timeout: {}s", crawler.request_timeout);
    println!(
        "  Retries: {} (backoff {}s, doubling)",
        crawler.max_retries, crawler.retry_backoff
    );
    println!("  Max redirects: {}", crawler.max_redirects);
    println!("  Respect robots.txt: {}", crawler.respect_robots);
    println!("  Extraction: {:?}", crawler.extraction);
    if crawler.max_pages > 0 {
        println!("  Max pages per run: {}", crawler.max_pages);
    }
    println!("  Checkpoint every {} targets", crawler.checkpoint_interval);

    println!("\nExcluded Patterns ({}):", crawler.excluded_patterns.len());
    for pattern in &crawler.excluded_patterns {
        println!("  - {}", pattern);
    }
    println!("Allowed Extensions: {}", crawler.allowed_extensions.join(", "));

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Content: {}", config.output.content_dir.display());
    println!("  State: {}", config.output.state_path.display());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --status mode: summarizes the saved crawl state
fn handle_status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonStateStore::new(&config.output.state_path);
    println!("State: {}\n", store.path().display());

    if store.is_fresh_run() {
        println!("No crawl state yet; the next run starts from {}", config.crawler.seed_url);
        return Ok(());
    }

    let state = store.load().map_err(CrawlerError::from)?;
    print_state_summary(&StateSummary::from_state(&state));

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if saved state exists)");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page");
            on_signal.cancel();
        }
    });

    // Run the crawler
    match run_crawl(config, fresh, cancel).await {
        Ok(stats) => {
            tracing::info!("Crawl completed successfully");
            print_statistics(&stats);
            Ok(())
        }
        Err(e @ CrawlerError::StateCorruption { .. }) => {
            tracing::error!("{}", e);
            tracing::error!("Run again with --fresh to discard the saved state");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
