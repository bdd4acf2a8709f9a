//! Forum-Archiver main entry point
//!
//! This is the command-line interface for the Forum-Archiver thread and
//! attachment archiver.

use clap::Parser;
use forum_archiver::config::{load_config_with_hash, validate_listing_url, Config};
use forum_archiver::crawler::{build_http_client, parse_forum, Coordinator, CrawlSummary};
use forum_archiver::output::{load_statistics, print_statistics, print_summary};
use forum_archiver::storage::{open_ledger, resume_settings};
use forum_archiver::url::parse_absolute_url;
use forum_archiver::{ArchiverError, ConfigError};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Forum-Archiver: a resumable forum thread and attachment archiver
///
/// Forum-Archiver walks a forum's thread listing, writes every thread's
/// posts into a description file and downloads its attachments, following
/// interstitial download pages to the real files. A ledger next to the
/// archive keeps repeated runs from fetching anything twice.
#[derive(Parser, Debug)]
#[command(name = "forum-archiver")]
#[command(version)]
#[command(about = "A resumable forum thread and attachment archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Listing URL to start from (overrides forum.start-url or the resumed base URL)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Directory to archive into (overrides output.save-root or the resumed directory)
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Resume the crawl recorded in an existing ledger file
    ///
    /// --url and --save-dir still apply; only missing values come from the ledger.
    #[arg(long, value_name = "LEDGER")]
    resume_from: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the ledger and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

/// Where a crawl starts and what it writes to
struct CrawlTarget {
    start_url: String,
    save_root: PathBuf,
    resumed_ledger: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(ArchiverError::from(e).into());
        }
    };

    if cli.stats {
        return handle_stats(&cli, &config);
    }

    let target = resolve_target(&cli, &config)?;

    if cli.dry_run {
        handle_dry_run(&config, &target);
        Ok(())
    } else {
        handle_crawl(config, target).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_archiver=info,warn"),
            1 => EnvFilter::new("forum_archiver=debug,info"),
            2 => EnvFilter::new("forum_archiver=trace,debug"),
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

/// Works out the start URL and save root from the ledger, flags and config
fn resolve_target(cli: &Cli, config: &Config) -> forum_archiver::Result<CrawlTarget> {
    if let Some(ledger_path) = &cli.resume_from {
        let (start_url, save_root) =
            resume_settings(ledger_path, cli.url.clone(), cli.save_dir.clone())?;
        validate_listing_url(&start_url)?;
        tracing::info!("Resuming {} into {}", start_url, save_root.display());

        return Ok(CrawlTarget {
            start_url,
            save_root,
            resumed_ledger: Some(ledger_path.clone()),
        });
    }

    let start_url = cli
        .url
        .clone()
        .or_else(|| config.forum.start_url.clone())
        .ok_or_else(|| {
            ConfigError::Validation("No listing URL: pass --url or set forum.start-url".into())
        })?;
    validate_listing_url(&start_url)?;

    let save_root = cli
        .save_dir
        .clone()
        .unwrap_or_else(|| config.output.save_root.clone());

    Ok(CrawlTarget {
        start_url,
        save_root,
        resumed_ledger: None,
    })
}

/// Handles the --dry-run mode: shows the resolved settings
fn handle_dry_run(config: &Config, target: &CrawlTarget) {
    println!("=== Forum-Archiver Dry Run ===\n");

    println!("Client Configuration:");
    println!("  User agent: {}", config.client.user_agent);
    println!("  Request timeout: {}s", config.client.timeout_secs);
    println!("  Connect timeout: {}s", config.client.connect_timeout_secs);
    println!(
        "  Session cookie: {}",
        if config.client.cookie.is_some() {
            "set"
        } else {
            "none"
        }
    );

    println!("\nCrawler Configuration:");
    println!(
        "  Max interstitial depth: {}",
        config.crawler.max_interstitial_depth
    );
    println!("  Retry attempts: {}", config.crawler.retry_attempts);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!("  Chunk size: {} bytes", config.crawler.chunk_size);

    println!("\nTarget:");
    println!("  Start URL: {}", target.start_url);
    println!("  Save root: {}", target.save_root.display());
    println!("  Ledger: {}", ledger_path(config, target).display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the ledger
fn handle_stats(cli: &Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let path = match (&cli.resume_from, &cli.save_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => config.output.ledger_path_in(dir),
        (None, None) => config.output.ledger_path(),
    };

    if !path.exists() {
        return Err(format!("Ledger {} does not exist", path.display()).into());
    }

    println!("Ledger: {}\n", path.display());
    let ledger = open_ledger(&path)?;
    let stats = load_statistics(&ledger, 10)?;
    print_statistics(&stats);

    Ok(())
}

fn ledger_path(config: &Config, target: &CrawlTarget) -> PathBuf {
    target
        .resumed_ledger
        .clone()
        .unwrap_or_else(|| config.output.ledger_path_in(&target.save_root))
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    target: CrawlTarget,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current step");
            signal_token.cancel();
        }
    });

    match run_crawl(&config, &target, cancel).await {
        Ok(summary) => {
            tracing::info!("Crawl completed");
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_crawl(
    config: &Config,
    target: &CrawlTarget,
    cancel: CancellationToken,
) -> forum_archiver::Result<CrawlSummary> {
    let start_url = parse_absolute_url(&target.start_url)?;
    let client = build_http_client(&config.client)?;

    match &target.resumed_ledger {
        Some(path) => {
            resume_crawl(client, config, &target.save_root, path, &start_url, cancel).await
        }
        None => parse_forum(client, &start_url, &target.save_root, config, cancel).await,
    }
}

async fn resume_crawl(
    client: reqwest::Client,
    config: &Config,
    save_root: &Path,
    ledger_path: &Path,
    start_url: &url::Url,
    cancel: CancellationToken,
) -> forum_archiver::Result<CrawlSummary> {
    let ledger = open_ledger(ledger_path)?;
    let mut coordinator = Coordinator::new(
        client,
        &config.crawler,
        ledger,
        save_root.to_path_buf(),
        cancel,
    );
    coordinator.run(start_url).await
}
