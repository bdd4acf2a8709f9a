//! Crawler coordinator - main archiving orchestration logic
//!
//! This module contains the main crawl loop that sequences all steps of the
//! archiving process, including:
//! - Walking the listing pages and recording the base URL
//! - Extracting each thread and writing its description file
//! - Resolving attachment links and skipping already archived ones
//! - Downloading files and appending them to the ledger
//! - Honoring cancellation between threads and attachments

use crate::config::{Config, CrawlerConfig};
use crate::crawler::downloader::{DownloadOutcome, Downloader};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::listing::ListingTraverser;
use crate::crawler::resolver::AttachmentResolver;
use crate::crawler::thread::ThreadParser;
use crate::crawler::{AttachmentRef, ResolvedAttachment, ThreadRecord};
use crate::output::{thread_directory, write_description};
use crate::storage::{open_ledger, Ledger, LedgerEntry, NewLedgerEntry, SqliteLedger};
use crate::ArchiverError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Counts and records produced by one crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    /// Listing pages that loaded successfully
    pub pages_traversed: u64,

    /// Threads processed, in traversal order
    pub threads: Vec<ThreadRecord>,

    pub attachments_saved: u64,

    /// Attachments skipped because the ledger already had their URL
    pub duplicates_skipped: u64,

    /// Attachments skipped because their name was the `reply` sentinel
    pub sentinels_skipped: u64,

    pub attachment_failures: u64,
    pub thread_failures: u64,

    /// True if the crawl stopped early on cancellation
    pub cancelled: bool,
}

/// What happened to one resolved attachment
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentOutcome {
    /// Downloaded and appended to the ledger
    Saved { path: PathBuf, entry: LedgerEntry },

    /// The ledger already had this URL; nothing was fetched
    Duplicate,

    /// The derived name was the sentinel; nothing was written or recorded
    Sentinel,
}

/// Main archiver coordinator
///
/// The coordinator owns the ledger, so every ledger read and write goes
/// through it one at a time.
pub struct Coordinator {
    fetcher: PageFetcher,
    threads: ThreadParser,
    resolver: AttachmentResolver,
    downloader: Downloader,
    ledger: SqliteLedger,
    save_root: PathBuf,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator writing below `save_root`
    ///
    /// # Arguments
    ///
    /// * `client` - Authenticated HTTP client
    /// * `config` - Crawl behavior settings
    /// * `ledger` - Ledger to consult and append to
    /// * `save_root` - Directory receiving one sub-directory per thread
    /// * `cancel` - Token checked between threads, attachments and chunks
    pub fn new(
        client: Client,
        config: &CrawlerConfig,
        ledger: SqliteLedger,
        save_root: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        let fetcher =
            PageFetcher::new(client).with_retry(config.retry_attempts, config.retry_delay());

        Self {
            threads: ThreadParser::new(fetcher.clone()),
            resolver: AttachmentResolver::new(fetcher.clone(), config.max_interstitial_depth),
            downloader: Downloader::new(fetcher.clone(), config.chunk_size),
            fetcher,
            ledger,
            save_root,
            cancel,
        }
    }

    /// Read access to the ledger
    pub fn ledger(&self) -> &SqliteLedger {
        &self.ledger
    }

    /// Runs the main crawl loop starting at `listing_url`
    ///
    /// Only a failure to load the first listing page is returned as an
    /// error. Failures of single threads or attachments are logged and
    /// counted in the summary, and the crawl moves on.
    pub async fn run(&mut self, listing_url: &Url) -> Result<CrawlSummary, ArchiverError> {
        tracing::info!("Starting crawl at {}", listing_url);

        let start_time = std::time::Instant::now();
        let mut traverser = ListingTraverser::new(self.fetcher.clone(), listing_url.clone());
        let mut summary = CrawlSummary::default();
        let mut base_recorded = false;

        loop {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let next = traverser.next_thread().await;
            summary.pages_traversed = traverser.pages_traversed();

            if !base_recorded && traverser.pages_traversed() > 0 {
                let stored = self.ledger.get_or_set_base_url(listing_url.as_str())?;
                if stored != listing_url.as_str() {
                    tracing::info!("Ledger keeps its original base URL {}", stored);
                }
                base_recorded = true;
            }

            let Some(thread_url) = next? else {
                break;
            };

            match self.process_thread(&thread_url, &mut summary).await {
                Ok(record) => summary.threads.push(record),
                Err(ArchiverError::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Skipping thread {}: {}", thread_url, e);
                    summary.thread_failures += 1;
                }
            }
        }

        if summary.cancelled {
            tracing::info!("Crawl cancelled");
        }

        tracing::info!(
            "Crawl finished in {:?}: {} pages, {} threads, {} attachments saved",
            start_time.elapsed(),
            summary.pages_traversed,
            summary.threads.len(),
            summary.attachments_saved
        );

        Ok(summary)
    }

    /// Processes one thread: description file first, then its attachments
    async fn process_thread(
        &mut self,
        thread_url: &Url,
        summary: &mut CrawlSummary,
    ) -> Result<ThreadRecord, ArchiverError> {
        let parsed = self.threads.parse(thread_url).await?;
        let record = parsed.record;

        write_description(&self.save_root, &record)?;
        let directory = thread_directory(&self.save_root, &record);

        for reference in &parsed.attachments {
            if self.cancel.is_cancelled() {
                return Err(ArchiverError::Cancelled);
            }

            match self
                .process_reference(&record, thread_url, reference, &directory, summary)
                .await
            {
                Ok(()) => {}
                Err(ArchiverError::Cancelled) => return Err(ArchiverError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        "Attachment '{}' in {} failed: {}",
                        reference.url,
                        thread_url,
                        e
                    );
                    summary.attachment_failures += 1;
                }
            }
        }

        Ok(record)
    }

    async fn process_reference(
        &mut self,
        record: &ThreadRecord,
        thread_url: &Url,
        reference: &AttachmentRef,
        directory: &Path,
        summary: &mut CrawlSummary,
    ) -> Result<(), ArchiverError> {
        let Some(url) = reference.absolute_url(thread_url) else {
            tracing::debug!("Ignoring unusable attachment link '{}'", reference.url);
            return Ok(());
        };

        if self.ledger.exists(url.as_str())? {
            tracing::debug!("Already archived: {}", url);
            summary.duplicates_skipped += 1;
            return Ok(());
        }

        let resolved = {
            let ledger = &self.ledger;
            let is_known = |candidate: &Url| ledger.exists(candidate.as_str()).unwrap_or(false);
            self.resolver.resolve(&reference.name, url, &is_known).await
        };

        for attachment in resolved {
            if self.cancel.is_cancelled() {
                return Err(ArchiverError::Cancelled);
            }

            let attachment = match attachment {
                Ok(attachment) => attachment,
                Err(e) => {
                    tracing::warn!("Attachment behind '{}' failed: {}", reference.url, e);
                    summary.attachment_failures += 1;
                    continue;
                }
            };

            match self.archive_attachment(record, &attachment, directory).await {
                Ok(AttachmentOutcome::Saved { .. }) => summary.attachments_saved += 1,
                Ok(AttachmentOutcome::Duplicate) => summary.duplicates_skipped += 1,
                Ok(AttachmentOutcome::Sentinel) => summary.sentinels_skipped += 1,
                Err(ArchiverError::Cancelled) => return Err(ArchiverError::Cancelled),
                Err(e) => {
                    tracing::warn!("Download of {} failed: {}", attachment.url, e);
                    summary.attachment_failures += 1;
                }
            }
        }

        Ok(())
    }

    /// Downloads one resolved attachment unless the ledger already has it
    ///
    /// A successful download is appended to the ledger before returning.
    pub async fn archive_attachment(
        &mut self,
        record: &ThreadRecord,
        attachment: &ResolvedAttachment,
        directory: &Path,
    ) -> Result<AttachmentOutcome, ArchiverError> {
        if self.ledger.exists(attachment.url.as_str())? {
            tracing::debug!("Already archived: {}", attachment.url);
            return Ok(AttachmentOutcome::Duplicate);
        }

        match self
            .downloader
            .download(attachment, directory, &self.cancel)
            .await?
        {
            DownloadOutcome::Sentinel => Ok(AttachmentOutcome::Sentinel),
            DownloadOutcome::Saved { path, file_name } => {
                let entry = self.ledger.append_and_persist(NewLedgerEntry {
                    thread_title: record.title.clone(),
                    thread_url: record.url.clone(),
                    attachment_url: attachment.url.to_string(),
                    attachment_name: file_name,
                })?;

                tracing::info!("Saved #{}: {}", entry.sequence, path.display());
                Ok(AttachmentOutcome::Saved { path, entry })
            }
        }
    }
}

/// Archives every thread reachable from `listing_url` into `save_dir`
///
/// Opens (or creates) the ledger inside `save_dir` unless the configured
/// ledger file is absolute, then runs a full crawl. Resuming a crawl is the
/// same call with the base URL and directory recovered from an existing
/// ledger; attachments already recorded are skipped without any request.
///
/// # Example
///
/// ```no_run
/// use forum_archiver::config::load_config;
/// use forum_archiver::crawler::{build_http_client, parse_forum};
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("archiver.toml"))?;
/// let client = build_http_client(&config.client)?;
/// let start = Url::parse("https://forum.example.com/forums/firmware.7/")?;
///
/// let summary = parse_forum(client, &start, Path::new("archive"), &config, CancellationToken::new()).await?;
/// println!("{} threads", summary.threads.len());
/// # Ok(())
/// # }
/// ```
pub async fn parse_forum(
    client: Client,
    listing_url: &Url,
    save_dir: &Path,
    config: &Config,
    cancel: CancellationToken,
) -> Result<CrawlSummary, ArchiverError> {
    let ledger = open_ledger(&config.output.ledger_path_in(save_dir))?;
    let mut coordinator = Coordinator::new(
        client,
        &config.crawler,
        ledger,
        save_dir.to_path_buf(),
        cancel,
    );
    coordinator.run(listing_url).await
}
