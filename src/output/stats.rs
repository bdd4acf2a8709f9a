//! Statistics from the ledger and the crawl summary
//!
//! This module provides functionality for extracting and displaying
//! ledger statistics and the result of a finished crawl.

use crate::crawler::CrawlSummary;
use crate::storage::{Ledger, LedgerEntry};
use crate::ArchiverError;

/// Ledger statistics summary
#[derive(Debug, Clone)]
pub struct LedgerStatistics {
    /// Total number of recorded attachments
    pub total_entries: u64,

    /// Number of distinct threads with at least one attachment
    pub distinct_threads: u64,

    /// Listing URL the ledger was started with
    pub base_url: Option<String>,

    /// Most recent entries, newest first
    pub recent_entries: Vec<LedgerEntry>,
}

/// Loads statistics from a ledger
///
/// # Arguments
///
/// * `ledger` - The ledger to query
/// * `recent_limit` - How many of the latest entries to include
pub fn load_statistics(
    ledger: &dyn Ledger,
    recent_limit: usize,
) -> Result<LedgerStatistics, ArchiverError> {
    let total_entries = ledger.count_entries()?;
    let distinct_threads = ledger.count_threads()?;
    let base_url = ledger.base_url()?;

    let recent_entries = ledger
        .entries()?
        .into_iter()
        .rev()
        .take(recent_limit)
        .collect();

    Ok(LedgerStatistics {
        total_entries,
        distinct_threads,
        base_url,
        recent_entries,
    })
}

/// Prints ledger statistics to stdout in a formatted manner
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Ledger Statistics ===\n");

    println!("Overview:");
    println!(
        "  Base URL: {}",
        stats.base_url.as_deref().unwrap_or("(not recorded)")
    );
    println!("  Attachments recorded: {}", stats.total_entries);
    println!("  Threads with attachments: {}", stats.distinct_threads);
    println!();

    if !stats.recent_entries.is_empty() {
        println!("Latest Entries:");
        for entry in &stats.recent_entries {
            println!(
                "  #{} [{}] {} ({})",
                entry.sequence, entry.recorded_at, entry.attachment_name, entry.thread_title
            );
        }
        println!();
    }
}

/// Prints the result of a crawl to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    if summary.cancelled {
        println!("Crawl was cancelled before completion.\n");
    }

    println!("Traversal:");
    println!("  Listing pages traversed: {}", summary.pages_traversed);
    println!("  Threads found: {}", summary.threads.len());
    println!("  Threads failed: {}", summary.thread_failures);
    println!();

    println!("Attachments:");
    println!("  Saved: {}", summary.attachments_saved);
    println!("  Already archived: {}", summary.duplicates_skipped);
    println!("  Not real files: {}", summary.sentinels_skipped);
    println!("  Failed: {}", summary.attachment_failures);
}
