//! Paginated listing traversal
//!
//! Walks listing pages by following their "next page" link and yields the
//! thread URLs of each page in on-page order.

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::parse_listing;
use crate::ArchiverError;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Lazy sequence of thread URLs across listing pages
///
/// A page is fetched only once the threads of the previous page are used
/// up. Traversal stops when a page has no next link, when the next link
/// points to a page already seen, or when a page after the first fails to
/// load. A failure on the very first page is returned as an error since no
/// further pages are known.
pub struct ListingTraverser {
    fetcher: PageFetcher,
    next_page: Option<Url>,
    pending: VecDeque<Url>,
    visited: HashSet<String>,
    pages_traversed: u64,
}

impl ListingTraverser {
    /// Starts a traversal at `start_url`
    ///
    /// Any listing page works as a start, including a base URL recovered
    /// from the ledger.
    pub fn new(fetcher: PageFetcher, start_url: Url) -> Self {
        Self {
            fetcher,
            next_page: Some(start_url),
            pending: VecDeque::new(),
            visited: HashSet::new(),
            pages_traversed: 0,
        }
    }

    /// Number of listing pages loaded so far
    pub fn pages_traversed(&self) -> u64 {
        self.pages_traversed
    }

    /// Returns the next thread URL, loading listing pages as needed
    pub async fn next_thread(&mut self) -> Result<Option<Url>, ArchiverError> {
        loop {
            if let Some(thread_url) = self.pending.pop_front() {
                return Ok(Some(thread_url));
            }

            let Some(page_url) = self.next_page.take() else {
                return Ok(None);
            };

            if !self.visited.insert(page_url.to_string()) {
                tracing::debug!("Listing page {} already visited, stopping", page_url);
                return Ok(None);
            }

            let html = match self.fetcher.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) if self.pages_traversed == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("Stopping traversal at {}: {}", page_url, e);
                    return Ok(None);
                }
            };

            self.pages_traversed += 1;
            let listing = parse_listing(&html, &page_url);
            tracing::info!(
                "Listing page {} ({}): {} threads",
                self.pages_traversed,
                page_url,
                listing.thread_urls.len()
            );

            self.pending.extend(listing.thread_urls);
            self.next_page = listing.next_page;
        }
    }

    /// Drains the traversal into a vector
    pub async fn collect_all(mut self) -> Result<Vec<Url>, ArchiverError> {
        let mut threads = Vec::new();
        while let Some(thread_url) = self.next_thread().await? {
            threads.push(thread_url);
        }
        Ok(threads)
    }
}
