//! Thread page loading

use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{parse_thread, ParsedThread};
use crate::ArchiverError;
use url::Url;

/// Fetches thread pages and extracts their content
///
/// Only the fetch can fail. Missing markup degrades to placeholders inside
/// the returned record.
pub struct ThreadParser {
    fetcher: PageFetcher,
}

impl ThreadParser {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    pub async fn parse(&self, thread_url: &Url) -> Result<ParsedThread, ArchiverError> {
        let html = self.fetcher.fetch(thread_url).await?;
        let parsed = parse_thread(&html, thread_url);

        tracing::debug!(
            "Thread {}: '{}', {} posts, {} attachment links",
            thread_url,
            parsed.record.title,
            parsed.record.posts.len(),
            parsed.attachments.len()
        );

        Ok(parsed)
    }
}
