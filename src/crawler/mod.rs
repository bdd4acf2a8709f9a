//! Crawler module for forum traversal and attachment archiving
//!
//! This module contains the core crawl-and-resolve pipeline, including:
//! - HTTP fetching with timeout classification and optional retry
//! - Paginated listing traversal
//! - Thread page extraction (title, posts, attachment references)
//! - Attachment resolution through HTML interstitial listings
//! - Streaming downloads under collision-safe names
//! - Overall crawl coordination against the ledger

mod coordinator;
mod downloader;
mod fetcher;
mod listing;
mod parser;
mod resolver;
mod thread;

pub use coordinator::{parse_forum, AttachmentOutcome, Coordinator, CrawlSummary};
pub use downloader::{
    content_disposition_file_name, part_file_name, unique_path, DownloadOutcome, Downloader,
    FALLBACK_FILE_NAME, SENTINEL_NAME,
};
pub use fetcher::{build_http_client, classify_error, PageFetcher};
pub use listing::ListingTraverser;
pub use parser::{
    parse_interstitial, parse_listing, parse_thread, ListingPage, ParsedThread,
    AUTHOR_PLACEHOLDER, TEXT_PLACEHOLDER,
};
pub use resolver::{is_html_content_type, AttachmentResolver};
pub use thread::ThreadParser;

use crate::url::resolve_link;
use url::Url;

/// One post of a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub text: String,
}

/// Extracted content of one thread page
///
/// Authors and texts are kept as pairs, so every post has exactly one of
/// each even when the markup lacks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub url: String,
    pub title: String,
    pub directory_name: String,
    pub posts: Vec<Post>,
}

/// A raw attachment link as found on a thread page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Display name; empty for the primary download control
    pub name: String,

    /// Link as written in the page, relative or absolute
    pub url: String,
}

impl AttachmentRef {
    /// Resolves the link against the page it was found on
    pub fn absolute_url(&self, page_url: &Url) -> Option<Url> {
        resolve_link(&self.url, page_url)
    }
}

/// An attachment confirmed to point at a downloadable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    /// May still be empty; the downloader then derives it from the response
    pub name: String,
    pub url: Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_ref_absolute_url() {
        let page = Url::parse("https://forum.example.com/threads/me7.5/").unwrap();
        let reference = AttachmentRef {
            name: "me7.bin".to_string(),
            url: "/attachments/me7-bin.44/".to_string(),
        };
        assert_eq!(
            reference.absolute_url(&page).unwrap().as_str(),
            "https://forum.example.com/attachments/me7-bin.44/"
        );

        let broken = AttachmentRef {
            name: String::new(),
            url: "javascript:void(0)".to_string(),
        };
        assert!(broken.absolute_url(&page).is_none());
    }
}
