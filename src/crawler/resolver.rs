//! Attachment resolution
//!
//! Some attachment links do not point at a file but at an HTML listing
//! whose rows link to the real files (an interstitial). Such listings can
//! in turn point at further listings, so resolution walks them depth-first
//! with an explicit depth counter and fails past the configured bound.

use crate::crawler::fetcher::{classify_error, PageFetcher};
use crate::crawler::parser::parse_interstitial;
use crate::crawler::ResolvedAttachment;
use crate::ArchiverError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use url::Url;

/// Returns true if a Content-Type header value declares an HTML document
///
/// # Examples
///
/// ```
/// use forum_archiver::crawler::is_html_content_type;
///
/// assert!(is_html_content_type("text/html; charset=utf-8"));
/// assert!(!is_html_content_type("application/octet-stream"));
/// ```
pub fn is_html_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("text/html")
}

fn is_html_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(is_html_content_type)
        .unwrap_or(false)
}

/// Turns attachment links into downloadable (name, url) pairs
pub struct AttachmentResolver {
    fetcher: PageFetcher,
    max_depth: u32,
}

impl AttachmentResolver {
    /// Creates a resolver following at most `max_depth` nested interstitials
    pub fn new(fetcher: PageFetcher, max_depth: u32) -> Self {
        Self { fetcher, max_depth }
    }

    /// Resolves one attachment link into the files behind it
    ///
    /// The link is probed with a GET whose body is only read when the
    /// response is HTML. A non-HTML answer makes the link itself the
    /// resolved attachment, keeping `name` as given. An HTML answer is read
    /// as an interstitial listing and each of its rows is resolved in turn,
    /// in row order.
    ///
    /// Every file found yields one entry. A row that cannot be resolved
    /// yields an `Err` entry in its place and its siblings are still walked:
    ///
    /// * `ArchiverError::RecursionLimitExceeded` - an HTML page was reached
    ///   at depth `max_depth`
    /// * `ArchiverError::Timeout` / `ArchiverError::Fetch` - a probe failed
    ///
    /// `is_known` marks URLs already archived; rows pointing at them are
    /// returned without probing so the caller can skip them.
    pub async fn resolve(
        &self,
        name: &str,
        url: Url,
        is_known: &dyn Fn(&Url) -> bool,
    ) -> Vec<Result<ResolvedAttachment, ArchiverError>> {
        let mut resolved = Vec::new();
        let mut stack = vec![(name.to_string(), url, 0u32)];

        while let Some((name, url, depth)) = stack.pop() {
            if depth > 0 && is_known(&url) {
                resolved.push(Ok(ResolvedAttachment { name, url }));
                continue;
            }

            match self.probe(&url, depth).await {
                Ok(Probe::File) => resolved.push(Ok(ResolvedAttachment { name, url })),
                Ok(Probe::Listing(rows)) => stack.extend(
                    rows.into_iter()
                        .rev()
                        .map(|row| (row.name, row.url, depth + 1)),
                ),
                Err(e) => resolved.push(Err(e)),
            }
        }

        resolved
    }

    async fn probe(&self, url: &Url, depth: u32) -> Result<Probe, ArchiverError> {
        let response = self.fetcher.get(url).await?;
        if !is_html_response(&response) {
            return Ok(Probe::File);
        }

        if depth >= self.max_depth {
            return Err(ArchiverError::RecursionLimitExceeded {
                url: url.to_string(),
                depth,
            });
        }

        let page_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| classify_error(url.as_str(), e))?;
        let rows = parse_interstitial(&html, &page_url);

        tracing::debug!(
            "Interstitial {} at depth {} lists {} files",
            url,
            depth,
            rows.len()
        );

        Ok(Probe::Listing(rows))
    }
}

enum Probe {
    File,
    Listing(Vec<ResolvedAttachment>),
}
