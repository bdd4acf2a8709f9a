//! HTML extraction for listing, thread and interstitial pages
//!
//! Every function here is a pure function of the fetched markup and the URL
//! it came from. Missing markup never fails: absent elements turn into empty
//! lists or placeholder values.

use crate::crawler::{AttachmentRef, Post, ResolvedAttachment, ThreadRecord};
use crate::url::{directory_name, resolve_link, strip_unread_suffix};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Author written when a post has no parseable author link
pub const AUTHOR_PLACEHOLDER: &str = "Author not found";

/// Text written when a post has no parseable message body
pub const TEXT_PLACEHOLDER: &str = "Text not found";

const LISTING_ENTRY: &str = "div.structItem-title";
const NEXT_PAGE: &str = "a.pageNav-jump--next";
const THREAD_TITLE: &str = ".p-title .p-title-value";
const MESSAGE_CONTAINER: &str = "div.block-body.js-replyNewMessageContainer";
const MESSAGE: &str = "article.message";
const MESSAGE_AUTHOR: &str = "a.username";
const MESSAGE_EXPANDED_BODY: &str = "div.bbCodeBlock-expandContent";
const MESSAGE_BODY: &str = "div.bbWrapper";
const ATTACHMENT_LINK: &str = "ul.attachmentList a[href]";
const PRIMARY_DOWNLOAD: &str = ".p-title-pageAction a.button--cta";
const INTERSTITIAL_ROW: &str = ".block-body .block-row";
const INTERSTITIAL_TITLE: &str = ".contentRow-title";
const INTERSTITIAL_LINK: &str = ".contentRow-extra a";

/// Threads and pagination extracted from one listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Absolute thread URLs in on-page order
    pub thread_urls: Vec<Url>,

    /// The "next page" link, if the page has one
    pub next_page: Option<Url>,
}

/// Everything extracted from one thread page
#[derive(Debug, Clone)]
pub struct ParsedThread {
    pub record: ThreadRecord,

    /// Inline attachment links first, the primary download control last
    pub attachments: Vec<AttachmentRef>,
}

/// Parses a thread listing page
///
/// Each listing entry contributes its first link, with any "unread" jump
/// suffix removed, resolved against `page_url`.
///
/// # Example
///
/// ```
/// use forum_archiver::crawler::parse_listing;
/// use url::Url;
///
/// let html = r#"<div class="structItem-title"><a href="/threads/a.1/unread">A</a></div>
///               <a class="pageNav-jump--next" href="/forums/f.2/page-2">Next</a>"#;
/// let page_url = Url::parse("https://forum.example.com/forums/f.2/").unwrap();
/// let listing = parse_listing(html, &page_url);
/// assert_eq!(listing.thread_urls[0].as_str(), "https://forum.example.com/threads/a.1");
/// assert!(listing.next_page.is_some());
/// ```
pub fn parse_listing(html: &str, page_url: &Url) -> ListingPage {
    let document = Html::parse_document(html);
    let mut listing = ListingPage::default();

    if let (Ok(entry_selector), Ok(link_selector)) =
        (Selector::parse(LISTING_ENTRY), Selector::parse("a[href]"))
    {
        for entry in document.select(&entry_selector) {
            let href = entry
                .select(&link_selector)
                .next()
                .and_then(|link| link.value().attr("href"));

            match href.and_then(|h| resolve_link(strip_unread_suffix(h), page_url)) {
                Some(url) => listing.thread_urls.push(url),
                None => tracing::debug!("Listing entry without usable link on {}", page_url),
            }
        }
    }

    listing.next_page = Selector::parse(NEXT_PAGE).ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| resolve_link(href, page_url))
    });

    listing
}

/// Parses a thread page into its record and raw attachment references
pub fn parse_thread(html: &str, thread_url: &Url) -> ParsedThread {
    let document = Html::parse_document(html);

    let title = extract_title(&document).unwrap_or_else(|| {
        tracing::debug!("No title found on {}", thread_url);
        String::new()
    });
    let posts = extract_posts(&document, thread_url);
    let attachments = extract_attachment_refs(&document);

    ParsedThread {
        record: ThreadRecord {
            url: thread_url.to_string(),
            directory_name: directory_name(&title, thread_url),
            title,
            posts,
        },
        attachments,
    }
}

/// Parses an interstitial listing into the real (name, url) pairs
///
/// Rows missing either the title or the download link are skipped.
pub fn parse_interstitial(html: &str, page_url: &Url) -> Vec<ResolvedAttachment> {
    let document = Html::parse_document(html);
    let (Ok(row_selector), Ok(title_selector), Ok(link_selector)) = (
        Selector::parse(INTERSTITIAL_ROW),
        Selector::parse(INTERSTITIAL_TITLE),
        Selector::parse(INTERSTITIAL_LINK),
    ) else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .filter_map(|row| {
            let name = row.select(&title_selector).next()?;
            let href = row.select(&link_selector).next()?.value().attr("href")?;
            let url = resolve_link(href, page_url)?;
            Some(ResolvedAttachment {
                name: name.text().collect::<String>().trim().to_string(),
                url,
            })
        })
        .collect()
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse(THREAD_TITLE).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_posts(document: &Html, thread_url: &Url) -> Vec<Post> {
    let (Ok(container_selector), Ok(message_selector)) =
        (Selector::parse(MESSAGE_CONTAINER), Selector::parse(MESSAGE))
    else {
        return Vec::new();
    };

    let Some(container) = document.select(&container_selector).next() else {
        tracing::debug!("No message container on {}", thread_url);
        return Vec::new();
    };

    container
        .select(&message_selector)
        .enumerate()
        .map(|(index, message)| Post {
            author: extract_author(&message).unwrap_or_else(|| {
                tracing::debug!("Post {} on {} has no author", index, thread_url);
                AUTHOR_PLACEHOLDER.to_string()
            }),
            text: extract_text(&message).unwrap_or_else(|| {
                tracing::debug!("Post {} on {} has no body", index, thread_url);
                TEXT_PLACEHOLDER.to_string()
            }),
        })
        .collect()
}

fn extract_author(message: &ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse(MESSAGE_AUTHOR).ok()?;
    let author = message.select(&selector).next()?;
    Some(author.text().map(str::trim).collect::<String>())
}

fn extract_text(message: &ElementRef<'_>) -> Option<String> {
    let body = [MESSAGE_EXPANDED_BODY, MESSAGE_BODY]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|selector| message.select(&selector).next())?;

    Some(
        body.text()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn extract_attachment_refs(document: &Html) -> Vec<AttachmentRef> {
    let mut refs = Vec::new();

    if let Ok(selector) = Selector::parse(ATTACHMENT_LINK) {
        for link in document.select(&selector) {
            let element = link.value();
            let (Some(title), Some(href)) = (element.attr("title"), element.attr("href")) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            refs.push(AttachmentRef {
                name: title.to_string(),
                url: href.to_string(),
            });
        }
    }

    if let Ok(selector) = Selector::parse(PRIMARY_DOWNLOAD) {
        let primary = document
            .select(&selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .filter(|href| !href.is_empty());

        if let Some(href) = primary {
            refs.push(AttachmentRef {
                name: String::new(),
                url: href.to_string(),
            });
        }
    }

    refs
}
