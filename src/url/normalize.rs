use crate::UrlError;
use url::Url;

/// Suffix segment forum listings append to thread links for unread jumps
const UNREAD_SUFFIX: &str = "/unread";

/// Parses an absolute listing or thread URL
///
/// Only HTTP and HTTPS are accepted; mock servers in tests use plain HTTP.
///
/// # Examples
///
/// ```
/// use forum_archiver::url::parse_absolute_url;
///
/// let url = parse_absolute_url("https://forum.example.com/forums/ecu.4/").unwrap();
/// assert_eq!(url.host_str(), Some("forum.example.com"));
/// assert!(parse_absolute_url("mailto:admin@example.com").is_err());
/// ```
pub fn parse_absolute_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Resolves a link href against the page it was found on
///
/// Returns None if the link should be ignored:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel:, data: schemes
/// - anything that is not HTTP(S) after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url)
        }
        _ => None,
    }
}

/// Cuts a trailing "unread" jump segment (and anything after it) from a thread href
///
/// `/threads/ecu-dump.123/unread` becomes `/threads/ecu-dump.123`.
/// Only a whole `unread` segment counts, so `/threads/unreadable-x.1/` is
/// returned unchanged.
pub fn strip_unread_suffix(href: &str) -> &str {
    let mut from = 0;
    while let Some(offset) = href[from..].find(UNREAD_SUFFIX) {
        let pos = from + offset;
        let rest = &href[pos + UNREAD_SUFFIX.len()..];
        if rest.is_empty() || rest.starts_with(['/', '?', '#']) {
            return &href[..pos];
        }
        from = pos + UNREAD_SUFFIX.len();
    }
    href
}

/// Thread URL as written into description files, without a trailing slash
pub fn display_thread_url(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Extracts the thread slug from a `/threads/{slug}/` style URL
pub fn thread_slug(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.by_ref().find(|segment| *segment == "threads")?;
    segments
        .next()
        .filter(|slug| !slug.is_empty())
        .map(|slug| slug.to_string())
}
