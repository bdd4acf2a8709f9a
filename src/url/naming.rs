use std::path::{Component, Path};
use url::Url;

use crate::url::normalize::thread_slug;

/// Directory name used when neither a title nor a thread slug is available
pub const FALLBACK_DIRECTORY_NAME: &str = "untitled";

/// Characters that may not appear in a thread directory name
const UNSAFE_DIRECTORY_CHARS: &[char] = &['\\', '/', '|', '?', '&', '"', '<', '>', '*', ':', ' '];

/// Builds the on-disk directory name for a thread
///
/// Every unsafe character of the title (including each space) becomes `_`.
/// An empty title falls back to the thread slug from the URL, then to
/// [`FALLBACK_DIRECTORY_NAME`].
///
/// # Examples
///
/// ```
/// use forum_archiver::url::directory_name;
/// use url::Url;
///
/// let url = Url::parse("https://forum.example.com/threads/me7.5.10/").unwrap();
/// assert_eq!(directory_name("ME7 <dump>: v1.2", &url), "ME7__dump___v1.2");
/// assert_eq!(directory_name("", &url), "me7.5.10");
/// ```
pub fn directory_name(title: &str, thread_url: &Url) -> String {
    let replaced = replace_unsafe(title.trim());
    if is_usable_segment(&replaced) {
        return replaced;
    }

    thread_slug(thread_url)
        .map(|slug| replace_unsafe(&slug))
        .filter(|slug| is_usable_segment(slug))
        .unwrap_or_else(|| FALLBACK_DIRECTORY_NAME.to_string())
}

fn replace_unsafe(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if UNSAFE_DIRECTORY_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Last non-empty path segment of a URL, percent-decoded
///
/// Returns None when the path has no non-empty segment.
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.rev().find(|segment| !segment.is_empty())?;

    let decoded = urlencoding::decode(last)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| last.to_string());
    Some(decoded)
}

/// Makes a derived attachment name safe to join onto a directory
///
/// Path separators and control characters become `_`; names that would
/// escape the directory (`.`, `..`) are rewritten.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_usable_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_usable_segment(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}
