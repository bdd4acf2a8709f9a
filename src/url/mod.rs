//! URL handling module for Forum-Archiver
//!
//! This module resolves forum links against the page they were found on and
//! derives filesystem-safe names from thread titles and attachment URLs.

mod naming;
mod normalize;

// Re-export main functions
pub use naming::{
    directory_name, file_name_from_url, sanitize_file_name, FALLBACK_DIRECTORY_NAME,
};
pub use normalize::{
    display_thread_url, parse_absolute_url, resolve_link, strip_unread_suffix, thread_slug,
};
