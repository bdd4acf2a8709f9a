//! Forum-Archiver: a resumable forum thread and attachment archiver
//!
//! This crate walks paginated thread listings, extracts each thread's posts
//! into a description file, resolves attachment links (including HTML
//! interstitial listings that point at the real file) and downloads them
//! under collision-safe names. A persisted ledger keeps repeated runs from
//! downloading or recording the same attachment twice.

pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Forum-Archiver operations
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        /// HTTP status when the server answered with an error code
        status: Option<u16>,
        message: String,
    },

    #[error("Interstitial chain deeper than {depth} levels at {url}")]
    RecursionLimitExceeded { url: String, depth: u32 },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Crawl cancelled")]
    Cancelled,
}

impl ArchiverError {
    /// Wraps an IO error with the path it happened at
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Returns true for failures a bounded retry may recover from
    ///
    /// Timeouts, connection failures and 5xx answers are transient;
    /// 4xx answers and everything local are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Fetch { status, .. } => status.map_or(true, |code| code >= 500),
            _ => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for Forum-Archiver operations
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{parse_forum, AttachmentRef, CrawlSummary, ResolvedAttachment, ThreadRecord};
pub use storage::{Ledger, LedgerEntry, SqliteLedger};
