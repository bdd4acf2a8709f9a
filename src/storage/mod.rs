//! Storage module for the download ledger
//!
//! This module handles the persisted record of what has been archived:
//! - SQLite database initialization and schema management
//! - Append-only ledger rows, one per downloaded attachment
//! - The hidden base-URL slot that lets a crawl resume without its URL

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteLedger;
pub use traits::{Ledger, StorageError, StorageResult};

use crate::{ArchiverError, ConfigError};

use std::path::{Path, PathBuf};

/// Initializes or opens a ledger database
pub fn open_ledger(path: &Path) -> Result<SqliteLedger, ArchiverError> {
    SqliteLedger::new(path)
}

/// Reads the stored base URL from an existing ledger file
///
/// Returns the URL together with the directory holding the ledger, which is
/// the save root of the crawl that created it.
pub fn resume_target(ledger_path: &Path) -> Result<Option<(String, PathBuf)>, ArchiverError> {
    if !ledger_path.exists() {
        tracing::warn!("Ledger {} not found", ledger_path.display());
        return Ok(None);
    }

    let ledger = SqliteLedger::new(ledger_path)?;
    let directory = ledger_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    match ledger.base_url()? {
        Some(url) => Ok(Some((url, directory))),
        None => {
            tracing::warn!("Ledger {} has no stored base URL", ledger_path.display());
            Ok(None)
        }
    }
}

/// Works out the start URL and save root for resuming from `ledger_path`
///
/// Explicit values win. Whatever is missing comes from the ledger: the
/// stored base URL and the directory holding the ledger file.
///
/// # Errors
///
/// Fails with a configuration error if no URL was given and the ledger
/// has none recorded.
pub fn resume_settings(
    ledger_path: &Path,
    url: Option<String>,
    save_dir: Option<PathBuf>,
) -> Result<(String, PathBuf), ArchiverError> {
    let recovered = match (&url, &save_dir) {
        (Some(_), Some(_)) => None,
        _ => resume_target(ledger_path)?,
    };
    let (stored_url, stored_dir) = recovered.unzip();

    let start_url = url.or(stored_url).ok_or_else(|| {
        ConfigError::Validation(format!(
            "Cannot resume: {} has no recorded base URL; pass --url",
            ledger_path.display()
        ))
    })?;

    let save_root = save_dir.or(stored_dir).unwrap_or_else(|| {
        ledger_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    });

    Ok((start_url, save_root))
}

/// A ledger row as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub status: EntryStatus,
    pub thread_title: String,
    pub thread_url: String,
    pub attachment_url: String,
    pub attachment_name: String,
    pub recorded_at: String,
}

/// Fields supplied by the caller when appending a ledger row
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub thread_title: String,
    pub thread_url: String,
    pub attachment_url: String,
    pub attachment_name: String,
}

/// Status of a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Downloaded,
}

impl EntryStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "downloaded" => Some(Self::Downloaded),
            _ => None,
        }
    }
}
