//! Ledger trait and error types
//!
//! This module defines the interface of the persisted download ledger and
//! its error type.

use crate::storage::{LedgerEntry, NewLedgerEntry};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Attachment already recorded: {0}")]
    DuplicateAttachment(String),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for ledger operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of downloaded attachments and crawl configuration
///
/// Entries are only appended. At most one entry exists per attachment URL.
/// Mutating methods take `&mut self`, so whoever owns the ledger is its
/// single writer.
pub trait Ledger {
    /// Returns true if an attachment with this absolute URL was already downloaded
    fn exists(&self, attachment_url: &str) -> StorageResult<bool>;

    /// Returns true if any attachment was recorded for this thread
    fn contains_thread(&self, thread_url: &str) -> StorageResult<bool>;

    /// Appends an entry and persists it
    ///
    /// The sequence number is `current row count + 1`. Appending a URL that
    /// is already present fails with [`StorageError::DuplicateAttachment`].
    fn append_and_persist(&mut self, entry: NewLedgerEntry) -> StorageResult<LedgerEntry>;

    /// Returns the stored base URL, storing `url` first if none exists yet
    ///
    /// First write wins: a stored value is never overwritten.
    fn get_or_set_base_url(&mut self, url: &str) -> StorageResult<String>;

    /// Returns the stored base URL without modifying the ledger
    fn base_url(&self) -> StorageResult<Option<String>>;

    /// Gets all entries ordered by sequence number
    fn entries(&self) -> StorageResult<Vec<LedgerEntry>>;

    /// Counts the recorded entries
    fn count_entries(&self) -> StorageResult<u64>;

    /// Counts the distinct threads with at least one entry
    fn count_threads(&self) -> StorageResult<u64>;
}
