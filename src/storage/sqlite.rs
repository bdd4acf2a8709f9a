//! SQLite ledger implementation
//!
//! This module provides a SQLite-based implementation of the Ledger trait.
//! The attachment URL set is mirrored in memory so dedup checks never hit
//! the database.

use crate::storage::schema::{initialize_schema, BASE_URL_KEY};
use crate::storage::traits::{Ledger, StorageError, StorageResult};
use crate::storage::{EntryStatus, LedgerEntry, NewLedgerEntry};
use crate::ArchiverError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashSet;
use std::path::Path;

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Connection,
    known_urls: HashSet<String>,
}

impl SqliteLedger {
    /// Opens or creates the ledger database at `path`
    ///
    /// Missing parent directories are created.
    pub fn new(path: &Path) -> Result<Self, ArchiverError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArchiverError::filesystem(parent, e))?;
        }

        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )
        .map_err(StorageError::from)?;

        Ok(Self::from_connection(conn)?)
    }

    /// Creates an in-memory ledger (for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, ArchiverError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        Ok(Self::from_connection(conn)?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        initialize_schema(&conn)?;

        let known_urls = {
            let mut stmt = conn.prepare("SELECT attachment_url FROM ledger_entries")?;
            let urls = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<HashSet<_>, _>>()?;
            urls
        };

        Ok(Self { conn, known_urls })
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<(LedgerEntry, String)> {
    let status: String = row.get(1)?;
    Ok((
        LedgerEntry {
            sequence: row.get(0)?,
            status: EntryStatus::Downloaded,
            thread_title: row.get(2)?,
            thread_url: row.get(3)?,
            attachment_url: row.get(4)?,
            attachment_name: row.get(5)?,
            recorded_at: row.get(6)?,
        },
        status,
    ))
}

impl Ledger for SqliteLedger {
    fn exists(&self, attachment_url: &str) -> StorageResult<bool> {
        Ok(self.known_urls.contains(attachment_url))
    }

    fn contains_thread(&self, thread_url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM ledger_entries WHERE thread_url = ?1 LIMIT 1",
                params![thread_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn append_and_persist(&mut self, entry: NewLedgerEntry) -> StorageResult<LedgerEntry> {
        if self.known_urls.contains(&entry.attachment_url) {
            return Err(StorageError::DuplicateAttachment(entry.attachment_url));
        }

        let recorded_at = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| {
            row.get(0)
        })?;
        let sequence = count as u64 + 1;

        tx.execute(
            "INSERT INTO ledger_entries
             (sequence, status, thread_title, thread_url, attachment_url, attachment_name, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sequence as i64,
                EntryStatus::Downloaded.to_db_string(),
                entry.thread_title,
                entry.thread_url,
                entry.attachment_url,
                entry.attachment_name,
                recorded_at,
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::DuplicateAttachment(entry.attachment_url.clone())
            }
            other => StorageError::Sqlite(other),
        })?;

        tx.commit()?;

        self.known_urls.insert(entry.attachment_url.clone());

        Ok(LedgerEntry {
            sequence,
            status: EntryStatus::Downloaded,
            thread_title: entry.thread_title,
            thread_url: entry.thread_url,
            attachment_url: entry.attachment_url,
            attachment_name: entry.attachment_name,
            recorded_at,
        })
    }

    fn get_or_set_base_url(&mut self, url: &str) -> StorageResult<String> {
        self.conn.execute(
            "INSERT OR IGNORE INTO ledger_config (key, value) VALUES (?1, ?2)",
            params![BASE_URL_KEY, url],
        )?;

        let stored: String = self.conn.query_row(
            "SELECT value FROM ledger_config WHERE key = ?1",
            params![BASE_URL_KEY],
            |row| row.get(0),
        )?;
        Ok(stored)
    }

    fn base_url(&self) -> StorageResult<Option<String>> {
        let stored = self
            .conn
            .query_row(
                "SELECT value FROM ledger_config WHERE key = ?1",
                params![BASE_URL_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored)
    }

    fn entries(&self) -> StorageResult<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, status, thread_title, thread_url, attachment_url, attachment_name, recorded_at
             FROM ledger_entries ORDER BY sequence ASC",
        )?;

        let rows = stmt
            .query_map([], entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(entry, status)| match EntryStatus::from_db_string(&status) {
                Some(status) => Ok(LedgerEntry { status, ..entry }),
                None => Err(StorageError::Corrupt(format!(
                    "sequence {} has unknown status '{}'",
                    entry.sequence, status
                ))),
            })
            .collect()
    }

    fn count_entries(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_threads(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT thread_url) FROM ledger_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
