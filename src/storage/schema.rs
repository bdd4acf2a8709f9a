//! Database schema definitions
//!
//! This module contains the SQL schema for the Forum-Archiver ledger.

/// Key of the crawl's base listing URL in `ledger_config`
pub const BASE_URL_KEY: &str = "base_url";

/// SQL schema for the ledger database
pub const SCHEMA_SQL: &str = r#"
-- One row per downloaded attachment; rows are only ever appended
CREATE TABLE IF NOT EXISTS ledger_entries (
    sequence INTEGER NOT NULL UNIQUE,
    status TEXT NOT NULL,
    thread_title TEXT NOT NULL,
    thread_url TEXT NOT NULL,
    attachment_url TEXT NOT NULL UNIQUE,
    attachment_name TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_entries_thread ON ledger_entries(thread_url);

-- Hidden configuration slots (crawl base URL)
CREATE TABLE IF NOT EXISTS ledger_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
