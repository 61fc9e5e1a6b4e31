//! SQLite schema for the host store

use crate::error::StoreResult;
use rusqlite::{params, Connection, OptionalExtension};

/// Current schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// One row per host. `age` is unix milliseconds, NULL until the first crawl.
/// `files` is a JSON object of fingerprint -> qualified path.
const CREATE_HOSTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS hosts (
    key TEXT PRIMARY KEY,
    name TEXT,
    age INTEGER,
    files TEXT NOT NULL DEFAULT '{}'
)
"#;

/// Key/value metadata about the store itself
const CREATE_STORE_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS store_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// The stale-host query scans by age
const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_hosts_age ON hosts(age)",
    "CREATE INDEX IF NOT EXISTS idx_hosts_name ON hosts(name)",
];

/// Workers write concurrently with the coordinator's reads
const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#;

/// Metadata keys
pub mod keys {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const CREATED_AT: &str = "created_at";
}

/// Whether the hosts table already exists
pub fn schema_exists(conn: &Connection) -> StoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'hosts'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Configure the connection and create any missing tables and indexes
pub fn create_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(PRAGMAS)?;

    conn.execute(CREATE_HOSTS_TABLE, [])?;
    conn.execute(CREATE_STORE_INFO_TABLE, [])?;
    for sql in CREATE_INDEXES {
        conn.execute(sql, [])?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO store_info (key, value) VALUES (?1, ?2)",
        params![keys::SCHEMA_VERSION, SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO store_info (key, value) VALUES (?1, ?2)",
        params![keys::CREATED_AT, chrono::Utc::now().to_rfc3339()],
    )?;

    Ok(())
}

/// Read a metadata value
pub fn store_info(conn: &Connection, key: &str) -> StoreResult<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM store_info WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}
