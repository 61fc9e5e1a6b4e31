//! SQLite-backed host store
//!
//! A single connection guarded by a mutex. Point operations are short, so
//! workers serialise on the connection rather than each holding their own.

use crate::error::{StoreError, StoreResult};
use crate::host::{FileIndex, HostRecord, StaleHost};
use crate::store::{schema, HostStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How long a statement waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Host store persisted in a SQLite file
pub struct SqliteHostStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteHostStore {
    /// Open the database at `path`, creating the file and schema if missing
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let existed = schema::schema_exists(&conn)?;
        schema::create_schema(&conn)?;

        let expected = schema::SCHEMA_VERSION.to_string();
        let version = schema::store_info(&conn, schema::keys::SCHEMA_VERSION)?;
        if version.as_deref() != Some(expected.as_str()) {
            return Err(StoreError::OpenFailed {
                path: path.to_path_buf(),
                reason: format!(
                    "schema version {} not supported (expected {})",
                    version.as_deref().unwrap_or("unknown"),
                    expected
                ),
            });
        }

        if existed {
            debug!(path = %path.display(), "Opened host database");
        } else {
            info!(path = %path.display(), "Created host database");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file path (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Register a new, never-crawled host under a fresh key
    pub fn add_host(&self, name: &str) -> StoreResult<HostRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidRecord("host name is empty".into()));
        }

        let record = HostRecord::new(uuid::Uuid::new_v4().to_string(), name);
        self.put(&record)?;
        Ok(record)
    }

    /// Every host record, ordered by name
    pub fn list_hosts(&self) -> StoreResult<Vec<HostRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key, name, age, files FROM hosts ORDER BY name, key")?;
        let rows = stmt.query_map([], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode_row(row?)?);
        }
        Ok(records)
    }

    /// Records whose name matches exactly
    pub fn find_by_name(&self, name: &str) -> StoreResult<Vec<HostRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT key, name, age, files FROM hosts WHERE name = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![name], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode_row(row?)?);
        }
        Ok(records)
    }
}

impl HostStore for SqliteHostStore {
    fn ping(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<HostRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key, name, age, files FROM hosts WHERE key = ?1")?;
        let row = stmt.query_row(params![key], read_row).optional()?;
        row.map(decode_row).transpose()
    }

    fn put(&self, record: &HostRecord) -> StoreResult<()> {
        let files = serde_json::to_string(&record.files).map_err(|e| StoreError::Malformed {
            key: record.key.clone(),
            reason: e.to_string(),
        })?;

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO hosts (key, name, age, files) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                 name = excluded.name,
                 age = excluded.age,
                 files = excluded.files",
        )?;
        stmt.execute(params![
            record.key,
            record.name,
            record.age.map(|age| age.timestamp_millis()),
            files,
        ])?;
        Ok(())
    }

    fn query_stale(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<StaleHost>> {
        let conn = self.conn.lock();
        // NULL ages sort first, so never-crawled hosts lead
        let mut stmt = conn.prepare_cached(
            "SELECT key, name FROM hosts WHERE age IS NULL OR age < ?1 ORDER BY age, key",
        )?;
        let rows = stmt.query_map(params![threshold.timestamp_millis()], |row| {
            Ok(StaleHost {
                key: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        let mut stale = Vec::new();
        for row in rows {
            stale.push(row?);
        }
        Ok(stale)
    }
}

/// Raw columns of a hosts row
type RawHost = (String, Option<String>, Option<i64>, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawHost> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_row((key, name, age, files): RawHost) -> StoreResult<HostRecord> {
    let age = match age {
        Some(millis) => Some(DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StoreError::Malformed {
                key: key.clone(),
                reason: format!("age {} out of range", millis),
            }
        })?),
        None => None,
    };

    let files: FileIndex = serde_json::from_str(&files).map_err(|e| StoreError::Malformed {
        key: key.clone(),
        reason: e.to_string(),
    })?;

    Ok(HostRecord {
        key,
        name,
        age,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_roundtrip_keeps_millis() {
        let store = SqliteHostStore::open_in_memory().unwrap();
        let age = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();

        let mut record = HostRecord::new("h1", "srv01").with_age(age);
        record.files.insert("abc".into(), "public/a.txt".into());
        store.put(&record).unwrap();

        assert_eq!(store.get("h1").unwrap(), Some(record));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_put_replaces_files() {
        let store = SqliteHostStore::open_in_memory().unwrap();

        let mut record = HostRecord::new("h1", "srv01");
        record.files.insert("old".into(), "public/old.txt".into());
        store.put(&record).unwrap();

        record.files.clear();
        record.files.insert("new".into(), "public/new.txt".into());
        store.put(&record).unwrap();

        let loaded = store.get("h1").unwrap().unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert!(loaded.files.contains_key("new"));
    }

    #[test]
    fn test_query_stale() {
        let store = SqliteHostStore::open_in_memory().unwrap();
        let now = Utc::now();

        store
            .put(&HostRecord::new("fresh", "a").with_age(now - ChronoDuration::hours(1)))
            .unwrap();
        store
            .put(&HostRecord::new("old", "b").with_age(now - ChronoDuration::hours(10)))
            .unwrap();
        store.put(&HostRecord::new("never", "c")).unwrap();

        let stale = store.query_stale(now - ChronoDuration::hours(6)).unwrap();
        let keys: Vec<_> = stale.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["never", "old"]);
    }

    #[test]
    fn test_add_host() {
        let store = SqliteHostStore::open_in_memory().unwrap();

        let record = store.add_host("  srv01 ").unwrap();
        assert_eq!(record.name.as_deref(), Some("srv01"));
        assert!(record.age.is_none());

        let found = store.find_by_name("srv01").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, record.key);

        assert!(matches!(
            store.add_host(""),
            Err(StoreError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_open_creates_and_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hosts.db");

        {
            let store = SqliteHostStore::open(&path).unwrap();
            store.add_host("srv01").unwrap();
            store.ping().unwrap();
        }

        let store = SqliteHostStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.list_hosts().unwrap().len(), 1);
    }

    #[test]
    fn test_open_rejects_other_schema_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hosts.db");
        drop(SqliteHostStore::open(&path).unwrap());

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE store_info SET value = '99' WHERE key = ?1",
            params![schema::keys::SCHEMA_VERSION],
        )
        .unwrap();
        drop(conn);

        assert!(matches!(
            SqliteHostStore::open(&path),
            Err(StoreError::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no/such/dir/hosts.db");
        assert!(matches!(
            SqliteHostStore::open(&path),
            Err(StoreError::OpenFailed { .. })
        ));
    }
}
