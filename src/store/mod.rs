//! Document store for host records
//!
//! The crawler only needs point reads, point writes and the stale-host
//! query. Two backends are provided:
//! - `SqliteHostStore`: the durable store used by the CLI
//! - `MemoryHostStore`: a map behind a mutex, for tests and benchmarks
//!
//! Point operations are atomic from the crawler's point of view. A
//! `get` followed by a `put` is not; a record changed externally between the
//! two is overwritten.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryHostStore;
pub use sqlite::SqliteHostStore;

use crate::error::StoreResult;
use crate::host::{HostRecord, StaleHost};
use chrono::{DateTime, Utc};

/// Client interface to the host document store
pub trait HostStore: Send + Sync {
    /// Check that the store is reachable
    fn ping(&self) -> StoreResult<()>;

    /// Load one host record
    fn get(&self, key: &str) -> StoreResult<Option<HostRecord>>;

    /// Insert or replace a host record, keyed by `record.key`
    fn put(&self, record: &HostRecord) -> StoreResult<()>;

    /// Every host whose age is older than `threshold` (or unset), oldest first
    fn query_stale(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<StaleHost>>;
}
