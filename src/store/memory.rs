//! In-memory host store

use crate::error::StoreResult;
use crate::host::{HostKey, HostRecord, StaleHost};
use crate::store::HostStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Host store backed by a map
#[derive(Debug, Default)]
pub struct MemoryHostStore {
    records: Mutex<BTreeMap<HostKey, HostRecord>>,
}

impl MemoryHostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with `records`
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = HostRecord>,
    {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&self, record: HostRecord) {
        self.records.lock().insert(record.key.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of every record, ordered by key
    pub fn records(&self) -> Vec<HostRecord> {
        self.records.lock().values().cloned().collect()
    }
}

impl HostStore for MemoryHostStore {
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<HostRecord>> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn put(&self, record: &HostRecord) -> StoreResult<()> {
        self.insert(record.clone());
        Ok(())
    }

    fn query_stale(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<StaleHost>> {
        let records = self.records.lock();
        let mut stale: Vec<&HostRecord> = records
            .values()
            .filter(|record| record.is_stale(threshold))
            .collect();
        // None sorts before Some, so never-crawled hosts come first
        stale.sort_by(|a, b| a.age.cmp(&b.age).then_with(|| a.key.cmp(&b.key)));
        Ok(stale.into_iter().map(StaleHost::from).collect())
    }
}
