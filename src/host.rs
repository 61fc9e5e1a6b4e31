//! Host records and stale-host query results

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Document-store identity of a host
pub type HostKey = String;

/// File index of a host: fingerprint -> qualified path
pub type FileIndex = BTreeMap<String, String>;

/// One crawl target and its last-known file listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    /// Stable key assigned by the store
    pub key: HostKey,

    /// Host identifier used to address the host for discovery
    pub name: Option<String>,

    /// Completion time of the last crawl (None = never crawled)
    pub age: Option<DateTime<Utc>>,

    /// Fingerprint of the qualified path -> qualified path
    pub files: FileIndex,
}

impl HostRecord {
    /// Create a never-crawled record
    pub fn new(key: impl Into<HostKey>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: Some(name.into()),
            age: None,
            files: FileIndex::new(),
        }
    }

    /// Set the crawl age (builder style, mostly for seeding)
    pub fn with_age(mut self, age: DateTime<Utc>) -> Self {
        self.age = Some(age);
        self
    }

    /// The name to crawl, if the record has a usable one
    ///
    /// Absent, empty and whitespace-only names all count as missing.
    pub fn crawl_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Whether the record is due for a crawl at `threshold`
    pub fn is_stale(&self, threshold: DateTime<Utc>) -> bool {
        match self.age {
            Some(age) => age < threshold,
            None => true,
        }
    }

    /// Replace the file index and stamp the crawl time
    pub fn refresh(&mut self, files: FileIndex, now: DateTime<Utc>) {
        self.files = files;
        self.age = Some(now);
    }
}

/// Row returned by the stale-host query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleHost {
    pub key: HostKey,
    pub name: Option<String>,
}

impl From<&HostRecord> for StaleHost {
    fn from(record: &HostRecord) -> Self {
        Self {
            key: record.key.clone(),
            name: record.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_crawl_name() {
        let mut record = HostRecord::new("h1", "srv01");
        assert_eq!(record.crawl_name(), Some("srv01"));

        record.name = Some(String::new());
        assert_eq!(record.crawl_name(), None);

        record.name = Some("   ".into());
        assert_eq!(record.crawl_name(), None);

        record.name = None;
        assert_eq!(record.crawl_name(), None);
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let threshold = now - Duration::hours(6);

        let never = HostRecord::new("h1", "srv01");
        assert!(never.is_stale(threshold));

        let old = HostRecord::new("h2", "srv02").with_age(now - Duration::hours(10));
        assert!(old.is_stale(threshold));

        let fresh = HostRecord::new("h3", "srv03").with_age(now - Duration::hours(1));
        assert!(!fresh.is_stale(threshold));
    }

    #[test]
    fn test_refresh_replaces_files() {
        let mut record = HostRecord::new("h1", "srv01");
        record.files.insert("old".into(), "public/gone.txt".into());

        let mut files = FileIndex::new();
        files.insert("new".into(), "public/a.txt".into());

        let now = Utc::now();
        record.refresh(files, now);

        assert_eq!(record.files.len(), 1);
        assert!(!record.files.contains_key("old"));
        assert_eq!(record.age, Some(now));
    }
}
