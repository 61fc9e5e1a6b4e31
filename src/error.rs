//! Error types for share-crawler
//!
//! This module defines the error hierarchy for the crawler:
//! - Document store errors (SQLite and in-memory backends)
//! - Share discovery errors
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Only startup failures are fatal. Everything a worker or the coordinator
//! hits while running is logged and absorbed; the next stale-host cycle is
//! the retry mechanism.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the crawler
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Share discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pool could not be brought up
    #[error("Crawler failed to start: {reason}")]
    StartupFailed { reason: String },
}

/// Document store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open or create the database file
    #[error("Failed to open database at '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// Stored document could not be decoded or encoded
    #[error("Malformed document '{key}': {reason}")]
    Malformed { key: String, reason: String },

    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Rejected write
    #[error("Invalid host record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Check if this error is a transport-level failure (as opposed to a bad document)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(_) | StoreError::OpenFailed { .. } | StoreError::Unavailable(_)
        )
    }
}

/// Share discovery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Host could not be reached or has no share namespace
    #[error("Host '{host}' unreachable: {reason}")]
    HostUnreachable { host: String, reason: String },

    /// A single share could not be listed
    #[error("Failed to list share '{share}' on '{host}': {reason}")]
    ShareUnreadable {
        host: String,
        share: String,
        reason: String,
    },

    /// The remote side answered with something unusable
    #[error("Invalid response from '{host}': {reason}")]
    InvalidResponse { host: String, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid thread count {count}: must be between 1 and {max}")]
    InvalidThreadCount { count: usize, max: usize },

    /// Duration string could not be parsed or is zero
    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Database path error
    #[error("Invalid database path '{path}': {reason}")]
    InvalidDatabasePath { path: PathBuf, reason: String },

    /// Share root does not exist
    #[error("Invalid share root '{path}': {reason}")]
    InvalidShareRoot { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Thread could not be spawned
    #[error("Failed to spawn worker {id}: {reason}")]
    SpawnFailed { id: usize, reason: String },

    /// Coordinator thread panicked
    #[error("Coordinator thread panicked")]
    CoordinatorPanicked,
}

/// Result type alias for CrawlerError
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for StoreError
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for DiscoveryError
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Why a claimed host was not crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Record has no usable name
    MissingName,

    /// Record vanished between scheduling and claiming
    NotFound,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingName => write!(f, "host record has no name"),
            SkipReason::NotFound => write!(f, "host record not found"),
        }
    }
}

/// Represents the outcome of processing a single claimed host
#[derive(Debug)]
pub enum CrawlOutcome {
    /// Crawl finished and the record was written back
    Crawled {
        key: String,
        files: usize,
        failed_shares: usize,
    },

    /// Claimed but not processed
    Skipped { key: String, reason: SkipReason },

    /// Load or write-back failed
    Failed { key: String, error: StoreError },
}

impl CrawlOutcome {
    /// Returns true if this outcome represents a completed crawl
    pub fn is_crawled(&self) -> bool {
        matches!(self, CrawlOutcome::Crawled { .. })
    }

    /// Returns the host key associated with this outcome
    pub fn key(&self) -> &str {
        match self {
            CrawlOutcome::Crawled { key, .. } => key,
            CrawlOutcome::Skipped { key, .. } => key,
            CrawlOutcome::Failed { key, .. } => key,
        }
    }
}
