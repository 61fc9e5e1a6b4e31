//! share-crawler - Periodic re-indexer for network file shares
//!
//! Keeps a per-host index of every file on a host's shares. Each host record
//! carries the time it was last crawled; once that is older than
//! `max_host_age` the host is scheduled, a worker lists all of its shares and
//! files, and the refreshed index is written back.
//!
//! # Features
//!
//! - **Claim Queue**: stale hosts are admitted at most once, and a host is
//!   crawled by at most one worker at a time.
//!
//! - **Graceful Degradation**: unreachable hosts and unreadable shares shrink
//!   the index instead of failing the crawl; the next cycle is the retry.
//!
//! - **Cooperative Shutdown**: in-flight crawls always complete before the
//!   pool stops.
//!
//! - **SQLite Store**: host records live in a single SQLite file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Host Store (SQLite)                          │
//! └──────────────┬───────────────────────────────────▲──────────────┘
//!                │ query_stale                       │ get / put
//!                ▼                                   │
//! ┌──────────────────────────┐                       │
//! │   Coordinator thread     │                       │
//! │  - every poll_interval   │                       │
//! └────────────┬─────────────┘                       │
//!              │ admit                               │
//!              ▼                                     │
//! ┌──────────────────────────┐         ┌─────────────┴─────────────┐
//! │      Claim Queue         │  claim  │      Worker Threads        │
//! │  scheduled | claimed     │────────▶│  crawler-0 ... crawler-N   │
//! └──────────────────────────┘         └─────────────┬─────────────┘
//!                                                    │ list_shares / list_files
//!                                                    ▼
//!                                      ┌───────────────────────────┐
//!                                      │     Share Discovery       │
//!                                      └───────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! share-crawler add srv01 srv02
//! share-crawler crawl --share-root /mnt/shares -t 8
//! share-crawler hosts --stale
//! ```

pub mod config;
pub mod coordinator;
pub mod crawl;
pub mod discovery;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod queue;
pub mod report;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use config::{CliArgs, CrawlConfig};
pub use coordinator::{Coordinator, CrawlSummary, CrawlerHandle};
pub use discovery::{MountedShares, ShareDiscovery};
pub use error::{CrawlerError, Result};
pub use host::{HostKey, HostRecord, StaleHost};
pub use queue::ClaimQueue;
pub use shutdown::{PoolState, ShutdownSignal};
pub use store::{HostStore, MemoryHostStore, SqliteHostStore};
