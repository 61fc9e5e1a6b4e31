//! Worker thread logic for the crawl pool
//!
//! Each worker:
//! - Polls the claim queue every `worker_poll_interval`
//! - Claims at most one host per tick
//! - Loads the host record, crawls it and writes it back
//! - Releases the claim whatever happened
//!
//! Shutdown is only checked between ticks, so a crawl in progress always
//! runs to completion before the thread exits.

use crate::crawl::crawl_host;
use crate::discovery::ShareDiscovery;
use crate::error::{CrawlOutcome, SkipReason, WorkerError};
use crate::queue::ClaimQueue;
use crate::shutdown::ShutdownSignal;
use crate::store::HostStore;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Hosts crawled and written back
    pub hosts_crawled: AtomicU64,

    /// Claims skipped (missing name, vanished record)
    pub hosts_skipped: AtomicU64,

    /// Claims whose load or write-back failed
    pub hosts_failed: AtomicU64,

    /// Files indexed across all crawls
    pub files_indexed: AtomicU64,

    /// Shares that failed to list
    pub shares_failed: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &CrawlOutcome) {
        match outcome {
            CrawlOutcome::Crawled {
                files,
                failed_shares,
                ..
            } => {
                self.hosts_crawled.fetch_add(1, Ordering::Relaxed);
                self.files_indexed.fetch_add(*files as u64, Ordering::Relaxed);
                self.shares_failed
                    .fetch_add(*failed_shares as u64, Ordering::Relaxed);
            }
            CrawlOutcome::Skipped { .. } => {
                self.hosts_skipped.fetch_add(1, Ordering::Relaxed);
            }
            CrawlOutcome::Failed { .. } => {
                self.hosts_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Everything a worker needs to process claims
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: Arc<ClaimQueue>,
    pub store: Arc<dyn HostStore>,
    pub discovery: Arc<dyn ShareDiscovery>,
}

/// A worker thread that crawls claimed hosts
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: WorkerContext,
        poll_interval: Duration,
        shutdown: ShutdownSignal,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("crawler-{}", id))
            .spawn(move || worker_loop(id, ctx, poll_interval, shutdown, stats_clone))
            .map_err(|e| WorkerError::SpawnFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Wait for the worker to finish
    ///
    /// Statistics stay readable after joining. Joining twice is a no-op.
    pub fn join(&mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    ctx: WorkerContext,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
    stats: Arc<WorkerStats>,
) {
    debug!(worker = id, "Worker starting");

    while !shutdown.is_triggered() {
        if let Some(outcome) = process_next(id, &ctx) {
            stats.record(&outcome);
        }
        shutdown.sleep(poll_interval);
    }

    info!(
        worker = id,
        crawled = stats.hosts_crawled.load(Ordering::Relaxed),
        failed = stats.hosts_failed.load(Ordering::Relaxed),
        "Worker stopping"
    );
}

/// Claim one scheduled host and process it
///
/// Returns `None` when nothing was scheduled. The claim is released before
/// this returns, whatever the outcome.
pub fn process_next(worker_id: usize, ctx: &WorkerContext) -> Option<CrawlOutcome> {
    let claim = ctx.queue.claim()?;
    let key = claim.key().to_string();
    debug!(worker = worker_id, host_key = %key, "Claimed host");

    let outcome = process_host(worker_id, ctx, &key);

    match &outcome {
        CrawlOutcome::Crawled {
            files,
            failed_shares,
            ..
        } => {
            info!(
                worker = worker_id,
                host_key = %key,
                files = files,
                failed_shares = failed_shares,
                "Host crawled"
            );
        }
        CrawlOutcome::Skipped { reason, .. } => {
            warn!(worker = worker_id, host_key = %key, reason = %reason, "Host skipped");
        }
        CrawlOutcome::Failed { error, .. } if error.is_transport() => {
            error!(worker = worker_id, host_key = %key, error = %error, "Host crawl failed");
        }
        CrawlOutcome::Failed { error, .. } => {
            warn!(
                worker = worker_id,
                host_key = %key,
                error = %error,
                "Malformed host record, skipping"
            );
        }
    }

    drop(claim);
    Some(outcome)
}

/// Load, crawl and write back one host
fn process_host(worker_id: usize, ctx: &WorkerContext, key: &str) -> CrawlOutcome {
    let record = match ctx.store.get(key) {
        Ok(Some(record)) => record,
        Ok(None) => {
            return CrawlOutcome::Skipped {
                key: key.to_string(),
                reason: SkipReason::NotFound,
            }
        }
        Err(error) => {
            return CrawlOutcome::Failed {
                key: key.to_string(),
                error,
            }
        }
    };

    let Some(host) = record.crawl_name().map(str::to_string) else {
        return CrawlOutcome::Skipped {
            key: key.to_string(),
            reason: SkipReason::MissingName,
        };
    };

    debug!(worker = worker_id, host_key = %key, host = %host, "Crawling host");

    match crawl_host(
        ctx.store.as_ref(),
        ctx.discovery.as_ref(),
        record,
        &host,
        Utc::now(),
    ) {
        Ok(scan) => CrawlOutcome::Crawled {
            key: key.to_string(),
            files: scan.files.len(),
            failed_shares: scan.shares_failed,
        },
        Err(error) => CrawlOutcome::Failed {
            key: key.to_string(),
            error,
        },
    }
}

/// Totals across a set of workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub hosts_crawled: u64,
    pub hosts_skipped: u64,
    pub hosts_failed: u64,
    pub files_indexed: u64,
    pub shares_failed: u64,
}

/// Aggregate statistics from multiple workers
pub fn aggregate_stats(workers: &[Worker]) -> PoolTotals {
    let mut totals = PoolTotals::default();

    for worker in workers {
        totals.hosts_crawled += worker.stats.hosts_crawled.load(Ordering::Relaxed);
        totals.hosts_skipped += worker.stats.hosts_skipped.load(Ordering::Relaxed);
        totals.hosts_failed += worker.stats.hosts_failed.load(Ordering::Relaxed);
        totals.files_indexed += worker.stats.files_indexed.load(Ordering::Relaxed);
        totals.shares_failed += worker.stats.shares_failed.load(Ordering::Relaxed);
    }

    totals
}
