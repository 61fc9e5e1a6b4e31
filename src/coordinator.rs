//! Crawl coordinator - owns the worker pool and schedules stale hosts
//!
//! The coordinator is responsible for:
//! - Verifying the host store before anything is spawned
//! - Starting and stopping the worker pool
//! - Periodically admitting stale hosts into the claim queue
//! - Final statistics

use crate::config::{stale_threshold, CrawlConfig};
use crate::discovery::ShareDiscovery;
use crate::error::{CrawlerError, Result, WorkerError};
use crate::queue::ClaimQueue;
use crate::shutdown::{PoolState, PoolStateCell, ShutdownSignal};
use crate::store::HostStore;
use crate::worker::{aggregate_stats, PoolTotals, Worker, WorkerContext};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a finished crawler run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Worker totals
    pub totals: PoolTotals,

    /// Stale-host cycles run by the coordinator
    pub cycles: u64,

    /// Host keys admitted into the claim queue
    pub admitted: u64,

    /// Time between start and the end of stop
    pub duration: Duration,
}

impl CrawlSummary {
    /// Calculate hosts crawled per second
    pub fn hosts_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.totals.hosts_crawled as f64 / secs
        } else {
            0.0
        }
    }
}

/// Schedules stale hosts onto a pool of crawl workers
pub struct Coordinator {
    /// Configuration
    config: Arc<CrawlConfig>,

    store: Arc<dyn HostStore>,

    discovery: Arc<dyn ShareDiscovery>,

    /// Scheduled and claimed host keys
    queue: Arc<ClaimQueue>,

    /// Shutdown signal
    shutdown: ShutdownSignal,
}

impl Coordinator {
    /// Create a coordinator; nothing runs until [`Coordinator::start`]
    pub fn new(
        config: CrawlConfig,
        store: Arc<dyn HostStore>,
        discovery: Arc<dyn ShareDiscovery>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            store,
            discovery,
            queue: Arc::new(ClaimQueue::new()),
            shutdown: ShutdownSignal::new(),
        })
    }

    pub fn queue(&self) -> &Arc<ClaimQueue> {
        &self.queue
    }

    /// Get a clone of the shutdown signal (for signal handlers)
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run one stale-host cycle; returns the number of keys admitted
    pub fn poll_once(&self) -> usize {
        poll_stale(self.store.as_ref(), &self.queue, self.config.max_host_age)
    }

    /// Start the pool and the coordinator thread
    ///
    /// Fails without leaving any thread behind if the store cannot be reached
    /// or a thread cannot be spawned.
    pub fn start(self) -> Result<CrawlerHandle> {
        let started = Instant::now();

        self.store
            .ping()
            .map_err(|e| CrawlerError::StartupFailed {
                reason: format!("host store unreachable: {}", e),
            })?;

        info!(
            workers = self.config.thread_count,
            max_host_age_secs = self.config.max_host_age.as_secs(),
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Starting crawler"
        );

        let workers = self.spawn_workers()?;

        let cycles = Arc::new(AtomicU64::new(0));
        let poller = CoordinatorLoop {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            max_host_age: self.config.max_host_age,
            poll_interval: self.config.poll_interval,
            shutdown: self.shutdown.clone(),
            cycles: Arc::clone(&cycles),
        };

        let coordinator = match thread::Builder::new()
            .name("coordinator".into())
            .spawn(move || poller.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                self.shutdown.trigger();
                join_workers(workers);
                return Err(CrawlerError::StartupFailed {
                    reason: format!("failed to spawn coordinator thread: {}", e),
                });
            }
        };

        Ok(CrawlerHandle {
            queue: self.queue,
            shutdown: self.shutdown,
            state: PoolStateCell::new(PoolState::Running),
            coordinator: Some(coordinator),
            workers,
            cycles,
            started,
        })
    }

    /// Start, block until the shutdown signal fires, then stop
    pub fn run(self) -> Result<CrawlSummary> {
        let shutdown = self.shutdown.clone();
        let handle = self.start()?;

        shutdown.wait();
        info!("Shutdown signal received");

        handle.stop()
    }

    /// Spawn worker threads, tearing down the partial pool on failure
    fn spawn_workers(&self) -> Result<Vec<Worker>> {
        let ctx = WorkerContext {
            queue: Arc::clone(&self.queue),
            store: Arc::clone(&self.store),
            discovery: Arc::clone(&self.discovery),
        };

        let mut workers = Vec::with_capacity(self.config.thread_count);
        for id in 0..self.config.thread_count {
            match Worker::spawn(
                id,
                ctx.clone(),
                self.config.worker_poll_interval,
                self.shutdown.clone(),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    warn!(worker = id, error = %e, "Worker spawn failed, stopping started workers");
                    self.shutdown.trigger();
                    join_workers(workers);
                    return Err(CrawlerError::StartupFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(count = workers.len(), "Workers spawned");
        Ok(workers)
    }
}

/// Query stale hosts and admit them; a failed query counts as zero hosts
fn poll_stale(store: &dyn HostStore, queue: &ClaimQueue, max_host_age: Duration) -> usize {
    let threshold = stale_threshold(Utc::now(), max_host_age);

    let stale = match store.query_stale(threshold) {
        Ok(stale) => stale,
        Err(e) => {
            warn!(error = %e, "Stale host query failed, skipping cycle");
            return 0;
        }
    };

    let found = stale.len();
    let admitted = queue.admit(stale.into_iter().map(|host| host.key));

    if admitted > 0 {
        info!(
            stale = found,
            admitted = admitted,
            scheduled = queue.scheduled_len(),
            "Stale hosts admitted"
        );
    } else {
        debug!(stale = found, "No new stale hosts");
    }

    admitted
}

/// State moved onto the coordinator thread
struct CoordinatorLoop {
    store: Arc<dyn HostStore>,
    queue: Arc<ClaimQueue>,
    max_host_age: Duration,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
    cycles: Arc<AtomicU64>,
}

impl CoordinatorLoop {
    fn run(self) {
        debug!("Coordinator starting");

        // First cycle runs immediately
        while !self.shutdown.is_triggered() {
            poll_stale(self.store.as_ref(), &self.queue, self.max_host_age);
            self.cycles.fetch_add(1, Ordering::Relaxed);

            if !self.shutdown.sleep(self.poll_interval) {
                break;
            }
        }

        info!(
            cycles = self.cycles.load(Ordering::Relaxed),
            "Coordinator stopping"
        );
    }
}

/// Join workers, logging any that panicked
fn join_workers(mut workers: Vec<Worker>) -> Vec<Worker> {
    for worker in &mut workers {
        if let Err(e) = worker.join() {
            warn!(worker = worker.id(), error = %e, "Worker failed to join cleanly");
        }
    }
    workers
}

/// A running crawler
///
/// Dropping the handle without calling [`CrawlerHandle::stop`] signals
/// shutdown but does not wait for the threads.
pub struct CrawlerHandle {
    queue: Arc<ClaimQueue>,
    shutdown: ShutdownSignal,
    state: PoolStateCell,
    coordinator: Option<JoinHandle<()>>,
    workers: Vec<Worker>,
    cycles: Arc<AtomicU64>,
    started: Instant,
}

impl CrawlerHandle {
    pub fn state(&self) -> PoolState {
        self.state.get()
    }

    pub fn queue(&self) -> &Arc<ClaimQueue> {
        &self.queue
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Live worker totals
    pub fn totals(&self) -> PoolTotals {
        aggregate_stats(&self.workers)
    }

    /// Coordinator cycles completed so far
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Signal shutdown and wait for every thread to drain
    ///
    /// Crawls already in progress run to completion before this returns.
    pub fn stop(mut self) -> Result<CrawlSummary> {
        self.state.set(PoolState::Stopping);
        info!(state = %self.state.get(), "Stopping crawler");

        // Close before signalling so a cycle in flight cannot admit more keys
        self.queue.close();
        self.shutdown.trigger();

        if let Some(handle) = self.coordinator.take() {
            if handle.join().is_err() {
                warn!(
                    error = %WorkerError::CoordinatorPanicked,
                    "Coordinator failed to join cleanly"
                );
            }
        }

        let workers = join_workers(std::mem::take(&mut self.workers));
        let totals = aggregate_stats(&workers);

        let summary = CrawlSummary {
            totals,
            cycles: self.cycles.load(Ordering::Relaxed),
            admitted: self.queue.stats().admitted_count(),
            duration: self.started.elapsed(),
        };

        self.state.set(PoolState::Stopped);
        info!(
            crawled = summary.totals.hosts_crawled,
            skipped = summary.totals.hosts_skipped,
            failed = summary.totals.hosts_failed,
            files = summary.totals.files_indexed,
            cycles = summary.cycles,
            duration_secs = summary.duration.as_secs(),
            "Crawler stopped"
        );

        Ok(summary)
    }
}

impl Drop for CrawlerHandle {
    fn drop(&mut self) {
        if self.state.get() != PoolState::Stopped {
            self.queue.close();
            self.shutdown.trigger();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DiscoveryResult, StoreError, StoreResult};
    use crate::host::{HostRecord, StaleHost};
    use crate::store::MemoryHostStore;
    use chrono::DateTime;

    struct OneShare;

    impl ShareDiscovery for OneShare {
        fn list_shares(&self, _host: &str) -> DiscoveryResult<Vec<String>> {
            Ok(vec!["public".into()])
        }

        fn list_files(&self, _host: &str, _share: &str) -> DiscoveryResult<Vec<String>> {
            Ok(vec!["a.txt".into(), "b.txt".into()])
        }
    }

    /// Every call fails
    struct DownStore;

    impl HostStore for DownStore {
        fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn get(&self, _key: &str) -> StoreResult<Option<HostRecord>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn put(&self, _record: &HostRecord) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn query_stale(&self, _threshold: DateTime<Utc>) -> StoreResult<Vec<StaleHost>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    fn fast_config(threads: usize) -> CrawlConfig {
        CrawlConfig {
            thread_count: threads,
            poll_interval: Duration::from_millis(20),
            worker_poll_interval: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_validates_config() {
        let result = Coordinator::new(
            fast_config(0),
            Arc::new(MemoryHostStore::new()),
            Arc::new(OneShare),
        );
        assert!(matches!(result, Err(CrawlerError::Config(_))));
    }

    #[test]
    fn test_poll_once_admits_stale_once() {
        let now = Utc::now();
        let store = Arc::new(MemoryHostStore::with_records([
            HostRecord::new("old", "srv01").with_age(now - chrono::Duration::hours(10)),
            HostRecord::new("fresh", "srv02").with_age(now - chrono::Duration::hours(1)),
            HostRecord::new("never", "srv03"),
        ]));
        let coordinator = Coordinator::new(fast_config(1), store, Arc::new(OneShare)).unwrap();

        assert_eq!(coordinator.poll_once(), 2);
        assert!(coordinator.queue().is_scheduled("old"));
        assert!(coordinator.queue().is_scheduled("never"));
        assert!(!coordinator.queue().is_scheduled("fresh"));

        // Still scheduled, so nothing new
        assert_eq!(coordinator.poll_once(), 0);
        assert_eq!(coordinator.queue().scheduled_len(), 2);
    }

    #[test]
    fn test_poll_once_query_failure_is_zero() {
        let coordinator =
            Coordinator::new(fast_config(1), Arc::new(DownStore), Arc::new(OneShare)).unwrap();
        assert_eq!(coordinator.poll_once(), 0);
        assert!(coordinator.queue().is_idle());
    }

    #[test]
    fn test_start_fails_when_store_down() {
        let coordinator =
            Coordinator::new(fast_config(4), Arc::new(DownStore), Arc::new(OneShare)).unwrap();
        let queue = Arc::clone(coordinator.queue());

        let result = coordinator.start();
        assert!(matches!(result, Err(CrawlerError::StartupFailed { .. })));
        assert_eq!(queue.stats().claimed_count(), 0);
    }

    #[test]
    fn test_start_crawls_then_stops() {
        let store = Arc::new(MemoryHostStore::with_records([
            HostRecord::new("h1", "srv01"),
            HostRecord::new("h2", "srv02"),
        ]));
        let coordinator =
            Coordinator::new(fast_config(2), store.clone(), Arc::new(OneShare)).unwrap();

        let handle = coordinator.start().unwrap();
        assert_eq!(handle.state(), PoolState::Running);
        assert_eq!(handle.worker_count(), 2);

        let deadline = Instant::now() + Duration::from_secs(10);
        while handle.totals().hosts_crawled < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let queue = Arc::clone(handle.queue());
        let summary = handle.stop().unwrap();
        assert!(summary.totals.hosts_crawled >= 2);
        assert!(summary.totals.files_indexed >= 4);
        assert!(summary.cycles >= 1);
        assert!(summary.admitted >= 2);

        assert!(queue.is_closed());
        assert!(queue.is_idle());
        assert_eq!(queue.admit(["h1".to_string()]), 0);
        assert!(store.records().iter().all(|r| r.files.len() == 2));
    }

    #[test]
    fn test_run_returns_on_shutdown() {
        let coordinator = Coordinator::new(
            fast_config(1),
            Arc::new(MemoryHostStore::new()),
            Arc::new(OneShare),
        )
        .unwrap();
        let shutdown = coordinator.shutdown_signal();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            shutdown.trigger();
        });

        let summary = coordinator.run().unwrap();
        trigger.join().unwrap();
        assert_eq!(summary.totals, PoolTotals::default());
        assert!(summary.cycles >= 1);
    }

    #[test]
    fn test_hosts_per_second() {
        let summary = CrawlSummary {
            totals: PoolTotals {
                hosts_crawled: 50,
                ..Default::default()
            },
            cycles: 3,
            admitted: 50,
            duration: Duration::from_secs(10),
        };
        assert!((summary.hosts_per_second() - 5.0).abs() < 0.01);
    }
}
