//! Claim queue shared by the coordinator and the workers
//!
//! Host keys move through two disjoint collections:
//!
//! ```text
//!   coordinator ──admit──▶ scheduled ──claim──▶ claimed ──release──▶ (eligible again)
//! ```
//!
//! Both collections sit behind a single mutex. `admit` checks membership in
//! both and inserts under one lock acquisition, and `claim` pops from
//! `scheduled` and inserts into `claimed` under one lock acquisition, so a
//! key is never scheduled twice and never owned by two workers at once.
//! The raw collections are never handed out.

use crate::host::HostKey;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for the claim queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Keys accepted into `scheduled`
    pub admitted: AtomicU64,

    /// Keys refused because they were already scheduled or claimed
    pub duplicates: AtomicU64,

    /// Keys moved from `scheduled` to `claimed`
    pub claimed: AtomicU64,

    /// Claims released
    pub released: AtomicU64,
}

impl QueueStats {
    pub fn admitted_count(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn duplicate_count(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn claimed_count(&self) -> u64 {
        self.claimed.load(Ordering::Relaxed)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct ClaimState {
    /// FIFO order of scheduled keys
    order: VecDeque<HostKey>,

    /// Membership mirror of `order`
    scheduled: HashSet<HostKey>,

    claimed: HashSet<HostKey>,

    /// Set once the pool starts stopping; admissions are refused afterwards
    closed: bool,
}

/// Scheduled/claimed host keys with the at-most-one-claim invariant
#[derive(Debug, Default)]
pub struct ClaimQueue {
    state: Mutex<ClaimState>,
    stats: QueueStats,
}

impl ClaimQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit keys into `scheduled`, skipping any already scheduled or claimed
    ///
    /// Returns the number of keys actually admitted. Nothing is admitted once
    /// the queue is closed.
    pub fn admit<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = HostKey>,
    {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }

        let mut admitted = 0;
        let mut duplicates = 0;
        for key in keys {
            if state.scheduled.contains(&key) || state.claimed.contains(&key) {
                duplicates += 1;
                continue;
            }
            state.scheduled.insert(key.clone());
            state.order.push_back(key);
            admitted += 1;
        }
        drop(state);

        self.stats.admitted.fetch_add(admitted as u64, Ordering::Relaxed);
        self.stats.duplicates.fetch_add(duplicates, Ordering::Relaxed);
        admitted
    }

    /// Claim the oldest scheduled key, if any
    ///
    /// The returned guard releases the claim when dropped.
    pub fn claim(&self) -> Option<Claim<'_>> {
        let mut state = self.state.lock();
        let key = state.order.pop_front()?;
        state.scheduled.remove(&key);
        state.claimed.insert(key.clone());
        drop(state);

        self.stats.claimed.fetch_add(1, Ordering::Relaxed);
        Some(Claim { queue: self, key })
    }

    fn release(&self, key: &str) {
        let removed = self.state.lock().claimed.remove(key);
        if removed {
            self.stats.released.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Refuse all further admissions
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.state.lock().scheduled.contains(key)
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        self.state.lock().claimed.contains(key)
    }

    /// Number of keys waiting to be claimed
    pub fn scheduled_len(&self) -> usize {
        self.state.lock().order.len()
    }

    /// Number of keys currently owned by workers
    pub fn claimed_len(&self) -> usize {
        self.state.lock().claimed.len()
    }

    /// Nothing scheduled and nothing claimed
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.order.is_empty() && state.claimed.is_empty()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

/// RAII ownership of one host key
///
/// Dropping the claim (including during unwinding) moves the key out of
/// `claimed`, making the host eligible for scheduling again.
#[derive(Debug)]
pub struct Claim<'a> {
    queue: &'a ClaimQueue,
    key: HostKey,
}

impl Claim<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.queue.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn keys(names: &[&str]) -> Vec<HostKey> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_admit_dedups_scheduled() {
        let queue = ClaimQueue::new();

        assert_eq!(queue.admit(keys(&["h1", "h2"])), 2);
        assert_eq!(queue.admit(keys(&["h1", "h2", "h3"])), 1);
        assert_eq!(queue.scheduled_len(), 3);
        assert_eq!(queue.stats().duplicate_count(), 2);
    }

    #[test]
    fn test_admit_dedups_within_batch() {
        let queue = ClaimQueue::new();
        assert_eq!(queue.admit(keys(&["h1", "h1", "h1"])), 1);
        assert_eq!(queue.scheduled_len(), 1);
    }

    #[test]
    fn test_claimed_key_not_readmitted() {
        let queue = ClaimQueue::new();
        queue.admit(keys(&["h1"]));

        let claim = queue.claim().unwrap();
        assert_eq!(claim.key(), "h1");
        assert!(queue.is_claimed("h1"));
        assert!(!queue.is_scheduled("h1"));

        // Still claimed: refused
        assert_eq!(queue.admit(keys(&["h1"])), 0);
        assert_eq!(queue.scheduled_len(), 0);

        drop(claim);
        assert!(!queue.is_claimed("h1"));

        // Released: eligible again
        assert_eq!(queue.admit(keys(&["h1"])), 1);
    }

    #[test]
    fn test_claim_fifo_and_empty() {
        let queue = ClaimQueue::new();
        assert!(queue.claim().is_none());

        queue.admit(keys(&["a", "b"]));
        let first = queue.claim().unwrap();
        let second = queue.claim().unwrap();
        assert_eq!(first.key(), "a");
        assert_eq!(second.key(), "b");
        assert!(queue.claim().is_none());
        assert_eq!(queue.claimed_len(), 2);
    }

    #[test]
    fn test_closed_queue_refuses_admission() {
        let queue = ClaimQueue::new();
        queue.admit(keys(&["h1"]));
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.admit(keys(&["h2"])), 0);

        // Already scheduled work can still be claimed and released
        let claim = queue.claim().unwrap();
        drop(claim);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_claim_released_on_panic() {
        let queue = Arc::new(ClaimQueue::new());
        queue.admit(keys(&["h1"]));

        let q = Arc::clone(&queue);
        let result = thread::spawn(move || {
            let _claim = q.claim().unwrap();
            panic!("crawl blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!queue.is_claimed("h1"));
        assert_eq!(queue.stats().released_count(), 1);
    }

    #[test]
    fn test_concurrent_claims_are_exclusive() {
        let queue = Arc::new(ClaimQueue::new());
        let total = 500;
        queue.admit((0..total).map(|i| format!("host-{i}")));

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut seen = Vec::new();
                    while let Some(claim) = queue.claim() {
                        assert!(!queue.is_scheduled(claim.key()));
                        seen.push(claim.key().to_string());
                    }
                    seen
                })
            })
            .collect();

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        let before = all.len();
        all.dedup();

        assert_eq!(before, total);
        assert_eq!(all.len(), total);
        assert!(queue.is_idle());
    }
}
