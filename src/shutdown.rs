//! Cooperative shutdown
//!
//! Workers and the coordinator only look at the signal between work units,
//! so nothing is interrupted mid-crawl. Long sleeps are sliced so a stop
//! request is noticed quickly even with a 45 second poll interval.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep between shutdown checks
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Cloneable cancellation token
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown (idempotent)
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Sleep for `duration` unless shutdown is requested first
    ///
    /// Returns `true` if the full duration elapsed, `false` if woken by shutdown.
    /// A duration past the end of the clock sleeps until shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            self.wait();
            return false;
        };
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Block until shutdown is requested
    pub fn wait(&self) {
        while !self.is_triggered() {
            thread::sleep(SLEEP_SLICE);
        }
    }
}

/// Lifecycle of a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolState::Running => "running",
            PoolState::Stopping => "stopping",
            PoolState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Shared, lock-free view of a [`PoolState`]
#[derive(Debug, Clone)]
pub struct PoolStateCell {
    state: Arc<AtomicU8>,
}

impl PoolStateCell {
    pub fn new(state: PoolState) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(state as u8)),
        }
    }

    pub fn get(&self) -> PoolState {
        match self.state.load(Ordering::SeqCst) {
            0 => PoolState::Running,
            1 => PoolState::Stopping,
            _ => PoolState::Stopped,
        }
    }

    pub fn set(&self, state: PoolState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}
