//! Concurrency admission control
//!
//! Bounds how many compression tasks run at once. Submissions beyond the
//! limit queue in arrival order on the semaphore and are admitted as
//! running tasks finish. No priorities, no cancellation, no timeouts: a
//! hung task holds its slot indefinitely.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Admission throttle shared by all tasks in a cycle
#[derive(Debug, Clone)]
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: Arc<AtomicUsize>,
}

impl Throttle {
    /// Create a throttle admitting at most `limit` concurrent tasks
    ///
    /// A limit of zero is clamped to one; a throttle that admits nothing
    /// would deadlock the cycle.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Default admission limit: one slot per available CPU core
    #[must_use]
    pub fn default_limit() -> usize {
        num_cpus::get()
    }

    /// Run a unit of work under an admission slot
    ///
    /// Waits for a free slot (FIFO among waiters), runs the future, and
    /// releases the slot when it completes. Success and failure both
    /// release; the future's output passes through untouched.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        // Acquisition only fails on a closed semaphore; this one is owned
        // here and `close` is never called on it
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_closed) => unreachable!("throttle semaphore is never closed"),
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = task.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }

    /// Configured admission limit
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks currently holding a slot
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Self::default_limit())
    }
}
