//! Insert coalescing
//!
//! Groups bursts of adds into batch operations. Adds arriving within the
//! quiescence window of the previous one are merged into the committed
//! batch and the timer is pushed back. A batch is emitted when the window
//! elapses with no new adds, or immediately once it reaches the size cap.
//!
//! The timer is a deadline owned by the staging state. The flusher thread
//! sleeps until that deadline; cancelling or rescheduling is a plain write
//! under the same lock, so a stale timer can never fire.

use crate::queue::OperationQueue;
use crate::worker::{AddItem, Operation};
use objdir_common::{CoalesceConfig, Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

/// Coalescer counters
#[derive(Debug, Default)]
pub struct CoalesceStats {
    /// Adds submitted
    pub submitted: AtomicU64,
    /// Batches handed to the operation queue
    pub batches: AtomicU64,
    /// Batches emitted because they hit the size cap
    pub size_flushes: AtomicU64,
    /// Batches emitted by the timer
    pub timer_flushes: AtomicU64,
}

#[derive(Default)]
struct Staging {
    incoming: Vec<AddItem>,
    committed: Vec<AddItem>,
    last_scheduled: Option<Instant>,
    deadline: Option<Instant>,
    shutdown: bool,
}

impl Staging {
    fn merge_incoming(&mut self) {
        if self.committed.is_empty() {
            std::mem::swap(&mut self.committed, &mut self.incoming);
        } else {
            self.committed.append(&mut self.incoming);
        }
    }
}

struct Inner {
    staging: Mutex<Staging>,
    timer: Condvar,
    queue: Arc<OperationQueue>,
    window: Duration,
    max_batch: usize,
    stats: CoalesceStats,
}

impl Inner {
    /// Emit whatever is staged. Caller holds the staging lock.
    fn flush_staged(&self, staging: &mut Staging) -> usize {
        staging.deadline = None;
        staging.merge_incoming();
        let batch = std::mem::take(&mut staging.committed);
        let len = batch.len();
        if len > 0 {
            self.stats.batches.fetch_add(1, Ordering::Relaxed);
            trace!(len, "emitting add batch");
            self.queue.enqueue(Operation::Add { batch });
        }
        len
    }
}

/// Debounces adds into batches for the operation queue
pub struct Coalescer {
    inner: Arc<Inner>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Coalescer {
    pub fn new(queue: Arc<OperationQueue>, config: &CoalesceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                staging: Mutex::new(Staging::default()),
                timer: Condvar::new(),
                queue,
                window: config.window(),
                max_batch: config.max_batch_size.max(1),
                stats: CoalesceStats::default(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the flusher thread
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }
        self.inner.staging.lock().shutdown = false;

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("objdir-coalesce".to_string())
            .spawn(move || run_flusher(&inner));
        *handle = Some(spawned.map_err(|e| Error::WorkerSpawn(e.to_string()))?);
        Ok(())
    }

    /// Stage one add
    pub fn submit(&self, item: AddItem) {
        let inner = &self.inner;
        inner.stats.submitted.fetch_add(1, Ordering::Relaxed);

        let mut staging = inner.staging.lock();
        staging.incoming.push(item);

        let now = Instant::now();
        let within_window = staging
            .last_scheduled
            .is_some_and(|at| now.duration_since(at) < inner.window);

        if within_window {
            staging.deadline = None;
            staging.merge_incoming();
        } else if staging.committed.is_empty() {
            staging.merge_incoming();
        }

        if staging.committed.len() >= inner.max_batch {
            inner.stats.size_flushes.fetch_add(1, Ordering::Relaxed);
            let batch = std::mem::take(&mut staging.committed);
            staging.deadline = None;
            inner.stats.batches.fetch_add(1, Ordering::Relaxed);
            debug!(len = batch.len(), "add batch full, flushing");
            inner.queue.enqueue(Operation::Add { batch });
            return;
        }

        staging.last_scheduled = Some(now);
        staging.deadline = Some(now + inner.window);
        inner.timer.notify_one();
    }

    /// Emit everything staged now. Returns the number of adds emitted.
    pub fn flush(&self) -> usize {
        let mut staging = self.inner.staging.lock();
        self.inner.flush_staged(&mut staging)
    }

    /// Flush and stop the flusher thread
    pub fn stop(&self) {
        {
            let mut staging = self.inner.staging.lock();
            self.inner.flush_staged(&mut staging);
            staging.shutdown = true;
            self.inner.timer.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("Coalescer thread panicked");
            }
        }
    }

    /// Adds staged but not yet emitted
    pub fn staged(&self) -> usize {
        let staging = self.inner.staging.lock();
        staging.incoming.len() + staging.committed.len()
    }

    pub fn stats(&self) -> &CoalesceStats {
        &self.inner.stats
    }
}

impl Drop for Coalescer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_flusher(inner: &Inner) {
    info!("Coalescer started, window {:?}", inner.window);
    let mut staging = inner.staging.lock();
    while !staging.shutdown {
        let deadline = staging.deadline;
        match deadline {
            None => inner.timer.wait(&mut staging),
            Some(deadline) if Instant::now() >= deadline => {
                if inner.flush_staged(&mut staging) > 0 {
                    inner.stats.timer_flushes.fetch_add(1, Ordering::Relaxed);
                }
            }
            Some(deadline) => {
                inner.timer.wait_until(&mut staging, deadline);
            }
        }
    }
    drop(staging);
    info!("Coalescer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DirCache;
    use objdir_common::{DirCacheConfig, WorkerConfig};
    use objdir_store::MemoryStore;

    fn setup(
        window_ms: u64,
        max_batch_size: usize,
    ) -> (Arc<MemoryStore>, Arc<OperationQueue>, Coalescer) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(DirCache::new(&DirCacheConfig::default()));
        let queue = Arc::new(OperationQueue::new(
            store.clone(),
            cache,
            &WorkerConfig::default(),
        ));
        let coalescer = Coalescer::new(
            Arc::clone(&queue),
            &CoalesceConfig {
                window_ms,
                max_batch_size,
            },
        );
        (store, queue, coalescer)
    }

    fn item(i: usize) -> AddItem {
        AddItem::new(format!("bucket/f{i}"), b"M".to_vec())
    }

    #[test]
    fn test_burst_becomes_one_batch() {
        // No worker running, so emitted batches stay visible in the queue
        let (_store, queue, coalescer) = setup(200, 128);
        coalescer.start().unwrap();

        for i in 0..10 {
            coalescer.submit(item(i));
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(coalescer.staged(), 10);

        thread::sleep(Duration::from_millis(600));
        assert_eq!(queue.pending(), 1);
        assert_eq!(coalescer.staged(), 0);
        assert_eq!(coalescer.stats().timer_flushes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_size_cap_flushes_immediately() {
        let (_store, queue, coalescer) = setup(10_000, 4);

        for i in 0..4 {
            coalescer.submit(item(i));
        }
        assert_eq!(queue.pending(), 1);
        assert_eq!(coalescer.staged(), 0);
        assert_eq!(coalescer.stats().size_flushes.load(Ordering::Relaxed), 1);

        coalescer.submit(item(4));
        assert_eq!(coalescer.staged(), 1);
    }

    #[test]
    fn test_manual_flush() {
        let (_store, queue, coalescer) = setup(10_000, 128);
        assert_eq!(coalescer.flush(), 0);
        assert_eq!(queue.pending(), 0);

        coalescer.submit(item(0));
        coalescer.submit(item(1));
        assert_eq!(coalescer.flush(), 2);
        assert_eq!(queue.pending(), 1);
    }

    #[test]
    fn test_add_outside_window_keeps_committed_batch() {
        // Zero window: every add arrives outside the window of the last one
        let (_store, queue, coalescer) = setup(0, 128);

        coalescer.submit(item(0));
        assert_eq!(coalescer.staged(), 1);
        coalescer.submit(item(1));
        assert_eq!(coalescer.staged(), 2);
        assert_eq!(queue.pending(), 0);

        assert_eq!(coalescer.flush(), 2);
        assert_eq!(queue.pending(), 1);
        assert_eq!(coalescer.staged(), 0);
    }

    #[test]
    fn test_stop_flushes_and_worker_applies() {
        let (store, queue, coalescer) = setup(10_000, 128);
        queue.start().unwrap();
        coalescer.start().unwrap();

        for i in 0..3 {
            coalescer.submit(item(i));
        }
        coalescer.stop();
        queue.wait_for_empty();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_separate_bursts() {
        let (_store, queue, coalescer) = setup(50, 128);
        coalescer.start().unwrap();

        coalescer.submit(item(0));
        thread::sleep(Duration::from_millis(300));
        coalescer.submit(item(1));
        thread::sleep(Duration::from_millis(300));

        assert_eq!(queue.pending(), 2);
        assert_eq!(coalescer.stats().batches.load(Ordering::Relaxed), 2);
    }
}
