//! Operation queue and background worker thread
//!
//! Producers append under a short mutex. A single worker thread swaps the
//! whole pending list out, releases the lock, and applies the operations in
//! FIFO order. `wait_for_empty` blocks until nothing is pending and the
//! worker is idle.

use crate::cache::DirCache;
use crate::worker::{Operation, Worker, WorkerStats};
use objdir_common::{Error, Result, WorkerConfig};
use objdir_store::KvStore;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// Worker thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for work
    Idle,
    /// Applying a swapped-out batch
    Draining,
    /// No worker thread running
    Stopped,
}

struct QueueState {
    pending: Vec<Operation>,
    state: WorkerState,
    stop: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    /// Signalled on enqueue and stop
    wake: Condvar,
    /// Signalled whenever the worker goes idle or stops
    drained: Condvar,
    worker: Worker,
}

/// FIFO of index operations drained by one background thread
pub struct OperationQueue {
    shared: Arc<Shared>,
    thread_name: String,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl OperationQueue {
    pub fn new(store: Arc<dyn KvStore>, cache: Arc<DirCache>, config: &WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    pending: Vec::new(),
                    state: WorkerState::Stopped,
                    stop: false,
                }),
                wake: Condvar::new(),
                drained: Condvar::new(),
                worker: Worker::new(store, cache),
            }),
            thread_name: config.thread_name.clone(),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker thread. Does nothing if it is already running.
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }

        {
            let mut queue = self.shared.queue.lock();
            queue.stop = false;
            queue.state = WorkerState::Idle;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run(&shared));

        match spawned {
            Ok(h) => {
                *handle = Some(h);
                Ok(())
            }
            Err(e) => {
                self.shared.queue.lock().state = WorkerState::Stopped;
                Err(Error::WorkerSpawn(e.to_string()))
            }
        }
    }

    /// Stop the worker after it drains everything already queued
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        {
            let mut queue = self.shared.queue.lock();
            queue.stop = true;
            self.shared.wake.notify_all();
        }

        if handle.join().is_err() {
            error!("Worker thread panicked");
            let mut queue = self.shared.queue.lock();
            queue.state = WorkerState::Stopped;
            self.shared.drained.notify_all();
        }
    }

    /// Append an operation and wake the worker
    pub fn enqueue(&self, op: Operation) {
        let mut queue = self.shared.queue.lock();
        queue.pending.push(op);
        self.shared.wake.notify_one();
    }

    /// Block until the queue is empty and the worker is idle.
    ///
    /// Returns immediately when no worker is running.
    pub fn wait_for_empty(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.state != WorkerState::Stopped
            && (!queue.pending.is_empty() || queue.state == WorkerState::Draining)
        {
            self.shared.drained.wait(&mut queue);
        }
        if !queue.pending.is_empty() {
            debug!(
                pending = queue.pending.len(),
                "wait_for_empty returned with no worker running"
            );
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.queue.lock().state
    }

    /// Operations waiting to be swapped out by the worker
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    pub fn stats(&self) -> &WorkerStats {
        self.shared.worker.stats()
    }
}

impl Drop for OperationQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &Shared) {
    info!("Index worker started");
    let mut queue = shared.queue.lock();
    loop {
        while !queue.pending.is_empty() {
            let batch = std::mem::take(&mut queue.pending);
            queue.state = WorkerState::Draining;
            debug!(operations = batch.len(), "draining operation queue");
            MutexGuard::unlocked(&mut queue, || {
                for op in batch {
                    shared.worker.process(op);
                }
            });
            queue.state = WorkerState::Idle;
        }
        shared.drained.notify_all();

        if queue.stop {
            break;
        }
        shared.wake.wait(&mut queue);
    }
    queue.state = WorkerState::Stopped;
    shared.drained.notify_all();
    drop(queue);
    info!("Index worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::AddItem;
    use objdir_common::DirCacheConfig;
    use objdir_store::MemoryStore;
    use std::sync::atomic::Ordering;

    fn queue_over(store: Arc<MemoryStore>) -> OperationQueue {
        let cache = Arc::new(DirCache::new(&DirCacheConfig::default()));
        OperationQueue::new(store, cache, &WorkerConfig::default())
    }

    fn add(path: &str) -> Operation {
        Operation::Add {
            batch: vec![AddItem::new(path, b"M".to_vec())],
        }
    }

    #[test]
    fn test_start_drain_stop() {
        let store = Arc::new(MemoryStore::new());
        let queue = queue_over(store.clone());
        assert_eq!(queue.state(), WorkerState::Stopped);

        queue.start().unwrap();
        queue.start().unwrap();
        for i in 0..50 {
            queue.enqueue(add(&format!("bucket/dir/f{i}")));
        }
        queue.wait_for_empty();

        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.state(), WorkerState::Idle);
        assert_eq!(store.len(), 52);
        assert_eq!(queue.stats().operations.load(Ordering::Relaxed), 50);

        queue.stop();
        assert_eq!(queue.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_fifo_order_add_then_delete() {
        let store = Arc::new(MemoryStore::new());
        let queue = queue_over(store.clone());
        queue.start().unwrap();

        queue.enqueue(add("bucket/a/f"));
        queue.enqueue(Operation::Delete {
            path: "bucket/a/f".to_string(),
            cascade: true,
        });
        queue.wait_for_empty();
        assert!(store.is_empty(), "left: {:?}", store.keys());
    }

    #[test]
    fn test_stop_drains_pending() {
        let store = Arc::new(MemoryStore::new());
        let queue = queue_over(store.clone());

        // Queued before the worker exists, then drained on start/stop
        for i in 0..10 {
            queue.enqueue(add(&format!("bucket/x{i}")));
        }
        queue.wait_for_empty();
        assert_eq!(queue.pending(), 10);

        queue.start().unwrap();
        queue.stop();
        assert_eq!(queue.pending(), 0);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_restart_after_stop() {
        let store = Arc::new(MemoryStore::new());
        let queue = queue_over(store.clone());
        queue.start().unwrap();
        queue.stop();

        queue.enqueue(add("bucket/y"));
        queue.start().unwrap();
        queue.wait_for_empty();
        assert!(store.contains(b"bucket/.y"));
    }

    #[test]
    fn test_concurrent_producers() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(queue_over(store.clone()));
        queue.start().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..25 {
                        queue.enqueue(add(&format!("bucket/t{t}/f{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        queue.wait_for_empty();

        // 100 objects plus head and tail for each of the four directories
        assert_eq!(store.len(), 108);
    }

    #[test]
    fn test_custom_thread_name() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(DirCache::new(&DirCacheConfig::default()));
        let config = WorkerConfig {
            thread_name: "dir-index-test".to_string(),
        };
        let queue = OperationQueue::new(store, cache, &config);
        queue.start().unwrap();

        let name = queue
            .handle
            .lock()
            .as_ref()
            .and_then(|h| h.thread().name().map(str::to_string));
        assert_eq!(name.as_deref(), Some("dir-index-test"));
    }
}
