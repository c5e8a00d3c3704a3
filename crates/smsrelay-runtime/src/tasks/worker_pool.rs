//! Bounded worker pool for remote relay attempts
//!
//! A fixed number of workers drain a bounded queue. Submission never waits:
//! when the queue is full the job is refused and the caller records a failed
//! attempt. Shutdown closes the queue, lets the workers finish everything
//! already queued and joins them.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use smsrelay_core::{RelayError, RelayResult, WorkerPoolConfig};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Unit of work run by the pool
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
    completed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Spawn the workers; must be called within a tokio runtime
    pub fn new(config: &WorkerPoolConfig) -> Self {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(capacity);
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let completed = Arc::new(AtomicU64::new(0));

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let completed = completed.clone();
                tokio::spawn(async move { run_worker(worker_id, receiver, completed).await })
            })
            .collect();

        debug!(workers, capacity, "Worker pool started");

        Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            capacity,
            completed,
        }
    }

    /// Queue a job without waiting
    pub fn submit(&self, job: Job) -> RelayResult<()> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| RelayError::Shutdown)?;
        let sender = guard.as_ref().ok_or(RelayError::Shutdown)?;

        sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RelayError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => RelayError::Shutdown,
        })
    }

    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Jobs finished so far
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting jobs, drain the queue and join all workers
    ///
    /// Returns the total number of jobs the pool completed.
    pub async fn shutdown(&self) -> u64 {
        let sender = self.sender.lock().ok().and_then(|mut guard| guard.take());
        drop(sender);

        let handles: Vec<_> = self
            .handles
            .lock()
            .map(|mut guard| guard.drain(..).collect())
            .unwrap_or_default();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Relay worker ended abnormally: {}", e);
            }
        }

        let completed = self.completed();
        info!(completed, "Worker pool stopped");
        completed
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("completed", &self.completed())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    completed: Arc<AtomicU64>,
) {
    loop {
        let job = { receiver.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        // Run on its own task so a panicking job cannot take the worker down
        if let Err(e) = tokio::spawn(job).await {
            warn!(worker_id, "Relay job panicked: {}", e);
        }
        completed.fetch_add(1, Ordering::SeqCst);
    }
    debug!(worker_id, "Relay worker exiting");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    fn config(workers: usize, queue_capacity: usize) -> WorkerPoolConfig {
        WorkerPoolConfig {
            workers,
            queue_capacity,
        }
    }

    #[tokio::test]
    async fn test_jobs_run_and_shutdown_drains() {
        let pool = WorkerPool::new(&config(2, 32));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let counter = counter.clone();
            pool.submit(Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }

        assert_eq!(pool.shutdown().await, 20);
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let pool = WorkerPool::new(&config(1, 1));
        let gate = Arc::new(Semaphore::new(0));

        // Occupy the single worker, then fill the single queue slot
        let mut accepted = 0;
        let mut rejected = 0;
        for _ in 0..5 {
            let gate = gate.clone();
            match pool.submit(Box::pin(async move {
                let _ = gate.acquire().await;
            })) {
                Ok(()) => accepted += 1,
                Err(RelayError::QueueFull { capacity }) => {
                    assert_eq!(capacity, 1);
                    rejected += 1;
                }
                Err(e) => panic!("unexpected error: {:?}", e),
            }
            tokio::task::yield_now().await;
        }

        assert!(accepted >= 1);
        assert!(rejected >= 1);
        assert_eq!(accepted + rejected, 5);

        gate.close();
        assert_eq!(pool.shutdown().await, accepted as u64);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(&config(1, 4));
        pool.shutdown().await;

        let result = pool.submit(Box::pin(async {}));
        assert!(matches!(result, Err(RelayError::Shutdown)));
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_worker() {
        let pool = WorkerPool::new(&config(1, 4));
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(Box::pin(async { panic!("job failure") })).unwrap();
        let c = counter.clone();
        pool.submit(Box::pin(async move {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        assert_eq!(pool.shutdown().await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
