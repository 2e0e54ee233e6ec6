//! A small general-purpose worker pool.
//!
//! The only consumer inside the core is the render queue, which runs a
//! single worker so that all canvas mutations are serialized on one
//! thread. Jobs can be pushed to the back or the front of the queue;
//! each push returns a [`TaskHandle`] that can be waited on for the
//! job's result.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum PoolError {
    /// The worker executing the task is gone (the pool was terminated
    /// or the job panicked).
    #[error("worker terminated before the task finished")]
    WorkerGone,
}

/// Blocks on the completion of a single pushed job.
pub struct TaskHandle<R> {
    rx: mpsc::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// Block until the job has run and return its result.
    pub fn wait(self) -> Result<R, PoolError> {
        self.rx.recv().map_err(|_| PoolError::WorkerGone)
    }
}

struct PoolState {
    queue: Mutex<VecDeque<Job>>,
    condition: Condvar,
    stop: AtomicBool,
}

/// Fixed set of worker threads draining a shared job deque.
pub struct WorkerPool {
    state: Arc<PoolState>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(thread_count: usize) -> Self {
        let state = Arc::new(PoolState {
            queue: Mutex::new(VecDeque::new()),
            condition: Condvar::new(),
            stop: AtomicBool::new(false),
        });

        let workers = (0..thread_count.max(1))
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || worker_loop(&state))
            })
            .collect();

        Self { state, workers }
    }

    /// Enqueue a job at the back of the queue.
    pub fn push_back<F, R>(&self, job: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push(true, job)
    }

    /// Enqueue a job at the front of the queue.
    pub fn push_front<F, R>(&self, job: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.push(false, job)
    }

    /// Drop all queued (not yet started) jobs.
    pub fn clear(&self) {
        let mut queue = self.state.queue.lock().expect("pool mutex poisoned");
        let dropped = queue.len();
        queue.clear();
        if dropped > 0 {
            debug!(dropped, "cleared queued pool jobs");
        }
    }

    fn push<F, R>(&self, back: bool, job: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            // the receiver may have been dropped; the job still runs
            let _ = tx.send(job());
        });
        {
            let mut queue = self.state.queue.lock().expect("pool mutex poisoned");
            if back {
                queue.push_back(wrapped);
            } else {
                queue.push_front(wrapped);
            }
        }
        self.state.condition.notify_one();
        TaskHandle { rx }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.state.stop.store(true, Ordering::SeqCst);
        self.state.condition.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(state: &PoolState) {
    loop {
        let job = {
            let mut queue = state.queue.lock().expect("pool mutex poisoned");
            loop {
                if let Some(job) = queue.pop_front() {
                    break job;
                }
                if state.stop.load(Ordering::SeqCst) {
                    return;
                }
                queue = state
                    .condition
                    .wait(queue)
                    .expect("pool mutex poisoned");
            }
        };
        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_job_and_returns_result() {
        let pool = WorkerPool::new(1);
        let handle = pool.push_back(|| 2 + 3);
        assert_eq!(handle.wait().unwrap(), 5);
    }

    #[test]
    fn test_single_worker_preserves_order() {
        let pool = WorkerPool::new(1);
        let (tx, rx) = mpsc::channel();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let tx = tx.clone();
                pool.push_back(move || {
                    tx.send(i).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.wait().unwrap();
        }
        let order: Vec<i32> = rx.try_iter().collect();
        assert_eq!(order, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_front_jumps_queue() {
        let pool = WorkerPool::new(1);
        // block the worker so both probes sit in the queue together
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock().unwrap();
        let gate2 = Arc::clone(&gate);
        let blocker = pool.push_back(move || {
            let _g = gate2.lock().unwrap();
        });
        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        let back = pool.push_back(move || tx.send("back").unwrap());
        let front = pool.push_front(move || tx2.send("front").unwrap());
        drop(guard);
        blocker.wait().unwrap();
        front.wait().unwrap();
        back.wait().unwrap();
        let order: Vec<&str> = rx.try_iter().collect();
        assert_eq!(order, vec!["front", "back"]);
    }

    #[test]
    fn test_clear_drops_queued_jobs() {
        let pool = WorkerPool::new(1);
        let gate = Arc::new(Mutex::new(()));
        let guard = gate.lock().unwrap();
        let gate2 = Arc::clone(&gate);
        let (started_tx, started_rx) = mpsc::channel();
        let blocker = pool.push_back(move || {
            started_tx.send(()).unwrap();
            let _g = gate2.lock().unwrap();
        });
        // wait until the worker is inside the blocker before queueing
        started_rx.recv().unwrap();
        let doomed = pool.push_back(|| 42);
        pool.clear();
        drop(guard);
        blocker.wait().unwrap();
        // the cleared job never ran; its handle reports the loss
        assert!(doomed.wait().is_err());
    }

    #[test]
    fn test_drop_joins_workers() {
        let pool = WorkerPool::new(2);
        let h = pool.push_back(|| 1);
        assert_eq!(h.wait().unwrap(), 1);
        drop(pool);
    }
}
