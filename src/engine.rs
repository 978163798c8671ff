//! Async Compilation Engine
//!
//! A bounded pool of worker threads executing submitted compilation jobs.
//! Submission is non-blocking and returns a [`Job`] future handle
//! immediately; results travel over a single-slot flume channel.
//!
//! Every job carries a [`JobToken`] holding its deadline and a
//! cooperative cancellation flag. Workers consult the token before
//! starting and the orchestrator consults it again before caching, so a
//! result produced after its future timed out is discarded rather than
//! cached.
//!
//! Shutdown closes the job queue, then waits up to a grace period for
//! workers to drain; workers still running afterwards are abandoned with
//! a warning (their tokens stay valid, so late results are still
//! discarded safely).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::errors::{ForgeError, Result};

type BoxedJob = Box<dyn FnOnce() + Send + 'static>;

// ─── Job Token ────────────────────────────────────────────────────────────────

/// Deadline + cancellation state shared between a job and its future.
#[derive(Debug, Clone)]
pub struct JobToken {
    cancelled: Arc<AtomicBool>,
    deadline: Instant,
    budget: Duration,
}

impl JobToken {
    fn new(budget: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now() + budget,
            budget,
        }
    }

    /// True once the job has been cancelled or its deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || Instant::now() > self.deadline
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

// ─── Job Future ───────────────────────────────────────────────────────────────

/// Handle to an in-flight job; resolves to the job's result.
#[must_use = "a Job does nothing until waited on or resolved"]
pub struct Job<T> {
    rx: flume::Receiver<Result<T>>,
    token: JobToken,
}

impl<T> Job<T> {
    /// Blocks the calling thread until the job finishes or its budget
    /// runs out; a timeout cancels the job cooperatively.
    pub fn wait(self) -> Result<T> {
        match self.rx.recv_deadline(self.token.deadline) {
            Ok(result) => result,
            Err(flume::RecvTimeoutError::Timeout) => {
                self.token.cancel();
                Err(ForgeError::Timeout(self.token.budget))
            }
            Err(flume::RecvTimeoutError::Disconnected) => {
                Err(ForgeError::NotRunning("engine shut down"))
            }
        }
    }

    /// Like [`Job::wait`], but against a caller-supplied deadline
    /// instead of the job's own budget.
    pub fn wait_deadline(self, deadline: Instant) -> Result<T> {
        match self.rx.recv_deadline(deadline) {
            Ok(result) => result,
            Err(flume::RecvTimeoutError::Timeout) => {
                self.token.cancel();
                Err(ForgeError::Timeout(self.token.budget))
            }
            Err(flume::RecvTimeoutError::Disconnected) => {
                Err(ForgeError::NotRunning("engine shut down"))
            }
        }
    }

    /// Awaits the job from an async context.
    pub async fn resolve(self) -> Result<T> {
        match self.rx.recv_async().await {
            Ok(result) => result,
            Err(_) => Err(ForgeError::NotRunning("engine shut down")),
        }
    }

    /// Non-blocking poll; `None` while the job is still in flight.
    pub fn try_take(&self) -> Option<Result<T>> {
        self.rx.try_recv().ok()
    }

    /// A job that resolved before it was ever queued (e.g. an L1 hit or
    /// a rejected submission).
    pub(crate) fn completed(result: Result<T>, budget: Duration) -> Self {
        let (tx, rx) = flume::bounded(1);
        let _ = tx.send(result);
        Self {
            rx,
            token: JobToken::new(budget),
        }
    }

    /// Wraps an externally driven completion channel.
    pub(crate) fn from_channel(rx: flume::Receiver<Result<T>>, budget: Duration) -> Self {
        Self {
            rx,
            token: JobToken::new(budget),
        }
    }

    /// Drops the handle without waiting; the job still runs.
    pub(crate) fn detach(self) {}
}

// ─── Engine ───────────────────────────────────────────────────────────────────

pub struct AsyncEngine {
    queue: Mutex<Option<flume::Sender<BoxedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AsyncEngine {
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (tx, rx) = flume::unbounded::<BoxedJob>();

        let workers = (0..worker_count)
            .map(|index| {
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("forge-worker-{index}"))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                        debug!("forge-worker-{index} exiting");
                    })
                    .expect("failed to spawn compilation worker")
            })
            .collect();

        Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Queues `work`, returning its future immediately.
    ///
    /// `work` receives the job's token; long-running implementations
    /// should check it between phases and must check it before caching.
    pub fn submit<T, F>(&self, budget: Duration, work: F) -> Job<T>
    where
        T: Send + 'static,
        F: FnOnce(&JobToken) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = flume::bounded(1);
        let token = JobToken::new(budget);
        let job_token = token.clone();

        let boxed: BoxedJob = Box::new(move || {
            let result = if job_token.expired() {
                Err(ForgeError::Timeout(job_token.budget))
            } else {
                work(&job_token)
            };
            let result = match result {
                Ok(value) if job_token.expired() => {
                    warn!("Discarding job result produced after its deadline");
                    drop(value);
                    Err(ForgeError::Timeout(job_token.budget))
                }
                other => other,
            };
            let _ = tx.send(result);
        });

        let queued = match self.queue.lock().as_ref() {
            Some(queue) => queue.send(boxed).is_ok(),
            None => false,
        };
        if !queued {
            // Queue already closed; fail the future without a worker.
            let (tx, rx) = flume::bounded(1);
            let _ = tx.send(Err(ForgeError::NotRunning("engine shut down")));
            return Job { rx, token };
        }

        Job { rx, token }
    }

    /// Closes the queue and joins workers for up to `grace`.
    ///
    /// Returns `false` when some workers had to be abandoned; that is
    /// logged, never raised.
    pub fn shutdown(&self, grace: Duration) -> bool {
        drop(self.queue.lock().take());

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let deadline = Instant::now() + grace;
        let mut clean = true;

        while !workers.is_empty() && Instant::now() < deadline {
            workers.retain(|worker| !worker.is_finished());
            if !workers.is_empty() {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        for worker in workers {
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                warn!(
                    "Abandoning worker {:?} still running after {grace:?} grace period",
                    worker.thread().name().unwrap_or("<unnamed>")
                );
                clean = false;
            }
        }
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitted_job_resolves() {
        let engine = AsyncEngine::new(2);
        let job = engine.submit(Duration::from_secs(5), |_| Ok(21 * 2));
        assert_eq!(job.wait().unwrap(), 42);
        engine.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn timed_out_job_surfaces_timeout_and_cancels() {
        let engine = AsyncEngine::new(1);
        // Occupy the only worker long enough for the second job's budget
        // to lapse before it runs.
        let blocker = engine.submit(Duration::from_secs(5), |_| {
            std::thread::sleep(Duration::from_millis(100));
            Ok(())
        });
        let starved = engine.submit(Duration::from_millis(10), |_| Ok(()));

        assert!(matches!(starved.wait(), Err(ForgeError::Timeout(_))));
        blocker.wait().unwrap();
        engine.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn wait_deadline_overrides_the_job_budget() {
        let engine = AsyncEngine::new(1);
        let job = engine.submit(Duration::from_secs(5), |_| {
            std::thread::sleep(Duration::from_millis(100));
            Ok(())
        });
        let early = Instant::now() + Duration::from_millis(10);
        assert!(matches!(
            job.wait_deadline(early),
            Err(ForgeError::Timeout(_))
        ));
        engine.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn submit_after_shutdown_fails_fast() {
        let engine = AsyncEngine::new(1);
        assert!(engine.shutdown(Duration::from_secs(1)));
        let job = engine.submit(Duration::from_secs(1), |_| Ok(()));
        assert!(matches!(job.wait(), Err(ForgeError::NotRunning(_))));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let engine = AsyncEngine::new(2);
        engine.shutdown(Duration::from_secs(1));
        engine.shutdown(Duration::from_secs(1));
    }
}
