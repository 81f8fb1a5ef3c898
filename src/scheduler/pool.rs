//! Worker pool over a bounded crossbeam queue.
//!
//! ```ignore
//! let pool = WorkerPool::start(4, backend);
//! pool.submit(tasks)?;
//! pool.close();
//! for result in pool.results() {
//!     progress.inc(result.task.kind.as_str());
//! }
//! ```
//!
//! Workers are spawned lazily: never more than `min(concurrency, tasks
//! submitted so far)`. Results arrive in completion order. All methods take
//! `&self`, so one thread can submit while another drains results.

use anyhow::{Result, bail};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Instant,
};

use super::BuildResult;
use crate::{compiler::CompilerBackend, graph::BuildTask};

/// Queue slots per worker.
const QUEUE_SLOTS_PER_WORKER: usize = 2;

pub struct WorkerPool {
    concurrency: usize,
    backend: Arc<dyn CompilerBackend>,
    cancel: Arc<AtomicBool>,
    task_rx: Receiver<Arc<BuildTask>>,
    result_rx: Receiver<BuildResult>,
    inner: Mutex<PoolState>,
}

/// Senders are `None` once the pool is closed.
struct PoolState {
    task_tx: Option<Sender<Arc<BuildTask>>>,
    result_tx: Option<Sender<BuildResult>>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
}

impl WorkerPool {
    /// Pool running at most `concurrency` backend invocations at once.
    pub fn start(concurrency: usize, backend: Arc<dyn CompilerBackend>) -> Self {
        let concurrency = concurrency.max(1);
        let (task_tx, task_rx) = channel::bounded(concurrency * QUEUE_SLOTS_PER_WORKER);
        // Unbounded so workers never block on a caller that drains late.
        let (result_tx, result_rx) = channel::unbounded();
        Self {
            concurrency,
            backend,
            cancel: Arc::new(AtomicBool::new(false)),
            task_rx,
            result_rx,
            inner: Mutex::new(PoolState {
                task_tx: Some(task_tx),
                result_tx: Some(result_tx),
                workers: Vec::new(),
                submitted: 0,
            }),
        }
    }

    /// Share an external cancel flag (e.g. the Ctrl+C flag).
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Queue tasks, blocking while the queue is full.
    pub fn submit<I>(&self, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<BuildTask>>,
    {
        let tasks: Vec<_> = tasks.into_iter().collect();

        // The lock is released before sending: a full queue must not block
        // `close` or other submitters.
        let tx = {
            let mut state = self.inner.lock();
            if self.is_cancelled() {
                bail!("worker pool is cancelled");
            }
            let Some(tx) = state.task_tx.clone() else {
                bail!("worker pool is closed");
            };
            state.submitted += tasks.len();
            self.spawn_workers(&mut state);
            tx
        };

        for task in tasks {
            if self.is_cancelled() {
                bail!("worker pool is cancelled");
            }
            if tx.send(task).is_err() {
                bail!("all workers have exited");
            }
        }
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Stream of results. Ends once [`close`](Self::close) was called and
    /// every queued task has finished.
    pub fn results(&self) -> channel::Iter<'_, BuildResult> {
        self.result_rx.iter()
    }

    /// Stop accepting tasks; queued and in-flight tasks still complete.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        state.task_tx = None;
        state.result_tx = None;
    }

    /// Abort. Running compilers see the flag and are killed, queued tasks
    /// are dropped without a result, and further submissions are refused.
    /// Idle workers wake up and exit.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.close();
    }

    pub fn worker_count(&self) -> usize {
        self.inner.lock().workers.len()
    }

    fn spawn_workers(&self, state: &mut PoolState) {
        let Some(result_tx) = &state.result_tx else {
            return;
        };
        let wanted = self.concurrency.min(state.submitted);
        while state.workers.len() < wanted {
            let worker = Worker {
                tasks: self.task_rx.clone(),
                results: result_tx.clone(),
                backend: Arc::clone(&self.backend),
                cancel: Arc::clone(&self.cancel),
            };
            state.workers.push(std::thread::spawn(move || worker.run()));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
        for handle in self.inner.get_mut().workers.drain(..) {
            let _ = handle.join();
        }
    }
}

struct Worker {
    tasks: Receiver<Arc<BuildTask>>,
    results: Sender<BuildResult>,
    backend: Arc<dyn CompilerBackend>,
    cancel: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        while let Ok(task) = self.tasks.recv() {
            if self.cancel.load(Ordering::SeqCst) {
                continue;
            }

            let start = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| self.backend.run(&task, &self.cancel)));

            // Results of cancelled work are discarded
            if self.cancel.load(Ordering::SeqCst) {
                continue;
            }

            let result = match outcome {
                Ok(outcome) => BuildResult::from_outcome(task, outcome, start.elapsed()),
                Err(_) => BuildResult::panicked(task, start.elapsed()),
            };
            if self.results.send(result).is_err() {
                break;
            }
        }
    }
}
