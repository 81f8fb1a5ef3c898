//! Drivers used by `build` and the watch coordinator.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use super::{BuildResult, BuildSummary, WorkerPool};
use crate::{compiler::CompilerBackend, config::BuildSectionConfig, debug, graph::BuildTask};

/// How a batch of tasks is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One task at a time, stopping at the first failure.
    Sequential,
    /// Worker pool of the given size; every task runs.
    Parallel(usize),
}

impl RunMode {
    pub fn from_config(build: &BuildSectionConfig) -> Self {
        if build.parallel {
            Self::Parallel(build.worker_count())
        } else {
            Self::Sequential
        }
    }
}

/// Run `tasks`, calling `on_result` as each one finishes.
pub fn run_tasks(
    tasks: &[Arc<BuildTask>],
    backend: Arc<dyn CompilerBackend>,
    mode: RunMode,
    cancel: Arc<AtomicBool>,
    on_result: impl FnMut(&BuildResult),
) -> BuildSummary {
    let start = Instant::now();
    let mut summary = match mode {
        RunMode::Sequential => run_sequential(tasks, backend.as_ref(), &cancel, on_result),
        RunMode::Parallel(workers) => run_parallel(tasks, backend, workers, cancel, on_result),
    };
    summary.elapsed = start.elapsed();
    summary
}

fn run_sequential(
    tasks: &[Arc<BuildTask>],
    backend: &dyn CompilerBackend,
    cancel: &Arc<AtomicBool>,
    mut on_result: impl FnMut(&BuildResult),
) -> BuildSummary {
    let mut summary = BuildSummary::default();

    for (i, task) in tasks.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            summary.not_run = tasks.len() - i;
            break;
        }

        let start = Instant::now();
        let outcome = backend.run(task, cancel);
        if cancel.load(Ordering::SeqCst) {
            summary.not_run = tasks.len() - i;
            break;
        }

        let result = BuildResult::from_outcome(Arc::clone(task), outcome, start.elapsed());
        on_result(&result);
        let failed = !result.success;
        summary.results.push(result);

        if failed {
            summary.not_run = tasks.len() - i - 1;
            debug!("build"; "stopping after failure of {}", task.name);
            break;
        }
    }
    summary
}

fn run_parallel(
    tasks: &[Arc<BuildTask>],
    backend: Arc<dyn CompilerBackend>,
    workers: usize,
    cancel: Arc<AtomicBool>,
    mut on_result: impl FnMut(&BuildResult),
) -> BuildSummary {
    let mut summary = BuildSummary::default();
    let pool = WorkerPool::start(workers, backend).with_cancel(cancel);

    // Submit from a scoped thread so results stream while the bounded
    // queue is still being filled.
    std::thread::scope(|scope| {
        scope.spawn(|| {
            if let Err(e) = pool.submit(tasks.iter().cloned()) {
                debug!("build"; "submit stopped: {}", e);
            }
            pool.close();
        });

        for result in pool.results() {
            on_result(&result);
            summary.results.push(result);
        }
    });
    summary.not_run = tasks.len() - summary.results.len();
    summary
}
