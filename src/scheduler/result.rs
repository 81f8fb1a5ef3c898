//! Per-task results and their aggregate.

use anyhow::Result;
use owo_colors::OwoColorize;
use std::{sync::Arc, time::Duration};

use crate::{compiler::BackendOutput, graph::BuildTask, log, utils::plural_count};

/// Outcome of one task. Read-only after creation.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub task: Arc<BuildTask>,
    pub success: bool,
    pub duration: Duration,
    /// Why the task failed, when the backend says more than "exit 1".
    pub error: Option<String>,
    /// Captured compiler output.
    pub log: String,
}

impl BuildResult {
    pub(super) fn from_outcome(
        task: Arc<BuildTask>,
        outcome: Result<BackendOutput>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(output) => {
                let error = match (output.success, output.cancelled) {
                    (true, _) => None,
                    (false, true) => Some("cancelled".to_string()),
                    (false, false) => Some("compilation failed".to_string()),
                };
                Self {
                    task,
                    success: output.success,
                    duration,
                    error,
                    log: output.log,
                }
            }
            Err(e) => Self {
                task,
                success: false,
                duration,
                error: Some(format!("{e:#}")),
                log: String::new(),
            },
        }
    }

    pub(super) fn panicked(task: Arc<BuildTask>, duration: Duration) -> Self {
        Self {
            task,
            success: false,
            duration,
            error: Some("compiler backend panicked".to_string()),
            log: String::new(),
        }
    }
}

/// Aggregate of a full or partial build.
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Results in completion order.
    pub results: Vec<BuildResult>,
    /// Tasks never run (sequential stop or cancellation).
    pub not_run: usize,
    pub elapsed: Duration,
}

impl BuildSummary {
    pub fn failures(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.not_run == 0 && self.failed_count() == 0
    }

    /// Print every failed task with its captured output, then one summary
    /// line.
    pub fn report(&self) {
        for result in self.failures() {
            log!("error"; "{} failed: {}", result.task, result.error.as_deref().unwrap_or("unknown error"));
            let output = result.log.trim_end();
            if !output.is_empty() {
                eprintln!("{}", output.dimmed());
            }
        }

        let failed = self.failed_count();
        if failed == 0 && self.not_run == 0 {
            log!("build"; "{} built in {:.2?}", plural_count(self.results.len(), "task"), self.elapsed);
        } else {
            log!(
                "build";
                "{} failed, {} succeeded, {} not run ({:.2?})",
                plural_count(failed, "task"),
                self.results.len() - failed,
                self.not_run,
                self.elapsed
            );
        }
    }
}
