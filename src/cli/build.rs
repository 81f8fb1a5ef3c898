//! `resforge build`: derive tasks, run them through the worker pool and
//! deploy the output.
//!
//! Phases:
//! - **Prepare** - Optional clean, create the output directory
//! - **Derive** - Build the task graph from the config
//! - **Compile** - Run every task (parallel or sequential)
//! - **Deploy** - Mirror the output into `destination`, if configured

use anyhow::{Result, bail};
use std::{fs, sync::Arc};

use crate::{
    compiler::{CompilerBackend, ProcessBackend},
    config::ProjectConfig,
    core::{is_shutdown, shutdown_flag},
    debug,
    deploy::Deployer,
    graph::TaskGraph,
    log,
    logger::ProgressLine,
    scheduler::{BuildSummary, RunMode, run_tasks},
    utils::plural_count,
};

/// Run every task of the project once.
///
/// Task failures are reported, not returned: callers decide whether a
/// failed build is fatal.
pub fn build_project(
    config: &ProjectConfig,
    backend: Arc<dyn CompilerBackend>,
    quiet: bool,
) -> Result<(TaskGraph, BuildSummary)> {
    prepare_output(config)?;

    let graph = TaskGraph::build(config)?;
    let mode = RunMode::from_config(&config.build);
    debug!("build"; "{} ({:?})", plural_count(graph.len(), "task"), mode);

    let progress = (!quiet).then(|| ProgressLine::new(&graph.kind_counts()));
    let summary = run_tasks(graph.tasks(), backend, mode, shutdown_flag(), |result| {
        if let Some(progress) = &progress {
            progress.inc(result.task.kind.as_str());
        }
    });
    if let Some(progress) = progress {
        progress.finish();
    }

    if !quiet {
        summary.report();
    }
    Ok((graph, summary))
}

/// Error for a build that did not fully succeed.
pub fn ensure_success(summary: &BuildSummary) -> Result<()> {
    if is_shutdown() {
        bail!("build interrupted");
    }
    let failed = summary.failed_count();
    if failed > 0 {
        bail!("{} failed", plural_count(failed, "task"));
    }
    if summary.not_run > 0 {
        bail!("build stopped with {} not run", plural_count(summary.not_run, "task"));
    }
    Ok(())
}

/// Deploy the whole output if a destination is configured.
pub fn deploy_output(config: &ProjectConfig) -> Result<()> {
    let deployer = Deployer::from_config(config);
    if let Some(destination) = deployer.destination() {
        let stats = deployer.deploy_all()?;
        log!(
            "deploy";
            "{} -> {}",
            plural_count(stats.files, "file"),
            destination.display()
        );
    }
    Ok(())
}

pub fn run(config: &ProjectConfig) -> Result<()> {
    let backend = Arc::new(ProcessBackend::from_config(config));
    let (_, summary) = build_project(config, backend, false)?;
    ensure_success(&summary)?;
    deploy_output(config)
}

fn prepare_output(config: &ProjectConfig) -> Result<()> {
    if config.build.clean && super::clean::clean_output(config)? {
        debug!("build"; "cleaned {}", config.root_relative(&config.output));
    }
    fs::create_dir_all(&config.output)?;
    Ok(())
}
