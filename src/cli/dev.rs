//! `resforge dev`: full build, then incremental rebuilds with hot reload.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    compiler::{CompilerBackend, ProcessBackend},
    config::{ConfigOverrides, ProjectConfig},
    core::is_shutdown,
    log,
    reload::Notifier,
    watch::{self, BackendFactory, WatchCoordinator},
};

pub fn run(config: ProjectConfig, overrides: ConfigOverrides) -> Result<()> {
    let backend: Arc<dyn CompilerBackend> = Arc::new(ProcessBackend::from_config(&config));
    let (graph, summary) = super::build::build_project(&config, backend, false)?;
    if is_shutdown() {
        return Ok(());
    }

    // A failed initial build still enters watch mode so the next save can fix it.
    if summary.is_success()
        && let Err(e) = super::build::deploy_output(&config)
    {
        log!("warning"; "deploy failed: {:#}", e);
    }

    let notifier = Notifier::from_config(&config);
    log!("dev"; "hot reload via {} strategy", notifier.strategy_name());

    let backends: BackendFactory =
        Arc::new(|config: &ProjectConfig| -> Arc<dyn CompilerBackend> {
            Arc::new(ProcessBackend::from_config(config))
        });
    let coordinator = WatchCoordinator::new(config, graph, overrides, backends, notifier);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    runtime.block_on(watch::run(coordinator))
}
