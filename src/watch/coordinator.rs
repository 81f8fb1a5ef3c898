//! Watch coordinator: debounced, per-resource incremental rebuilds.
//!
//! Shared state:
//! - `view`: config + task graph, swapped atomically on config reload
//! - `debouncer`: latest change generation per path
//! - `building`: resource identities with a rebuild in flight
//!
//! A change that hits an identity already in `building` is dropped, not
//! queued. The next save of any file of that resource rebuilds it again.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::Notify;

use super::{debouncer::Debouncer, event::FsChange, resolve};
use crate::{
    compiler::CompilerBackend,
    config::{ConfigOverrides, ProjectConfig},
    debug,
    deploy::Deployer,
    graph::{BuildTask, TaskGraph},
    log,
    logger::{status_error, status_success, status_warning},
    reload::Notifier,
    scheduler::{BuildSummary, RunMode, run_tasks},
    utils::{hash, plural_count},
};

/// Poll interval while a full rebuild waits for running rebuilds.
const BUSY_POLL: Duration = Duration::from_millis(50);

/// Creates the compiler backend for a (re)loaded config.
pub type BackendFactory = Arc<dyn Fn(&ProjectConfig) -> Arc<dyn CompilerBackend> + Send + Sync>;

/// Configuration and tasks as of the last successful (re)load.
#[derive(Debug)]
pub struct WatchView {
    pub config: Arc<ProjectConfig>,
    pub graph: TaskGraph,
    /// Hash of the config file content this view was loaded from.
    config_hash: u64,
}

/// What happened to one rebuild request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// No task owns the changed path.
    Ignored,
    /// A resource was already building; the request was discarded.
    Dropped(Vec<String>),
    /// The tasks ran.
    Built { names: Vec<String>, success: bool },
}

pub struct WatchCoordinator {
    view: ArcSwap<WatchView>,
    overrides: ConfigOverrides,
    debouncer: Debouncer,
    building: Mutex<FxHashSet<String>>,
    backends: BackendFactory,
    notifier: Notifier,
    /// Serializes config reloads.
    reload_lock: tokio::sync::Mutex<()>,
    /// Wakes the event loop to re-register watches after a reload.
    pub(super) rewatch: Notify,
}

impl WatchCoordinator {
    pub fn new(
        config: ProjectConfig,
        graph: TaskGraph,
        overrides: ConfigOverrides,
        backends: BackendFactory,
        notifier: Notifier,
    ) -> Arc<Self> {
        let config_hash = fs::read_to_string(&config.config_path)
            .map(|content| hash::compute(&content))
            .unwrap_or_default();
        let view = WatchView {
            config: Arc::new(config),
            graph,
            config_hash,
        };

        Arc::new(Self {
            view: ArcSwap::from_pointee(view),
            overrides,
            debouncer: Debouncer::new(),
            building: Mutex::new(FxHashSet::default()),
            backends,
            notifier,
            reload_lock: tokio::sync::Mutex::new(()),
            rewatch: Notify::new(),
        })
    }

    /// Current configuration and task graph.
    pub fn view(&self) -> Arc<WatchView> {
        self.view.load_full()
    }

    /// Identities with a rebuild in flight.
    pub fn building(&self) -> Vec<String> {
        let mut names: Vec<_> = self.building.lock().iter().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch one filtered filesystem change.
    pub(super) fn on_change(self: &Arc<Self>, change: FsChange) {
        match change {
            FsChange::File(path) if path == self.view.load().config.config_path => {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.config_changed().await;
                });
            }
            FsChange::File(path) => self.schedule(path),
            FsChange::Dir(path) => {
                debug!("watch"; "directory created: {}", path.display());
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.refresh().await;
                });
            }
        }
    }

    /// Arm the quiet-period timer for `path`. Only the last change to a
    /// path within the window triggers a rebuild.
    pub fn schedule(self: &Arc<Self>, path: PathBuf) {
        let generation = self.debouncer.touch(&path);
        let delay = self.view.load().config.dev.debounce();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if this.debouncer.settle(&path, generation) {
                this.rebuild_path(&path).await;
            }
        });
    }

    /// Number of paths waiting out their quiet period.
    pub fn pending(&self) -> usize {
        self.debouncer.pending()
    }

    /// Rebuild the tasks affected by a change at `path`.
    pub async fn rebuild_path(self: &Arc<Self>, path: &Path) -> RebuildOutcome {
        let view = self.view();
        let tasks = resolve::affected(&view.graph, path);
        if tasks.is_empty() {
            debug!("watch"; "no task owns {}", view.config.root_relative(path));
            return RebuildOutcome::Ignored;
        }

        let identities = identities(&tasks);
        let Some(guard) = BuildingGuard::try_acquire(&self.building, &identities) else {
            log!("watch"; "{} already building, change dropped", identities.join(", "));
            return RebuildOutcome::Dropped(identities);
        };

        let names = task_names(&tasks);
        log!("watch"; "rebuilding {}", names.join(", "));
        let summary = self.run(&view, tasks.clone()).await;

        if !summary.is_success() {
            drop(guard);
            report_failure(&names, &summary);
            return RebuildOutcome::Built {
                names,
                success: false,
            };
        }

        let deployer = Deployer::from_config(&view.config);
        if deployer.is_enabled() {
            let ids = identities.clone();
            let deployed = tokio::task::spawn_blocking(move || {
                ids.iter()
                    .map(|id| deployer.deploy_resource(id).map(|_| ()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await;
            match deployed {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => status_warning(&format!("deploy failed: {e}")),
                Err(e) => status_warning(&format!("deploy aborted: {e}")),
            }
        }
        drop(guard);

        status_success(&format!(
            "rebuilt {} in {:.2?}",
            names.join(", "),
            summary.elapsed
        ));
        self.notifier.rebuilt(&tasks).await;

        RebuildOutcome::Built {
            names,
            success: true,
        }
    }

    /// Reload after the config file changed; rebuild everything if its
    /// content differs from the loaded one.
    pub async fn config_changed(self: &Arc<Self>) -> Option<RebuildOutcome> {
        match self.reload(false).await {
            Ok(Some(view)) => {
                log!("watch"; "config changed, rebuilding all tasks");
                Some(self.rebuild_all(view).await)
            }
            Ok(None) => {
                debug!("watch"; "config content unchanged");
                None
            }
            Err(e) => {
                status_error("config reload failed", &format!("{e:#}"));
                None
            }
        }
    }

    /// Re-derive tasks after a directory appeared, so new glob matches
    /// become buildable.
    pub async fn refresh(self: &Arc<Self>) {
        match self.reload(true).await {
            Ok(Some(view)) => {
                debug!("watch"; "task graph refreshed: {}", plural_count(view.graph.len(), "task"));
            }
            Ok(None) => {}
            Err(e) => status_error("task refresh failed", &format!("{e:#}")),
        }
    }

    async fn reload(self: &Arc<Self>, force: bool) -> Result<Option<Arc<WatchView>>> {
        let _lock = self.reload_lock.lock().await;
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.load_view(force))
            .await
            .context("config reload aborted")?
    }

    fn load_view(&self, force: bool) -> Result<Option<Arc<WatchView>>> {
        let current = self.view.load_full();
        let path = &current.config.config_path;
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config_hash = hash::compute(&content);
        if !force && config_hash == current.config_hash {
            return Ok(None);
        }

        let config = ProjectConfig::load_from(path, &self.overrides)?;
        let graph = TaskGraph::build(&config)?;
        let view = Arc::new(WatchView {
            config: Arc::new(config),
            graph,
            config_hash,
        });
        self.view.store(Arc::clone(&view));
        self.rewatch.notify_one();
        Ok(Some(view))
    }

    /// Rebuild every task of `view`, waiting for in-flight rebuilds first.
    async fn rebuild_all(&self, view: Arc<WatchView>) -> RebuildOutcome {
        let tasks = view.graph.tasks().to_vec();
        let identities = identities(&tasks);
        let guard = loop {
            if let Some(guard) = BuildingGuard::try_acquire(&self.building, &identities) {
                break guard;
            }
            if crate::core::is_shutdown() {
                return RebuildOutcome::Dropped(identities);
            }
            tokio::time::sleep(BUSY_POLL).await;
        };

        let names = task_names(&tasks);
        let summary = self.run(&view, tasks).await;
        if !summary.is_success() {
            drop(guard);
            report_failure(&names, &summary);
            return RebuildOutcome::Built {
                names,
                success: false,
            };
        }

        let deployer = Deployer::from_config(&view.config);
        if deployer.is_enabled() {
            match tokio::task::spawn_blocking(move || deployer.deploy_all()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => status_warning(&format!("deploy failed: {e}")),
                Err(e) => status_warning(&format!("deploy aborted: {e}")),
            }
        }
        drop(guard);

        status_success(&format!(
            "rebuilt {} in {:.2?}",
            plural_count(names.len(), "task"),
            summary.elapsed
        ));
        RebuildOutcome::Built {
            names,
            success: true,
        }
    }

    async fn run(&self, view: &WatchView, tasks: Vec<Arc<BuildTask>>) -> BuildSummary {
        let backend = (self.backends)(&view.config);
        let mode = RunMode::from_config(&view.config.build);
        let cancel = crate::core::shutdown_flag();
        let count = tasks.len();

        tokio::task::spawn_blocking(move || run_tasks(&tasks, backend, mode, cancel, |_| {}))
            .await
            .unwrap_or_else(|e| {
                debug!("watch"; "rebuild task aborted: {}", e);
                BuildSummary {
                    not_run: count,
                    ..Default::default()
                }
            })
    }
}

/// Marks identities as building; unmarks them on drop.
struct BuildingGuard<'a> {
    building: &'a Mutex<FxHashSet<String>>,
    identities: Vec<String>,
}

impl<'a> BuildingGuard<'a> {
    /// `None` if any of `identities` is already building.
    fn try_acquire(building: &'a Mutex<FxHashSet<String>>, identities: &[String]) -> Option<Self> {
        let mut set = building.lock();
        if identities.iter().any(|id| set.contains(id)) {
            return None;
        }
        set.extend(identities.iter().cloned());
        Some(Self {
            building,
            identities: identities.to_vec(),
        })
    }
}

impl Drop for BuildingGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.building.lock();
        for id in &self.identities {
            set.remove(id);
        }
    }
}

/// Distinct identities of `tasks`, in first-seen order.
fn identities(tasks: &[Arc<BuildTask>]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tasks
        .iter()
        .map(|t| t.identity())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

fn task_names(tasks: &[Arc<BuildTask>]) -> Vec<String> {
    tasks.iter().map(|t| t.name.clone()).collect()
}

fn report_failure(names: &[String], summary: &BuildSummary) {
    let detail = summary
        .failures()
        .map(|r| {
            let error = r.error.as_deref().unwrap_or("failed");
            let log = r.log.trim();
            if log.is_empty() {
                format!("{}: {}", r.task.name, error)
            } else {
                format!("{}: {}\n{}", r.task.name, error, log)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let summary_line = if summary.not_run > 0 && summary.failed_count() == 0 {
        format!("rebuild of {} cancelled", names.join(", "))
    } else {
        format!("rebuild of {} failed", names.join(", "))
    };
    status_error(&summary_line, &detail);
}
