use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use async_trait::async_trait;
use notify::{
    EventKind, RecursiveMode,
    event::{AccessKind, CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind},
};
use parking_lot::Mutex;
use tempfile::TempDir;

use super::debouncer::Debouncer;
use super::event::{EventFilter, FsChange, is_temp_file};
use super::watch_paths::collect_watch_paths;
use super::watch_roots::WatchRoots;
use super::*;
use crate::compiler::{BackendOutput, CompilerBackend};
use crate::config::{ConfigOverrides, ProjectConfig, test_load_config};
use crate::graph::{BuildTask, TaskGraph};
use crate::reload::{Notifier, ReloadError, ReloadStrategy};
use crate::utils::path::normalize_path;

const CONFIG: &str = r#"
[resources]
include = ["resources/*"]

[[resources.units]]
path = "resources/admin"
views = { path = "resources/admin/ui" }

[dev]
debounce_ms = 40
"#;

// ============================================================================
// fakes
// ============================================================================

#[derive(Default)]
struct FakeBackend {
    delay: Duration,
    fail: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().clone();
        calls.sort();
        calls
    }
}

impl CompilerBackend for FakeBackend {
    fn run(&self, task: &BuildTask, _cancel: &Arc<AtomicBool>) -> anyhow::Result<BackendOutput> {
        std::thread::sleep(self.delay);
        self.calls.lock().push(task.name.clone());
        fs::create_dir_all(&task.output)?;
        fs::write(task.output.join("out.txt"), &task.name)?;
        if self.fail.contains(&task.name.as_str()) {
            Ok(BackendOutput::failed("boom"))
        } else {
            Ok(BackendOutput::ok(""))
        }
    }
}

#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ReloadStrategy for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn supports_core(&self) -> bool {
        true
    }

    async fn reload(&self, identity: &str) -> Result<(), ReloadError> {
        self.calls.lock().push(identity.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeWatcher {
    watched: Vec<PathBuf>,
    unwatched: Vec<PathBuf>,
}

impl notify::Watcher for FakeWatcher {
    fn new<F: notify::EventHandler>(_handler: F, _config: notify::Config) -> notify::Result<Self> {
        Ok(Self::default())
    }

    fn watch(&mut self, path: &Path, _mode: RecursiveMode) -> notify::Result<()> {
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
        self.unwatched.push(path.to_path_buf());
        Ok(())
    }

    fn kind() -> notify::WatcherKind {
        notify::WatcherKind::NullWatcher
    }
}

// ============================================================================
// helpers
// ============================================================================

struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    backend: Arc<FakeBackend>,
    strategy: Arc<Recording>,
    coordinator: Arc<WatchCoordinator>,
}

impl Fixture {
    fn new(backend: FakeBackend) -> Self {
        Self::with_config(backend, CONFIG)
    }

    fn with_config(backend: FakeBackend, content: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for d in [
            "core",
            "resources/admin/src",
            "resources/admin/ui",
            "resources/chat",
        ] {
            fs::create_dir_all(dir.path().join(d)).unwrap();
        }

        let config = test_load_config(dir.path(), content).unwrap();
        let graph = TaskGraph::build(&config).unwrap();
        let root = config.root.clone();

        let backend = Arc::new(backend);
        let shared: Arc<dyn CompilerBackend> = backend.clone();
        let factory: BackendFactory = Arc::new(move |_: &ProjectConfig| Arc::clone(&shared));
        let strategy = Arc::new(Recording::default());
        let coordinator = WatchCoordinator::new(
            config,
            graph,
            ConfigOverrides::default(),
            factory,
            Notifier::new(strategy.clone(), "core"),
        );

        Self {
            _dir: dir,
            root,
            backend,
            strategy,
            coordinator,
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn reloads(&self) -> Vec<String> {
        self.strategy.calls.lock().clone()
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn event(kind: EventKind, paths: &[&Path]) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.iter().map(|p| p.to_path_buf()).collect(),
        attrs: Default::default(),
    }
}

fn modify() -> EventKind {
    EventKind::Modify(ModifyKind::Data(DataChange::Content))
}

// ============================================================================
// debouncer
// ============================================================================

#[test]
fn test_debouncer_latest_generation_wins() {
    let debouncer = Debouncer::new();
    let path = Path::new("/p/resources/chat/a.ts");

    let first = debouncer.touch(path);
    let second = debouncer.touch(path);
    assert_eq!(debouncer.pending(), 1);

    assert!(!debouncer.settle(path, first));
    assert!(debouncer.settle(path, second));
    assert_eq!(debouncer.pending(), 0);
    // a settled window does not fire twice
    assert!(!debouncer.settle(path, second));
}

#[test]
fn test_debouncer_paths_are_independent() {
    let debouncer = Debouncer::new();
    let a = debouncer.touch(Path::new("/a"));
    let b = debouncer.touch(Path::new("/b"));
    assert!(debouncer.settle(Path::new("/a"), a));
    assert!(debouncer.settle(Path::new("/b"), b));
}

// ============================================================================
// event filter
// ============================================================================

#[test]
fn test_temp_files() {
    for name in ["a.swp", "a.swo", "a.tmp", "a.bak", "a~", ".hidden", "x.backup"] {
        assert!(is_temp_file(Path::new(name)), "{name}");
    }
    assert!(!is_temp_file(Path::new("main.ts")));
    assert!(!is_temp_file(Path::new("resforge.toml")));
}

#[test]
fn test_filter_drops_noise() {
    let dir = tempfile::tempdir().unwrap();
    let root = normalize_path(dir.path());
    let filter = EventFilter::new(&root, &root.join("dist"));

    let source = root.join("resources/chat/main.ts");
    let swap = root.join("resources/chat/.main.ts.swp");
    let output = root.join("dist/chat/client.js");
    let modules = root.join("resources/chat/node_modules/x/index.js");

    let changes = filter.classify(&event(modify(), &[&source, &swap, &output, &modules]));
    assert_eq!(changes, vec![FsChange::File(source.clone())]);

    let metadata = EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime));
    assert!(filter.classify(&event(metadata, &[&source])).is_empty());

    let access = EventKind::Access(AccessKind::Any);
    assert!(filter.classify(&event(access, &[&source])).is_empty());
}

#[test]
fn test_filter_detects_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = normalize_path(dir.path());
    let created = root.join("resources/inventory");
    fs::create_dir_all(&created).unwrap();
    let filter = EventFilter::new(&root, &root.join("dist"));

    let folder = EventKind::Create(CreateKind::Folder);
    assert_eq!(
        filter.classify(&event(folder, &[&created])),
        vec![FsChange::Dir(created.clone())]
    );
    // platforms that do not say what was created
    let any = EventKind::Create(CreateKind::Any);
    assert_eq!(
        filter.classify(&event(any, &[&created])),
        vec![FsChange::Dir(created.clone())]
    );

    let removed = root.join("resources/chat/old.ts");
    let remove = EventKind::Remove(RemoveKind::File);
    assert_eq!(
        filter.classify(&event(remove, &[&removed])),
        vec![FsChange::File(removed)]
    );
}

// ============================================================================
// watch paths and roots
// ============================================================================

#[test]
fn test_collect_watch_paths() {
    let fixture = Fixture::new(FakeBackend::default());
    let view = fixture.coordinator.view();
    let paths = collect_watch_paths(&view.config, &view.graph);

    // admin/ui is covered by admin
    assert_eq!(
        paths.roots,
        vec![
            fixture.path("core"),
            fixture.path("resources/admin"),
            fixture.path("resources/chat"),
        ]
    );
    assert_eq!(paths.bases, vec![fixture.root.clone(), fixture.path("resources")]);
}

#[test]
fn test_watch_roots_skip_noise_dirs() {
    let fixture = Fixture::new(FakeBackend::default());
    fs::create_dir_all(fixture.path("resources/chat/node_modules/lib")).unwrap();
    fs::create_dir_all(fixture.path("resources/chat/src/client")).unwrap();

    let view = fixture.coordinator.view();
    let mut roots = WatchRoots::new(
        collect_watch_paths(&view.config, &view.graph),
        &view.config.output,
    );
    let mut watcher = FakeWatcher::default();
    roots.attach_existing(&mut watcher).unwrap();

    assert!(roots.is_attached(&fixture.path("resources/chat/src/client")));
    assert!(roots.is_attached(&fixture.path("resources/admin/ui")));
    assert!(!roots.is_attached(&fixture.path("resources/chat/node_modules")));
    assert!(!roots.is_attached(&fixture.path("resources/chat/node_modules/lib")));
    // every directory is watched exactly once
    let mut watched = watcher.watched.clone();
    watched.sort();
    watched.dedup();
    assert_eq!(watched.len(), watcher.watched.len());
}

#[test]
fn test_watch_roots_new_dir_and_replace() {
    let fixture = Fixture::new(FakeBackend::default());
    let view = fixture.coordinator.view();
    let mut roots = WatchRoots::new(
        collect_watch_paths(&view.config, &view.graph),
        &view.config.output,
    );
    let mut watcher = FakeWatcher::default();
    roots.attach_existing(&mut watcher).unwrap();

    let created = fixture.path("resources/chat/src/shared");
    fs::create_dir_all(created.join("deep")).unwrap();
    assert_eq!(roots.attach_tree(&mut watcher, &created), 2);
    assert!(roots.is_attached(&created.join("deep")));

    // chat disappears from the watch set
    let mut paths = collect_watch_paths(&view.config, &view.graph);
    paths.roots.retain(|p| !p.ends_with("chat"));
    roots.replace(&mut watcher, paths, &view.config.output);
    assert!(!roots.is_attached(&created));
    assert!(watcher.unwatched.contains(&fixture.path("resources/chat")));
}

#[test]
fn test_watch_roots_reattach_recreated_root() {
    let fixture = Fixture::new(FakeBackend::default());
    let view = fixture.coordinator.view();
    let mut roots = WatchRoots::new(
        collect_watch_paths(&view.config, &view.graph),
        &view.config.output,
    );
    let mut watcher = FakeWatcher::default();
    roots.attach_existing(&mut watcher).unwrap();

    let chat = fixture.path("resources/chat");
    fs::remove_dir_all(&chat).unwrap();
    roots.maintain(&mut watcher);
    assert!(!roots.is_attached(&chat));

    fs::create_dir_all(&chat).unwrap();
    roots.maintain(&mut watcher);
    assert!(roots.is_attached(&chat));
}

// ============================================================================
// coordinator
// ============================================================================

#[tokio::test]
async fn test_burst_of_writes_rebuilds_once() {
    let fixture = Fixture::new(FakeBackend::default());
    let file = fixture.path("resources/chat/main.ts");

    for _ in 0..5 {
        fixture.coordinator.schedule(file.clone());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(fixture.backend.calls(), names(&["chat"]));
    assert_eq!(fixture.reloads(), names(&["chat"]));
    assert_eq!(fixture.coordinator.pending(), 0);
}

#[tokio::test]
async fn test_change_while_building_is_dropped() {
    let fixture = Fixture::new(FakeBackend {
        delay: Duration::from_millis(300),
        ..Default::default()
    });
    let file = fixture.path("resources/admin/src/main.ts");

    let first = tokio::spawn({
        let coordinator = Arc::clone(&fixture.coordinator);
        let file = file.clone();
        async move { coordinator.rebuild_path(&file).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.coordinator.building(), names(&["admin"]));

    let second = fixture.coordinator.rebuild_path(&file).await;
    assert_eq!(second, RebuildOutcome::Dropped(names(&["admin"])));

    let first = first.await.unwrap();
    assert_eq!(
        first,
        RebuildOutcome::Built {
            names: names(&["admin", "admin/ui"]),
            success: true
        }
    );
    assert_eq!(fixture.backend.calls(), names(&["admin", "admin/ui"]));
    assert!(fixture.coordinator.building().is_empty());
}

#[tokio::test]
async fn test_other_resource_builds_concurrently() {
    let fixture = Fixture::new(FakeBackend {
        delay: Duration::from_millis(200),
        ..Default::default()
    });

    let admin = tokio::spawn({
        let coordinator = Arc::clone(&fixture.coordinator);
        let file = fixture.path("resources/admin/src/main.ts");
        async move { coordinator.rebuild_path(&file).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let chat = fixture
        .coordinator
        .rebuild_path(&fixture.path("resources/chat/main.ts"))
        .await;
    assert!(matches!(chat, RebuildOutcome::Built { success: true, .. }));
    assert!(matches!(admin.await.unwrap(), RebuildOutcome::Built { success: true, .. }));
}

#[tokio::test]
async fn test_views_change_rebuilds_only_views() {
    let fixture = Fixture::new(FakeBackend::default());

    let outcome = fixture
        .coordinator
        .rebuild_path(&fixture.path("resources/admin/ui/app.ts"))
        .await;
    assert_eq!(
        outcome,
        RebuildOutcome::Built {
            names: names(&["admin/ui"]),
            success: true
        }
    );
    assert_eq!(fixture.backend.calls(), names(&["admin/ui"]));
    assert_eq!(fixture.reloads(), names(&["admin"]));
}

#[tokio::test]
async fn test_unowned_path_is_ignored() {
    let fixture = Fixture::new(FakeBackend::default());
    let outcome = fixture
        .coordinator
        .rebuild_path(&fixture.path("README.md"))
        .await;
    assert_eq!(outcome, RebuildOutcome::Ignored);
    assert!(fixture.backend.calls().is_empty());
}

#[tokio::test]
async fn test_failed_rebuild_does_not_reload() {
    let fixture = Fixture::new(FakeBackend {
        fail: vec!["chat"],
        ..Default::default()
    });

    let outcome = fixture
        .coordinator
        .rebuild_path(&fixture.path("resources/chat/main.ts"))
        .await;
    assert_eq!(
        outcome,
        RebuildOutcome::Built {
            names: names(&["chat"]),
            success: false
        }
    );
    assert!(fixture.reloads().is_empty());
    assert!(fixture.coordinator.building().is_empty());
}

#[tokio::test]
async fn test_successful_rebuild_deploys_resource() {
    let config = format!("destination = \"server/resources\"\n{CONFIG}");
    let fixture = Fixture::with_config(FakeBackend::default(), &config);

    fixture
        .coordinator
        .rebuild_path(&fixture.path("resources/chat/main.ts"))
        .await;

    let deployed = fixture.path("server/resources/chat/out.txt");
    assert_eq!(fs::read_to_string(deployed).unwrap(), "chat");
    assert!(!fixture.path("server/resources/admin").exists());
}

#[tokio::test]
async fn test_config_change_rebuilds_everything() {
    let fixture = Fixture::new(FakeBackend::default());

    // same content: nothing happens
    assert!(fixture.coordinator.config_changed().await.is_none());
    assert!(fixture.backend.calls().is_empty());

    // drop the glob so only core and admin remain
    let trimmed = CONFIG.replace("include = [\"resources/*\"]", "");
    fs::write(fixture.path("resforge.toml"), trimmed).unwrap();

    let outcome = fixture.coordinator.config_changed().await;
    assert_eq!(
        outcome,
        Some(RebuildOutcome::Built {
            names: names(&["core", "admin", "admin/ui"]),
            success: true
        })
    );
    assert_eq!(fixture.coordinator.view().graph.len(), 3);
    // full rebuilds do not hot-reload
    assert!(fixture.reloads().is_empty());
}

#[tokio::test]
async fn test_invalid_config_keeps_previous_view() {
    let fixture = Fixture::new(FakeBackend::default());
    fs::write(fixture.path("resforge.toml"), "[resources\ninclude = 3").unwrap();

    assert!(fixture.coordinator.config_changed().await.is_none());
    assert_eq!(fixture.coordinator.view().graph.len(), 4);
    assert!(fixture.backend.calls().is_empty());
}

#[tokio::test]
async fn test_refresh_picks_up_new_resource() {
    let fixture = Fixture::new(FakeBackend::default());
    fs::create_dir_all(fixture.path("resources/inventory")).unwrap();

    fixture.coordinator.refresh().await;

    let view = fixture.coordinator.view();
    assert!(view.graph.tasks().iter().any(|t| t.name == "inventory"));
    // no rebuild until a file inside it changes
    assert!(fixture.backend.calls().is_empty());
}

#[tokio::test]
async fn test_config_write_rebuilds_without_debounce() {
    let fixture = Fixture::new(FakeBackend::default());
    let trimmed = CONFIG.replace("include = [\"resources/*\"]", "");
    fs::write(fixture.path("resforge.toml"), trimmed).unwrap();

    fixture
        .coordinator
        .on_change(FsChange::File(fixture.path("resforge.toml")));
    // the config file never waits out a quiet period
    assert_eq!(fixture.coordinator.pending(), 0);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(fixture.backend.calls(), names(&["admin", "admin/ui", "core"]));
    assert_eq!(fixture.coordinator.view().graph.len(), 3);
    assert!(fixture.reloads().is_empty());
}

#[tokio::test]
async fn test_source_write_is_debounced() {
    let fixture = Fixture::new(FakeBackend::default());
    fixture
        .coordinator
        .on_change(FsChange::File(fixture.path("resources/chat/main.ts")));
    assert_eq!(fixture.coordinator.pending(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(fixture.backend.calls(), names(&["chat"]));
    assert_eq!(fixture.coordinator.pending(), 0);
}

#[tokio::test]
async fn test_new_directory_refreshes_tasks() {
    let fixture = Fixture::new(FakeBackend::default());
    let created = fixture.path("resources/inventory");
    fs::create_dir_all(&created).unwrap();

    fixture.coordinator.on_change(FsChange::Dir(created));
    assert_eq!(fixture.coordinator.pending(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let view = fixture.coordinator.view();
    assert!(view.graph.tasks().iter().any(|t| t.name == "inventory"));
    assert!(fixture.backend.calls().is_empty());
}

#[test]
fn test_filter_keeps_build_folders_inside_units() {
    let dir = tempfile::tempdir().unwrap();
    let root = normalize_path(dir.path());
    let build_unit = root.join("resources/build");
    let vendored = root.join("vendor/node_modules/widget");
    let filter = EventFilter::new(&root, &root.join("dist")).with_sources([
        root.join("resources/admin"),
        build_unit.clone(),
        vendored.clone(),
    ]);

    let in_build_unit = build_unit.join("main.ts");
    let nested_build = root.join("resources/admin/src/build/helpers.ts");
    let in_vendored_unit = vendored.join("index.ts");
    let dependency = vendored.join("node_modules/dep/index.js");
    let output = root.join("dist/admin/server.js");

    let changes = filter.classify(&event(
        modify(),
        &[&in_build_unit, &nested_build, &in_vendored_unit, &dependency, &output],
    ));
    assert_eq!(
        changes,
        vec![
            FsChange::File(in_build_unit),
            FsChange::File(nested_build),
            FsChange::File(in_vendored_unit),
        ]
    );
}

#[tokio::test]
async fn test_resource_named_build_rebuilds() {
    let fixture = Fixture::new(FakeBackend::default());
    fs::create_dir_all(fixture.path("resources/build/src")).unwrap();
    fixture.coordinator.refresh().await;

    let view = fixture.coordinator.view();
    assert!(view.graph.tasks().iter().any(|t| t.name == "build"));

    let outcome = fixture
        .coordinator
        .rebuild_path(&fixture.path("resources/build/src/main.ts"))
        .await;
    assert_eq!(
        outcome,
        RebuildOutcome::Built {
            names: names(&["build"]),
            success: true
        }
    );
}
