use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use super::watch_paths::WatchPaths;
use crate::utils::path::is_noise_dir;

/// Watch-root consistency manager.
///
/// Source roots are watched one directory at a time so noise directories
/// (`node_modules`, `.git`, ...) never cost a watch handle.
///
/// Responsibility:
/// - Attach existing roots at startup
/// - Attach directories created under a watched directory
/// - Re-attach roots that were removed and recreated
/// - Swap the whole set after a config reload
pub(super) struct WatchRoots {
    desired: WatchPaths,
    output: PathBuf,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(paths: WatchPaths, output: &Path) -> Self {
        Self {
            desired: paths,
            output: output.to_path_buf(),
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing<W: Watcher>(&mut self, watcher: &mut W) -> notify::Result<()> {
        for base in self.desired.bases.clone() {
            if base.is_dir() && !self.attached.contains(&base) {
                watcher.watch(&base, RecursiveMode::NonRecursive)?;
                self.attached.insert(base);
            }
        }
        for root in self.desired.roots.clone() {
            self.attach_tree(watcher, &root);
        }
        Ok(())
    }

    /// Watch `dir` and every non-noise directory below it.
    /// Returns the number of newly attached directories.
    pub(super) fn attach_tree<W: Watcher>(&mut self, watcher: &mut W, dir: &Path) -> usize {
        if !dir.is_dir() || dir.starts_with(&self.output) {
            return 0;
        }

        let dirs: Vec<PathBuf> = WalkDir::new(dir)
            .skip_hidden(false)
            .process_read_dir(|_, _, _, children| {
                children.retain(|entry| {
                    entry.as_ref().is_ok_and(|e| {
                        e.file_type().is_dir()
                            && e.file_name().to_str().is_none_or(|n| {
                                !n.starts_with('.') && !is_noise_dir(n)
                            })
                    })
                });
            })
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| !p.starts_with(&self.output))
            .collect();

        let mut added = 0;
        for path in dirs {
            if self.attached.contains(&path) {
                continue;
            }
            match watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    self.attached.insert(path);
                    added += 1;
                }
                Err(e) => crate::debug!("watch"; "cannot watch {}: {}", path.display(), e),
            }
        }
        added
    }

    pub(super) fn maintain<W: Watcher>(&mut self, watcher: &mut W) {
        // Drop stale handles for directories that no longer exist.
        self.attached.retain(|path| path.exists());

        for root in self.desired.roots.clone() {
            if self.is_attached(&root) || !root.exists() {
                continue;
            }
            let added = self.attach_tree(watcher, &root);
            if added > 0 {
                crate::debug!("watch"; "re-attached watch: {}", root.display());
            }
        }
        for base in self.desired.bases.clone() {
            if self.is_attached(&base) || !base.is_dir() {
                continue;
            }
            if watcher.watch(&base, RecursiveMode::NonRecursive).is_ok() {
                crate::debug!("watch"; "re-attached watch: {}", base.display());
                self.attached.insert(base);
            }
        }
    }

    /// Switch to a new set of paths, unwatching directories it no longer
    /// covers.
    pub(super) fn replace<W: Watcher>(&mut self, watcher: &mut W, paths: WatchPaths, output: &Path) {
        self.output = output.to_path_buf();
        let stale: Vec<PathBuf> = self
            .attached
            .iter()
            .filter(|p| !covers(&paths, p) || p.starts_with(&self.output))
            .cloned()
            .collect();
        for path in stale {
            let _ = watcher.unwatch(&path);
            self.attached.remove(&path);
        }

        self.desired = paths;
        if let Err(e) = self.attach_existing(watcher) {
            crate::log!("watch"; "failed to watch: {}", e);
        }
    }

    pub(super) fn is_attached(&self, path: &Path) -> bool {
        self.attached.contains(path)
    }

    pub(super) fn attached_count(&self) -> usize {
        self.attached.len()
    }
}

fn covers(paths: &WatchPaths, path: &Path) -> bool {
    paths.roots.iter().any(|r| path.starts_with(r)) || paths.bases.iter().any(|b| b == path)
}
