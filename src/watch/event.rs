//! Raw notify events to actionable changes.

use std::path::{Component, Path, PathBuf};

use notify::{
    EventKind,
    event::{CreateKind, ModifyKind},
};

use crate::utils::path::{is_noise_dir, normalize_path};

/// A change the coordinator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum FsChange {
    /// A file was written, created, renamed or removed.
    File(PathBuf),
    /// A directory appeared.
    Dir(PathBuf),
}

/// How an event kind says whether its paths are directories.
#[derive(Clone, Copy)]
enum Shape {
    Dir,
    File,
    /// Ask the filesystem.
    Probe,
}

/// Drops editor artifacts, metadata noise, output and noise directories.
///
/// Noise directories are only looked for below a unit's source, never in
/// the unit path itself.
pub(super) struct EventFilter {
    root: PathBuf,
    output: PathBuf,
    /// Unit source directories, deepest first.
    sources: Vec<PathBuf>,
}

impl EventFilter {
    pub(super) fn new(root: &Path, output: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            output: output.to_path_buf(),
            sources: Vec::new(),
        }
    }

    pub(super) fn with_sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources = sources.into_iter().collect();
        self.sources
            .sort_by_key(|p| std::cmp::Reverse(p.components().count()));
        self
    }

    pub(super) fn classify(&self, event: &notify::Event) -> Vec<FsChange> {
        let shape = match event.kind {
            EventKind::Create(CreateKind::Folder) => Shape::Dir,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_)) => Shape::Probe,
            // mtime/chmod noise would cause endless rebuild loops
            EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
            EventKind::Modify(_) | EventKind::Remove(_) => Shape::File,
            _ => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter(|p| !is_temp_file(p))
            .map(|p| normalize_path(p))
            .filter(|p| self.is_relevant(p))
            .map(|path| {
                let is_dir = match shape {
                    Shape::Dir => true,
                    Shape::File => false,
                    Shape::Probe => path.is_dir(),
                };
                if is_dir {
                    FsChange::Dir(path)
                } else {
                    FsChange::File(path)
                }
            })
            .collect()
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.output) {
            return false;
        }
        let base = self
            .sources
            .iter()
            .find(|s| path.starts_with(s))
            .unwrap_or(&self.root);
        let relative = path.strip_prefix(base).unwrap_or(path);
        !relative.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(is_noise_dir),
            _ => false,
        })
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
