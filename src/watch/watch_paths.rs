//! Directories the dev loop watches.

use std::path::PathBuf;

use crate::{
    config::ProjectConfig,
    graph::{TaskGraph, glob},
};

/// What to watch for one config/graph pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct WatchPaths {
    /// Task source roots, watched with all their subdirectories.
    pub(super) roots: Vec<PathBuf>,
    /// Single directories: glob bases and the config file's directory.
    pub(super) bases: Vec<PathBuf>,
}

/// Collect watch paths for `config` and its task graph.
///
/// Roots nested in another root and anything inside the output directory
/// are dropped. The config directory is watched instead of the file itself
/// so atomic saves (write + rename) are still seen.
pub(super) fn collect_watch_paths(config: &ProjectConfig, graph: &TaskGraph) -> WatchPaths {
    let output = &config.output;

    let mut sources: Vec<PathBuf> = graph
        .tasks()
        .iter()
        .map(|t| t.source.clone())
        .filter(|p| !p.starts_with(output))
        .collect();
    sources.sort();
    sources.dedup();

    let roots: Vec<PathBuf> = sources
        .iter()
        .filter(|p| !sources.iter().any(|o| o != *p && p.starts_with(o)))
        .cloned()
        .collect();

    let patterns = config
        .resources
        .include
        .iter()
        .chain(&config.standalone.include);
    let mut bases: Vec<PathBuf> = patterns
        .map(|p| glob::watch_base(&config.root, p))
        .chain(config.config_path.parent().map(PathBuf::from))
        .filter(|p| !p.starts_with(output))
        .collect();
    bases.sort();
    bases.dedup();

    WatchPaths { roots, bases }
}
