//! Build task types.

use serde::Serialize;
use std::{collections::BTreeMap, fmt, path::PathBuf};

use crate::config::{Target, TargetOptions};

/// Suffix of the name of a unit's `views` task.
pub const VIEWS_SUFFIX: &str = "/ui";

/// What the compiler backend is asked to do with a source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Core,
    Resource,
    Standalone,
    Views,
    Copy,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Core,
        TaskKind::Resource,
        TaskKind::Standalone,
        TaskKind::Views,
        TaskKind::Copy,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Resource => "resource",
            Self::Standalone => "standalone",
            Self::Views => "views",
            Self::Copy => "copy",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options handed to the compiler backend as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOptions {
    /// Enabled targets only.
    pub targets: BTreeMap<Target, TargetOptions>,
    pub minify: bool,
    pub source_maps: bool,
    /// `false` mirrors the source instead of compiling it.
    pub compile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    /// Entry file of a `views` pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

/// One compiler backend invocation.
///
/// Immutable once built; shared as `Arc<BuildTask>` between the watch
/// view and the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTask {
    /// Logical name; `views` tasks carry a `/ui` suffix.
    pub name: String,
    pub kind: TaskKind,
    pub source: PathBuf,
    pub output: PathBuf,
    pub options: TaskOptions,
    /// Replaces `build.compiler` for this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<Vec<String>>,
}

impl BuildTask {
    /// Resource identity: the name up to the first `/`.
    #[inline]
    pub fn identity(&self) -> &str {
        resource_identity(&self.name)
    }

    pub fn is_enabled(&self, target: Target) -> bool {
        self.options.targets.contains_key(&target)
    }
}

impl fmt::Display for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Substring of a task name before the first `/`.
#[inline]
pub fn resource_identity(name: &str) -> &str {
    name.split_once('/').map_or(name, |(identity, _)| identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_identity() {
        assert_eq!(resource_identity("admin"), "admin");
        assert_eq!(resource_identity("admin/ui"), "admin");
        assert_eq!(resource_identity("a/b/c"), "a");
    }

    #[test]
    fn test_options_json_shape() {
        let mut targets = BTreeMap::new();
        targets.insert(
            Target::Client,
            TargetOptions {
                platform: "browser".into(),
                format: "iife".into(),
                entry: "src/client/index.ts".into(),
            },
        );
        let options = TaskOptions {
            targets,
            minify: true,
            source_maps: false,
            compile: true,
            framework: None,
            entry: None,
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["targets"]["client"]["format"], "iife");
        assert_eq!(json["minify"], true);
        assert!(json.get("framework").is_none());
    }
}
