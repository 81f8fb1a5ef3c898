//! `[core]`, `[resources]` and `[standalone]` unit declarations.
//!
//! # Example
//!
//! ```toml
//! [core]
//! path = "core"
//! entry_points = { server = "src/server/main.ts" }
//! views = { path = "core/ui", framework = "react" }
//!
//! [resources]
//! include = ["resources/*", "resources/[gameplay]/*"]
//!
//! [[resources.units]]
//! path = "resources/admin"
//! client = { entry = "src/client/app.ts" }
//! compiler = ["node", "tools/admin.mjs"]
//!
//! [[standalone.units]]
//! path = "standalone/loading"
//! compile = false              # Copied, not compiled
//! ```
//!
//! All paths are relative to the project root until the config is
//! finalized, after which they are absolute.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::build::{Target, TargetSetting};
use crate::config::ConfigDiagnostics;

/// Default source directory of the core unit.
pub const DEFAULT_CORE_PATH: &str = "core";

/// One compilable unit (core, resource or standalone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Source directory.
    pub path: PathBuf,

    /// Display name. Defaults to the directory name.
    pub name: Option<String>,

    /// `None` detects the target from the source tree.
    pub server: Option<TargetSetting>,

    pub client: Option<TargetSetting>,

    /// Entry file per target name, e.g. `{ server = "src/main.ts" }`.
    pub entry_points: BTreeMap<String, String>,

    /// Compiler command replacing `build.compiler` for this unit.
    pub compiler: Option<Vec<String>>,

    /// Auxiliary UI pipeline built as a separate `views` task.
    pub views: Option<ViewsConfig>,

    /// `false` copies the directory instead of compiling it (standalone only).
    pub compile: bool,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            name: None,
            server: None,
            client: None,
            entry_points: BTreeMap::new(),
            compiler: None,
            views: None,
            compile: true,
        }
    }
}

impl UnitConfig {
    /// Unit at `path` with every other field defaulted.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Configured name, or the last component of the source directory.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| dir_name(&self.path))
    }

    pub fn setting(&self, target: Target) -> Option<&TargetSetting> {
        match target {
            Target::Server => self.server.as_ref(),
            Target::Client => self.client.as_ref(),
        }
    }

    pub fn entry_point(&self, target: Target) -> Option<&str> {
        self.entry_points.get(target.as_str()).map(String::as_str)
    }

    /// Resolve relative paths against the project root.
    pub(crate) fn normalize(&mut self, root: &Path) {
        self.path = crate::utils::path::normalize_path(&root.join(&self.path));
        if let Some(views) = &mut self.views {
            views.path = crate::utils::path::normalize_path(&root.join(&views.path));
        }
    }

    /// Check a unit after normalization. `field` prefixes diagnostic paths.
    pub fn validate(&self, field: &str, diag: &mut ConfigDiagnostics) {
        if !self.path.is_dir() {
            diag.error_with_hint(
                format!("{field}.path"),
                format!("directory not found: {}", self.path.display()),
                "paths are relative to the directory holding the config file",
            );
        }

        if let Some(views) = &self.views
            && !views.path.is_dir()
        {
            diag.error(
                format!("{field}.views.path"),
                format!("directory not found: {}", views.path.display()),
            );
        }

        for key in self.entry_points.keys() {
            if !Target::ALL.iter().any(|t| t.as_str() == key) {
                diag.error_with_hint(
                    format!("{field}.entry_points.{key}"),
                    format!("unknown target `{key}`"),
                    "expected `server` or `client`",
                );
            }
        }

        if let Some(compiler) = &self.compiler
            && compiler.first().is_none_or(|p| p.trim().is_empty())
        {
            diag.error(
                format!("{field}.compiler"),
                "compiler command is empty",
            );
        }

        if let Some(name) = &self.name
            && (name.is_empty() || name.contains('/'))
        {
            diag.error(
                format!("{field}.name"),
                format!("invalid name `{name}`: must be non-empty without `/`"),
            );
        }
    }
}

/// Auxiliary asset pipeline of a unit (e.g. a web UI).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    /// Pipeline source directory.
    pub path: PathBuf,

    /// Framework hint passed to the compiler (`react`, `vue`, ...).
    pub framework: Option<String>,

    /// Entry file of the pipeline, e.g. `index.html`.
    pub entry: Option<String>,
}

/// `[resources]` / `[standalone]` section: glob includes plus explicit units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitGroupConfig {
    /// Directory glob patterns relative to the project root.
    pub include: Vec<String>,

    pub units: Vec<UnitConfig>,
}

impl UnitGroupConfig {
    pub(crate) fn normalize(&mut self, root: &Path) {
        for unit in &mut self.units {
            unit.normalize(root);
        }
    }

    pub fn validate(&self, section: &str, diag: &mut ConfigDiagnostics) {
        for pattern in &self.include {
            if Path::new(pattern).is_absolute() || pattern.split('/').any(|s| s == "..") {
                diag.error_with_hint(
                    format!("{section}.include"),
                    format!("pattern `{pattern}` leaves the project root"),
                    "use a pattern relative to the project root",
                );
            }
        }
        for (i, unit) in self.units.iter().enumerate() {
            unit.validate(&format!("{section}.units[{i}]"), diag);
        }
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
