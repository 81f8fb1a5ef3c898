//! `[build]` section configuration.
//!
//! Global defaults applied to every unit before per-unit overrides.
//!
//! # Example
//!
//! ```toml
//! [build]
//! compiler = ["node", "tools/compile.mjs"]  # Compiler backend command
//! minify = false
//! source_maps = true
//! parallel = true             # false = run tasks one by one, stop at first failure
//! workers = 4                 # Default: available parallelism
//!
//! [build.server]
//! platform = "node"
//! format = "cjs"
//! entry = "src/server/index.ts"
//! dir = "src/server"          # Presence enables the target for resources
//!
//! [build.client]
//! platform = "browser"
//! format = "iife"
//! entry = "src/client/index.ts"
//! dir = "src/client"
//! ```

mod target;

pub use target::{Target, TargetDefaults, TargetOptions, TargetOverride, TargetSetting};

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Default compiler backend executable.
pub const DEFAULT_COMPILER: &str = "resforge-compiler";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSectionConfig {
    /// Compiler backend command (program followed by fixed arguments).
    pub compiler: Vec<String>,

    pub minify: bool,

    pub source_maps: bool,

    /// Run tasks on the worker pool (true) or one at a time (false).
    pub parallel: bool,

    /// Worker count for parallel builds.
    pub workers: Option<usize>,

    pub server: TargetDefaults,

    pub client: TargetDefaults,

    /// Remove the output directory before a full build (CLI only).
    #[serde(skip)]
    pub clean: bool,
}

impl Default for BuildSectionConfig {
    fn default() -> Self {
        Self {
            compiler: vec![DEFAULT_COMPILER.to_string()],
            minify: false,
            source_maps: true,
            parallel: true,
            workers: None,
            server: TargetDefaults::default(),
            client: TargetDefaults::default(),
            clean: false,
        }
    }
}

impl BuildSectionConfig {
    /// Global options for one target, with built-in fallbacks filled in.
    pub fn target(&self, target: Target) -> TargetOptions {
        self.target_table(target).resolve(target)
    }

    /// Source subdirectory whose presence enables `target` for a unit.
    pub fn detect_dir(&self, target: Target) -> &str {
        self.target_table(target)
            .dir
            .as_deref()
            .unwrap_or(target.default_dir())
    }

    fn target_table(&self, target: Target) -> &TargetDefaults {
        match target {
            Target::Server => &self.server,
            Target::Client => &self.client,
        }
    }

    /// Effective worker count: configured value or available parallelism.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match self.compiler.first() {
            None => diag.error_with_hint(
                "build.compiler",
                "compiler command is empty",
                format!("e.g. compiler = [\"{DEFAULT_COMPILER}\"]"),
            ),
            Some(program) if program.trim().is_empty() => {
                diag.error("build.compiler", "compiler program name is empty")
            }
            Some(program) => {
                // Relative scripts resolve against the project root at run time,
                // so a PATH miss is only worth a warning.
                if !program.contains(['/', '\\']) && which::which(program).is_err() {
                    diag.warn(
                        "build.compiler",
                        format!("`{program}` not found in PATH"),
                    );
                }
            }
        }

        if self.workers == Some(0) {
            diag.error("build.workers", "worker count must be at least 1");
        }
    }
}
