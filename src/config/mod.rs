//! Project configuration management for `resforge.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── build/     # [build], [build.server], [build.client]
//! │   ├── dev        # [dev], [dev.remote]
//! │   └── unit       # [core], [resources], [standalone]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section          | Purpose                                          |
//! |------------------|--------------------------------------------------|
//! | top level        | Project name, output and deploy destination      |
//! | `[core]`         | The mandatory core unit                          |
//! | `[resources]`    | Resource units (glob includes + explicit units)  |
//! | `[standalone]`   | Standalone units, compiled or copied             |
//! | `[build]`        | Compiler command and per-target defaults         |
//! | `[dev]`          | Debounce, local port, remote reload credentials  |
//!
//! Precedence, weakest first: built-in defaults, the file, `RESFORGE_*`
//! environment variables, command-line flags.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

// Re-export from section/
pub use section::{
    BuildSectionConfig, Credentials, DEFAULT_CORE_PATH, DevConfig, RemoteConfig, Target,
    TargetOptions, TargetOverride, TargetSetting, UnitConfig, UnitGroupConfig, ViewsConfig,
};

// Re-export from types/
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default output directory, relative to the project root.
pub const DEFAULT_OUTPUT: &str = "dist";

// ============================================================================
// command-line overrides
// ============================================================================

/// Values from the command line that take precedence over the file.
///
/// Kept apart from [`Cli`] so the watch coordinator can reload the config
/// with the same overrides the process started with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub output: Option<PathBuf>,
    pub minify: Option<bool>,
    pub source_maps: Option<bool>,
    pub sequential: bool,
    pub workers: Option<usize>,
    pub clean: bool,
    pub port: Option<u16>,
}

impl ConfigOverrides {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut overrides = Self::default();
        if let Some(args) = cli.build_args() {
            overrides.output.clone_from(&args.output);
            overrides.minify = args.minify;
            overrides.source_maps = args.source_maps;
            overrides.sequential = args.sequential;
            overrides.workers = args.workers;
            overrides.clean = args.clean;
        }
        if let Commands::Dev { port, .. } = &cli.command {
            overrides.port = *port;
        }
        overrides
    }
}

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing resforge.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Project name. Defaults to the root directory name.
    pub name: String,

    /// Build output directory.
    pub output: PathBuf,

    /// Deploy destination. `None` disables deployment.
    pub destination: Option<PathBuf>,

    /// The mandatory core unit.
    pub core: UnitConfig,

    pub resources: UnitGroupConfig,

    pub standalone: UnitGroupConfig,

    pub build: BuildSectionConfig,

    pub dev: DevConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            name: String::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            destination: None,
            core: UnitConfig::at(DEFAULT_CORE_PATH),
            resources: UnitGroupConfig::default(),
            standalone: UnitGroupConfig::default(),
            build: BuildSectionConfig::default(),
            dev: DevConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file; the project root is
    /// the file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let Some(path) = find_config_file(&cli.config, &cwd) else {
            bail!(
                "Config file '{}' not found in {} or any parent directory",
                cli.config.display(),
                cwd.display()
            );
        };
        Self::load_from(&path, &ConfigOverrides::from_cli(cli))
    }

    /// Load, finalize and validate the config at `path`.
    ///
    /// Used both at startup and by the watch coordinator on config changes.
    pub fn load_from(path: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = Self::from_path(path)?;
        config.config_path = crate::utils::path::normalize_path(path);
        config.finalize(overrides, |key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    ///
    /// Unknown keys never abort: dev mode reloads the file unattended.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored: {}", display_path, fields.join(", "));
    }

    /// Resolve root, apply overrides and normalize paths.
    fn finalize(&mut self, overrides: &ConfigOverrides, env: impl Fn(&str) -> Option<String>) {
        let root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.root = crate::utils::path::normalize_path(&root);

        if self.name.is_empty() {
            self.name = self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }

        self.dev.apply_env(env);
        self.apply_overrides(overrides);
        self.normalize_paths();
    }

    /// Apply command-line overrides.
    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        Self::update_option(&mut self.output, overrides.output.as_ref());
        Self::update_option(&mut self.build.minify, overrides.minify.as_ref());
        Self::update_option(&mut self.build.source_maps, overrides.source_maps.as_ref());
        Self::update_option(&mut self.dev.port, overrides.port.as_ref());
        if overrides.workers.is_some() {
            self.build.workers = overrides.workers;
        }
        if overrides.sequential {
            self.build.parallel = false;
        }
        self.build.clean = overrides.clean;
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Normalize all paths relative to root directory.
    fn normalize_paths(&mut self) {
        let root = self.root.clone();

        self.output = crate::utils::path::normalize_path(&root.join(&self.output));
        if let Some(destination) = self.destination.take() {
            self.destination = Some(crate::utils::path::expand_path(&destination, &root));
        }

        if self.core.path.as_os_str().is_empty() {
            self.core.path = PathBuf::from(DEFAULT_CORE_PATH);
        }
        self.core.normalize(&root);
        self.resources.normalize(&root);
        self.standalone.normalize(&root);
    }

    /// Get path relative to the project root, for display.
    pub fn root_relative(&self, path: impl AsRef<Path>) -> String {
        crate::utils::path::relative_display(path.as_ref(), &self.root)
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate the finalized configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        if !self.config_path.exists() {
            bail!(ConfigError::Validation("config file not found".into()));
        }

        self.core.validate("core", &mut diag);
        if !self.core.compile {
            diag.error("core.compile", "the core unit is always compiled");
        }
        self.resources.validate("resources", &mut diag);
        self.standalone.validate("standalone", &mut diag);
        self.build.validate(&mut diag);
        self.dev.validate(&mut diag);
        self.validate_unique_names(&mut diag);

        if let Some(destination) = &self.destination
            && (destination == &self.output || destination.starts_with(&self.output))
        {
            diag.error_with_hint(
                "destination",
                "destination lies inside the output directory",
                "deploying would copy the output into itself",
            );
        }

        diag.print_warnings();

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    /// Display names of explicit units must not collide.
    fn validate_unique_names(&self, diag: &mut ConfigDiagnostics) {
        let mut seen = rustc_hash::FxHashMap::default();
        seen.insert(self.core.display_name(), FieldPath::new("core"));

        let groups = [("resources.units", &self.resources), ("standalone.units", &self.standalone)];
        for (section, group) in groups {
            for (i, unit) in group.units.iter().enumerate() {
                let field = FieldPath::indexed(section, i, "name");
                let name = unit.display_name();
                if let Some(first) = seen.get(&name) {
                    diag.error(
                        field,
                        format!("name `{name}` is already used by {first}"),
                    );
                } else {
                    seen.insert(name, field);
                }
            }
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config content without touching the filesystem.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Write `content` as `resforge.toml` under `root` and load it.
#[cfg(test)]
pub fn test_load_config(root: &Path, content: &str) -> Result<ProjectConfig> {
    let path = root.join("resforge.toml");
    fs::write(&path, content)?;
    ProjectConfig::load_from(&path, &ConfigOverrides::default())
}

// ============================================================================
// tests
// ============================================================================
