//! Task derivation from a finalized [`ProjectConfig`].
//!
//! Order: core (and its views), then per group the glob matches in
//! pattern order, then explicit units not matched by any glob.

use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::{
    glob,
    task::{BuildTask, TaskKind, TaskOptions, VIEWS_SUFFIX},
};
use crate::{
    config::{ConfigError, ProjectConfig, Target, TargetSetting, UnitConfig, UnitGroupConfig},
    debug,
};

/// Which group a unit was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Core,
    Resource,
    Standalone,
}

impl Role {
    fn kind(self, unit: &UnitConfig) -> TaskKind {
        match self {
            Self::Core => TaskKind::Core,
            Self::Resource => TaskKind::Resource,
            Self::Standalone if unit.compile => TaskKind::Standalone,
            Self::Standalone => TaskKind::Copy,
        }
    }

    const fn section(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Resource => "resources",
            Self::Standalone => "standalone",
        }
    }
}

pub(super) struct Builder<'a> {
    config: &'a ProjectConfig,
    tasks: Vec<BuildTask>,
    /// Source directories already claimed by a unit.
    sources: FxHashSet<PathBuf>,
    /// Display name -> source directory.
    names: FxHashMap<String, PathBuf>,
}

impl<'a> Builder<'a> {
    pub(super) fn new(config: &'a ProjectConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            sources: FxHashSet::default(),
            names: FxHashMap::default(),
        }
    }

    pub(super) fn build(mut self) -> Result<Vec<BuildTask>, ConfigError> {
        let config = self.config;
        if !config.core.path.is_dir() {
            return Err(missing_dir("core", &config.core.path));
        }
        self.push_unit(&config.core, Role::Core)?;

        self.push_group(&config.resources, Role::Resource)?;
        self.push_group(&config.standalone, Role::Standalone)?;
        Ok(self.tasks)
    }

    fn push_group(&mut self, group: &UnitGroupConfig, role: Role) -> Result<(), ConfigError> {
        let explicit: FxHashMap<&Path, usize> = group
            .units
            .iter()
            .enumerate()
            .map(|(i, unit)| (unit.path.as_path(), i))
            .collect();
        let mut consumed = vec![false; group.units.len()];

        for pattern in &group.include {
            let matches = glob::expand(&self.config.root, pattern);
            debug!("graph"; "{} `{}`: {} match(es)", role.section(), pattern, matches.len());

            for dir in matches {
                if self.sources.contains(&dir) || dir.starts_with(&self.config.output) {
                    continue;
                }
                // An explicit record for the same directory supplies the overrides.
                match explicit.get(dir.as_path()) {
                    Some(&i) => {
                        consumed[i] = true;
                        self.push_unit(&group.units[i], role)?;
                    }
                    None => self.push_unit(&UnitConfig::at(dir), role)?,
                }
            }
        }

        for (i, unit) in group.units.iter().enumerate() {
            if consumed[i] {
                continue;
            }
            if !unit.path.is_dir() {
                return Err(missing_dir(
                    &format!("{}.units[{i}]", role.section()),
                    &unit.path,
                ));
            }
            if self.sources.contains(&unit.path) {
                debug!("graph"; "skipping duplicate unit {}", unit.path.display());
                continue;
            }
            self.push_unit(unit, role)?;
        }
        Ok(())
    }

    fn push_unit(&mut self, unit: &UnitConfig, role: Role) -> Result<(), ConfigError> {
        let name = unit.display_name();
        if name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "cannot derive a name for {}",
                unit.path.display()
            )));
        }
        if let Some(other) = self.names.get(&name)
            && other != &unit.path
        {
            return Err(ConfigError::Validation(format!(
                "name `{name}` is used by both {} and {}",
                other.display(),
                unit.path.display()
            )));
        }
        self.names.insert(name.clone(), unit.path.clone());
        self.sources.insert(unit.path.clone());

        let kind = role.kind(unit);
        let targets = if kind == TaskKind::Copy {
            BTreeMap::new()
        } else {
            self.resolve_targets(unit, role)
        };

        let build = &self.config.build;
        let output = self.config.output.join(&name);

        let views = unit.views.as_ref().map(|views| BuildTask {
            name: format!("{name}{VIEWS_SUFFIX}"),
            kind: TaskKind::Views,
            source: views.path.clone(),
            output: output.join(VIEWS_SUFFIX.trim_start_matches('/')),
            options: TaskOptions {
                targets: BTreeMap::new(),
                minify: build.minify,
                source_maps: build.source_maps,
                compile: true,
                framework: views.framework.clone(),
                entry: views.entry.clone(),
            },
            compiler: unit.compiler.clone(),
        });

        self.tasks.push(BuildTask {
            name,
            kind,
            source: unit.path.clone(),
            output,
            options: TaskOptions {
                targets,
                minify: build.minify,
                source_maps: build.source_maps,
                compile: kind != TaskKind::Copy,
                framework: None,
                entry: None,
            },
            compiler: unit.compiler.clone(),
        });
        self.tasks.extend(views);
        Ok(())
    }

    /// Enabled targets with global defaults, entry points and custom
    /// settings applied in that order.
    fn resolve_targets(
        &self,
        unit: &UnitConfig,
        role: Role,
    ) -> BTreeMap<Target, crate::config::TargetOptions> {
        let build = &self.config.build;
        let mut targets = BTreeMap::new();

        for target in Target::ALL {
            let enabled = match unit.setting(target) {
                Some(setting) => setting.is_enabled(),
                None => role == Role::Core || unit.path.join(build.detect_dir(target)).is_dir(),
            };
            if !enabled {
                continue;
            }

            let mut options = build.target(target);
            if let Some(entry) = unit.entry_point(target) {
                options.entry = entry.to_string();
            }
            if let Some(TargetSetting::Custom(custom)) = unit.setting(target) {
                options = options.apply(custom);
            }
            targets.insert(target, options);
        }
        targets
    }
}

fn missing_dir(field: &str, path: &Path) -> ConfigError {
    ConfigError::Validation(format!(
        "`{field}.path`: directory not found: {}",
        path.display()
    ))
}
