//! Compiler backend that spawns an external process per task.
//!
//! Invocation form, run in the project root:
//!
//! ```text
//! <command...> --kind <kind> --source <dir> --output <dir> --options <json>
//! ```
//!
//! Exit status 0 is success; stdout and stderr are captured.

use anyhow::{Context, Result, bail};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, atomic::AtomicBool},
};

use super::{BackendOutput, CompilerBackend};
use crate::{
    config::{ProjectConfig, Target},
    debug,
    graph::BuildTask,
    utils::exec::{Cmd, strip_ansi},
};

pub struct ProcessBackend {
    /// Default command (`build.compiler`).
    command: Vec<String>,
    root: PathBuf,
}

impl ProcessBackend {
    pub fn new(command: Vec<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            command,
            root: root.into(),
        }
    }

    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.build.compiler.clone(), &config.root)
    }

    /// Command for `task`, with a relative script path anchored at the root.
    fn command_for(&self, task: &BuildTask) -> Result<Vec<String>> {
        let mut command = task
            .compiler
            .clone()
            .unwrap_or_else(|| self.command.clone());

        let Some(program) = command.first_mut() else {
            bail!("no compiler command configured for `{}`", task.name);
        };
        if program.contains(['/', '\\']) && Path::new(program.as_str()).is_relative() {
            *program = self.root.join(&*program).to_string_lossy().into_owned();
        }
        Ok(command)
    }
}

impl CompilerBackend for ProcessBackend {
    fn run(&self, task: &BuildTask, cancel: &Arc<AtomicBool>) -> Result<BackendOutput> {
        let command = self.command_for(task)?;
        let options =
            serde_json::to_string(&task.options).context("Failed to encode task options")?;

        let targets: Vec<&str> = Target::ALL
            .into_iter()
            .filter(|&t| task.is_enabled(t))
            .map(Target::as_str)
            .collect();
        debug!("compile"; "{} [{}] via `{}`", task.name, targets.join(","), command.join(" "));

        let captured = Cmd::from_slice(&command)
            .args(["--kind", task.kind.as_str()])
            .arg("--source")
            .arg(&task.source)
            .arg("--output")
            .arg(&task.output)
            .args(["--options", options.as_str()])
            .cwd(&self.root)
            .cancel(Arc::clone(cancel))
            .run_captured()
            .with_context(|| format!("Failed to run compiler for `{}`", task.name))?;

        let mut log = strip_ansi(&captured.output).into_owned();
        if !captured.success() && !captured.cancelled {
            let status = captured
                .status
                .and_then(|s| s.code())
                .map_or_else(|| "a signal".to_string(), |c| format!("status {c}"));
            if !log.is_empty() && !log.ends_with('\n') {
                log.push('\n');
            }
            log.push_str(&format!("compiler exited with {status}"));
        }

        Ok(BackendOutput {
            success: captured.success(),
            log,
            cancelled: captured.cancelled,
        })
    }
}
