//! Compiler backend seam.
//!
//! The orchestrator never compiles anything itself. Each [`BuildTask`] is
//! handed to a [`CompilerBackend`]; the production backend spawns the
//! configured compiler process ([`ProcessBackend`]), tests plug in fakes.

mod process;

pub use process::ProcessBackend;

use anyhow::Result;
use std::sync::{Arc, atomic::AtomicBool};

use crate::graph::BuildTask;

/// What a backend reports for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOutput {
    pub success: bool,
    /// Captured compiler output (stdout then stderr).
    pub log: String,
    /// The invocation was killed through the cancel flag.
    pub cancelled: bool,
}

impl BackendOutput {
    pub fn ok(log: impl Into<String>) -> Self {
        Self {
            success: true,
            log: log.into(),
            cancelled: false,
        }
    }

    pub fn failed(log: impl Into<String>) -> Self {
        Self {
            success: false,
            log: log.into(),
            cancelled: false,
        }
    }
}

/// Runs one build task.
///
/// `Err` means the backend could not be invoked at all (e.g. the compiler
/// executable is missing); a compilation that ran and failed is
/// `Ok` with `success == false`.
pub trait CompilerBackend: Send + Sync {
    fn run(&self, task: &BuildTask, cancel: &Arc<AtomicBool>) -> Result<BackendOutput>;
}
