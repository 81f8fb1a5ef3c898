//! Task graph: the flat list of build tasks derived from the config.
//!
//! Tasks never depend on each other's outputs, so the "graph" has no
//! edges; it is an ordered, duplicate-free list.
//!
//! | Module    | Purpose                                     |
//! |-----------|---------------------------------------------|
//! | `task`    | `BuildTask`, `TaskKind`, resource identity  |
//! | `glob`    | Directory glob matching for unit discovery  |
//! | `builder` | Config → tasks derivation                   |

mod builder;
pub mod glob;
mod task;


pub use task::{BuildTask, TaskKind, TaskOptions, VIEWS_SUFFIX, resource_identity};

use std::sync::Arc;

use crate::config::{ConfigError, ProjectConfig};

/// Ordered build tasks: core first, then resources, then standalone units.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Arc<BuildTask>>,
}

impl TaskGraph {
    /// Derive every task of the project.
    pub fn build(config: &ProjectConfig) -> Result<Self, ConfigError> {
        let tasks = builder::Builder::new(config).build()?;
        Ok(Self {
            tasks: tasks.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn tasks(&self) -> &[Arc<BuildTask>] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks sharing a resource identity, in graph order.
    pub fn for_identity(&self, identity: &str) -> Vec<Arc<BuildTask>> {
        self.tasks
            .iter()
            .filter(|t| t.identity() == identity)
            .cloned()
            .collect()
    }

    /// `(kind, count)` for every kind, in [`TaskKind::ALL`] order.
    pub fn kind_counts(&self) -> Vec<(&'static str, usize)> {
        TaskKind::ALL
            .iter()
            .map(|kind| {
                let count = self.tasks.iter().filter(|t| t.kind == *kind).count();
                (kind.as_str(), count)
            })
            .collect()
    }
}
