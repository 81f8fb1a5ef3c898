//! Changed path to affected tasks.

use std::{path::Path, sync::Arc};

use crate::graph::{BuildTask, TaskGraph, TaskKind};

/// Tasks to rebuild after a change at `path`.
///
/// The owner is the task with the longest source prefix of `path`. A
/// `views` owner is rebuilt alone; any other owner pulls in every task
/// sharing its resource identity. Paths outside all sources yield nothing.
pub(super) fn affected(graph: &TaskGraph, path: &Path) -> Vec<Arc<BuildTask>> {
    let Some(owner) = graph
        .tasks()
        .iter()
        .filter(|t| path.starts_with(&t.source))
        .max_by_key(|t| t.source.components().count())
    else {
        return Vec::new();
    };

    if owner.kind == TaskKind::Views {
        return vec![Arc::clone(owner)];
    }

    graph.for_identity(owner.identity())
}
