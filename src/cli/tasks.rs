//! `resforge tasks`: print the resolved task list as JSON.

use anyhow::Result;

use crate::{
    config::ProjectConfig,
    graph::{BuildTask, TaskGraph},
};

pub fn to_json(graph: &TaskGraph, pretty: bool) -> Result<String> {
    let tasks: Vec<&BuildTask> = graph.tasks().iter().map(AsRef::as_ref).collect();
    let json = if pretty {
        serde_json::to_string_pretty(&tasks)?
    } else {
        serde_json::to_string(&tasks)?
    };
    Ok(json)
}

pub fn run(config: &ProjectConfig, pretty: bool) -> Result<()> {
    let graph = TaskGraph::build(config)?;
    println!("{}", to_json(&graph, pretty)?);
    Ok(())
}
