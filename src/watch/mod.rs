//! Incremental watch mode.
//!
//! Architecture:
//! ```text
//! notify → bridge thread → EventFilter → WatchCoordinator
//!                                          ├─ Debouncer (per path)
//!                                          ├─ resolve (path → tasks)
//!                                          └─ run_tasks → Deployer → Notifier
//! ```
//!
//! The watcher is created after the initial build; changes made during
//! that build are picked up by the next save.

mod coordinator;
mod debouncer;
mod event;
mod resolve;
mod watch_paths;
mod watch_roots;

#[cfg(test)]
mod tests;

pub use coordinator::{BackendFactory, RebuildOutcome, WatchCoordinator, WatchView};

use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

use event::{EventFilter, FsChange};
use watch_paths::collect_watch_paths;
use watch_roots::WatchRoots;

use crate::{debug, log, utils::plural_count};

/// How often vanished watch roots are checked for reappearance.
const MAINTAIN_INTERVAL: Duration = Duration::from_secs(2);

const EVENT_BUFFER: usize = 64;

/// Watch the project until shutdown is requested.
pub async fn run(coordinator: Arc<WatchCoordinator>) -> Result<()> {
    // Create sync channel for notify (it doesn't support async)
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })
    .context("failed to create file watcher")?;

    let view = coordinator.view();
    let mut roots = WatchRoots::new(
        collect_watch_paths(&view.config, &view.graph),
        &view.config.output,
    );
    roots
        .attach_existing(&mut watcher)
        .context("failed to watch project")?;
    let mut filter = event_filter(&view);
    log!("watch"; "watching {}", plural_count(roots.attached_count(), "folder"));

    let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(EVENT_BUFFER);

    // Spawn a thread to poll notify events and send to async channel
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            match result {
                Ok(event) => {
                    if async_tx.blocking_send(event).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => log!("watch"; "notify error: {}", e),
            }
        }
    });

    let mut maintain = tokio::time::interval(MAINTAIN_INTERVAL);
    maintain.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = crate::core::wait_for_shutdown() => break,
            Some(event) = async_rx.recv() => {
                debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);
                for change in filter.classify(&event) {
                    if let FsChange::Dir(dir) = &change {
                        let added = roots.attach_tree(&mut watcher, dir);
                        debug!("watch"; "watching new directory {} (+{})", dir.display(), added);
                    }
                    coordinator.on_change(change);
                }
            }
            () = coordinator.rewatch.notified() => {
                let view = coordinator.view();
                roots.replace(
                    &mut watcher,
                    collect_watch_paths(&view.config, &view.graph),
                    &view.config.output,
                );
                filter = event_filter(&view);
                debug!("watch"; "watch set updated: {}", plural_count(roots.attached_count(), "folder"));
            }
            _ = maintain.tick() => roots.maintain(&mut watcher),
        }
    }

    let building = coordinator.building();
    if !building.is_empty() || coordinator.pending() > 0 {
        log!(
            "watch";
            "stopped with {} pending, still building: {}",
            plural_count(coordinator.pending(), "change"),
            building.join(", ")
        );
    } else {
        debug!("watch"; "stopped");
    }
    Ok(())
}

fn event_filter(view: &WatchView) -> EventFilter {
    EventFilter::new(&view.config.root, &view.config.output)
        .with_sources(view.graph.tasks().iter().map(|t| t.source.clone()))
}
