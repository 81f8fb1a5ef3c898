//! Per-path quiet period.
//!
//! Every change bumps a process-wide generation and records it as the
//! latest for its path. A timer armed with that generation fires the
//! rebuild only if no newer change to the same path arrived meanwhile.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

#[derive(Default)]
struct State {
    next: u64,
    latest: FxHashMap<PathBuf, u64>,
}

#[derive(Default)]
pub(super) struct Debouncer {
    state: Mutex<State>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Record a change to `path` and return its generation.
    pub(super) fn touch(&self, path: &Path) -> u64 {
        let mut state = self.state.lock();
        state.next += 1;
        let generation = state.next;
        state.latest.insert(path.to_path_buf(), generation);
        generation
    }

    /// `true` if `generation` is still the latest change to `path`.
    /// Consumes the entry so the path starts a fresh window.
    pub(super) fn settle(&self, path: &Path, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.latest.get(path) == Some(&generation) {
            state.latest.remove(path);
            true
        } else {
            false
        }
    }

    /// Paths with an armed timer.
    pub(super) fn pending(&self) -> usize {
        self.state.lock().latest.len()
    }
}
