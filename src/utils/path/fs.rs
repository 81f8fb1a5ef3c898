//! Path normalization utilities.
//!
//! Every path that ends up in a build task or a watch root goes through
//! [`normalize_path`], so prefix comparisons between watcher events and task
//! source roots compare like with like.

use std::path::{Path, PathBuf};

/// Directories never treated as sources: dependencies, VCS data and caches.
///
/// Build output is excluded through the configured output path, not by
/// name, so folders called `build` or `dist` stay ordinary sources.
pub const NOISE_DIRS: &[&str] = &["node_modules", ".git", ".cache"];

/// Whether a directory name is one of [`NOISE_DIRS`].
#[inline]
pub fn is_noise_dir(name: &str) -> bool {
    NOISE_DIRS.contains(&name)
}

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Expand `~` and resolve a configured path against the project root.
pub fn expand_path(path: &Path, root: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_relative() {
        normalize_path(&root.join(path))
    } else {
        normalize_path(&path)
    }
}

/// Path relative to `root` for display, or the path itself when outside.
pub fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
