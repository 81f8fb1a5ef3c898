//! Directory glob patterns for unit discovery.
//!
//! Patterns are matched one path segment at a time:
//!
//! | Segment | Matches                                   |
//! |---------|-------------------------------------------|
//! | `*`     | any run of characters inside one segment  |
//! | `?`     | exactly one character                     |
//! | `**`    | zero or more directory levels             |
//!
//! Brackets carry no meaning, so `resources/[gameplay]/*` names a real
//! `[gameplay]` folder. Only directories match; dot-directories and
//! [`NOISE_DIRS`](crate::utils::path::NOISE_DIRS) are skipped by wildcards.

use jwalk::WalkDir;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

use crate::utils::path::{is_noise_dir, normalize_path};

enum Segment {
    Literal(String),
    Wild(Regex),
    AnyDepth,
}

fn parse(pattern: &str) -> Vec<Segment> {
    pattern
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|s| match s {
            "**" => Segment::AnyDepth,
            s if s.contains(['*', '?']) => segment_regex(s)
                .map_or_else(|| Segment::Literal(s.to_string()), Segment::Wild),
            s => Segment::Literal(s.to_string()),
        })
        .collect()
}

fn segment_regex(segment: &str) -> Option<Regex> {
    let mut re = String::with_capacity(segment.len() + 8);
    re.push('^');
    for c in segment.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Directories under `root` matching `pattern`, in lexical order.
///
/// A pattern matching nothing yields an empty list.
pub fn expand(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let mut current = vec![root.to_path_buf()];

    for segment in parse(pattern) {
        let mut next = Vec::new();
        for dir in &current {
            match &segment {
                Segment::Literal(name) => {
                    let path = dir.join(name);
                    if path.is_dir() {
                        next.push(path);
                    }
                }
                Segment::Wild(re) => next.extend(
                    child_dirs(dir)
                        .into_iter()
                        .filter(|p| file_name(p).is_some_and(|n| re.is_match(n))),
                ),
                Segment::AnyDepth => next.extend(descendant_dirs(dir)),
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }

    // `**` can reach the same directory along several routes
    let mut seen = FxHashSet::default();
    current
        .into_iter()
        .map(|p| normalize_path(&p))
        .filter(|p| p != root && seen.insert(p.clone()))
        .collect()
}

/// Deepest existing directory above the first wildcard of `pattern`.
///
/// Watching it reveals directories that start matching later.
pub fn watch_base(root: &Path, pattern: &str) -> PathBuf {
    let mut base = root.to_path_buf();
    for segment in parse(pattern) {
        match segment {
            Segment::Literal(name) => base.push(name),
            Segment::Wild(_) | Segment::AnyDepth => break,
        }
    }
    base.ancestors()
        .find(|p| p.is_dir())
        .filter(|p| p.starts_with(root))
        .map_or_else(|| root.to_path_buf(), Path::to_path_buf)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_skipped(name: &str) -> bool {
    name.starts_with('.') || is_noise_dir(name)
}

fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<_> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|e| !is_skipped(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

fn descendant_dirs(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort(true)
        .skip_hidden(true)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().is_ok_and(|e| {
                    e.file_type().is_dir() && !is_skipped(&e.file_name().to_string_lossy())
                })
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect()
}
