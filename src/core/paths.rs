//! Path normalization utilities
//!
//! All relative paths are normalized to use '/' as separator. Canonical forms
//! are memoized in a [`PathCache`] owned by whoever is discovering files.

use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};

/// Default number of entries kept by a [`PathCache`]
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 4096;

/// Normalize a path to use '/' as separator (for cross-platform consistency)
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Make a path relative to the root directory
pub fn make_relative(path: &Path, root: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(normalize_path)
}

/// Check if a path is hidden (starts with '.')
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.') && name != "." && name != "..")
        .unwrap_or(false)
}

/// Resolve `.` and `..` without touching the filesystem
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, lexically normalized form of `path` resolved against `base`
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        lexical_normalize(path)
    } else {
        lexical_normalize(&base.join(path))
    }
}

/// Bounded memo of canonical paths with first-in-first-out eviction.
///
/// Not shared across runs; each discovery owns one.
#[derive(Debug)]
pub struct PathCache {
    capacity: usize,
    entries: HashMap<PathBuf, PathBuf>,
    order: VecDeque<PathBuf>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Canonical form of `path`; falls back to lexical normalization when the
    /// path cannot be resolved (e.g. it vanished mid-run)
    pub fn canonicalize(&mut self, path: &Path) -> PathBuf {
        if let Some(hit) = self.entries.get(path) {
            return hit.clone();
        }

        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| lexical_normalize(path));

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(path.to_path_buf());
        self.entries.insert(path.to_path_buf(), canonical.clone());
        canonical
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_CACHE_CAPACITY)
    }
}
