//! Directory walking backend
//!
//! Uses the ignore crate when ignore files should be honored and walkdir for
//! a raw traversal. Excluded directories are pruned before descent in both.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::core::paths::{is_hidden, make_relative};

/// Traversal options
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Include dotfiles and dot-directories
    pub hidden: bool,
    /// Honor .gitignore, .ignore and git excludes
    pub respect_ignore_files: bool,
    /// Directory names, or root-relative directory paths, never descended into
    pub exclude_dirs: Vec<String>,
    pub max_depth: Option<usize>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            hidden: false,
            respect_ignore_files: true,
            exclude_dirs: Vec::new(),
            max_depth: None,
        }
    }
}

/// Recursive file enumerator rooted at the scan root
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    options: WalkOptions,
    excluded: Arc<ExcludedDirs>,
}

impl DirectoryWalker {
    pub fn new(root: &Path, options: WalkOptions) -> Self {
        let excluded = Arc::new(ExcludedDirs::new(root, &options.exclude_dirs));
        Self { options, excluded }
    }

    /// Every regular file under `start`, sorted by path.
    ///
    /// A file passed as `start` is returned as-is; unreadable entries are
    /// logged and skipped.
    pub fn walk(&self, start: &Path) -> Vec<PathBuf> {
        if start.is_file() {
            return vec![start.to_path_buf()];
        }

        let mut files = if self.options.respect_ignore_files {
            self.walk_with_ignore(start)
        } else {
            self.walk_raw(start)
        };

        files.sort();
        files
    }

    fn walk_with_ignore(&self, start: &Path) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(start);
        builder
            .standard_filters(false)
            .hidden(!self.options.hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .parents(true)
            .require_git(false)
            .follow_links(false);

        if let Some(depth) = self.options.max_depth {
            builder.max_depth(Some(depth));
        }

        let excluded = Arc::clone(&self.excluded);
        builder.filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            !(is_dir && excluded.is_excluded(entry.path()))
        });

        let mut files = Vec::new();
        for entry in builder.build() {
            match entry {
                Ok(entry) => {
                    if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => tracing::warn!("walk error: {}", e),
            }
        }
        files
    }

    fn walk_raw(&self, start: &Path) -> Vec<PathBuf> {
        let mut walker = WalkDir::new(start).follow_links(false);
        if let Some(depth) = self.options.max_depth {
            walker = walker.max_depth(depth);
        }

        let hidden = self.options.hidden;
        let excluded = Arc::clone(&self.excluded);
        let iter = walker.into_iter().filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            if !hidden && is_hidden(entry.path()) {
                return false;
            }
            !(entry.file_type().is_dir() && excluded.is_excluded(entry.path()))
        });

        let mut files = Vec::new();
        for entry in iter {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => tracing::warn!("walk error: {}", e),
            }
        }
        files
    }
}

/// Directory exclusion list split by shape
#[derive(Debug)]
struct ExcludedDirs {
    root: PathBuf,
    names: Vec<String>,
    paths: Vec<String>,
}

impl ExcludedDirs {
    fn new(root: &Path, entries: &[String]) -> Self {
        let mut names = Vec::new();
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.trim_matches('/');
            if entry.is_empty() {
                continue;
            }
            if entry.contains('/') {
                paths.push(entry.to_string());
            } else {
                names.push(entry.to_string());
            }
        }
        Self {
            root: root.to_path_buf(),
            names,
            paths,
        }
    }

    fn is_excluded(&self, dir: &Path) -> bool {
        let name_hit = dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.names.iter().any(|n| n == name))
            .unwrap_or(false);
        if name_hit {
            return true;
        }
        if self.paths.is_empty() {
            return false;
        }
        match make_relative(dir, &self.root) {
            Some(rel) => self.paths.iter().any(|p| *p == rel),
            None => false,
        }
    }
}
