//! File discovery
//!
//! Turns the requested inputs into a deduplicated, filtered, sorted list of
//! files. Enumeration comes from git when the inputs live in a repository
//! and from a directory walk otherwise.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::backends::git;
use crate::backends::walk::{DirectoryWalker, WalkOptions};
use crate::core::error::{PackError, Result};
use crate::core::model::DiscoveryMode;
use crate::core::paths::{absolutize, make_relative, normalize_path, PathCache};
use crate::core::pattern::{has_wildcard, PatternSet};
use crate::core::settings::Settings;

/// A file that survived discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Relative to the scan root, '/' separated
    pub relative_path: String,
}

/// Result of one discovery run
#[derive(Debug, Clone)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    pub mode: DiscoveryMode,
}

/// Discovery orchestrator. Owns the canonical-path cache for its run.
pub struct FileDiscovery<'a> {
    settings: &'a Settings,
    root: PathBuf,
    scopes: Vec<PathBuf>,
    include: PatternSet,
    exclude: PatternSet,
    exclude_names: Vec<String>,
    exclude_paths: Vec<String>,
    include_dirs: Vec<String>,
    types: Vec<String>,
    cache: PathCache,
}

impl<'a> FileDiscovery<'a> {
    pub fn new(settings: &'a Settings) -> Result<Self> {
        Self::with_cache(settings, PathCache::default())
    }

    pub fn with_cache(settings: &'a Settings, cache: PathCache) -> Result<Self> {
        let root = settings.root.canonicalize()?;

        let mut scopes = Vec::new();
        let mut include_patterns = settings.include_patterns.clone();
        for input in &settings.paths {
            let absolute = absolutize(input, &root);
            if absolute.exists() {
                scopes.push(absolute.canonicalize().unwrap_or(absolute));
                continue;
            }

            let text = normalize_path(input);
            if has_wildcard(&text) {
                let pattern = text.trim_start_matches("./").to_string();
                tracing::debug!("treating {} as an include pattern", pattern);
                include_patterns.push(pattern);
            } else {
                return Err(PackError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("path does not exist: {}", input.display()),
                )));
            }
        }
        if scopes.is_empty() {
            scopes.push(root.clone());
        }

        let mut exclude_names = Vec::new();
        let mut exclude_paths = Vec::new();
        for dir in settings.all_exclude_dirs() {
            let dir = dir.trim_matches('/');
            if dir.is_empty() {
                continue;
            }
            if dir.contains('/') {
                exclude_paths.push(dir.to_string());
            } else {
                exclude_names.push(dir.to_string());
            }
        }

        Ok(Self {
            settings,
            root,
            scopes,
            include: PatternSet::new(&include_patterns)?,
            exclude: PatternSet::new(&settings.exclude_patterns)?,
            exclude_names,
            exclude_paths,
            include_dirs: settings
                .include_dirs
                .iter()
                .map(|d| d.trim_matches('/').to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            types: settings
                .types
                .iter()
                .map(|t| t.trim_start_matches('.').to_lowercase())
                .collect(),
            cache,
        })
    }

    /// Enumerate, filter, dedupe, sort, and enforce `max_files`
    pub fn discover(&mut self) -> Result<Discovery> {
        let (mode, repo_root) = self.select_mode()?;
        tracing::debug!("discovery mode: {}", mode);

        let (candidates, mode) = match (mode, &repo_root) {
            (DiscoveryMode::Diff, Some(repo)) => (self.enumerate_changes(repo)?, mode),
            (DiscoveryMode::Vcs, Some(repo)) => match git::list_files(repo) {
                Ok(files) => (git::filter_to_scopes(files, &self.scopes), mode),
                Err(e) => {
                    tracing::warn!("git listing failed, walking instead: {}", e);
                    (self.enumerate_walk(), DiscoveryMode::Walk)
                }
            },
            _ => (self.enumerate_walk(), DiscoveryMode::Walk),
        };

        let files = self.filter(candidates);
        tracing::info!("discovered {} files ({})", files.len(), mode);

        let limit = self.settings.limits.max_files;
        if files.len() > limit {
            return Err(PackError::TooManyFiles {
                found: files.len(),
                limit,
            });
        }

        Ok(Discovery { files, mode })
    }

    fn select_mode(&self) -> Result<(DiscoveryMode, Option<PathBuf>)> {
        let wants_git = self.settings.use_git || self.settings.diff_only;
        let git_ready = wants_git && git::is_git_available();
        let repo_root = if git_ready {
            git::find_repo_root(&self.root)
        } else {
            None
        };

        let usable = repo_root.as_ref().filter(|repo| {
            self.root.starts_with(repo) && self.scopes.iter().all(|s| s.starts_with(repo))
        });

        if self.settings.diff_only {
            return match usable {
                Some(repo) => Ok((DiscoveryMode::Diff, Some(repo.clone()))),
                None => Err(PackError::NotARepository(self.root.clone())),
            };
        }

        match usable {
            Some(repo) if self.settings.use_git => Ok((DiscoveryMode::Vcs, Some(repo.clone()))),
            _ => Ok((DiscoveryMode::Walk, None)),
        }
    }

    fn enumerate_walk(&self) -> Vec<PathBuf> {
        let walker = DirectoryWalker::new(
            &self.root,
            WalkOptions {
                hidden: self.settings.hidden,
                respect_ignore_files: self.settings.respect_ignore_files,
                exclude_dirs: self.settings.all_exclude_dirs(),
                max_depth: None,
            },
        );
        self.scopes
            .iter()
            .flat_map(|scope| walker.walk(scope))
            .collect()
    }

    fn enumerate_changes(&self, repo: &Path) -> Result<Vec<PathBuf>> {
        let changed: Vec<PathBuf> = git::changed_files(repo)?
            .into_iter()
            .filter(|entry| !entry.is_deleted())
            .map(|entry| repo.join(entry.path))
            .filter(|path| path.is_file())
            .collect();
        Ok(git::filter_to_scopes(changed, &self.scopes))
    }

    fn filter(&mut self, candidates: Vec<PathBuf>) -> Vec<DiscoveredFile> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for path in candidates {
            let canonical = self.cache.canonicalize(&path);
            if !seen.insert(canonical.clone()) {
                continue;
            }

            let relative_path =
                make_relative(&path, &self.root).unwrap_or_else(|| normalize_path(&path));
            let named = self.named_scope(&canonical);
            if self.keep(&relative_path, named.as_deref()) {
                files.push(DiscoveredFile {
                    path,
                    relative_path,
                });
            }
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        files
    }

    /// Root-relative path of the deepest input that contains `canonical`,
    /// unless that input is the root itself
    fn named_scope(&self, canonical: &Path) -> Option<String> {
        self.scopes
            .iter()
            .filter(|scope| **scope != self.root && canonical.starts_with(scope))
            .max_by_key(|scope| scope.as_os_str().len())
            .and_then(|scope| make_relative(scope, &self.root))
    }

    /// Apply every filter to one file. `named` is the input path the file was
    /// found under; directories at or above it are not subject to the hidden
    /// or excluded-directory rules, and a file named directly skips them all.
    fn keep(&self, relative_path: &str, named: Option<&str>) -> bool {
        let (dirs, file_name) = match relative_path.rsplit_once('/') {
            Some((dirs, name)) => (dirs, name),
            None => ("", relative_path),
        };

        let named_directly = named == Some(relative_path);
        let (checked_dirs, skipped_prefix) = match named {
            Some(scope) if !named_directly => match dirs.strip_prefix(scope) {
                Some(below) => (below.trim_start_matches('/'), format!("{}/", scope)),
                None => (dirs, String::new()),
            },
            _ => (dirs, String::new()),
        };

        if !named_directly && !checked_dirs.is_empty() {
            let excluded_component = checked_dirs.split('/').any(|component| {
                self.exclude_names.iter().any(|n| n == component)
                    || (!self.settings.hidden && component.starts_with('.'))
            });
            if excluded_component {
                tracing::debug!("{}: under an excluded or hidden directory", relative_path);
                return false;
            }
            let dir_prefix = format!("{}/", dirs);
            let excluded_path = self.exclude_paths.iter().any(|p| {
                let p = format!("{}/", p);
                dir_prefix.starts_with(&p) && !skipped_prefix.starts_with(&p)
            });
            if excluded_path {
                tracing::debug!("{}: under an excluded directory", relative_path);
                return false;
            }
        }

        if !named_directly && !self.settings.hidden && file_name.starts_with('.') {
            tracing::debug!("{}: hidden file", relative_path);
            return false;
        }

        if !self.include_dirs.is_empty() {
            let inside = self
                .include_dirs
                .iter()
                .any(|d| relative_path.starts_with(&format!("{}/", d)));
            if !inside {
                return false;
            }
        }

        if !self.types.is_empty() {
            let ext = file_name
                .rsplit_once('.')
                .map(|(_, e)| e.to_lowercase())
                .unwrap_or_default();
            if !self.types.contains(&ext) {
                return false;
            }
        }

        if !self.include.is_empty() && !self.include.is_match(relative_path, file_name) {
            return false;
        }

        if let Some(pattern) = self.exclude.first_match(relative_path, file_name) {
            tracing::debug!("{} excluded by {}", relative_path, pattern.as_str());
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, rel).unwrap();
    }

    fn settings(root: &Path) -> Settings {
        Settings {
            root: root.to_path_buf(),
            use_git: false,
            ..Default::default()
        }
    }

    fn relative(discovery: &Discovery) -> Vec<&str> {
        discovery
            .files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect()
    }

    #[test]
    fn test_exclusions_end_to_end() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/app.swift");
        touch(temp.path(), "build/app.swift");
        touch(temp.path(), "vendor/lib.php");

        let settings = Settings {
            exclude_patterns: vec!["vendor/**".into()],
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&discovery), vec!["src/app.swift"]);
        assert_eq!(discovery.mode, DiscoveryMode::Walk);
    }

    #[test]
    fn test_too_many_files() {
        let temp = tempdir().unwrap();
        for i in 0..15 {
            touch(temp.path(), &format!("f{:02}.txt", i));
        }

        let mut settings = settings(temp.path());
        settings.limits.max_files = 10;
        let err = FileDiscovery::new(&settings).unwrap().discover().unwrap_err();
        match err {
            PackError::TooManyFiles { found, limit } => {
                assert_eq!(found, 15);
                assert_eq!(limit, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exactly_max_files_passes() {
        let temp = tempdir().unwrap();
        for i in 0..10 {
            touch(temp.path(), &format!("f{:02}.txt", i));
        }
        let mut settings = settings(temp.path());
        settings.limits.max_files = 10;
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(discovery.files.len(), 10);
    }

    #[test]
    fn test_ordering_is_stable_across_runs() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "z.rs");
        touch(temp.path(), "a/b.rs");
        touch(temp.path(), "m.rs");

        let settings = settings(temp.path());
        let first = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        let second = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&first), vec!["a/b.rs", "m.rs", "z.rs"]);
        assert_eq!(first.files, second.files);
    }

    #[test]
    fn test_overlapping_inputs_are_deduplicated() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/lib.rs");
        touch(temp.path(), "src/main.rs");

        let settings = Settings {
            paths: vec!["src".into(), "src/lib.rs".into(), "./src/../src/main.rs".into()],
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&discovery), vec!["src/lib.rs", "src/main.rs"]);
    }

    #[test]
    fn test_glob_input_becomes_include_pattern() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/lib.rs");
        touch(temp.path(), "src/notes.md");
        touch(temp.path(), "README.md");

        let settings = Settings {
            paths: vec!["**/*.md".into()],
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&discovery), vec!["README.md", "src/notes.md"]);
    }

    #[test]
    fn test_missing_input_is_error() {
        let temp = tempdir().unwrap();
        let settings = Settings {
            paths: vec!["nope".into()],
            ..settings(temp.path())
        };
        assert!(matches!(
            FileDiscovery::new(&settings),
            Err(PackError::Io(_))
        ));
    }

    #[test]
    fn test_types_and_include_dirs() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "src/a.rs");
        touch(temp.path(), "src/b.py");
        touch(temp.path(), "tests/c.rs");

        let settings = Settings {
            types: vec![".rs".into()],
            include_dirs: vec!["src/".into()],
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&discovery), vec!["src/a.rs"]);
    }

    #[test]
    fn test_include_patterns_require_a_match() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "instance/a/content/x.txt");
        touch(temp.path(), "instance/a/other/y.txt");

        let settings = Settings {
            include_patterns: vec!["instance/*/content/**".into()],
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&discovery), vec!["instance/a/content/x.txt"]);
    }

    #[test]
    fn test_bracket_in_pattern_is_literal() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "[draft].md");
        touch(temp.path(), "d.md");

        let settings = Settings {
            exclude_patterns: vec!["[draft].md".into()],
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(relative(&discovery), vec!["d.md"]);
    }

    #[test]
    fn test_named_inputs_bypass_hidden_and_excluded_dirs() {
        let temp = tempdir().unwrap();
        touch(temp.path(), ".github/ci.yml");
        touch(temp.path(), ".github/workflows/build.yml");
        touch(temp.path(), "build/gen.rs");
        touch(temp.path(), ".env");
        touch(temp.path(), "src/main.rs");

        let named = |paths: &[&str]| {
            let settings = Settings {
                paths: paths.iter().map(PathBuf::from).collect(),
                ..settings(temp.path())
            };
            let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
            let files: Vec<String> = relative(&discovery).into_iter().map(String::from).collect();
            files
        };

        assert_eq!(named(&[".github/ci.yml"]), vec![".github/ci.yml"]);
        assert_eq!(
            named(&[".github"]),
            vec![".github/ci.yml", ".github/workflows/build.yml"]
        );
        assert_eq!(named(&["build", ".env"]), vec![".env", "build/gen.rs"]);
        assert_eq!(named(&["."]), vec!["src/main.rs"]);
    }

    #[test]
    fn test_diff_without_repository() {
        let temp = tempdir().unwrap();
        if git::is_git_available() && git::find_repo_root(temp.path()).is_some() {
            return;
        }
        let settings = Settings {
            diff_only: true,
            ..settings(temp.path())
        };
        let err = FileDiscovery::new(&settings).unwrap().discover().unwrap_err();
        assert!(matches!(err, PackError::NotARepository(_)));
    }

    #[test]
    fn test_vcs_mode_uses_git_listing() {
        if !git::is_git_available() {
            return;
        }
        let temp = tempdir().unwrap();
        let status = std::process::Command::new("git")
            .current_dir(temp.path())
            .args(["init", "-q"])
            .status()
            .unwrap();
        assert!(status.success());
        fs::write(temp.path().join(".gitignore"), "*.log\n").unwrap();
        touch(temp.path(), "src/main.rs");
        touch(temp.path(), "trace.log");

        let settings = Settings {
            use_git: true,
            ..settings(temp.path())
        };
        let discovery = FileDiscovery::new(&settings).unwrap().discover().unwrap();
        assert_eq!(discovery.mode, DiscoveryMode::Vcs);
        assert_eq!(relative(&discovery), vec!["src/main.rs"]);
    }
}
