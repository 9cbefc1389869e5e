//! Git backend
//!
//! Asks git for the file list instead of walking the tree, so ignore rules are
//! evaluated exactly as git sees them. All output is requested NUL-separated
//! (`-z`) so paths with spaces or newlines survive unquoted.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::{PackError, Result};
use crate::core::util::command_exists;

/// Check if git is available in PATH
pub fn is_git_available() -> bool {
    command_exists("git")
}

/// One entry of `git status --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter XY status code (`" M"`, `"??"`, `"R "`)
    pub code: String,
    /// Path relative to the repository root; the new path for renames
    pub path: String,
}

impl StatusEntry {
    pub fn is_deleted(&self) -> bool {
        self.code.contains('D')
    }
}

/// Top level of the work tree containing `dir`, if any
pub fn find_repo_root(dir: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let top = stdout.trim();
    if top.is_empty() {
        return None;
    }
    let top = PathBuf::from(top);
    Some(top.canonicalize().unwrap_or(top))
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<Vec<u8>> {
    tracing::debug!("git {}", args.join(" "));
    let output = Command::new("git").current_dir(repo_root).args(args).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            return Err(PackError::NotARepository(repo_root.to_path_buf()));
        }
        return Err(PackError::Git(stderr.trim().to_string()));
    }

    Ok(output.stdout)
}

fn split_nul(bytes: &[u8]) -> impl Iterator<Item = String> + '_ {
    bytes
        .split(|b| *b == 0)
        .filter(|field| !field.is_empty())
        .map(|field| String::from_utf8_lossy(field).into_owned())
}

/// Tracked files plus untracked files that are not ignored.
///
/// Paths are absolute. Files deleted from the work tree but still in the
/// index are dropped.
pub fn list_files(repo_root: &Path) -> Result<Vec<PathBuf>> {
    let stdout = run_git(
        repo_root,
        &["ls-files", "--cached", "--others", "--exclude-standard", "-z"],
    )?;

    let mut files: Vec<PathBuf> = split_nul(&stdout)
        .map(|rel| repo_root.join(rel))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Uncommitted changes, including every untracked file
pub fn changed_files(repo_root: &Path) -> Result<Vec<StatusEntry>> {
    let stdout = run_git(
        repo_root,
        &["status", "--porcelain", "-z", "--untracked-files=all"],
    )?;
    Ok(parse_porcelain_z(&stdout))
}

/// Parse `git status --porcelain -z` output.
///
/// Rename and copy entries carry the original path as an extra field after
/// the new one; it is consumed and discarded.
pub fn parse_porcelain_z(bytes: &[u8]) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut fields = split_nul(bytes);

    while let Some(field) = fields.next() {
        if field.len() < 4 || !field.is_char_boundary(2) {
            continue;
        }
        let (code, rest) = field.split_at(2);
        let path = rest.trim_start_matches(' ').to_string();

        let index_code = code.chars().next().unwrap_or(' ');
        if matches!(index_code, 'R' | 'C') {
            fields.next();
        }

        entries.push(StatusEntry {
            code: code.to_string(),
            path,
        });
    }

    entries
}

/// Keep paths equal to or inside one of `scopes`; no scopes keeps everything
pub fn filter_to_scopes(paths: Vec<PathBuf>, scopes: &[PathBuf]) -> Vec<PathBuf> {
    if scopes.is_empty() {
        return paths;
    }
    paths
        .into_iter()
        .filter(|path| scopes.iter().any(|scope| path.starts_with(scope)))
        .collect()
}
