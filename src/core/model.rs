//! Pipeline data model
//!
//! Every value here is built fresh per run and never patched afterwards;
//! stages that need a different record build a new one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default cap on the number of discovered files
pub const DEFAULT_MAX_FILES: usize = 10_000;

/// Default cap on a single file's size in bytes (10 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default cap on tokens in the assembled output
pub const DEFAULT_MAX_TOTAL_TOKENS: usize = 2_000_000;

/// Why a file's content was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Null byte found in the leading bytes
    Binary,
    /// Larger than the per-file size cap
    TooLarge,
    /// Not valid UTF-8
    InvalidUtf8,
    /// Token limit rule resolved to zero
    Excluded,
}

impl SkipReason {
    /// Sentinel text shown in place of the content
    pub fn sentinel(&self) -> &'static str {
        match self {
            SkipReason::Binary => "[binary file]",
            SkipReason::TooLarge => "[file too large]",
            SkipReason::InvalidUtf8 => "[invalid utf-8]",
            SkipReason::Excluded => "[excluded by token limit]",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SkipReason::Binary => "binary",
            SkipReason::TooLarge => "too large",
            SkipReason::InvalidUtf8 => "invalid utf-8",
            SkipReason::Excluded => "pattern-excluded",
        };
        write!(f, "{}", name)
    }
}

/// File content or the reason it was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileContent {
    Text(String),
    Skipped(SkipReason),
}

impl FileContent {
    /// Text to place in the assembled output
    pub fn as_display(&self) -> &str {
        match self {
            FileContent::Text(s) => s,
            FileContent::Skipped(reason) => reason.sentinel(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FileContent::Skipped(_))
    }
}

/// One processed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path
    pub path: PathBuf,

    /// Path relative to the scan root, using '/' as separator
    pub relative_path: String,

    pub content: FileContent,

    /// Tokens after truncation; 0 while tokenization is deferred
    pub token_count: usize,

    /// Tokens before truncation; 0 while tokenization is deferred
    pub original_token_count: usize,

    pub truncated: bool,
}

impl FileRecord {
    /// Untokenized text record
    pub fn text(path: PathBuf, relative_path: String, content: String) -> Self {
        Self {
            path,
            relative_path,
            content: FileContent::Text(content),
            token_count: 0,
            original_token_count: 0,
            truncated: false,
        }
    }

    /// Record carrying a skip sentinel
    pub fn skipped(path: PathBuf, relative_path: String, reason: SkipReason) -> Self {
        Self {
            path,
            relative_path,
            content: FileContent::Skipped(reason),
            token_count: 0,
            original_token_count: 0,
            truncated: false,
        }
    }
}

/// Hard caps. Exceeding any of them aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    pub max_files: usize,
    pub max_file_size: u64,
    pub max_total_tokens: usize,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_total_tokens: DEFAULT_MAX_TOTAL_TOKENS,
        }
    }
}

/// How discovery enumerated files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Tracked + untracked-but-not-ignored files from git
    Vcs,
    /// Uncommitted changes from git
    Diff,
    /// Recursive filesystem walk
    Walk,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryMode::Vcs => "git",
            DiscoveryMode::Diff => "git diff",
            DiscoveryMode::Walk => "walk",
        };
        write!(f, "{}", name)
    }
}

/// Everything the output stage needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackResult {
    pub records: Vec<FileRecord>,
    /// The assembled document
    pub output: String,
    /// Tokens in `output`, counted once
    pub total_tokens: usize,
    pub file_count: usize,
    pub mode: DiscoveryMode,
    pub token_model: String,
}

impl PackResult {
    pub fn skipped_count(&self) -> usize {
        self.records.iter().filter(|r| r.content.is_skipped()).count()
    }

    pub fn truncated_count(&self) -> usize {
        self.records.iter().filter(|r| r.truncated).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_are_distinct() {
        let reasons = [
            SkipReason::Binary,
            SkipReason::TooLarge,
            SkipReason::InvalidUtf8,
            SkipReason::Excluded,
        ];
        let mut sentinels: Vec<_> = reasons.iter().map(|r| r.sentinel()).collect();
        sentinels.sort();
        sentinels.dedup();
        assert_eq!(sentinels.len(), reasons.len());
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Binary.to_string(), "binary");
        assert_eq!(SkipReason::Excluded.to_string(), "pattern-excluded");
    }

    #[test]
    fn test_file_content_display() {
        assert_eq!(FileContent::Text("abc".into()).as_display(), "abc");
        assert_eq!(
            FileContent::Skipped(SkipReason::TooLarge).as_display(),
            "[file too large]"
        );
        assert!(FileContent::Skipped(SkipReason::Binary).is_skipped());
    }

    #[test]
    fn test_record_constructors() {
        let rec = FileRecord::text("/p/a.rs".into(), "a.rs".into(), "x".into());
        assert_eq!(rec.token_count, 0);
        assert!(!rec.truncated);

        let rec = FileRecord::skipped("/p/b.bin".into(), "b.bin".into(), SkipReason::Binary);
        assert!(rec.content.is_skipped());
    }

    #[test]
    fn test_safety_limits_default() {
        let limits = SafetyLimits::default();
        assert_eq!(limits.max_files, DEFAULT_MAX_FILES);
        assert_eq!(limits.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(limits.max_total_tokens, DEFAULT_MAX_TOTAL_TOKENS);
    }

    #[test]
    fn test_record_serializes() {
        let rec = FileRecord::skipped("/p/b.bin".into(), "b.bin".into(), SkipReason::Binary);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["content"]["skipped"], "binary");
        assert_eq!(json["relative_path"], "b.bin");
    }
}
