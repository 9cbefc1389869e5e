//! Resolved settings
//!
//! One value carries everything the pipeline needs. It starts from defaults,
//! is overlaid by an optional TOML file, and finally by command-line flags.
//!
//! ```toml
//! max_tokens_per_file = 8000
//! exclude_patterns = ["vendor/**", "*.generated.rs"]
//!
//! [limits]
//! max_files = 2000
//!
//! [[token_limits]]
//! pattern = "docs/**"
//! limit = 0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{PackError, Result};
use crate::core::limits::TokenLimitRule;
use crate::core::model::SafetyLimits;
use crate::core::tokenizer::TokenModel;
use crate::core::truncate::TruncationStrategy;

/// Config file looked up in the root when `--config` is not given
pub const CONFIG_FILE_NAME: &str = ".ctxpack.toml";

/// Default per-file token ceiling
pub const DEFAULT_FILE_TOKEN_LIMIT: usize = 25_000;

/// Directories never descended into
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "build",
    "dist",
    "out",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".idea",
    ".vscode",
    ".build",
    "DerivedData",
    "Pods",
    ".next",
    ".nuxt",
    "coverage",
    ".gradle",
    ".cache",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Scan root; relative paths and patterns are resolved against it
    #[serde(skip)]
    pub root: PathBuf,

    /// Files, directories, or glob patterns to pack (empty means the root)
    pub paths: Vec<PathBuf>,

    /// Token model name (see `TokenModel`)
    pub model: String,

    /// Global per-file token ceiling
    pub max_tokens_per_file: usize,

    /// Directory names (or relative paths) pruned in addition to the defaults
    pub exclude_dirs: Vec<String>,

    /// Only keep files under these relative directories
    pub include_dirs: Vec<String>,

    /// Keep only files matching one of these globs
    pub include_patterns: Vec<String>,

    /// Drop files matching any of these globs
    pub exclude_patterns: Vec<String>,

    /// Extension filter, without the dot (`rs`, `py`)
    pub types: Vec<String>,

    /// Per-pattern ceilings; `0` skips the file
    pub token_limits: Vec<TokenLimitRule>,

    pub limits: SafetyLimits,

    /// How over-limit files are cut in eager mode
    pub truncation: TruncationStrategy,

    /// Tokenize and truncate every file (stats mode) instead of only the final output
    pub eager_tokenization: bool,

    /// Abort instead of skipping when a file exceeds `limits.max_file_size`
    pub fail_on_large_file: bool,

    /// Prefer git's file list when inside a repository
    pub use_git: bool,

    /// Only pack uncommitted changes
    pub diff_only: bool,

    /// Honor .gitignore/.ignore files during a filesystem walk
    pub respect_ignore_files: bool,

    /// Include dotfiles and dot-directories
    pub hidden: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            paths: Vec::new(),
            model: TokenModel::default().to_string(),
            max_tokens_per_file: DEFAULT_FILE_TOKEN_LIMIT,
            exclude_dirs: Vec::new(),
            include_dirs: Vec::new(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            types: Vec::new(),
            token_limits: Vec::new(),
            limits: SafetyLimits::default(),
            truncation: TruncationStrategy::default(),
            eager_tokenization: false,
            fail_on_large_file: false,
            use_git: true,
            diff_only: false,
            respect_ignore_files: true,
            hidden: false,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PackError::Config(e.to_string()))
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            PackError::Config(msg) => PackError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Explicit config path, else `.ctxpack.toml` in the root, else defaults
    pub fn load_for_root(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    tracing::debug!("loading config from {}", candidate.display());
                    Self::load(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        settings.root = root.to_path_buf();
        Ok(settings)
    }

    pub fn token_model(&self) -> Result<TokenModel> {
        self.model.parse().map_err(PackError::Config)
    }

    /// Default exclusions followed by the configured ones
    pub fn all_exclude_dirs(&self) -> Vec<String> {
        DEFAULT_EXCLUDE_DIRS
            .iter()
            .map(|s| s.to_string())
            .chain(self.exclude_dirs.iter().cloned())
            .collect()
    }

    /// Reject values that would make every run fail
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_files == 0 {
            return Err(PackError::Config("limits.max_files must be > 0".into()));
        }
        if self.limits.max_total_tokens == 0 {
            return Err(PackError::Config(
                "limits.max_total_tokens must be > 0".into(),
            ));
        }
        self.token_model()?;
        Ok(())
    }
}
