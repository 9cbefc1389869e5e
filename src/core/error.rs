//! Error taxonomy for the packing pipeline
//!
//! Safety-limit violations and tokenizer initialization failures are fatal and
//! travel up to the CLI. Per-file faults never show up here: they become
//! skip sentinels on the file's record (see `core::model::SkipReason`).

use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PackError {
    #[error(
        "too many files: found {found}, limit is {limit}. \
Narrow the input paths or --exclude patterns, or raise --max-files"
    )]
    TooManyFiles { found: usize, limit: usize },

    #[error(
        "file too large: {} is {size} bytes, limit is {limit} bytes. \
Exclude it or raise --max-file-size",
        path.display()
    )]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error(
        "too many tokens: output has {found} tokens, limit is {limit}. \
Narrow the input paths, add token limit rules, or raise --max-total-tokens"
    )]
    TooManyTokens { found: usize, limit: usize },

    #[error("tokenizer unavailable: {0}")]
    TokenizerInit(String),

    #[error("tokenization failed: {0}")]
    Tokenize(String),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("git failed: {0}")]
    Git(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to start worker pool: {0}")]
    Pool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PackError>;
