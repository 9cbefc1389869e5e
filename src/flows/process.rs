//! Concurrent file processing
//!
//! Reads every discovered file on the worker pool and turns it into a
//! [`FileRecord`]. Output order always equals discovery order.

use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;

use crate::core::error::{PackError, Result};
use crate::core::file_reader::read_source_file;
use crate::core::limits::TokenLimits;
use crate::core::model::{FileContent, FileRecord, SkipReason};
use crate::core::tokenizer::Tokenizer;
use crate::core::truncate::TruncationStrategy;
use crate::flows::discover::DiscoveredFile;

/// Per-run processing options
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub max_file_size: u64,
    /// Abort instead of emitting a `TooLarge` sentinel
    pub fail_on_large_file: bool,
    /// Tokenize and truncate each file now (stats mode)
    pub eager: bool,
    pub strategy: TruncationStrategy,
}

pub struct FileProcessor {
    limits: TokenLimits,
    tokenizer: Arc<dyn Tokenizer>,
    pool: Arc<ThreadPool>,
    options: ProcessOptions,
}

impl FileProcessor {
    pub fn new(
        limits: TokenLimits,
        tokenizer: Arc<dyn Tokenizer>,
        pool: Arc<ThreadPool>,
        options: ProcessOptions,
    ) -> Self {
        Self {
            limits,
            tokenizer,
            pool,
            options,
        }
    }

    /// Process files concurrently; unreadable files are logged and omitted
    pub fn process(&self, files: &[DiscoveredFile]) -> Result<Vec<FileRecord>> {
        let mut indexed: Vec<(usize, FileRecord)> = self.pool.install(|| {
            files
                .par_iter()
                .enumerate()
                .filter_map(|(index, file)| match self.process_one(file) {
                    Ok(Some(record)) => Some(Ok((index, record))),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                })
                .collect::<Result<Vec<_>>>()
        })?;

        indexed.sort_by_key(|(index, _)| *index);
        let records: Vec<FileRecord> = indexed.into_iter().map(|(_, record)| record).collect();

        tracing::info!(
            "processed {} of {} files ({} skipped)",
            records.len(),
            files.len(),
            records.iter().filter(|r| r.content.is_skipped()).count()
        );
        Ok(records)
    }

    fn process_one(&self, file: &DiscoveredFile) -> Result<Option<FileRecord>> {
        let path = file.path.clone();
        let rel = file.relative_path.clone();

        let read = match read_source_file(&file.path, self.options.max_file_size) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!("skipping {}: {}", rel, e);
                return Ok(None);
            }
        };

        let content = match read {
            FileContent::Text(content) => content,
            FileContent::Skipped(SkipReason::TooLarge) if self.options.fail_on_large_file => {
                let size = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);
                return Err(PackError::FileTooLarge {
                    path,
                    size,
                    limit: self.options.max_file_size,
                });
            }
            FileContent::Skipped(reason) => {
                tracing::debug!("{}: {}", rel, reason);
                return Ok(Some(FileRecord::skipped(path, rel, reason)));
            }
        };

        let limit = self.limits.resolve(file_name(&rel), &rel);
        if limit == 0 {
            tracing::debug!("{}: token limit is 0", rel);
            return Ok(Some(FileRecord::skipped(path, rel, SkipReason::Excluded)));
        }

        if !self.options.eager {
            return Ok(Some(FileRecord::text(path, rel, content)));
        }

        let result = self
            .options
            .strategy
            .apply(self.tokenizer.as_ref(), &content, limit);
        if result.truncated {
            tracing::debug!(
                "{}: truncated {} -> {} tokens",
                rel,
                result.original_token_count,
                result.token_count
            );
        }

        let mut record = FileRecord::text(path, rel, result.content);
        record.token_count = result.token_count;
        record.original_token_count = result.original_token_count;
        record.truncated = result.truncated;
        Ok(Some(record))
    }
}

fn file_name(relative_path: &str) -> &str {
    relative_path
        .rsplit_once('/')
        .map(|(_, name)| name)
        .unwrap_or(relative_path)
}
