//! Aggregate token counting
//!
//! The assembled output is counted once, at the end. Large documents are cut
//! into line-aligned chunks that are counted in parallel on a bounded pool;
//! the pool size caps how many tokenizer calls run at the same time.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

use crate::core::error::{PackError, Result};
use crate::core::tokenizer::Tokenizer;
use crate::core::util::floor_char_boundary;

/// Documents at or below this size are counted in one call (1 MiB)
pub const CHUNK_THRESHOLD: usize = 1024 * 1024;

/// Target chunk size above the threshold (256 KiB)
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Number of worker threads to use when none is configured
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Build the shared worker pool
pub fn worker_pool(threads: usize) -> Result<Arc<ThreadPool>> {
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("ctxpack-worker-{}", i))
        .build()
        .map(Arc::new)
        .map_err(|e| PackError::Pool(e.to_string()))
}

/// Counts tokens of assembled output
pub struct TokenCounter {
    tokenizer: Arc<dyn Tokenizer>,
    pool: Arc<ThreadPool>,
    threshold: usize,
    chunk_size: usize,
}

impl TokenCounter {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, pool: Arc<ThreadPool>) -> Self {
        Self {
            tokenizer,
            pool,
            threshold: CHUNK_THRESHOLD,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override chunking thresholds
    #[cfg(test)]
    pub fn with_chunking(mut self, threshold: usize, chunk_size: usize) -> Self {
        self.threshold = threshold;
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn count(&self, text: &str) -> usize {
        if text.len() <= self.threshold {
            return self.pool.install(|| self.tokenizer.count(text));
        }

        let chunks = split_chunks(text, self.chunk_size);
        tracing::debug!(
            "counting {} bytes in {} chunks on {} threads",
            text.len(),
            chunks.len(),
            self.pool.current_num_threads()
        );

        let tokenizer = &self.tokenizer;
        self.pool
            .install(|| chunks.par_iter().map(|chunk| tokenizer.count(chunk)).sum())
    }

    /// Count and fail if the total exceeds `max_total_tokens`
    pub fn enforce(&self, text: &str, max_total_tokens: usize) -> Result<usize> {
        let found = self.count(text);
        if found > max_total_tokens {
            return Err(PackError::TooManyTokens {
                found,
                limit: max_total_tokens,
            });
        }
        Ok(found)
    }
}

/// Split into pieces of at most `chunk_size` bytes, cut after the last newline
/// inside each window when there is one, never inside a character
pub fn split_chunks(text: &str, chunk_size: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / chunk_size + 1);
    let mut start = 0;

    while start < text.len() {
        let mut end = floor_char_boundary(text, start + chunk_size);

        if end < text.len() {
            if let Some(pos) = text[start..end].rfind('\n') {
                end = start + pos + 1;
            }
        }

        if end <= start {
            // Window narrower than the character at `start`
            end = start
                + text[start..]
                    .chars()
                    .next()
                    .map(char::len_utf8)
                    .unwrap_or(1);
        }

        chunks.push(&text[start..end]);
        start = end;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::testing::CharTokenizer;

    fn counter() -> TokenCounter {
        TokenCounter::new(Arc::new(CharTokenizer), worker_pool(2).unwrap())
    }

    #[test]
    fn test_split_chunks_prefers_newlines() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_chunks(text, 7);
        assert_eq!(chunks, vec!["aaaa\n", "bbbb\n", "cccc"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_chunks_without_newlines() {
        let chunks = split_chunks("abcdefg", 3);
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_split_chunks_respects_char_boundaries() {
        let text = "你好世界";
        let chunks = split_chunks(text, 4);
        assert_eq!(chunks, vec!["你", "好", "世", "界"]);

        let chunks = split_chunks(text, 1);
        assert_eq!(chunks.concat(), text);
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_split_chunks_empty() {
        assert!(split_chunks("", 10).is_empty());
    }

    #[test]
    fn test_count_small_document() {
        assert_eq!(counter().count("hello"), 5);
        assert_eq!(counter().count(""), 0);
    }

    #[test]
    fn test_count_chunked_matches_whole() {
        let text = "line of text\n".repeat(500);
        let chunked = counter().with_chunking(64, 100);
        assert_eq!(chunked.count(&text), text.chars().count());
    }

    #[test]
    fn test_enforce() {
        let counter = counter();
        assert_eq!(counter.enforce("abc", 3).unwrap(), 3);

        match counter.enforce("abcd", 3) {
            Err(PackError::TooManyTokens { found, limit }) => {
                assert_eq!(found, 4);
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_worker_pool_size() {
        let pool = worker_pool(3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        assert!(default_parallelism() >= 1);
    }
}
