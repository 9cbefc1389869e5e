//! Token-boundary truncation
//!
//! Content is encoded exactly once. Truncation slices the token sequence in
//! memory and decodes the kept slices, so the codec runs one encode and at
//! most two decodes regardless of file size.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::tokenizer::Tokenizer;

/// Share of the budget kept from the start of the file (the rest comes from the end)
const HEAD_NUMERATOR: usize = 3;
const HEAD_DENOMINATOR: usize = 4;

/// Characters per token assumed when the codec fails
const APPROX_CHARS_PER_TOKEN: usize = 4;

/// Outcome of a truncation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationResult {
    pub content: String,
    /// Tokens kept (excludes the marker)
    pub token_count: usize,
    pub original_token_count: usize,
    pub truncated: bool,
}

impl TruncationResult {
    fn unchanged(content: &str, token_count: usize) -> Self {
        Self {
            content: content.to_string(),
            token_count,
            original_token_count: token_count,
            truncated: false,
        }
    }
}

/// Which part of an over-limit file survives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationStrategy {
    /// First 75% and last 25% of the budget
    #[default]
    HeadTail,
    /// Only the start of the file
    Head,
}

impl TruncationStrategy {
    pub fn apply(
        &self,
        tokenizer: &dyn Tokenizer,
        content: &str,
        limit: usize,
    ) -> TruncationResult {
        match self {
            TruncationStrategy::HeadTail => truncate_head_tail(tokenizer, content, limit),
            TruncationStrategy::Head => truncate_head(tokenizer, content, limit),
        }
    }
}

impl std::str::FromStr for TruncationStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "head-tail" | "head_tail" | "headtail" => Ok(TruncationStrategy::HeadTail),
            "head" => Ok(TruncationStrategy::Head),
            _ => Err(format!("Unknown truncation strategy: {}", s)),
        }
    }
}

/// Keep the first 75% and last 25% of the token budget
pub fn truncate_head_tail(
    tokenizer: &dyn Tokenizer,
    content: &str,
    limit: usize,
) -> TruncationResult {
    let tokens = match tokenizer.encode(content) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("encode failed, truncating by characters: {}", e);
            return approximate_truncate(tokenizer, content, limit, true);
        }
    };

    let original = tokens.len();
    if original <= limit {
        return TruncationResult::unchanged(content, original);
    }
    if limit == 0 {
        return emptied(original);
    }

    let head_budget = limit * HEAD_NUMERATOR / HEAD_DENOMINATOR;
    let tail_budget = limit - head_budget;

    let kept = fit_window(tokenizer, &tokens, head_budget, Edge::Head).and_then(|head| {
        fit_window(tokenizer, &tokens, tail_budget, Edge::Tail).map(|tail| (head, tail))
    });

    match kept {
        Ok(((head, head_kept), (tail, tail_kept))) => {
            let kept = head_kept + tail_kept;
            let omitted = original - kept;
            TruncationResult {
                content: format!(
                    "{}\n\n... [{} tokens truncated] ...\n\n{}",
                    head, omitted, tail
                ),
                token_count: kept,
                original_token_count: original,
                truncated: true,
            }
        }
        Err(e) => {
            tracing::warn!("decode failed, truncating by characters: {}", e);
            approximate_truncate(tokenizer, content, limit, true)
        }
    }
}

/// Keep only the first `limit` tokens
pub fn truncate_head(tokenizer: &dyn Tokenizer, content: &str, limit: usize) -> TruncationResult {
    let tokens = match tokenizer.encode(content) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("encode failed, truncating by characters: {}", e);
            return approximate_truncate(tokenizer, content, limit, false);
        }
    };

    let original = tokens.len();
    if original <= limit {
        return TruncationResult::unchanged(content, original);
    }
    if limit == 0 {
        return emptied(original);
    }

    match fit_window(tokenizer, &tokens, limit, Edge::Head) {
        Ok((head, kept)) => TruncationResult {
            content: format!("{}\n\n... [{} tokens truncated]\n", head, original - kept),
            token_count: kept,
            original_token_count: original,
            truncated: true,
        },
        Err(e) => {
            tracing::warn!("decode failed, truncating by characters: {}", e);
            approximate_truncate(tokenizer, content, limit, false)
        }
    }
}

fn emptied(original: usize) -> TruncationResult {
    TruncationResult {
        content: String::new(),
        token_count: 0,
        original_token_count: original,
        truncated: true,
    }
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Head,
    Tail,
}

/// Decode the leading or trailing window of `tokens` into text whose own
/// encoding fits `budget`. Returns the text and its exact token count.
///
/// A window edge may fall inside a multi-byte character; the partial bytes
/// are dropped. If the trimmed text re-encodes to more than `budget` tokens
/// the window shrinks by the excess and is decoded again.
fn fit_window(
    tokenizer: &dyn Tokenizer,
    tokens: &[u32],
    budget: usize,
    edge: Edge,
) -> Result<(String, usize)> {
    let mut size = budget.min(tokens.len());
    while size > 0 {
        let window = match edge {
            Edge::Head => &tokens[..size],
            Edge::Tail => &tokens[tokens.len() - size..],
        };
        let bytes = tokenizer.decode_bytes(window)?;
        let text = match edge {
            Edge::Head => valid_prefix(bytes),
            Edge::Tail => valid_suffix(&bytes),
        };

        let kept = tokenizer.encode(&text)?.len();
        if kept <= budget {
            return Ok((text, kept));
        }
        size -= (kept - budget).min(size);
    }
    Ok((String::new(), 0))
}

/// Longest valid UTF-8 prefix
fn valid_prefix(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let valid = e.utf8_error().valid_up_to();
            String::from_utf8_lossy(&e.as_bytes()[..valid]).into_owned()
        }
    }
}

/// Valid UTF-8 text after any leading continuation bytes
fn valid_suffix(bytes: &[u8]) -> String {
    let start = bytes.iter().take_while(|&&b| b & 0xC0 == 0x80).count();
    valid_prefix(bytes[start..].to_vec())
}

/// Character-based fallback used when the codec misbehaves
fn approximate_truncate(
    tokenizer: &dyn Tokenizer,
    content: &str,
    limit: usize,
    keep_tail: bool,
) -> TruncationResult {
    let original = tokenizer.approximate_count(content);
    if original <= limit {
        return TruncationResult::unchanged(content, original);
    }
    if limit == 0 {
        return emptied(original);
    }

    let char_budget = limit * APPROX_CHARS_PER_TOKEN;
    let total_chars = content.chars().count();

    let (head_chars, tail_chars) = if keep_tail {
        let head = char_budget * HEAD_NUMERATOR / HEAD_DENOMINATOR;
        (head, char_budget - head)
    } else {
        (char_budget, 0)
    };

    let head_end = byte_offset_of_char(content, head_chars.min(total_chars));
    let tail_start =
        byte_offset_of_char(content, total_chars.saturating_sub(tail_chars)).max(head_end);
    let head = &content[..head_end];
    let tail = &content[tail_start..];

    let kept = (tokenizer.approximate_count(head) + tokenizer.approximate_count(tail)).min(limit);
    let omitted = original.saturating_sub(kept);
    let content = if keep_tail {
        format!("{}\n\n... [~{} tokens truncated] ...\n\n{}", head, omitted, tail)
    } else {
        format!("{}\n\n... [~{} tokens truncated]\n", head, omitted)
    };

    TruncationResult {
        content,
        token_count: kept,
        original_token_count: original,
        truncated: true,
    }
}

/// Byte offset of the `n`th char (or the end of the string)
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::testing::{BrokenTokenizer, CharTokenizer};
    use crate::core::tokenizer::{load_tokenizer, TokenModel};

    fn numbered_lines(n: usize) -> String {
        (1..=n)
            .map(|i| format!("let value_{} = compute({});\n", i, i))
            .collect()
    }

    #[test]
    fn test_within_limit_is_unchanged() {
        let tokenizer = load_tokenizer(TokenModel::Cl100k).unwrap();
        let content = "fn main() {}\n";
        let count = tokenizer.count(content);

        let result = truncate_head_tail(tokenizer.as_ref(), content, count);
        assert_eq!(result.content, content);
        assert!(!result.truncated);
        assert_eq!(result.token_count, count);
        assert_eq!(result.original_token_count, count);
    }

    #[test]
    fn test_over_limit_respects_budget() {
        let tokenizer = load_tokenizer(TokenModel::Cl100k).unwrap();
        let content = numbered_lines(400);
        let original = tokenizer.count(&content);

        for limit in [1, 7, 100, 1000] {
            let result = truncate_head_tail(tokenizer.as_ref(), &content, limit);
            assert!(result.truncated);
            assert!(result.token_count <= limit, "{} > {}", result.token_count, limit);
            assert_eq!(result.original_token_count, original);
        }
    }

    #[test]
    fn test_head_tail_keeps_both_ends() {
        let tokenizer = load_tokenizer(TokenModel::Cl100k).unwrap();
        let content = numbered_lines(400);

        let result = truncate_head_tail(tokenizer.as_ref(), &content, 200);
        assert!(result.content.starts_with("let value_1 = compute(1);"));
        assert!(result.content.ends_with("let value_400 = compute(400);\n"));
        assert!(result.content.contains("tokens truncated"));
        assert!(!result.content.contains("value_200 ="));
    }

    #[test]
    fn test_split_is_three_quarters_head() {
        let content: String = "abcdefghijklmnopqrstuvwxyz".into();
        let result = truncate_head_tail(&CharTokenizer, &content, 8);
        assert!(result.truncated);
        assert_eq!(result.token_count, 8);
        assert_eq!(result.content, "abcdef\n\n... [18 tokens truncated] ...\n\nyz");
    }

    #[test]
    fn test_head_only() {
        let result = truncate_head(&CharTokenizer, "abcdefghij", 4);
        assert!(result.truncated);
        assert_eq!(result.token_count, 4);
        assert!(result.content.starts_with("abcd\n"));
        assert!(result.content.contains("[6 tokens truncated]"));
    }

    #[test]
    fn test_head_only_within_limit() {
        let result = truncate_head(&CharTokenizer, "abc", 3);
        assert!(!result.truncated);
        assert_eq!(result.content, "abc");
    }

    #[test]
    fn test_zero_limit_empties_content() {
        let result = truncate_head_tail(&CharTokenizer, "abc", 0);
        assert!(result.truncated);
        assert_eq!(result.content, "");
        assert_eq!(result.token_count, 0);
        assert_eq!(result.original_token_count, 3);
    }

    #[test]
    fn test_empty_content() {
        let result = truncate_head_tail(&CharTokenizer, "", 0);
        assert!(!result.truncated);
        assert_eq!(result.content, "");
    }

    #[test]
    fn test_multibyte_boundaries_decode() {
        let tokenizer = load_tokenizer(TokenModel::Cl100k).unwrap();
        let content = "日本語のテキストと絵文字🎉🎉🎉が混ざった文章です。".repeat(50);

        let result = truncate_head_tail(tokenizer.as_ref(), &content, 33);
        assert!(result.truncated);
        assert!(result.token_count <= 33);
        assert!(!result.content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_emoji_boundaries_stay_within_budget() {
        let tokenizer = load_tokenizer(TokenModel::Cl100k).unwrap();
        let samples = [
            "🎉🎊🎈🧨✨🎆🎇🧧".repeat(200),
            "👨‍👩‍👧‍👦👩🏽‍💻🏳️‍🌈".repeat(150),
            "naïve café 🎉 日本語 ".repeat(120),
        ];

        for content in &samples {
            for limit in 1..300 {
                let result = truncate_head_tail(tokenizer.as_ref(), content, limit);
                assert!(result.truncated);
                assert!(!result.content.contains("[~"), "fallback at limit {}", limit);

                let (head, rest) = result.content.split_once("\n\n... [").unwrap();
                let (_, tail) = rest.split_once("] ...\n\n").unwrap();
                let real = tokenizer.count(head) + tokenizer.count(tail);
                assert_eq!(result.token_count, real, "limit {}", limit);
                assert!(real <= limit, "limit {} kept {}", limit, real);
            }
        }
    }

    #[test]
    fn test_head_only_emoji_within_budget() {
        let tokenizer = load_tokenizer(TokenModel::Cl100k).unwrap();
        let content = "🧨✨🧧".repeat(100);
        for limit in 1..40 {
            let result = truncate_head(tokenizer.as_ref(), &content, limit);
            let (head, _) = result.content.split_once("\n\n... [").unwrap();
            assert_eq!(result.token_count, tokenizer.count(head));
            assert!(result.token_count <= limit);
        }
    }

    #[test]
    fn test_valid_prefix_and_suffix_trim_partial_characters() {
        let bytes = "a🎉b".as_bytes();
        assert_eq!(valid_prefix(bytes[..3].to_vec()), "a");
        assert_eq!(valid_suffix(&bytes[3..]), "b");
        assert_eq!(valid_suffix(bytes), "a🎉b");
    }

    #[test]
    fn test_broken_codec_falls_back_to_characters() {
        let content = "word ".repeat(200);
        let result = truncate_head_tail(&BrokenTokenizer, &content, 10);
        assert!(result.truncated);
        assert!(result.token_count <= 10);
        assert!(result.content.contains("tokens truncated"));
        assert!(result.content.len() < content.len());
    }

    #[test]
    fn test_broken_codec_small_content_unchanged() {
        let result = truncate_head(&BrokenTokenizer, "tiny", 100);
        assert!(!result.truncated);
        assert_eq!(result.content, "tiny");
    }

    #[test]
    fn test_byte_offset_of_char() {
        assert_eq!(byte_offset_of_char("héllo", 2), 3);
        assert_eq!(byte_offset_of_char("abc", 10), 3);
    }

    #[test]
    fn test_strategy_dispatch() {
        let head = TruncationStrategy::Head.apply(&CharTokenizer, "abcdefghij", 4);
        assert!(head.content.starts_with("abcd\n"));
        assert!(!head.content.ends_with("j"));

        let both = TruncationStrategy::default().apply(&CharTokenizer, "abcdefghij", 4);
        assert!(both.content.starts_with("abc\n"));
        assert!(both.content.ends_with("j"));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("head".parse::<TruncationStrategy>().unwrap(), TruncationStrategy::Head);
        assert_eq!(
            "head-tail".parse::<TruncationStrategy>().unwrap(),
            TruncationStrategy::HeadTail
        );
        assert!("middle".parse::<TruncationStrategy>().is_err());
    }
}
