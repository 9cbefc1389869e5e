//! Tokenizer capability - exact encode/decode plus a fast approximate count
//!
//! The pipeline only talks to the [`Tokenizer`] trait. The shipped backend is
//! tiktoken (cl100k_base by default, o200k_base for gpt-4o); anything with an
//! exact encode/decode contract can be plugged in instead.
//!
//! Usage:
//! ```rust,ignore
//! let tokenizer = load_tokenizer(TokenModel::default())?;
//! let tokens = tokenizer.encode("Hello world")?;
//! let text = tokenizer.decode(&tokens)?;
//! ```

use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

use crate::core::error::{PackError, Result};

/// Supported token models/encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenModel {
    /// cl100k_base encoding (GPT-4, GPT-3.5-turbo, Claude 3)
    #[default]
    Cl100k,
    /// o200k_base encoding (GPT-4o native)
    O200k,
    /// GPT-4 / GPT-4-turbo (alias for Cl100k)
    Gpt4,
    /// GPT-4o (alias for O200k)
    Gpt4o,
    /// GPT-3.5-turbo (alias for Cl100k)
    Gpt35Turbo,
    /// Claude 3 / 3.5 (approximated with Cl100k)
    Claude3,
}

impl TokenModel {
    /// List all available models
    pub fn available_models() -> &'static [&'static str] {
        &["cl100k", "o200k", "gpt4", "gpt4o", "gpt35", "claude3"]
    }

    /// Name of the underlying BPE encoding
    pub fn encoding_name(&self) -> &'static str {
        match self {
            TokenModel::O200k | TokenModel::Gpt4o => "o200k_base",
            TokenModel::Cl100k
            | TokenModel::Gpt4
            | TokenModel::Gpt35Turbo
            | TokenModel::Claude3 => "cl100k_base",
        }
    }
}

impl fmt::Display for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenModel::Cl100k => "cl100k",
            TokenModel::O200k => "o200k",
            TokenModel::Gpt4 => "gpt4",
            TokenModel::Gpt4o => "gpt4o",
            TokenModel::Gpt35Turbo => "gpt35",
            TokenModel::Claude3 => "claude3",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TokenModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" | "default" => Ok(TokenModel::Cl100k),
            "o200k" | "o200k_base" => Ok(TokenModel::O200k),
            "gpt4" | "gpt-4" | "gpt-4-turbo" => Ok(TokenModel::Gpt4),
            "gpt4o" | "gpt-4o" => Ok(TokenModel::Gpt4o),
            "gpt35" | "gpt-3.5" | "gpt-3.5-turbo" => Ok(TokenModel::Gpt35Turbo),
            "claude" | "claude3" | "claude-3" | "claude-3.5" => Ok(TokenModel::Claude3),
            _ => Err(format!(
                "Unknown model: {}. Available: {}",
                s,
                TokenModel::available_models().join(", ")
            )),
        }
    }
}

/// Exact tokenizer contract used by truncation and aggregate counting
pub trait Tokenizer: Send + Sync {
    /// Short identifier for logs and stats
    fn name(&self) -> &str;

    /// Encode text to a token sequence
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode a token sequence. Fails if the slice ends inside a character.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Raw bytes of a token sequence produced by [`Tokenizer::encode`]; the
    /// ends may hold partial UTF-8 characters.
    fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>> {
        self.decode(tokens).map(String::into_bytes)
    }

    /// Cheap estimate without running the codec
    fn approximate_count(&self, text: &str) -> usize {
        estimate_tokens_heuristic(text)
    }

    /// Exact count, falling back to the estimate if encoding fails
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self.encode(text) {
            Ok(tokens) => tokens.len(),
            Err(e) => {
                tracing::warn!("{}: falling back to approximate count: {}", self.name(), e);
                self.approximate_count(text)
            }
        }
    }
}

/// tiktoken-backed tokenizer
pub struct BpeTokenizer {
    name: String,
    bpe: Arc<CoreBPE>,
}

impl BpeTokenizer {
    pub fn new(model: TokenModel, bpe: Arc<CoreBPE>) -> Self {
        Self {
            name: model.to_string(),
            bpe,
        }
    }
}

impl Tokenizer for BpeTokenizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.bpe.encode_with_special_tokens(text))
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| PackError::Tokenize(e.to_string()))
    }

    fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>> {
        Ok(self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect())
    }
}

// Lazy-initialized BPE encodings (loaded once on first use). A failed load
// stays cached so later callers fail fast instead of retrying.
static CL100K_BPE: Lazy<std::result::Result<Arc<CoreBPE>, String>> = Lazy::new(|| {
    cl100k_base()
        .map(Arc::new)
        .map_err(|e| format!("Failed to load cl100k_base: {}", e))
});

static O200K_BPE: Lazy<std::result::Result<Arc<CoreBPE>, String>> = Lazy::new(|| {
    o200k_base()
        .map(Arc::new)
        .map_err(|e| format!("Failed to load o200k_base: {}", e))
});

/// Select and load the tokenizer for a model
pub fn load_tokenizer(model: TokenModel) -> Result<Arc<dyn Tokenizer>> {
    let cell = match model {
        TokenModel::O200k | TokenModel::Gpt4o => &O200K_BPE,
        TokenModel::Cl100k | TokenModel::Gpt4 | TokenModel::Gpt35Turbo | TokenModel::Claude3 => {
            &CL100K_BPE
        }
    };

    match &**cell {
        Ok(bpe) => {
            tracing::debug!("loaded {} for model {}", model.encoding_name(), model);
            Ok(Arc::new(BpeTokenizer::new(model, Arc::clone(bpe))))
        }
        Err(e) => Err(PackError::TokenizerInit(e.clone())),
    }
}

/// Estimate tokens using a fast heuristic (no BPE encoding)
///
/// The heuristic accounts for:
/// - ASCII text: ~4 characters per token
/// - Code symbols: ~2 characters per token
/// - CJK characters: ~1.5 characters per token
/// - Other Unicode: ~2 characters per token
pub fn estimate_tokens_heuristic(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let mut ascii_chars = 0usize;
    let mut cjk_chars = 0usize;
    let mut other_unicode = 0usize;
    let mut whitespace = 0usize;
    let mut code_symbols = 0usize;

    for c in text.chars() {
        if c.is_ascii_whitespace() {
            whitespace += 1;
        } else if c.is_ascii() {
            if is_code_symbol(c) {
                code_symbols += 1;
            } else {
                ascii_chars += 1;
            }
        } else if is_cjk_char(c) {
            cjk_chars += 1;
        } else {
            other_unicode += 1;
        }
    }

    let ascii_tokens = (ascii_chars + whitespace).div_ceil(4);
    let symbol_tokens = code_symbols.div_ceil(2);
    let cjk_tokens = (cjk_chars * 2).div_ceil(3);
    let other_tokens = other_unicode.div_ceil(2);

    ascii_tokens + symbol_tokens + cjk_tokens + other_tokens
}

/// Check if a character is a common code symbol/operator
#[inline]
fn is_code_symbol(c: char) -> bool {
    matches!(
        c,
        '(' | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | '<'
            | '>'
            | '='
            | '+'
            | '-'
            | '*'
            | '/'
            | '%'
            | '&'
            | '|'
            | '^'
            | '!'
            | '~'
            | '?'
            | ':'
            | ';'
            | ','
            | '.'
            | '@'
            | '#'
            | '$'
            | '\\'
            | '"'
            | '\''
            | '`'
    )
}

/// Check if a character is CJK (Chinese/Japanese/Korean)
#[inline]
fn is_cjk_char(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp)      // CJK Unified Ideographs
        || (0x3400..=0x4DBF).contains(&cp)  // CJK Extension A
        || (0x3000..=0x303F).contains(&cp)  // CJK Symbols and Punctuation
        || (0x3040..=0x309F).contains(&cp)  // Hiragana
        || (0x30A0..=0x30FF).contains(&cp)  // Katakana
        || (0xAC00..=0xD7AF).contains(&cp)  // Hangul Syllables
        || (0xFF00..=0xFFEF).contains(&cp) // Fullwidth Forms
}
