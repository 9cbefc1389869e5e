//! Glob pattern engine
//!
//! Supports `*`, `?` and recursive `**`. Every glob is compiled once into an
//! anchored regex; keep the compiled [`Pattern`] around when matching many
//! candidates.
//!
//! Two flavours:
//! - name patterns match a single path segment (`*.rs`, `Cargo.?ock`)
//! - path patterns match a `/`-separated relative path (`src/**/*.rs`)
//!
//! Matching is case-sensitive and never touches the filesystem.

use regex::Regex;

use crate::core::error::{PackError, Result};

/// How a compiled pattern tests a candidate
#[derive(Debug, Clone)]
enum Matcher {
    /// No wildcard characters: plain string equality
    Exact(String),
    Regex(Regex),
}

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    path_shaped: bool,
    matcher: Matcher,
}

impl Pattern {
    /// Compile a pattern, choosing path or name semantics from its shape
    pub fn new(pattern: &str) -> Result<Self> {
        if is_path_shaped(pattern) {
            Self::path(pattern)
        } else {
            Self::name(pattern)
        }
    }

    /// Compile a single-segment pattern
    pub fn name(pattern: &str) -> Result<Self> {
        Self::compile(pattern, false)
    }

    /// Compile a multi-segment pattern
    pub fn path(pattern: &str) -> Result<Self> {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, path_shaped: bool) -> Result<Self> {
        let matcher = if has_wildcard(pattern) {
            let source = glob_to_regex(pattern, path_shaped);
            let regex = Regex::new(&source).map_err(|e| PackError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            Matcher::Regex(regex)
        } else {
            Matcher::Exact(pattern.to_string())
        };

        Ok(Self {
            source: pattern.to_string(),
            path_shaped,
            matcher,
        })
    }

    /// The original glob text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether this pattern spans multiple segments
    pub fn is_path_shaped(&self) -> bool {
        self.path_shaped
    }

    /// Number of `/`-separated segments in the pattern
    pub fn segment_count(&self) -> usize {
        self.source.split('/').filter(|s| !s.is_empty()).count()
    }

    /// Test a candidate. Empty candidates never match.
    pub fn is_match(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match &self.matcher {
            Matcher::Exact(s) => s == candidate,
            Matcher::Regex(re) => re.is_match(candidate),
        }
    }
}

/// Ordered collection of compiled patterns.
///
/// Path-shaped patterns are tested against the relative path, name-shaped
/// ones against the base name.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern that matches the file, if any
    pub fn first_match(&self, relative_path: &str, file_name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| {
            if p.is_path_shaped() {
                p.is_match(relative_path)
            } else {
                p.is_match(file_name)
            }
        })
    }

    pub fn is_match(&self, relative_path: &str, file_name: &str) -> bool {
        self.first_match(relative_path, file_name).is_some()
    }
}

/// Match a single path segment against a name pattern.
///
/// Compiles the pattern on every call; use [`Pattern`] in loops.
#[allow(dead_code)]
pub fn matches_name(name: &str, pattern: &str) -> bool {
    Pattern::name(pattern)
        .map(|p| p.is_match(name))
        .unwrap_or(false)
}

/// Match a relative path against a path pattern.
///
/// Compiles the pattern on every call; use [`Pattern`] in loops.
#[allow(dead_code)]
pub fn matches_path(path: &str, pattern: &str) -> bool {
    Pattern::path(pattern)
        .map(|p| p.is_match(path))
        .unwrap_or(false)
}

/// A pattern containing a segment separator is matched against full paths
pub fn is_path_shaped(pattern: &str) -> bool {
    pattern.contains('/')
}

pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Translate a glob into an anchored regex source string
fn glob_to_regex(pattern: &str, path_shaped: bool) -> String {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if path_shaped && chars.peek() == Some(&'*') => {
                chars.next();
                // collapse runs like `***`
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:[^/]+/)*");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }

    out.push('$');
    out
}
