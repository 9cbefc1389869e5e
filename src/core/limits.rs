//! Per-file token ceilings
//!
//! A file's ceiling comes from the first matching rule, checked in this order:
//! 1. custom path-shaped rules (full relative path, then its trailing segments)
//! 2. custom name-shaped rules (base name)
//! 3. the built-in table of low-value files
//! 4. the global default
//!
//! A ceiling of `0` excludes the file entirely.

use serde::{Deserialize, Serialize};

use crate::core::error::{PackError, Result};
use crate::core::pattern::Pattern;

/// Lock files: useful to know they exist, rarely worth reading in full
pub const LOCK_FILE_LIMIT: usize = 500;

/// Built-in ceilings for generated or low-value files
pub const BUILTIN_LIMITS: &[(&str, usize)] = &[
    ("package-lock.json", LOCK_FILE_LIMIT),
    ("yarn.lock", LOCK_FILE_LIMIT),
    ("pnpm-lock.yaml", LOCK_FILE_LIMIT),
    ("Cargo.lock", LOCK_FILE_LIMIT),
    ("composer.lock", LOCK_FILE_LIMIT),
    ("Gemfile.lock", LOCK_FILE_LIMIT),
    ("poetry.lock", LOCK_FILE_LIMIT),
    ("Package.resolved", LOCK_FILE_LIMIT),
    ("Podfile.lock", LOCK_FILE_LIMIT),
    ("go.sum", LOCK_FILE_LIMIT),
    ("*.min.js", 0),
    ("*.min.css", 0),
    ("*.map", 0),
    ("*.snap", 2000),
];

/// A user-supplied `pattern -> ceiling` rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimitRule {
    pub pattern: String,
    pub limit: usize,
}

impl TokenLimitRule {
    pub fn new(pattern: impl Into<String>, limit: usize) -> Self {
        Self {
            pattern: pattern.into(),
            limit,
        }
    }
}

impl std::str::FromStr for TokenLimitRule {
    type Err = String;

    /// Parse `PATTERN=N`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (pattern, limit) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("Expected PATTERN=N, got: {}", s))?;
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(format!("Empty pattern in rule: {}", s));
        }
        let limit = limit
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("Invalid limit in rule '{}': {}", s, e))?;
        Ok(Self::new(pattern, limit))
    }
}

/// Rule table with patterns compiled once
#[derive(Debug, Clone)]
pub struct TokenLimits {
    default_limit: usize,
    path_rules: Vec<(Pattern, usize)>,
    name_rules: Vec<(Pattern, usize)>,
    builtin: Vec<(Pattern, usize)>,
}

impl TokenLimits {
    pub fn new(default_limit: usize, rules: &[TokenLimitRule]) -> Result<Self> {
        let mut path_rules = Vec::new();
        let mut name_rules = Vec::new();
        for rule in rules {
            let pattern = Pattern::new(&rule.pattern)?;
            if pattern.is_path_shaped() {
                path_rules.push((pattern, rule.limit));
            } else {
                name_rules.push((pattern, rule.limit));
            }
        }

        let builtin = BUILTIN_LIMITS
            .iter()
            .map(|(p, limit)| Pattern::name(p).map(|p| (p, *limit)))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| PackError::Config(format!("built-in limit table: {}", e)))?;

        Ok(Self {
            default_limit,
            path_rules,
            name_rules,
            builtin,
        })
    }

    /// Resolve the ceiling for one file
    pub fn resolve(&self, file_name: &str, relative_path: &str) -> usize {
        for (pattern, limit) in &self.path_rules {
            if pattern.is_match(relative_path) {
                return *limit;
            }
            let tail = trailing_segments(relative_path, pattern.segment_count());
            if tail != relative_path && pattern.is_match(tail) {
                return *limit;
            }
        }

        for (pattern, limit) in &self.name_rules {
            if pattern.is_match(file_name) {
                return *limit;
            }
        }

        for (pattern, limit) in &self.builtin {
            if pattern.is_match(file_name) {
                return *limit;
            }
        }

        self.default_limit
    }
}

/// One-shot resolution; compiles `rules` on every call.
///
/// Invalid custom patterns are skipped with a warning.
#[allow(dead_code)]
pub fn resolve_limit(
    file_name: &str,
    relative_path: &str,
    default_limit: usize,
    rules: &[TokenLimitRule],
) -> usize {
    let valid: Vec<TokenLimitRule> = rules
        .iter()
        .filter(|r| match Pattern::new(&r.pattern) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("ignoring token limit rule: {}", e);
                false
            }
        })
        .cloned()
        .collect();

    match TokenLimits::new(default_limit, &valid) {
        Ok(limits) => limits.resolve(file_name, relative_path),
        Err(_) => default_limit,
    }
}

/// The last `n` segments of a `/`-separated path
fn trailing_segments(path: &str, n: usize) -> &str {
    if n == 0 {
        return path;
    }
    let mut seen = 0;
    for (idx, b) in path.bytes().enumerate().rev() {
        if b == b'/' {
            seen += 1;
            if seen == n {
                return &path[idx + 1..];
            }
        }
    }
    path
}
