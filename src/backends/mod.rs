//! Backends module - File enumeration sources
//!
//! Provides:
//! - walk: Directory traversal with ignore-file support and pruning
//! - git: git CLI integration (file listing and uncommitted changes)

pub mod git;
pub mod walk;
