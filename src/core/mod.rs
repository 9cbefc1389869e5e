//! Core module - Contains the fundamental data structures and utilities
//!
//! This module provides:
//! - Error type shared by every stage
//! - Pattern engine and per-file token limits
//! - Tokenizer capability and head+tail truncation
//! - Pipeline data model and output rendering
//! - Settings loaded from `.ctxpack.toml`
//! - Path normalization and file reading

pub mod error;
pub mod file_reader;
pub mod limits;
pub mod model;
pub mod paths;
pub mod pattern;
pub mod render;
pub mod settings;
pub mod tokenizer;
pub mod truncate;
pub mod util;
