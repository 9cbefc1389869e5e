//! Flows module - The packing pipeline
//!
//! Provides:
//! - discover: File discovery (git listing or directory walk, then filters)
//! - process: Concurrent reading, skip detection, and per-file truncation
//! - aggregate: Bounded-parallel token counting of the assembled output
//! - pack: The pack/files/tokens commands wiring the stages together

pub mod aggregate;
pub mod discover;
pub mod pack;
pub mod process;
