//! Analysis logic for profiling data
//!
//! This module contains pure ranking logic over aggregated statistics,
//! separated from ingestion and from presentation.

pub mod hotspot_analyzer;

pub use hotspot_analyzer::{hot_paths, top_lines, top_methods, HotPath, LineEntry, MethodEntry};
