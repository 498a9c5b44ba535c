//! Domain model for rtprof
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern for every id namespace
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    ClassId, FunctionId, Metric, ModuleId, SourceFileId, SourceLineId, ThreadId, Timestamp,
};

pub use errors::{ExportError, LoadError, StackDeltaError};
