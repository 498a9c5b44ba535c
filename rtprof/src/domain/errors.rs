//! Structured error types for rtprof
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only [`LoadError`] and [`ExportError`] ever reach the caller; a
//! [`StackDeltaError`] is logged and counted, and ingestion moves on.

use super::types::ThreadId;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure while loading a session
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Session {session}: required file {} is missing", .path.display())]
    MissingFile { session: String, path: PathBuf },

    #[error("Session {session}: required file {} is empty", .path.display())]
    EmptyFile { session: String, path: PathBuf },

    #[error("Session {session}: no recognizable start time")]
    NoStartTime { session: String },

    #[error("Session {session}: invalid record on line {line}: {source}")]
    InvalidRecord {
        session: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A stack delta that cannot be applied to the thread's live stack
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackDeltaError {
    #[error("{thread}: unwinding {unwind} frames from a stack of depth {depth}")]
    UnwindPastRoot { thread: ThreadId, unwind: u32, depth: usize },

    #[error("{thread}: match prefix {match_prefix} exceeds previous stack size {stack_size}")]
    NegativeUnwind { thread: ThreadId, match_prefix: u32, stack_size: u32 },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_names_session() {
        let err = LoadError::EmptyFile {
            session: "run-42".to_string(),
            path: PathBuf::from("/tmp/run-42/events.jsonl"),
        };
        let msg = err.to_string();
        assert!(msg.contains("run-42"));
        assert!(msg.contains("events.jsonl"));
    }

    #[test]
    fn test_stack_delta_error_display() {
        let err = StackDeltaError::UnwindPastRoot { thread: ThreadId(3), unwind: 5, depth: 2 };
        assert_eq!(err.to_string(), "T:3: unwinding 5 frames from a stack of depth 2");
    }
}
