//! Metadata Registry
//!
//! Dense id → descriptor tables (threads, modules, classes, functions, source
//! files, source lines), populated as metadata events arrive and queried during
//! aggregation and display. Nothing is ever removed.

pub mod arena;
pub mod metadata;

pub use arena::Arena;
pub use metadata::{
    ClassInfo, FunctionInfo, MetadataRegistry, ModuleInfo, SourceFileInfo, SourceLineInfo,
    ThreadInfo, UNKNOWN_NAME,
};
