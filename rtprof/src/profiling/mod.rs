//! Profiling core modules
//!
//! Everything between a decoded [`TraceEvent`](rtprof_common::TraceEvent)
//! and a queryable [`Session`]:
//! - Live stack replay from stack deltas
//! - Sample aggregation into flat counters and the call tree
//! - Per-thread sample storage with time-frame rebuilds
//! - GC/JIT job pairing and reconciliation
//! - Memory and CPU utilization series
//! - Throttled ingestion progress

pub mod aggregator;
pub mod call_tree;
pub mod cpu_utils;
pub mod event_processor;
pub mod jobs;
pub mod memory_tracker;
pub mod options;
pub mod progress;
pub mod sample_store;
pub mod session;
pub mod stack_reconstructor;

// Re-export common types
pub use aggregator::{aggregate_sample, AllocationItem, Counters, Sample, Statistics, Weight};
pub use call_tree::{CallTree, CallTreeNode, CallTreeVisitor, NodeId};
pub use cpu_utils::{CpuUtilization, UtilizationPoint};
pub use event_processor::{EventProcessor, IngestCounters};
pub use jobs::{reconcile, GcItem, JitItem, JobInterval, JobKind, JobTracker};
pub use memory_tracker::{MemoryTypeTracker, TypeMemoryPoint};
pub use options::SessionOptions;
pub use progress::{IngestProgress, ProgressReporter};
pub use sample_store::{SampleStore, TimeFrame};
pub use session::{Scope, Session, SessionInfo, ThreadSummary};
pub use stack_reconstructor::{LiveStack, StackItem};
