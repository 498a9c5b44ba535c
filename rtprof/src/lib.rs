//! # rtprof - Managed-Runtime Profiling Trace Aggregator
//!
//! rtprof ingests the event stream a managed-runtime profiler records (stack
//! sample deltas, allocations, heap censuses, GC/JIT phase markers, CPU ticks
//! and the metadata that names them) and turns it into queryable statistics:
//! per-method and per-line counters, an aggregated call tree, hot paths, and
//! time series for charting.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Session directory                            │
//! │            sysinfo.json  +  events.jsonl                        │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ TraceEvent (rtprof-common)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      rtprof (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  trace_data  │──▶│    Event     │──▶│   Session    │         │
//! │  │   (loader)   │   │  Processor   │   │  (queries)   │         │
//! │  └──────────────┘   └──────┬───────┘   └──────┬───────┘         │
//! │                            │                  │                 │
//! │            ┌───────────────┼──────────┐       ▼                 │
//! │            ▼               ▼          ▼   ┌──────────────┐      │
//! │     ┌────────────┐  ┌───────────┐ ┌─────┐ │   Analysis   │      │
//! │     │  Registry  │  │ LiveStack │ │Jobs │ │  (Hotspots)  │      │
//! │     │ (metadata) │  │ → Samples │ │ CPU │ └──────────────┘      │
//! │     └────────────┘  └───────────┘ └─────┘ ┌──────────────┐      │
//! │                                           │    Export    │      │
//! │                                           │ (JSON/trace) │      │
//! │                                           └──────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`profiling`]: ingestion and aggregation
//!   - `event_processor`: routes each event to its owner
//!   - `stack_reconstructor`: replays stack deltas per thread
//!   - `aggregator` / `call_tree`: flat counters and the call tree
//!   - `jobs`: GC/JIT pairing and timeline reconciliation
//!   - `session`: the queryable result, with time-frame rebuilds
//! - [`registry`]: dense id → metadata tables, with placeholders
//! - [`analysis`]: top methods, top lines, hot paths
//! - [`export`]: JSON report and Chrome trace of job intervals
//! - [`trace_data`]: session files on disk
//! - [`cli`]: command-line arguments
//! - [`domain`]: id newtypes, metrics, errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Application summary
//! rtprof ./session
//!
//! # One thread by wall time, with a JSON report
//! rtprof ./session --thread 3 --metric time --export report.json
//! ```
//!
//! ## Key Concepts
//!
//! - **Inclusive / exclusive**: cost of a node with / without its callees
//! - **Stack delta**: "unwind N frames, push these" relative to the previous
//!   sample of the same thread
//! - **Fake id 0**: the call-tree root and the thread that owns events with no
//!   real thread; never shown to users

// Expose modules for testing
pub mod analysis;
pub mod cli;
pub mod domain;
pub mod export;
pub mod profiling;
pub mod registry;
pub mod trace_data;
