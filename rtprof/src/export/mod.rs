//! Session export functionality
//!
//! This module provides functionality for exporting an ingested session:
//! - JSON report of statistics, rankings and timelines
//! - Chrome Trace Event Format of GC/JIT intervals for chrome://tracing

pub mod chrome_trace;
pub mod report;

pub use chrome_trace::ChromeTraceExporter;
pub use report::{CallTreeSnapshot, ReportOptions, SessionReport};
