//! Job timeline export in Chrome Trace Event Format
//!
//! Every reconciled GC/JIT interval becomes one complete (`"X"`) event on its
//! thread's track, and each thread gets a `thread_name` metadata event. Load
//! the result in `chrome://tracing` or Perfetto.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::Write;

use crate::domain::{ExportError, ThreadId};
use crate::profiling::{JobInterval, JobKind, Session};
use crate::registry::MetadataRegistry;

/// All tracks live in one synthetic process
const PID: u32 = 1;

/// Chrome Trace Event format
/// Format reference: <https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview>
#[derive(Debug, Clone, Serialize)]
struct ChromeTraceEvent {
    /// Event name
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "X" = complete, "M" = metadata
    ph: String,
    /// Timestamp in microseconds
    ts: f64,
    /// Duration in microseconds (complete events only)
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    pid: u32,
    tid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<BTreeMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

/// Collects job intervals and writes them as a Chrome trace
#[derive(Debug, Default)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
    threads: BTreeMap<ThreadId, String>,
}

// Millisecond ticks to microseconds
#[allow(clippy::cast_precision_loss)]
fn micros(ms: u64) -> f64 {
    ms as f64 * 1000.0
}

impl ChromeTraceExporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exporter holding the reconciled timeline of every thread in `session`
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let mut exporter = Self::new();
        for thread in session.thread_ids() {
            exporter.add_thread(thread, &session.job_timeline(thread), session.registry());
        }
        exporter
    }

    /// Add one thread's job intervals
    pub fn add_thread(&mut self, thread: ThreadId, jobs: &[JobInterval], registry: &MetadataRegistry) {
        let label = registry
            .thread(thread)
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| format!("Thread {}", thread.0));
        self.threads.insert(thread, label);

        for job in jobs {
            let (name, cat) = match job.kind {
                JobKind::Gc => ("GC".to_string(), "gc"),
                JobKind::Jit => (
                    job.function.map_or_else(|| "JIT".to_string(), |f| {
                        format!("JIT {}", registry.function_name(f))
                    }),
                    "jit",
                ),
            };
            let args = job.function.map(|f| {
                BTreeMap::from([("function_id".to_string(), serde_json::json!(f.0))])
            });
            self.events.push(ChromeTraceEvent {
                name,
                cat: cat.to_string(),
                ph: "X".to_string(),
                ts: micros(job.start.0),
                dur: Some(micros(job.duration())),
                pid: PID,
                tid: thread.0,
                args,
            });
        }
    }

    /// Export the trace to any writer (file, stdout, buffer, etc.)
    ///
    /// # Errors
    /// Returns [`ExportError`] if serialization or the writer fails.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut all_events = self.events.clone();
        for (thread, label) in &self.threads {
            all_events.push(ChromeTraceEvent {
                name: "thread_name".to_string(),
                cat: String::new(),
                ph: "M".to_string(),
                ts: 0.0,
                dur: None,
                pid: PID,
                tid: thread.0,
                args: Some(BTreeMap::from([("name".to_string(), serde_json::json!(label))])),
            });
        }

        let trace = ChromeTrace { trace_events: all_events, display_time_unit: "ms".to_string() };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    /// Number of interval events collected
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
