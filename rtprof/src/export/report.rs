//! JSON session report
//!
//! A [`SessionReport`] is a plain value assembled from a [`Session`]: totals,
//! rankings, the call tree as a nested snapshot, job timelines and the CPU
//! series. Building one never touches the session's internals beyond its
//! public queries.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::analysis::{HotPath, LineEntry, MethodEntry};
use crate::domain::{ClassId, ExportError, FunctionId, Metric, ThreadId};
use crate::profiling::{
    CallTree, CallTreeNode, CallTreeVisitor, Counters, IngestCounters, JobInterval, NodeId, Scope,
    Session, SessionInfo, Statistics, ThreadSummary, TimeFrame, UtilizationPoint, Weight,
};
use crate::registry::MetadataRegistry;

// =============================================================================
// CALL TREE SNAPSHOT
// =============================================================================

/// Owned, nested copy of a call tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTreeSnapshot {
    pub function: FunctionId,
    pub name: String,
    pub counters: Counters,
    pub children: Vec<CallTreeSnapshot>,
}

impl CallTreeSnapshot {
    /// Snapshot of `tree`, children in discovery order
    #[must_use]
    pub fn build(tree: &CallTree, registry: &MetadataRegistry) -> Self {
        let mut builder = SnapshotBuilder { registry, open: Vec::new(), done: None };
        tree.walk(&mut builder);
        builder.done.unwrap_or_else(|| CallTreeSnapshot {
            function: FunctionId::FAKE,
            name: ROOT_NAME.to_string(),
            counters: tree.root().counters,
            children: Vec::new(),
        })
    }

    /// Number of nodes in this subtree
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(CallTreeSnapshot::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

const ROOT_NAME: &str = "<root>";

struct SnapshotBuilder<'a> {
    registry: &'a MetadataRegistry,
    open: Vec<CallTreeSnapshot>,
    done: Option<CallTreeSnapshot>,
}

impl CallTreeVisitor for SnapshotBuilder<'_> {
    fn enter(&mut self, id: NodeId, node: &CallTreeNode) {
        let name = if id == NodeId::ROOT {
            ROOT_NAME.to_string()
        } else {
            self.registry.function_name(node.function)
        };
        self.open.push(CallTreeSnapshot {
            function: node.function,
            name,
            counters: node.counters,
            children: Vec::with_capacity(node.children.len()),
        });
    }

    fn leave(&mut self, _id: NodeId, _node: &CallTreeNode) {
        let Some(finished) = self.open.pop() else { return };
        match self.open.last_mut() {
            Some(parent) => parent.children.push(finished),
            None => self.done = Some(finished),
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// What goes into a report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub scope: Scope,
    pub metric: Metric,
    pub top: usize,
    pub hot_threshold: f64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { scope: Scope::Application, metric: Metric::Samples, top: 10, hot_threshold: 1.0 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadJobs {
    pub thread: ThreadId,
    pub intervals: Vec<JobInterval>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcSummary {
    pub count: usize,
    pub total_pause: u64,
    /// Collections per generation index
    pub by_generation: BTreeMap<u32, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JitFunctionTime {
    pub function: FunctionId,
    pub name: String,
    pub count: usize,
    pub time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JitSummary {
    pub count: usize,
    pub total_time: u64,
    /// Largest compile time first
    pub functions: Vec<JitFunctionTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationTotal {
    pub class: ClassId,
    pub name: String,
    pub count: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session: SessionInfo,
    pub time_frame: TimeFrame,
    /// `None` for the whole application
    pub thread: Option<ThreadId>,
    pub metric: Metric,
    pub totals: Weight,
    pub counters: IngestCounters,
    pub threads: Vec<ThreadSummary>,
    pub top_methods: Vec<MethodEntry>,
    pub top_lines: Vec<LineEntry>,
    pub hot_paths: Vec<HotPath>,
    pub call_tree: CallTreeSnapshot,
    pub gc: GcSummary,
    pub jit: JitSummary,
    pub jobs: Vec<ThreadJobs>,
    /// `null` entries mark profiler pauses
    pub cpu: Vec<UtilizationPoint>,
    pub allocations: Vec<AllocationTotal>,
}

fn gc_summary(session: &Session) -> GcSummary {
    let mut summary = GcSummary::default();
    for gc in session.gc_items() {
        summary.count += 1;
        summary.total_pause += gc.pause();
        for &generation in &gc.generations {
            *summary.by_generation.entry(generation).or_insert(0) += 1;
        }
    }
    summary
}

fn jit_summary(session: &Session) -> JitSummary {
    let mut per_function: BTreeMap<FunctionId, (usize, u64)> = BTreeMap::new();
    let mut summary = JitSummary::default();
    for jit in session.jit_items() {
        summary.count += 1;
        summary.total_time += jit.duration();
        let entry = per_function.entry(jit.function).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += jit.duration();
    }
    summary.functions = per_function
        .into_iter()
        .map(|(function, (count, time))| JitFunctionTime {
            function,
            name: session.registry().function_name(function),
            count,
            time,
        })
        .collect();
    summary.functions.sort_by(|a, b| b.time.cmp(&a.time).then(a.function.cmp(&b.function)));
    summary
}

impl SessionReport {
    /// Assemble a report from the session's current statistics
    #[must_use]
    pub fn build(session: &Session, options: &ReportOptions) -> Self {
        let registry = session.registry();
        let stats = session.statistics(options.scope);
        let (thread, cpu) = match options.scope {
            Scope::Application => (None, session.application_cpu_utilization().to_vec()),
            Scope::Thread(id) => (Some(id), session.thread_cpu_utilization(id).to_vec()),
        };
        let jobs = session
            .thread_ids()
            .into_iter()
            .filter(|&id| thread.is_none() || thread == Some(id))
            .map(|id| ThreadJobs { thread: id, intervals: session.job_timeline(id) })
            .filter(|j| !j.intervals.is_empty())
            .collect();
        let call_tree = match stats {
            Some(stats) => CallTreeSnapshot::build(stats.call_tree(), registry),
            None => CallTreeSnapshot::build(&CallTree::new(), registry),
        };

        SessionReport {
            session: session.info().clone(),
            time_frame: session.time_frame(),
            thread,
            metric: options.metric,
            totals: stats.map(Statistics::totals).unwrap_or_default(),
            counters: session.counters().clone(),
            threads: session.thread_summaries(),
            top_methods: session.top_methods(options.scope, options.metric, options.top),
            top_lines: session.top_lines(options.scope, options.metric, options.top),
            hot_paths: session.hot_paths(options.scope, options.metric, options.hot_threshold),
            call_tree,
            gc: gc_summary(session),
            jit: jit_summary(session),
            jobs,
            cpu,
            allocations: session
                .memory()
                .allocation_totals()
                .into_iter()
                .map(|(class, point)| AllocationTotal {
                    class,
                    name: registry.class_name(class),
                    count: point.count,
                    size: point.size,
                })
                .collect(),
        }
    }

    /// Write the report as pretty-printed JSON
    ///
    /// # Errors
    /// Returns [`ExportError`] if serialization or the writer fails.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
