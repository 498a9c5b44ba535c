//! Ingested session, ready for queries
//!
//! A [`Session`] only exists once [`EventProcessor::finish`] has consumed the
//! whole event stream, so every query runs strictly after ingestion. The
//! metadata registry and the raw samples never change again; the flat and
//! tree statistics are rebuilt on demand for a time frame with
//! [`Session::build_statistics`].
//!
//! [`EventProcessor::finish`]: super::EventProcessor::finish

use serde::Serialize;
use std::collections::BTreeMap;

use super::aggregator::{aggregate_sample, Sample, Statistics, Weight};
use super::cpu_utils::{CpuUtilization, UtilizationPoint};
use super::event_processor::IngestCounters;
use super::jobs::{GcItem, JitItem, JobInterval, JobTracker};
use super::memory_tracker::MemoryTypeTracker;
use super::sample_store::{SampleStore, TimeFrame};
use crate::analysis::{self, HotPath, LineEntry, MethodEntry};
use crate::domain::{Metric, ThreadId, Timestamp};
use crate::registry::MetadataRegistry;

/// Which accumulator a query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Application,
    Thread(ThreadId),
}

/// Facts about the profiled process, from the session's system info
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub name: String,
    /// Wall-clock start, milliseconds since the Unix epoch
    pub start_time_ms: u64,
    pub processor_count: u32,
    pub runtime: Option<String>,
    pub device: Option<String>,
}

impl SessionInfo {
    /// Wall-clock milliseconds since the Unix epoch for a session-relative tick
    #[must_use]
    pub fn wall_clock_ms(&self, tick_ms: u64) -> u64 {
        self.start_time_ms.saturating_add(tick_ms)
    }
}

/// Per-thread roll-up for thread listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub os_thread_id: Option<u64>,
    pub name: Option<String>,
    pub created_at: Option<Timestamp>,
    pub destroyed_at: Option<Timestamp>,
    pub totals: Weight,
    pub sample_count: u64,
    pub first_sample: Option<Timestamp>,
    pub last_sample: Option<Timestamp>,
    pub gc_count: usize,
    pub gc_time: u64,
    pub jit_count: usize,
    pub jit_time: u64,
}

#[derive(Debug)]
pub struct Session {
    pub(crate) info: SessionInfo,
    pub(crate) registry: MetadataRegistry,
    pub(crate) samples: BTreeMap<ThreadId, SampleStore>,
    pub(crate) thread_stats: BTreeMap<ThreadId, Statistics>,
    pub(crate) application: Statistics,
    pub(crate) jobs: BTreeMap<ThreadId, JobTracker>,
    pub(crate) memory: MemoryTypeTracker,
    pub(crate) cpu: CpuUtilization,
    pub(crate) counters: IngestCounters,
    pub(crate) time_frame: TimeFrame,
}

impl Session {
    #[must_use]
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    #[must_use]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Mutable registry access, for source-file relocation
    pub fn registry_mut(&mut self) -> &mut MetadataRegistry {
        &mut self.registry
    }

    #[must_use]
    pub fn counters(&self) -> &IngestCounters {
        &self.counters
    }

    #[must_use]
    pub fn memory(&self) -> &MemoryTypeTracker {
        &self.memory
    }

    /// Frame the current statistics were built for
    #[must_use]
    pub fn time_frame(&self) -> TimeFrame {
        self.time_frame
    }

    /// Real threads that produced samples or job markers, in id order
    #[must_use]
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        let mut ids: Vec<ThreadId> = self
            .samples
            .keys()
            .chain(self.jobs.keys())
            .copied()
            .chain(self.registry.threads().map(|(id, _)| id))
            .filter(|id| !id.is_fake())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    #[must_use]
    pub fn samples(&self, thread: ThreadId) -> &[Sample] {
        self.samples.get(&thread).map_or(&[][..], SampleStore::all)
    }

    /// Statistics of a scope for the current time frame
    #[must_use]
    pub fn statistics(&self, scope: Scope) -> Option<&Statistics> {
        match scope {
            Scope::Application => Some(&self.application),
            Scope::Thread(id) => self.thread_stats.get(&id),
        }
    }

    /// Discard and rebuild all flat and tree statistics from the samples
    /// whose tick lies in `frame`. Samples are replayed in ingestion order,
    /// so rebuilding the full range reproduces the ingest-time statistics.
    pub fn build_statistics(&mut self, frame: TimeFrame) {
        let mut ordered: Vec<(ThreadId, &Sample)> = self
            .samples
            .iter()
            .filter(|(id, _)| !id.is_fake())
            .flat_map(|(&id, store)| store.in_frame(frame).iter().map(move |s| (id, s)))
            .collect();
        ordered.sort_unstable_by_key(|(_, sample)| sample.seq);

        let mut application = Statistics::new();
        let mut per_thread: BTreeMap<ThreadId, Statistics> = self
            .samples
            .keys()
            .filter(|id| !id.is_fake())
            .map(|&id| (id, Statistics::new()))
            .collect();
        for (id, sample) in ordered {
            let thread = per_thread.entry(id).or_default();
            aggregate_sample(sample, thread, &mut application);
        }

        log::debug!(
            "Rebuilt statistics for [{}, {}]: {} samples",
            frame.start.0,
            frame.end.0,
            application.sample_count()
        );
        self.application = application;
        self.thread_stats = per_thread;
        self.time_frame = frame;
    }

    // ---------------------------------------------------------------------
    // Ranked views
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn top_methods(&self, scope: Scope, metric: Metric, n: usize) -> Vec<MethodEntry> {
        self.statistics(scope)
            .map(|stats| analysis::top_methods(stats, &self.registry, metric, n))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn top_lines(&self, scope: Scope, metric: Metric, n: usize) -> Vec<LineEntry> {
        self.statistics(scope)
            .map(|stats| analysis::top_lines(stats, &self.registry, metric, n))
            .unwrap_or_default()
    }

    /// Hot paths of a scope, as a share of the whole application's total
    #[must_use]
    pub fn hot_paths(&self, scope: Scope, metric: Metric, threshold_percent: f64) -> Vec<HotPath> {
        let total = self.application.totals().get(metric);
        self.statistics(scope)
            .map(|stats| {
                analysis::hot_paths(stats.call_tree(), &self.registry, metric, total, threshold_percent)
            })
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Timelines
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn application_cpu_utilization(&self) -> &[UtilizationPoint] {
        self.cpu.application()
    }

    #[must_use]
    pub fn thread_cpu_utilization(&self, thread: ThreadId) -> &[UtilizationPoint] {
        self.cpu.thread(thread)
    }

    /// Reconciled GC/JIT timeline of one thread
    #[must_use]
    pub fn job_timeline(&self, thread: ThreadId) -> Vec<JobInterval> {
        self.jobs.get(&thread).map(JobTracker::timeline).unwrap_or_default()
    }

    /// Every complete GC, all threads, in start order
    #[must_use]
    pub fn gc_items(&self) -> Vec<&GcItem> {
        let mut items: Vec<_> = self.jobs.values().flat_map(JobTracker::gc_items).collect();
        items.sort_by_key(|gc| gc.suspend_begin);
        items
    }

    /// Every complete JIT compilation, all threads, in start order
    #[must_use]
    pub fn jit_items(&self) -> Vec<&JitItem> {
        let mut items: Vec<_> = self.jobs.values().flat_map(JobTracker::jit_items).collect();
        items.sort_by_key(|jit| jit.start);
        items
    }

    // ---------------------------------------------------------------------
    // Threads
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn thread_summary(&self, id: ThreadId) -> ThreadSummary {
        let info = self.registry.thread(id);
        let stats = self.thread_stats.get(&id);
        let store = self.samples.get(&id);
        let jobs = self.jobs.get(&id);

        ThreadSummary {
            id,
            os_thread_id: info.and_then(|t| t.os_thread_id),
            name: info.and_then(|t| t.name.clone()),
            created_at: info.and_then(|t| t.created_at),
            destroyed_at: info.and_then(|t| t.destroyed_at),
            totals: stats.map(Statistics::totals).unwrap_or_default(),
            sample_count: stats.map_or(0, Statistics::sample_count),
            first_sample: store.and_then(SampleStore::first_tick),
            last_sample: store.and_then(SampleStore::last_tick),
            gc_count: jobs.map_or(0, |j| j.gc_items().len()),
            gc_time: jobs.map_or(0, |j| j.gc_items().iter().map(GcItem::pause).sum()),
            jit_count: jobs.map_or(0, |j| j.jit_items().len()),
            jit_time: jobs.map_or(0, |j| j.jit_items().iter().map(JitItem::duration).sum()),
        }
    }

    #[must_use]
    pub fn thread_summaries(&self) -> Vec<ThreadSummary> {
        self.thread_ids().into_iter().map(|id| self.thread_summary(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_from_relative_tick() {
        let info = SessionInfo { start_time_ms: 1_700_000_000_000, ..Default::default() };
        assert_eq!(info.wall_clock_ms(250), 1_700_000_000_250);
        assert_eq!(info.wall_clock_ms(0), info.start_time_ms);
    }
}
