//! # Event Processing
//!
//! Consumes decoded trace events in stream order and routes them to the
//! component that owns each concern.
//!
//! ## Event Routing
//!
//! - Metadata (`module_loaded`, `class_name`, `function_name`, `source_*`,
//!   `thread_*`) → [`MetadataRegistry`]
//! - `stack_sample` → [`LiveStack`] → [`Sample`] → statistics + [`SampleStore`]
//! - `allocation_sample` → memory-weighted [`Sample`] + cumulative series
//! - `heap_census` → tracked-class snapshot series
//! - `gc` / `jit` → per-thread [`JobTracker`]
//! - `cpu_tick`, `profiling_paused/resumed` → [`CpuUtilization`]
//!
//! Malformed-but-decodable events (corrupt deltas, unpaired job markers) are
//! counted and logged, never fatal. Call [`EventProcessor::finish`] once the
//! stream ends to get a queryable [`Session`].

use crossbeam_channel::Sender;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

use rtprof_common::{
    AllocationSample, GcMarker, GcPhase, HeapCensus, JitMarker, JitPhase, StackSampleDelta,
    TraceEvent,
};

use super::aggregator::{aggregate_sample, AllocationItem, Sample, Statistics, Weight};
use super::cpu_utils::CpuUtilization;
use super::jobs::JobTracker;
use super::memory_tracker::MemoryTypeTracker;
use super::options::SessionOptions;
use super::progress::{IngestProgress, ProgressReporter};
use super::sample_store::{SampleStore, TimeFrame};
use super::session::{Session, SessionInfo};
use super::stack_reconstructor::{LiveStack, StackItem};
use crate::domain::{ClassId, FunctionId, SourceLineId, ThreadId, Timestamp};
use crate::registry::MetadataRegistry;

/// Diagnostics gathered while ingesting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounters {
    pub events: u64,
    pub by_kind: BTreeMap<&'static str, u64>,
    /// Samples produced (stack and allocation)
    pub samples: u64,
    pub allocation_samples: u64,
    /// Weight-0 stack records that only reshaped the live stack
    pub shape_only: u64,
    pub corrupt_deltas: u64,
    /// Job markers that could not be paired, plus phases left open at the end
    pub dropped_jobs: u64,
    /// Progress updates the observer was too slow to take
    pub dropped_progress: u64,
}

/// Replay state of one thread
#[derive(Debug)]
struct ThreadCursor {
    stack: LiveStack,
    last_sample: Option<Timestamp>,
    corrupt: u64,
}

impl ThreadCursor {
    fn new(thread: ThreadId) -> Self {
        Self { stack: LiveStack::new(thread), last_sample: None, corrupt: 0 }
    }
}

/// Encapsulates ingestion state for one session
pub struct EventProcessor {
    info: SessionInfo,
    registry: MetadataRegistry,
    cursors: BTreeMap<ThreadId, ThreadCursor>,
    samples: BTreeMap<ThreadId, SampleStore>,
    thread_stats: BTreeMap<ThreadId, Statistics>,
    application: Statistics,
    jobs: BTreeMap<ThreadId, JobTracker>,
    memory: MemoryTypeTracker,
    cpu: CpuUtilization,
    pub counters: IngestCounters,
    next_seq: u64,
    last_tick: Option<Timestamp>,
    progress: ProgressReporter,
}

impl EventProcessor {
    /// Create a new event processor
    #[must_use]
    pub fn new(
        info: SessionInfo,
        options: &SessionOptions,
        progress_tx: Option<Sender<IngestProgress>>,
    ) -> Self {
        let processors = options.processor_count.unwrap_or(info.processor_count);
        let mut memory = MemoryTypeTracker::new();
        for &class in &options.tracked_classes {
            memory.track(class);
        }
        info!(
            "Ingesting session '{}' ({} processors, {} tracked classes)",
            info.name,
            processors.max(1),
            options.tracked_classes.len()
        );

        Self {
            info: SessionInfo { processor_count: processors.max(1), ..info },
            registry: MetadataRegistry::new(),
            cursors: BTreeMap::new(),
            samples: BTreeMap::new(),
            thread_stats: BTreeMap::new(),
            application: Statistics::new(),
            jobs: BTreeMap::new(),
            memory,
            cpu: CpuUtilization::new(processors),
            counters: IngestCounters::default(),
            next_seq: 0,
            last_tick: None,
            progress: ProgressReporter::new(
                progress_tx,
                options.progress_every_events,
                options.progress_every,
            ),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Statistics accumulated so far for the whole application
    #[must_use]
    pub fn application(&self) -> &Statistics {
        &self.application
    }

    /// Process a single event
    pub fn process_event(&mut self, event: &TraceEvent) {
        self.counters.events += 1;
        *self.counters.by_kind.entry(event.kind_name()).or_insert(0) += 1;
        if let Some(tick) = event.tick() {
            let tick = Timestamp(tick);
            self.last_tick = Some(self.last_tick.map_or(tick, |last| last.max(tick)));
        }

        match event {
            TraceEvent::ThreadCreated(r) => {
                let (id, at) = (ThreadId(r.thread), Timestamp(r.tick));
                self.registry.thread_created(id, at);
                self.cursor(id).last_sample.get_or_insert(at);
            }
            TraceEvent::ThreadAssigned(r) => self.registry.assign_thread(r),
            TraceEvent::ThreadDestroyed(r) => {
                self.registry.thread_destroyed(ThreadId(r.thread), Timestamp(r.tick));
            }
            TraceEvent::ModuleLoaded(r) => self.registry.upsert_module(r),
            TraceEvent::ClassName(r) => self.registry.upsert_class(r),
            TraceEvent::FunctionName(r) => self.registry.upsert_function(r),
            TraceEvent::SourceFile(r) => self.registry.upsert_source_file(r),
            TraceEvent::SourceLine(r) => self.registry.upsert_source_line(r),
            TraceEvent::CpuTick(t) => {
                self.cpu.record_tick(t.thread.map(ThreadId), Timestamp(t.tick), t.cpu_time);
            }
            TraceEvent::ProfilingPaused(t) => self.cpu.pause(Timestamp(t.tick)),
            TraceEvent::ProfilingResumed(t) => self.cpu.resume(Timestamp(t.tick)),
            TraceEvent::StackSample(delta) => self.handle_stack_sample(delta),
            TraceEvent::AllocationSample(sample) => self.handle_allocation_sample(sample),
            TraceEvent::HeapCensus(census) => self.handle_heap_census(census),
            TraceEvent::Gc(marker) => self.handle_gc(marker),
            TraceEvent::Jit(marker) => self.handle_jit(marker),
        }

        let (events, samples, last_tick) =
            (self.counters.events, self.counters.samples, self.last_tick);
        self.progress.tick(|| IngestProgress { events, samples, last_tick, done: false });
    }

    /// End of stream: close out diagnostics and hand over a queryable session
    #[must_use]
    pub fn finish(mut self) -> Session {
        let open: usize = self.jobs.values().map(JobTracker::open_count).sum();
        self.counters.dropped_jobs = self.jobs.values().map(|j| j.dropped).sum::<u64>() + open as u64;

        let progress = self.snapshot_progress();
        self.progress.finish(progress);
        self.counters.dropped_progress = self.progress.dropped;

        info!(
            "Ingested {} events: {} samples, {} shape-only, {} corrupt deltas, {} dropped job markers",
            self.counters.events,
            self.counters.samples,
            self.counters.shape_only,
            self.counters.corrupt_deltas,
            self.counters.dropped_jobs
        );
        for (kind, count) in &self.counters.by_kind {
            info!("  {kind}: {count}");
        }

        Session {
            info: self.info,
            registry: self.registry,
            samples: self.samples,
            thread_stats: self.thread_stats,
            application: self.application,
            jobs: self.jobs,
            memory: self.memory,
            cpu: self.cpu,
            counters: self.counters,
            time_frame: TimeFrame::FULL,
        }
    }

    // Private event handlers

    fn handle_stack_sample(&mut self, delta: &StackSampleDelta) {
        let thread = ThreadId(delta.thread);
        let at = Timestamp(delta.tick);
        if !thread.is_fake() {
            self.registry.ensure_thread(thread);
        }
        for frame in &delta.new_frames {
            self.registry.ensure_function(FunctionId(frame.function));
            if let Some(line) = frame.line {
                self.registry.ensure_source_line(SourceLineId(line));
            }
        }
        if let Some(line) = delta.top_line {
            self.registry.ensure_source_line(SourceLineId(line));
        }

        let cursor = self.cursors.entry(thread).or_insert_with(|| ThreadCursor::new(thread));
        if let Err(e) = cursor.stack.apply(delta) {
            cursor.corrupt += 1;
            self.counters.corrupt_deltas += 1;
            if cursor.corrupt == 1 {
                warn!("Dropping corrupt stack delta at {at}: {e}");
            } else {
                debug!("Dropping corrupt stack delta at {at}: {e}");
            }
            return;
        }

        if delta.samples == 0 {
            self.counters.shape_only += 1;
            return;
        }

        let previous = *cursor.last_sample.get_or_insert(at);
        cursor.last_sample = Some(at);
        let weight = Weight::new(u64::from(delta.samples), at.since(previous), 0);
        let stack = cursor.stack.stack_items();

        self.record_sample(thread, at, weight, stack, Vec::new());
    }

    fn handle_allocation_sample(&mut self, sample: &AllocationSample) {
        let thread = ThreadId(sample.thread);
        let at = Timestamp(sample.tick);
        if !thread.is_fake() {
            self.registry.ensure_thread(thread);
        }

        let allocations: Vec<AllocationItem> = sample
            .entries
            .iter()
            .map(|entry| AllocationItem {
                class: ClassId(entry.class),
                count: entry.count,
                size: entry.size,
                line: entry.line.map(SourceLineId),
            })
            .collect();
        for item in &allocations {
            self.registry.ensure_class(item.class);
            if let Some(line) = item.line {
                self.registry.ensure_source_line(line);
            }
        }
        self.memory.record_allocations(at, &sample.entries);

        let memory = allocations.iter().map(|a| a.size).sum();
        let stack = self.cursor(thread).stack.stack_items();
        self.counters.allocation_samples += 1;
        self.record_sample(thread, at, Weight::memory_only(memory), stack, allocations);
    }

    fn handle_heap_census(&mut self, census: &HeapCensus) {
        for entry in &census.entries {
            self.registry.ensure_class(ClassId(entry.class));
        }
        self.memory.record_census(Timestamp(census.tick), &census.entries);
    }

    fn handle_gc(&mut self, marker: &GcMarker) {
        let thread = ThreadId(marker.thread);
        let at = Timestamp(marker.tick);
        let jobs = self.jobs.entry(thread).or_default();
        match marker.phase {
            GcPhase::SuspendBegin => jobs.gc_suspend_begin(thread, at),
            GcPhase::SuspendEnd => jobs.gc_suspend_end(at),
            GcPhase::RestartBegin => jobs.gc_restart_begin(at),
            GcPhase::RestartEnd => jobs.gc_restart_end(thread, at),
            GcPhase::GenerationRange { generation } => jobs.gc_generation(generation),
        }
    }

    fn handle_jit(&mut self, marker: &JitMarker) {
        let thread = ThreadId(marker.thread);
        let function = FunctionId(marker.function);
        let at = Timestamp(marker.tick);
        self.registry.ensure_function(function);
        let jobs = self.jobs.entry(thread).or_default();
        match marker.phase {
            JitPhase::Started => jobs.jit_started(thread, function, at),
            JitPhase::MethodLoaded => jobs.jit_method_loaded(function, at),
        }
    }

    // Helpers

    fn cursor(&mut self, thread: ThreadId) -> &mut ThreadCursor {
        self.cursors.entry(thread).or_insert_with(|| ThreadCursor::new(thread))
    }

    /// Store a sample and fold it into the running statistics.
    ///
    /// Samples on the fake thread reshape nothing user-visible and are dropped.
    fn record_sample(
        &mut self,
        thread: ThreadId,
        tick: Timestamp,
        weight: Weight,
        stack: Vec<StackItem>,
        allocations: Vec<AllocationItem>,
    ) {
        if thread.is_fake() {
            return;
        }
        let sample = Sample { seq: self.next_seq, tick, weight, stack, allocations };
        self.next_seq += 1;
        self.counters.samples += 1;

        let stats = self.thread_stats.entry(thread).or_default();
        aggregate_sample(&sample, stats, &mut self.application);
        self.samples.entry(thread).or_default().push(sample);
    }

    fn snapshot_progress(&self) -> IngestProgress {
        IngestProgress {
            events: self.counters.events,
            samples: self.counters.samples,
            last_tick: self.last_tick,
            done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metric;
    use crate::profiling::call_tree::NodeId;
    use crate::profiling::session::Scope;
    use crossbeam_channel::bounded;
    use rtprof_common::{FrameRecord, FunctionRecord, ThreadRecord};

    fn processor() -> EventProcessor {
        let info = SessionInfo { name: "test".to_string(), processor_count: 1, ..Default::default() };
        EventProcessor::new(info, &SessionOptions::default(), None)
    }

    fn delta(
        thread: u32,
        tick: u64,
        match_prefix: u32,
        stack_size: u32,
        new_frames: &[u32],
        samples: u32,
    ) -> TraceEvent {
        TraceEvent::StackSample(StackSampleDelta {
            thread,
            tick,
            match_prefix,
            stack_size,
            new_frames: new_frames.iter().map(|&f| FrameRecord::new(f)).collect(),
            samples,
            top_line: None,
        })
    }

    fn function(id: u32, name: &str) -> TraceEvent {
        TraceEvent::FunctionName(FunctionRecord {
            id,
            name: name.to_string(),
            signature: None,
            token: None,
            class: None,
            module: None,
        })
    }

    #[test]
    fn test_delta_replay_builds_expected_tree() {
        let mut p = processor();
        p.process_event(&function(1, "Main"));
        p.process_event(&function(2, "Run"));
        p.process_event(&function(3, "Work"));
        p.process_event(&TraceEvent::ThreadCreated(ThreadRecord { thread: 1, tick: 0 }));
        p.process_event(&delta(1, 10, 0, 0, &[1, 2], 1));
        p.process_event(&delta(1, 20, 2, 2, &[3], 1));
        p.process_event(&delta(1, 30, 1, 3, &[], 1));

        let session = p.finish();
        let app = session.statistics(Scope::Application).unwrap();
        assert_eq!(app.totals(), Weight::new(3, 30, 0));

        let tree = app.call_tree();
        let main = tree.child(NodeId::ROOT, FunctionId(1)).unwrap();
        let run = tree.child(main, FunctionId(2)).unwrap();
        let work = tree.child(run, FunctionId(3)).unwrap();
        assert_eq!(tree.node(main).unwrap().counters.inclusive(Metric::Samples), 3);
        assert_eq!(tree.node(run).unwrap().counters.exclusive(Metric::Samples), 1);
        assert_eq!(tree.node(work).unwrap().counters.exclusive(Metric::Samples), 1);
        assert_eq!(tree.node(main).unwrap().counters.exclusive(Metric::Samples), 1);
    }

    #[test]
    fn test_time_delta_starts_at_thread_creation() {
        let mut p = processor();
        p.process_event(&TraceEvent::ThreadCreated(ThreadRecord { thread: 2, tick: 100 }));
        p.process_event(&delta(2, 150, 0, 0, &[1], 1));
        p.process_event(&delta(2, 175, 1, 1, &[], 2));

        let session = p.finish();
        let times: Vec<u64> = session.samples(ThreadId(2)).iter().map(|s| s.weight.time).collect();
        assert_eq!(times, vec![50, 25]);
    }

    #[test]
    fn test_shape_only_records_produce_no_sample() {
        let mut p = processor();
        p.process_event(&delta(1, 10, 0, 0, &[1, 2], 0));
        p.process_event(&delta(1, 20, 2, 2, &[], 1));

        let session = p.finish();
        assert_eq!(session.counters().shape_only, 1);
        assert_eq!(session.counters().samples, 1);
        let stack = &session.samples(ThreadId(1))[0].stack;
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].function, FunctionId(2));
    }

    #[test]
    fn test_corrupt_delta_is_counted_and_skipped() {
        let mut p = processor();
        p.process_event(&delta(1, 10, 0, 0, &[1], 1));
        // Unwinding 5 frames from a stack of depth 1
        p.process_event(&delta(1, 20, 1, 6, &[2], 1));
        p.process_event(&delta(1, 30, 1, 1, &[], 1));

        let session = p.finish();
        assert_eq!(session.counters().corrupt_deltas, 1);
        assert_eq!(session.counters().samples, 2);
        assert_eq!(session.samples(ThreadId(1))[1].stack[0].function, FunctionId(1));
    }

    #[test]
    fn test_allocation_sample_is_memory_only() {
        let mut p = processor();
        p.process_event(&delta(1, 10, 0, 0, &[7], 0));
        p.process_event(&TraceEvent::AllocationSample(AllocationSample {
            thread: 1,
            tick: 12,
            entries: vec![
                rtprof_common::AllocationEntry { class: 4, count: 2, size: 64, line: None },
                rtprof_common::AllocationEntry { class: 5, count: 1, size: 16, line: None },
            ],
        }));

        let session = p.finish();
        let app = session.statistics(Scope::Application).unwrap();
        assert_eq!(app.totals(), Weight::new(0, 0, 80));
        assert_eq!(app.methods().get(FunctionId(7)).unwrap().exclusive(Metric::Memory), 80);
        assert_eq!(session.memory().cumulative(ClassId(4))[0].size, 64);
    }

    #[test]
    fn test_fake_thread_is_not_aggregated() {
        let mut p = processor();
        p.process_event(&delta(0, 10, 0, 0, &[1], 1));
        p.process_event(&delta(1, 10, 0, 0, &[1], 1));

        let session = p.finish();
        assert_eq!(session.statistics(Scope::Application).unwrap().sample_count(), 1);
        assert_eq!(session.thread_ids(), vec![ThreadId(1)]);
    }

    #[test]
    fn test_unpaired_job_markers_are_counted() {
        let mut p = processor();
        p.process_event(&TraceEvent::Gc(GcMarker { thread: 1, tick: 5, phase: GcPhase::RestartEnd }));
        p.process_event(&TraceEvent::Jit(JitMarker {
            thread: 1,
            tick: 6,
            function: 3,
            phase: JitPhase::Started,
        }));

        let session = p.finish();
        assert_eq!(session.counters().dropped_jobs, 2);
        assert!(session.job_timeline(ThreadId(1)).is_empty());
    }

    #[test]
    fn test_progress_reports_final_state() {
        let (tx, rx) = bounded(64);
        let options = SessionOptions { progress_every_events: 2, ..Default::default() };
        let mut p = EventProcessor::new(SessionInfo::default(), &options, Some(tx));
        for tick in 1..=5 {
            p.process_event(&delta(1, tick, 0, 0, &[1], 1));
        }
        let _session = p.finish();

        let updates: Vec<_> = rx.try_iter().collect();
        let last = updates.last().unwrap();
        assert!(last.done);
        assert_eq!(last.events, 5);
        assert_eq!(last.samples, 5);
        assert_eq!(last.last_tick, Some(Timestamp(5)));
    }
}
