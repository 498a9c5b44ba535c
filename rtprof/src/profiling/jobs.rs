//! GC and JIT job intervals
//!
//! Phase markers are paired into "full" intervals per thread (an interval
//! missing its closing marker is dropped and counted, never reported), and
//! the two streams are reconciled into a single sorted, non-overlapping
//! timeline per thread.
//!
//! # Reconciliation
//!
//! GC has priority over JIT. Each GC interval `g` is merged into a timeline
//! that starts out as the thread's JIT intervals:
//!
//! ```text
//! JIT  [0 ─────────────────────── 100)
//! GC          [30 ──── 50)
//!
//! out  [0 ── 30) [30 ── 50) [50 ── 100)
//!        JIT        GC         JIT
//! ```
//!
//! A GC that starts strictly inside a JIT interval and ends before it splits
//! that interval in three. Otherwise the GC is inserted before the first
//! interval starting at or after its end. Partial overlaps (GC hanging off
//! either end of a JIT, or covering one or more JITs) trim the JIT side: the
//! GC keeps its full extent and the JIT keeps only what lies outside it.
//!
//! Same-kind overlap (a compilation triggered while another one is running)
//! is flattened first: the inner interval cuts the outer one in pieces that
//! keep the outer function.

use log::{debug, trace};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{FunctionId, ThreadId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Gc,
    Jit,
}

/// `[start, end)` on one thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobInterval {
    pub start: Timestamp,
    pub end: Timestamp,
    pub kind: JobKind,
    /// Compiled function, for JIT pieces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionId>,
}

impl JobInterval {
    #[must_use]
    pub fn gc(start: u64, end: u64) -> Self {
        Self { start: Timestamp(start), end: Timestamp(end), kind: JobKind::Gc, function: None }
    }

    #[must_use]
    pub fn jit(start: u64, end: u64) -> Self {
        Self { start: Timestamp(start), end: Timestamp(end), kind: JobKind::Jit, function: None }
    }

    #[must_use]
    pub fn duration(&self) -> u64 {
        self.end.since(self.start)
    }

    fn with_bounds(self, start: Timestamp, end: Timestamp) -> Self {
        Self { start, end, ..self }
    }
}

/// One complete garbage collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GcItem {
    pub suspend_begin: Timestamp,
    pub suspend_end: Option<Timestamp>,
    pub restart_begin: Option<Timestamp>,
    pub restart_end: Timestamp,
    /// Generations announced while the collection ran
    pub generations: Vec<u32>,
}

impl GcItem {
    /// Total pause (suspend-begin to restart-end)
    #[must_use]
    pub fn pause(&self) -> u64 {
        self.restart_end.since(self.suspend_begin)
    }

    #[must_use]
    pub fn interval(&self) -> JobInterval {
        JobInterval {
            start: self.suspend_begin,
            end: self.restart_end,
            kind: JobKind::Gc,
            function: None,
        }
    }
}

/// One complete JIT compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JitItem {
    pub function: FunctionId,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl JitItem {
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.end.since(self.start)
    }

    #[must_use]
    pub fn interval(&self) -> JobInterval {
        JobInterval {
            start: self.start,
            end: self.end,
            kind: JobKind::Jit,
            function: Some(self.function),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenGc {
    suspend_begin: Timestamp,
    suspend_end: Option<Timestamp>,
    restart_begin: Option<Timestamp>,
    generations: Vec<u32>,
}

/// Pairs GC/JIT phase markers for one thread
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    open_gc: Option<OpenGc>,
    open_jit: HashMap<FunctionId, Timestamp>,
    gc_items: Vec<GcItem>,
    jit_items: Vec<JitItem>,
    /// Markers that could not be paired
    pub dropped: u64,
}

impl JobTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gc_suspend_begin(&mut self, thread: ThreadId, at: Timestamp) {
        if let Some(previous) = self.open_gc.take() {
            debug!("{thread}: GC from {} never restarted, dropping it", previous.suspend_begin);
            self.dropped += 1;
        }
        self.open_gc = Some(OpenGc {
            suspend_begin: at,
            suspend_end: None,
            restart_begin: None,
            generations: Vec::new(),
        });
    }

    pub fn gc_suspend_end(&mut self, at: Timestamp) {
        match self.open_gc.as_mut() {
            Some(gc) => gc.suspend_end = Some(at),
            None => self.dropped += 1,
        }
    }

    pub fn gc_restart_begin(&mut self, at: Timestamp) {
        match self.open_gc.as_mut() {
            Some(gc) => gc.restart_begin = Some(at),
            None => self.dropped += 1,
        }
    }

    pub fn gc_generation(&mut self, generation: u32) {
        match self.open_gc.as_mut() {
            Some(gc) if !gc.generations.contains(&generation) => gc.generations.push(generation),
            Some(_) => {}
            None => self.dropped += 1,
        }
    }

    pub fn gc_restart_end(&mut self, thread: ThreadId, at: Timestamp) {
        let Some(open) = self.open_gc.take() else {
            debug!("{thread}: GC restart-end at {at} without a suspend-begin");
            self.dropped += 1;
            return;
        };
        if at < open.suspend_begin {
            self.dropped += 1;
            return;
        }
        self.gc_items.push(GcItem {
            suspend_begin: open.suspend_begin,
            suspend_end: open.suspend_end,
            restart_begin: open.restart_begin,
            restart_end: at,
            generations: open.generations,
        });
    }

    pub fn jit_started(&mut self, thread: ThreadId, function: FunctionId, at: Timestamp) {
        if self.open_jit.insert(function, at).is_some() {
            debug!("{thread}: JIT of {function} restarted before it finished");
            self.dropped += 1;
        }
    }

    pub fn jit_method_loaded(&mut self, function: FunctionId, at: Timestamp) {
        match self.open_jit.remove(&function) {
            Some(start) if start <= at => self.jit_items.push(JitItem { function, start, end: at }),
            _ => self.dropped += 1,
        }
    }

    /// Completed collections in start order
    #[must_use]
    pub fn gc_items(&self) -> &[GcItem] {
        &self.gc_items
    }

    /// Completed compilations in start order
    #[must_use]
    pub fn jit_items(&self) -> &[JitItem] {
        &self.jit_items
    }

    /// Phases still open (no closing marker seen)
    #[must_use]
    pub fn open_count(&self) -> usize {
        usize::from(self.open_gc.is_some()) + self.open_jit.len()
    }

    /// Reconciled GC + JIT timeline
    #[must_use]
    pub fn timeline(&self) -> Vec<JobInterval> {
        let mut gc: Vec<_> = self.gc_items.iter().map(GcItem::interval).collect();
        let mut jit: Vec<_> = self.jit_items.iter().map(JitItem::interval).collect();
        gc.sort_by_key(|j| j.start);
        jit.sort_by_key(|j| j.start);
        reconcile(&gc, &jit)
    }
}

/// Merge GC intervals into JIT intervals.
///
/// Both inputs are first flattened so that neither overlaps itself: a
/// compilation nested inside another (the outer one triggered it) splits the
/// outer one, and a later GC cuts into an earlier one the same way. The
/// output is sorted by start and free of any overlap.
#[must_use]
pub fn reconcile(gc: &[JobInterval], jit: &[JobInterval]) -> Vec<JobInterval> {
    let mut jobs = flatten(jit);
    for g in flatten(gc) {
        overlay(&mut jobs, g, |j| j.kind != JobKind::Gc);
    }
    jobs
}

/// Same-kind intervals laid out without overlap; the later start wins
fn flatten(intervals: &[JobInterval]) -> Vec<JobInterval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|j| j.start);

    let mut flat = Vec::with_capacity(sorted.len());
    for interval in sorted {
        overlay(&mut flat, interval, |_| true);
    }
    if flat.len() > intervals.len() {
        debug!("Flattened {} nested job intervals into {}", intervals.len(), flat.len());
    }
    flat
}

/// Lay `top` over `jobs`, cutting away whatever part of a `yields` interval
/// it covers
fn overlay(jobs: &mut Vec<JobInterval>, top: JobInterval, yields: impl Fn(&JobInterval) -> bool) {
    let mut added = false;

    let mut i = 0;
    while i < jobs.len() {
        let j = jobs[i];
        if yields(&j) && j.start < top.start && top.start < j.end {
            if top.end < j.end {
                trace!(
                    "[{}, {}) splits [{}, {})",
                    top.start.0,
                    top.end.0,
                    j.start.0,
                    j.end.0
                );
                jobs[i] = j.with_bounds(j.start, top.start);
                jobs.insert(i + 1, top);
                jobs.insert(i + 2, j.with_bounds(top.end, j.end));
                added = true;
                // Skip the two pieces just inserted
                i += 2;
            } else {
                jobs[i] = j.with_bounds(j.start, top.start);
            }
        }
        i += 1;
    }

    if added {
        return;
    }

    // Whatever yielding work starts inside `top` loses the overlap
    let mut k = 0;
    while k < jobs.len() {
        let j = jobs[k];
        if yields(&j) && top.start <= j.start && j.start < top.end {
            if j.end <= top.end {
                jobs.remove(k);
                continue;
            }
            jobs[k] = j.with_bounds(top.end, j.end);
        }
        k += 1;
    }

    let position = jobs.iter().position(|j| j.start >= top.end).unwrap_or(jobs.len());
    jobs.insert(position, top);
}
