//! CPU utilization history
//!
//! CPU ticks report CPU time consumed since the previous tick of the same
//! scope (one thread, or the whole process). Each tick becomes one point:
//!
//! ```text
//! utilization% = 100 * cpu_time / (wall_delta * processor_count)
//! ```
//!
//! clamped to `[0, 100]`. Pausing the profiler inserts a `NaN` point at the
//! pause tick so that charts break the line there instead of interpolating
//! across the gap.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{ThreadId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtilizationPoint {
    /// Milliseconds since session start, like every event tick; see
    /// [`SessionInfo::wall_clock_ms`](super::SessionInfo::wall_clock_ms)
    pub timestamp_ms: u64,
    /// `NaN` marks a pause boundary (serialized as `null`)
    pub percent: f64,
}

impl UtilizationPoint {
    #[must_use]
    pub fn is_gap(&self) -> bool {
        self.percent.is_nan()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CpuHistory {
    points: Vec<UtilizationPoint>,
    baseline: Option<Timestamp>,
}

impl CpuHistory {
    fn record(&mut self, at: Timestamp, cpu_time: u64, processors: u32) {
        if let Some(previous) = self.baseline {
            let wall = at.since(previous);
            if wall > 0 {
                let capacity = wall as f64 * f64::from(processors.max(1));
                let percent = (100.0 * cpu_time as f64 / capacity).clamp(0.0, 100.0);
                self.points.push(UtilizationPoint { timestamp_ms: at.0, percent });
            }
        }
        self.baseline = Some(at);
    }

    fn pause(&mut self, at: Timestamp) {
        if self.points.last().is_some_and(UtilizationPoint::is_gap) {
            return;
        }
        self.points.push(UtilizationPoint { timestamp_ms: at.0, percent: f64::NAN });
        self.baseline = None;
    }

    fn resume(&mut self, at: Timestamp) {
        self.baseline = Some(at);
    }

    #[must_use]
    pub fn points(&self) -> &[UtilizationPoint] {
        &self.points
    }
}

/// Utilization histories for the process and for each thread
#[derive(Debug, Clone)]
pub struct CpuUtilization {
    processors: u32,
    application: CpuHistory,
    threads: BTreeMap<ThreadId, CpuHistory>,
    paused: bool,
}

impl CpuUtilization {
    #[must_use]
    pub fn new(processors: u32) -> Self {
        Self {
            processors: processors.max(1),
            application: CpuHistory::default(),
            threads: BTreeMap::new(),
            paused: false,
        }
    }

    #[must_use]
    pub fn processors(&self) -> u32 {
        self.processors
    }

    /// Record a tick for the process (`thread == None`) or one thread
    pub fn record_tick(&mut self, thread: Option<ThreadId>, at: Timestamp, cpu_time: u64) {
        if self.paused {
            return;
        }
        let history = match thread {
            None => &mut self.application,
            Some(id) => self.threads.entry(id).or_default(),
        };
        history.record(at, cpu_time, self.processors);
    }

    pub fn pause(&mut self, at: Timestamp) {
        self.paused = true;
        self.application.pause(at);
        for history in self.threads.values_mut() {
            history.pause(at);
        }
    }

    pub fn resume(&mut self, at: Timestamp) {
        self.paused = false;
        self.application.resume(at);
        for history in self.threads.values_mut() {
            history.resume(at);
        }
    }

    #[must_use]
    pub fn application(&self) -> &[UtilizationPoint] {
        self.application.points()
    }

    #[must_use]
    pub fn thread(&self, id: ThreadId) -> &[UtilizationPoint] {
        self.threads.get(&id).map_or(&[][..], CpuHistory::points)
    }
}
