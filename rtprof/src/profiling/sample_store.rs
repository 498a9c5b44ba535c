//! Per-thread sample storage
//!
//! Samples are kept in timestamp order so that a time frame maps onto one
//! contiguous slice, found with two binary searches.

use serde::Serialize;

use super::aggregator::Sample;
use crate::domain::Timestamp;

/// Closed time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeFrame {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeFrame {
    /// Everything: `[0, max]`
    pub const FULL: TimeFrame = TimeFrame { start: Timestamp(0), end: Timestamp::MAX };

    #[must_use]
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, tick: Timestamp) -> bool {
        self.start <= tick && tick <= self.end
    }
}

impl Default for TimeFrame {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Vec<Sample>,
}

impl SampleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample, keeping timestamp order (ties keep arrival order)
    pub fn push(&mut self, sample: Sample) -> &Sample {
        let position = match self.samples.last() {
            Some(last) if last.tick > sample.tick => {
                self.samples.partition_point(|s| s.tick <= sample.tick)
            }
            _ => self.samples.len(),
        };
        self.samples.insert(position, sample);
        &self.samples[position]
    }

    /// Samples with `frame.start <= tick <= frame.end`
    #[must_use]
    pub fn in_frame(&self, frame: TimeFrame) -> &[Sample] {
        let from = self.samples.partition_point(|s| s.tick < frame.start);
        let to = self.samples.partition_point(|s| s.tick <= frame.end);
        if from >= to {
            return &[];
        }
        &self.samples[from..to]
    }

    #[must_use]
    pub fn all(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn first_tick(&self) -> Option<Timestamp> {
        self.samples.first().map(|s| s.tick)
    }

    #[must_use]
    pub fn last_tick(&self) -> Option<Timestamp> {
        self.samples.last().map(|s| s.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiling::aggregator::Weight;

    fn sample(seq: u64, tick: u64) -> Sample {
        Sample {
            seq,
            tick: Timestamp(tick),
            weight: Weight::new(1, 0, 0),
            stack: Vec::new(),
            allocations: Vec::new(),
        }
    }

    #[test]
    fn test_out_of_order_insert_keeps_ticks_sorted() {
        let mut store = SampleStore::new();
        store.push(sample(0, 10));
        store.push(sample(1, 30));
        store.push(sample(2, 20));
        store.push(sample(3, 20));

        let ticks: Vec<_> = store.all().iter().map(|s| (s.tick.0, s.seq)).collect();
        assert_eq!(ticks, vec![(10, 0), (20, 2), (20, 3), (30, 1)]);
    }

    #[test]
    fn test_in_frame_is_inclusive_on_both_ends() {
        let mut store = SampleStore::new();
        for (seq, tick) in [10, 20, 30, 40].into_iter().enumerate() {
            store.push(sample(seq as u64, tick));
        }

        let ticks: Vec<_> = store
            .in_frame(TimeFrame::new(Timestamp(20), Timestamp(30)))
            .iter()
            .map(|s| s.tick.0)
            .collect();
        assert_eq!(ticks, vec![20, 30]);
        assert_eq!(store.in_frame(TimeFrame::FULL).len(), 4);
        assert!(store.in_frame(TimeFrame::new(Timestamp(41), Timestamp(50))).is_empty());
        assert!(store.in_frame(TimeFrame::new(Timestamp(30), Timestamp(20))).is_empty());
    }
}
