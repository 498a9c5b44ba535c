//! Per-class memory series
//!
//! Two series per class, fed by different events:
//!
//! - **cumulative**: running totals of allocations since session start, fed by
//!   allocation samples; never decreases
//! - **snapshot**: live objects per tracked class, fed by heap census events;
//!   can drop after a collection
//!
//! Only classes registered with [`MemoryTypeTracker::track`] get a snapshot
//! series.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use rtprof_common::AllocationEntry;

use crate::domain::{ClassId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeMemoryPoint {
    pub timestamp: Timestamp,
    pub count: u64,
    pub size: u64,
}

impl TypeMemoryPoint {
    fn same_value(&self, count: u64, size: u64) -> bool {
        self.count == count && self.size == size
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTypeTracker {
    cumulative: HashMap<ClassId, Vec<TypeMemoryPoint>>,
    tracked: BTreeSet<ClassId>,
    snapshots: HashMap<ClassId, Vec<TypeMemoryPoint>>,
}

impl MemoryTypeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start keeping a snapshot series for `class`
    pub fn track(&mut self, class: ClassId) {
        self.tracked.insert(class);
    }

    #[must_use]
    pub fn tracked(&self) -> &BTreeSet<ClassId> {
        &self.tracked
    }

    /// Add one allocation sample to the cumulative series
    pub fn record_allocations(&mut self, at: Timestamp, entries: &[AllocationEntry]) {
        for entry in entries {
            let series = self.cumulative.entry(ClassId(entry.class)).or_default();
            if let Some(last) = series.last_mut().filter(|p| p.timestamp == at) {
                last.count += entry.count;
                last.size += entry.size;
                continue;
            }
            let (count, size) = series.last().map_or((0, 0), |p| (p.count, p.size));
            series.push(TypeMemoryPoint {
                timestamp: at,
                count: count + entry.count,
                size: size + entry.size,
            });
        }
    }

    /// Record a heap census for every tracked class.
    ///
    /// A tracked class missing from the census has no live objects. Points
    /// at the same timestamp are overwritten, and a value that stays flat
    /// across consecutive censuses slides the plateau's closing point forward
    /// instead of growing the series.
    pub fn record_census(&mut self, at: Timestamp, entries: &[AllocationEntry]) {
        if self.tracked.is_empty() {
            return;
        }
        let mut live: HashMap<ClassId, (u64, u64)> = HashMap::new();
        for entry in entries {
            let value = live.entry(ClassId(entry.class)).or_insert((0, 0));
            value.0 += entry.count;
            value.1 += entry.size;
        }

        for &class in &self.tracked {
            let (count, size) = live.get(&class).copied().unwrap_or((0, 0));
            let point = TypeMemoryPoint { timestamp: at, count, size };
            let series = self.snapshots.entry(class).or_default();

            let n = series.len();
            let same_tick = series.last().is_some_and(|p| p.timestamp == at);
            let plateau = n >= 2
                && series[n - 2].same_value(count, size)
                && series[n - 1].same_value(count, size);

            if same_tick {
                series[n - 1] = point;
            } else if plateau {
                series[n - 1].timestamp = at;
            } else {
                series.push(point);
            }
        }
    }

    /// Running allocation totals for `class`
    #[must_use]
    pub fn cumulative(&self, class: ClassId) -> &[TypeMemoryPoint] {
        self.cumulative.get(&class).map_or(&[][..], Vec::as_slice)
    }

    /// Live-object series for a tracked `class`
    #[must_use]
    pub fn snapshots(&self, class: ClassId) -> &[TypeMemoryPoint] {
        self.snapshots.get(&class).map_or(&[][..], Vec::as_slice)
    }

    /// Final allocation totals per class, largest first (ties by class id)
    #[must_use]
    pub fn allocation_totals(&self) -> Vec<(ClassId, TypeMemoryPoint)> {
        let mut totals: Vec<_> = self
            .cumulative
            .iter()
            .filter_map(|(&class, series)| series.last().map(|&p| (class, p)))
            .collect();
        totals.sort_by(|a, b| b.1.size.cmp(&a.1.size).then(a.0.cmp(&b.0)));
        totals
    }

    /// Live objects of every tracked class as of `at`
    #[must_use]
    pub fn heap_at(&self, at: Timestamp) -> Vec<(ClassId, TypeMemoryPoint)> {
        self.tracked
            .iter()
            .filter_map(|&class| {
                let series = self.snapshots.get(&class)?;
                let upto = series.partition_point(|p| p.timestamp <= at);
                upto.checked_sub(1).map(|i| (class, series[i]))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(class: u32, count: u64, size: u64) -> AllocationEntry {
        AllocationEntry { class, count, size, line: None }
    }

    fn values(series: &[TypeMemoryPoint]) -> Vec<(u64, u64, u64)> {
        series.iter().map(|p| (p.timestamp.0, p.count, p.size)).collect()
    }

    #[test]
    fn test_cumulative_running_total() {
        let mut tracker = MemoryTypeTracker::new();
        tracker.record_allocations(Timestamp(10), &[entry(1, 2, 64)]);
        tracker.record_allocations(Timestamp(10), &[entry(1, 1, 32)]);
        tracker.record_allocations(Timestamp(20), &[entry(1, 1, 16), entry(2, 5, 500)]);

        assert_eq!(values(tracker.cumulative(ClassId(1))), vec![(10, 3, 96), (20, 4, 112)]);
        assert_eq!(values(tracker.cumulative(ClassId(2))), vec![(20, 5, 500)]);
        assert!(tracker.cumulative(ClassId(3)).is_empty());
    }

    #[test]
    fn test_allocation_totals_sorted_by_size() {
        let mut tracker = MemoryTypeTracker::new();
        tracker.record_allocations(Timestamp(1), &[entry(1, 1, 10), entry(2, 1, 300)]);
        tracker.record_allocations(Timestamp(2), &[entry(1, 1, 10)]);

        let totals = tracker.allocation_totals();
        assert_eq!(totals[0].0, ClassId(2));
        assert_eq!(totals[1].1.size, 20);
    }

    #[test]
    fn test_census_only_tracks_registered_classes() {
        let mut tracker = MemoryTypeTracker::new();
        tracker.track(ClassId(1));
        tracker.record_census(Timestamp(10), &[entry(1, 4, 40), entry(2, 9, 90)]);

        assert_eq!(values(tracker.snapshots(ClassId(1))), vec![(10, 4, 40)]);
        assert!(tracker.snapshots(ClassId(2)).is_empty());
    }

    #[test]
    fn test_census_can_decrease_and_compresses_plateaus() {
        let mut tracker = MemoryTypeTracker::new();
        tracker.track(ClassId(1));
        tracker.record_census(Timestamp(10), &[entry(1, 4, 40)]);
        tracker.record_census(Timestamp(20), &[entry(1, 4, 40)]);
        tracker.record_census(Timestamp(30), &[entry(1, 4, 40)]);
        tracker.record_census(Timestamp(40), &[entry(1, 4, 40)]);
        tracker.record_census(Timestamp(50), &[]);

        assert_eq!(
            values(tracker.snapshots(ClassId(1))),
            vec![(10, 4, 40), (40, 4, 40), (50, 0, 0)]
        );
    }

    #[test]
    fn test_census_same_timestamp_overwrites() {
        let mut tracker = MemoryTypeTracker::new();
        tracker.track(ClassId(1));
        tracker.record_census(Timestamp(10), &[entry(1, 4, 40)]);
        tracker.record_census(Timestamp(10), &[entry(1, 6, 60)]);

        assert_eq!(values(tracker.snapshots(ClassId(1))), vec![(10, 6, 60)]);
    }

    #[test]
    fn test_heap_at_picks_latest_point() {
        let mut tracker = MemoryTypeTracker::new();
        tracker.track(ClassId(1));
        tracker.record_census(Timestamp(10), &[entry(1, 4, 40)]);
        tracker.record_census(Timestamp(20), &[entry(1, 1, 10)]);

        assert!(tracker.heap_at(Timestamp(5)).is_empty());
        assert_eq!(tracker.heap_at(Timestamp(15))[0].1.count, 4);
        assert_eq!(tracker.heap_at(Timestamp(25))[0].1.count, 1);
    }
}
