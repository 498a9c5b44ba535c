//! Sample aggregation
//!
//! Every reconstructed [`Sample`] is folded into two [`Statistics`]
//! accumulators, the owning thread's and the whole application's. Each
//! accumulator keeps three surfaces:
//!
//! - flat per-method counters (keyed by function id)
//! - flat per-source-line counters (keyed by source-line id)
//! - the aggregated [`CallTree`]
//!
//! Every surface tracks samples, time and memory, each inclusive and
//! exclusive. Exclusive weight goes only to the innermost frame of a sample,
//! so summing exclusive counters over a call tree gives back the flat totals.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::call_tree::{CallTree, NodeId};
use super::stack_reconstructor::StackItem;
use crate::domain::{ClassId, FunctionId, Metric, SourceLineId, Timestamp};

// =============================================================================
// WEIGHTS AND COUNTERS
// =============================================================================

/// What a single sample contributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Weight {
    pub samples: u64,
    /// Milliseconds
    pub time: u64,
    /// Bytes
    pub memory: u64,
}

impl Weight {
    #[must_use]
    pub fn new(samples: u64, time: u64, memory: u64) -> Self {
        Self { samples, time, memory }
    }

    #[must_use]
    pub fn memory_only(memory: u64) -> Self {
        Self { samples: 0, time: 0, memory }
    }

    #[must_use]
    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Samples => self.samples,
            Metric::Time => self.time,
            Metric::Memory => self.memory,
        }
    }

    pub fn add(&mut self, other: Weight) {
        self.samples += other.samples;
        self.time += other.time;
        self.memory += other.memory;
    }
}

/// Inclusive and exclusive samples/time/memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub samples_inclusive: u64,
    pub samples_exclusive: u64,
    pub time_inclusive: u64,
    pub time_exclusive: u64,
    pub memory_inclusive: u64,
    pub memory_exclusive: u64,
}

impl Counters {
    pub fn add_inclusive(&mut self, weight: Weight) {
        self.samples_inclusive += weight.samples;
        self.time_inclusive += weight.time;
        self.memory_inclusive += weight.memory;
    }

    pub fn add_exclusive(&mut self, weight: Weight) {
        self.samples_exclusive += weight.samples;
        self.time_exclusive += weight.time;
        self.memory_exclusive += weight.memory;
    }

    #[must_use]
    pub fn inclusive(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Samples => self.samples_inclusive,
            Metric::Time => self.time_inclusive,
            Metric::Memory => self.memory_inclusive,
        }
    }

    #[must_use]
    pub fn exclusive(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Samples => self.samples_exclusive,
            Metric::Time => self.time_exclusive,
            Metric::Memory => self.memory_exclusive,
        }
    }
}

/// Counters keyed by id, remembering first-seen order
#[derive(Debug, Clone)]
pub struct KeyedCounters<K> {
    entries: Vec<(K, Counters)>,
    index: HashMap<K, usize>,
}

impl<K> Default for KeyedCounters<K> {
    fn default() -> Self {
        Self { entries: Vec::new(), index: HashMap::new() }
    }
}

// The index is derived from `entries`, so comparing entries is enough
impl<K: Eq + Hash> PartialEq for KeyedCounters<K> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq + Hash> Eq for KeyedCounters<K> {}

impl<K: Copy + Eq + Hash> KeyedCounters<K> {
    pub fn entry(&mut self, key: K) -> &mut Counters {
        let slot = *self.index.entry(key).or_insert_with(|| {
            self.entries.push((key, Counters::default()));
            self.entries.len() - 1
        });
        &mut self.entries[slot].1
    }

    #[must_use]
    pub fn get(&self, key: K) -> Option<&Counters> {
        self.index.get(&key).map(|&slot| &self.entries[slot].1)
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (K, &Counters)> {
        self.entries.iter().map(|(key, counters)| (*key, counters))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// SAMPLES
// =============================================================================

/// One class entry of an allocation sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationItem {
    pub class: ClassId,
    pub count: u64,
    pub size: u64,
    pub line: Option<SourceLineId>,
}

/// One observation on one thread; immutable once stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Ingestion order across all threads
    pub seq: u64,
    pub tick: Timestamp,
    pub weight: Weight,
    /// Innermost first
    pub stack: Vec<StackItem>,
    pub allocations: Vec<AllocationItem>,
}

// =============================================================================
// STATISTICS ACCUMULATOR
// =============================================================================

/// Rolled-up statistics for one scope (a thread or the whole application)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    totals: Weight,
    sample_count: u64,
    methods: KeyedCounters<FunctionId>,
    lines: KeyedCounters<SourceLineId>,
    tree: CallTree,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn totals(&self) -> Weight {
        self.totals
    }

    /// Number of samples folded in
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    #[must_use]
    pub fn methods(&self) -> &KeyedCounters<FunctionId> {
        &self.methods
    }

    #[must_use]
    pub fn lines(&self) -> &KeyedCounters<SourceLineId> {
        &self.lines
    }

    #[must_use]
    pub fn call_tree(&self) -> &CallTree {
        &self.tree
    }

    /// Fold one sample into all three surfaces
    pub fn accumulate(&mut self, sample: &Sample) {
        self.totals.add(sample.weight);
        self.sample_count += 1;
        accumulate_flat(&mut self.methods, &mut self.lines, sample);
        accumulate_tree(&mut self.tree, sample);
    }
}

/// Fold a sample into the thread and application accumulators
pub fn aggregate_sample(sample: &Sample, thread: &mut Statistics, application: &mut Statistics) {
    thread.accumulate(sample);
    application.accumulate(sample);
}

/// Per-method and per-line counters.
///
/// A function (or line) that appears more than once in the same stack is
/// counted inclusively once, so recursion never pushes inclusive weight past
/// the scope total.
pub(crate) fn accumulate_flat(
    methods: &mut KeyedCounters<FunctionId>,
    lines: &mut KeyedCounters<SourceLineId>,
    sample: &Sample,
) {
    let weight = sample.weight;
    let allocation_sample = !sample.allocations.is_empty();
    let mut seen_functions = HashSet::with_capacity(sample.stack.len());
    let mut seen_lines = HashSet::new();

    for (depth, item) in sample.stack.iter().enumerate() {
        let innermost = depth == 0;

        if seen_functions.insert(item.function) {
            methods.entry(item.function).add_inclusive(weight);
        }
        if innermost {
            methods.entry(item.function).add_exclusive(weight);
        }

        if let Some(line) = item.line {
            if seen_lines.insert(line) {
                lines.entry(line).add_inclusive(weight);
            }
            if innermost && !allocation_sample {
                lines.entry(line).add_exclusive(weight);
            }
        }
    }

    // Allocated bytes belong to the allocating line; entries without one fall
    // back to the innermost frame's line
    let top_line = sample.stack.first().and_then(|item| item.line);
    for allocation in &sample.allocations {
        if let Some(line) = allocation.line.or(top_line) {
            lines.entry(line).add_exclusive(Weight::memory_only(allocation.size));
        }
    }
}

/// Walk the sample's stack from the outermost frame down, creating nodes as
/// needed; the innermost node (or the root, for an empty stack) takes the
/// exclusive weight.
pub(crate) fn accumulate_tree(tree: &mut CallTree, sample: &Sample) {
    let weight = sample.weight;
    tree.add_inclusive(NodeId::ROOT, weight);
    if sample.stack.is_empty() {
        tree.add_exclusive(NodeId::ROOT, weight);
        return;
    }

    let mut position = NodeId::ROOT;
    for item in sample.stack.iter().rev() {
        position = tree.child_or_insert(position, item.function);
        tree.add_inclusive(position, weight);
    }
    tree.add_exclusive(position, weight);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seq: u64, weight: Weight, stack: &[u32]) -> Sample {
        Sample {
            seq,
            tick: Timestamp(seq),
            weight,
            // `stack` is given outermost first; samples store innermost first
            stack: stack.iter().rev().map(|&f| StackItem::new(FunctionId(f))).collect(),
            allocations: Vec::new(),
        }
    }

    #[test]
    fn test_two_frame_stack() {
        let mut stats = Statistics::new();
        stats.accumulate(&sample(0, Weight::new(10, 1000, 0), &[1, 2]));

        let tree = stats.call_tree();
        let f1 = tree.child(NodeId::ROOT, FunctionId(1)).unwrap();
        let f2 = tree.child(f1, FunctionId(2)).unwrap();

        let f2 = tree.node(f2).unwrap().counters;
        assert_eq!(f2.samples_inclusive, 10);
        assert_eq!(f2.samples_exclusive, 10);
        let f1 = tree.node(f1).unwrap().counters;
        assert_eq!(f1.samples_inclusive, 10);
        assert_eq!(f1.samples_exclusive, 0);
        assert_eq!(tree.root().counters.samples_inclusive, 10);
        assert_eq!(tree.root().counters.samples_exclusive, 0);
    }

    #[test]
    fn test_flat_method_counters() {
        let mut stats = Statistics::new();
        stats.accumulate(&sample(0, Weight::new(10, 1000, 0), &[1, 2]));
        stats.accumulate(&sample(1, Weight::new(5, 500, 0), &[1, 3]));

        let f1 = stats.methods().get(FunctionId(1)).unwrap();
        assert_eq!(f1.samples_inclusive, 15);
        assert_eq!(f1.samples_exclusive, 0);
        assert_eq!(f1.time_inclusive, 1500);
        let f3 = stats.methods().get(FunctionId(3)).unwrap();
        assert_eq!(f3.samples_exclusive, 5);
        assert_eq!(stats.totals(), Weight::new(15, 1500, 0));
    }

    #[test]
    fn test_empty_stack_goes_to_root() {
        let mut stats = Statistics::new();
        stats.accumulate(&sample(0, Weight::new(3, 30, 0), &[]));

        let root = stats.call_tree().root().counters;
        assert_eq!(root.samples_inclusive, 3);
        assert_eq!(root.samples_exclusive, 3);
        assert!(stats.methods().is_empty());
        assert_eq!(stats.totals().samples, 3);
    }

    #[test]
    fn test_single_frame_exclusive_only_on_frame() {
        let mut stats = Statistics::new();
        stats.accumulate(&sample(0, Weight::new(4, 0, 0), &[9]));

        let tree = stats.call_tree();
        assert_eq!(tree.root().counters.samples_exclusive, 0);
        let f9 = tree.child(NodeId::ROOT, FunctionId(9)).unwrap();
        assert_eq!(tree.node(f9).unwrap().counters.samples_exclusive, 4);
    }

    #[test]
    fn test_recursion_counts_inclusive_once() {
        let mut stats = Statistics::new();
        stats.accumulate(&sample(0, Weight::new(1, 10, 0), &[1, 2, 1, 2]));

        let f1 = stats.methods().get(FunctionId(1)).unwrap();
        assert_eq!(f1.samples_inclusive, 1);
        let f2 = stats.methods().get(FunctionId(2)).unwrap();
        assert_eq!(f2.samples_inclusive, 1);
        assert_eq!(f2.samples_exclusive, 1);
        // The tree keeps the literal path
        assert_eq!(stats.call_tree().len(), 5);
    }

    #[test]
    fn test_lines_and_allocations() {
        let mut stats = Statistics::new();
        let s = Sample {
            seq: 0,
            tick: Timestamp(0),
            weight: Weight::memory_only(96),
            stack: vec![
                StackItem::with_line(FunctionId(2), SourceLineId(20)),
                StackItem::with_line(FunctionId(1), SourceLineId(10)),
            ],
            allocations: vec![
                AllocationItem { class: ClassId(1), count: 2, size: 64, line: Some(SourceLineId(20)) },
                AllocationItem { class: ClassId(2), count: 1, size: 32, line: None },
            ],
        };
        stats.accumulate(&s);

        let inner = stats.lines().get(SourceLineId(20)).unwrap();
        assert_eq!(inner.memory_inclusive, 96);
        assert_eq!(inner.memory_exclusive, 96);
        let outer = stats.lines().get(SourceLineId(10)).unwrap();
        assert_eq!(outer.memory_inclusive, 96);
        assert_eq!(outer.memory_exclusive, 0);
        assert_eq!(stats.methods().get(FunctionId(2)).unwrap().memory_exclusive, 96);
    }

    #[test]
    fn test_aggregate_sample_updates_both_scopes() {
        let mut thread = Statistics::new();
        let mut application = Statistics::new();
        aggregate_sample(&sample(0, Weight::new(2, 20, 0), &[1]), &mut thread, &mut application);

        assert_eq!(thread.totals(), application.totals());
        assert_eq!(thread.call_tree(), application.call_tree());
    }

    #[test]
    fn test_statistics_equality_follows_contents() {
        let mut a = Statistics::new();
        let mut b = Statistics::new();
        a.accumulate(&sample(0, Weight::new(2, 20, 0), &[1, 2]));
        b.accumulate(&sample(0, Weight::new(2, 20, 0), &[1, 2]));
        assert_eq!(a, b);

        b.accumulate(&sample(1, Weight::new(1, 0, 0), &[3]));
        assert_ne!(a, b);

        let mut first: KeyedCounters<FunctionId> = KeyedCounters::default();
        let mut second: KeyedCounters<FunctionId> = KeyedCounters::default();
        first.entry(FunctionId(1)).add_exclusive(Weight::new(1, 0, 0));
        second.entry(FunctionId(1)).add_exclusive(Weight::new(1, 0, 0));
        assert_eq!(first, second);
        second.entry(FunctionId(1)).add_exclusive(Weight::new(1, 0, 0));
        assert_ne!(first, second);
    }

    #[test]
    fn test_keyed_counters_keep_first_seen_order() {
        let mut counters: KeyedCounters<FunctionId> = KeyedCounters::default();
        counters.entry(FunctionId(5)).add_inclusive(Weight::new(1, 0, 0));
        counters.entry(FunctionId(2)).add_inclusive(Weight::new(1, 0, 0));
        counters.entry(FunctionId(5)).add_inclusive(Weight::new(1, 0, 0));

        let keys: Vec<_> = counters.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![FunctionId(5), FunctionId(2)]);
        assert_eq!(counters.get(FunctionId(5)).unwrap().samples_inclusive, 2);
    }
}
