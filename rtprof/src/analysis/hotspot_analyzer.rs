//! Hotspot analysis over aggregated statistics.
//!
//! Turns the flat counters and the call tree of one [`Statistics`] scope into
//! ranked, named view models for display and export.
//!
//! # Architecture
//!
//! - **[`top_methods()`]** - functions ranked by own cost
//! - **[`top_lines()`]** - source lines ranked by own cost
//! - **[`hot_paths()`]** - call-tree nodes whose own cost crosses a share of
//!   the whole application's total
//!
//! ## Ordering
//!
//! Every ranking is a stable sort over first-seen order, so equal values keep
//! the order in which ingestion discovered them:
//!
//! ```text
//! methods / lines:  exclusive desc → inclusive desc → first seen
//! hot paths:        exclusive desc → node discovery order
//! ```
//!
//! # Performance
//!
//! - `top_*()`: O(n log n) where n = distinct functions or lines in scope
//! - `hot_paths()`: O(nodes · depth) for the ancestor names

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::cmp::Reverse;

use crate::domain::{FunctionId, Metric, SourceLineId};
use crate::profiling::{CallTree, NodeId, Statistics};
use crate::registry::MetadataRegistry;

// =============================================================================
// VIEW MODELS
// =============================================================================

/// One row of the method ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodEntry {
    pub function: FunctionId,
    /// `Class.method` display name
    pub name: String,
    pub inclusive: u64,
    pub exclusive: u64,
    /// Share of the scope total (0.0 - 100.0)
    pub inclusive_percent: f64,
    pub exclusive_percent: f64,
}

/// One row of the source-line ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineEntry {
    pub line: SourceLineId,
    /// `path:line`
    pub location: String,
    /// Owning function, when the line was announced
    pub function: Option<String>,
    pub inclusive: u64,
    pub exclusive: u64,
}

/// A call-tree node that crossed the hot-path threshold.
///
/// ```text
/// 12.5%  Worker.Hash        ← name
///        Program.Main       ← path[0]
///        Worker.Run         ← path[1]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotPath {
    pub function: FunctionId,
    pub name: String,
    pub exclusive: u64,
    pub inclusive: u64,
    /// Exclusive value as a share of the application total (0.0 - 100.0)
    pub percent: f64,
    /// Ancestor names, outermost first; neither the root nor the node itself
    pub path: Vec<String>,
}

fn percent(value: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * value as f64 / total as f64
    }
}

// =============================================================================
// RANKINGS
// =============================================================================

/// The `n` methods with the largest own cost for `metric`.
///
/// Methods never reached by a sample carrying `metric` (inclusive value 0)
/// are left out.
#[must_use]
pub fn top_methods(
    stats: &Statistics,
    registry: &MetadataRegistry,
    metric: Metric,
    n: usize,
) -> Vec<MethodEntry> {
    let total = stats.totals().get(metric);
    let mut ranked: Vec<(FunctionId, u64, u64)> = stats
        .methods()
        .iter()
        .map(|(function, c)| (function, c.inclusive(metric), c.exclusive(metric)))
        .filter(|&(_, inclusive, _)| inclusive > 0)
        .collect();
    ranked.sort_by_key(|&(_, inclusive, exclusive)| (Reverse(exclusive), Reverse(inclusive)));

    ranked
        .into_iter()
        .take(n)
        .map(|(function, inclusive, exclusive)| MethodEntry {
            function,
            name: registry.function_name(function),
            inclusive,
            exclusive,
            inclusive_percent: percent(inclusive, total),
            exclusive_percent: percent(exclusive, total),
        })
        .collect()
}

/// The `n` source lines with the largest own cost for `metric`.
///
/// A line is visible when either of its values is non-zero: allocation
/// samples can charge a line exclusively without it being on the stack.
#[must_use]
pub fn top_lines(
    stats: &Statistics,
    registry: &MetadataRegistry,
    metric: Metric,
    n: usize,
) -> Vec<LineEntry> {
    let mut ranked: Vec<(SourceLineId, u64, u64)> = stats
        .lines()
        .iter()
        .map(|(line, c)| (line, c.inclusive(metric), c.exclusive(metric)))
        .filter(|&(_, inclusive, exclusive)| inclusive > 0 || exclusive > 0)
        .collect();
    ranked.sort_by_key(|&(_, inclusive, exclusive)| (Reverse(exclusive), Reverse(inclusive)));

    ranked
        .into_iter()
        .take(n)
        .map(|(line, inclusive, exclusive)| LineEntry {
            line,
            location: registry.line_location(line),
            function: registry
                .source_line(line)
                .and_then(|l| l.function)
                .map(|f| registry.function_name(f)),
            inclusive,
            exclusive,
        })
        .collect()
}

/// Call-tree nodes whose exclusive `metric` is at least `threshold_percent`
/// of `application_total`.
///
/// Only nodes reached by at least one stack sample are considered, and the
/// root never is. Returns nothing when the application total is zero.
///
/// The stack-sample filter applies to every metric: a node only ever reached
/// by allocation samples is never a memory hot path. Its bytes still show up
/// in the method and line rankings and in the call tree.
#[must_use]
pub fn hot_paths(
    tree: &CallTree,
    registry: &MetadataRegistry,
    metric: Metric,
    application_total: u64,
    threshold_percent: f64,
) -> Vec<HotPath> {
    if application_total == 0 {
        return Vec::new();
    }

    let mut hot: Vec<(NodeId, u64, f64)> = tree
        .nodes()
        .filter(|&(id, node)| {
            id != NodeId::ROOT && node.counters.inclusive(Metric::Samples) > 0
        })
        .map(|(id, node)| {
            let exclusive = node.counters.exclusive(metric);
            (id, exclusive, percent(exclusive, application_total))
        })
        .filter(|&(_, _, share)| share >= threshold_percent)
        .collect();
    hot.sort_by_key(|&(_, exclusive, _)| Reverse(exclusive));

    hot.into_iter()
        .filter_map(|(id, exclusive, share)| {
            let node = tree.node(id)?;
            let mut path = tree.path(id);
            path.pop();
            Some(HotPath {
                function: node.function,
                name: registry.function_name(node.function),
                exclusive,
                inclusive: node.counters.inclusive(metric),
                percent: share,
                path: path.into_iter().map(|f| registry.function_name(f)).collect(),
            })
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
