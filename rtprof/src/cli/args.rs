//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{ClassId, Metric, ThreadId, Timestamp};
use crate::export::ReportOptions;
use crate::profiling::{Scope, SessionOptions, TimeFrame};

#[derive(Parser)]
#[command(
    name = "rtprof",
    about = "Aggregate managed-runtime profiling sessions into hotspots and timelines",
    after_help = "\
EXAMPLES:
    rtprof ./session                              Application summary by sample count
    rtprof ./session --thread 3 --metric time     One thread, ranked by time
    rtprof ./session --from 1000 --to 5000        Only samples in [1s, 5s]
    rtprof ./session --export report.json --export-timeline jobs.json"
)]
pub struct Args {
    /// Session directory (holds sysinfo.json and events.jsonl)
    #[arg(value_name = "SESSION")]
    pub session: PathBuf,

    /// Restrict rankings to one thread (internal thread id)
    #[arg(short, long, value_name = "ID")]
    pub thread: Option<u32>,

    /// Metric to rank by
    #[arg(short, long, value_enum, default_value_t = MetricArg::Samples)]
    pub metric: MetricArg,

    /// Number of methods and lines to show
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Minimum share of the application total for a hot path, in percent
    #[arg(long, value_name = "PCT", default_value = "1.0")]
    pub hot_threshold: f64,

    /// Only aggregate samples at or after this tick (ms)
    #[arg(long, value_name = "MS")]
    pub from: Option<u64>,

    /// Only aggregate samples at or before this tick (ms)
    #[arg(long, value_name = "MS")]
    pub to: Option<u64>,

    /// Keep a live-object series for this class id (repeatable)
    #[arg(long = "track-type", value_name = "ID")]
    pub track_types: Vec<u32>,

    /// Report ingestion progress every N events
    #[arg(long, value_name = "N", default_value = "100000")]
    pub progress_every: u64,

    /// Export a JSON report to file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Export the GC/JIT timeline in Chrome Trace Event Format
    #[arg(long, value_name = "FILE")]
    pub export_timeline: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    Samples,
    Time,
    Memory,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Samples => Metric::Samples,
            MetricArg::Time => Metric::Time,
            MetricArg::Memory => Metric::Memory,
        }
    }
}

impl Args {
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            tracked_classes: self.track_types.iter().copied().map(ClassId).collect(),
            progress_every_events: self.progress_every,
            progress_every: Duration::from_millis(250),
            ..SessionOptions::default()
        }
    }

    #[must_use]
    pub fn time_frame(&self) -> TimeFrame {
        TimeFrame::new(
            self.from.map_or(Timestamp(0), Timestamp),
            self.to.map_or(Timestamp::MAX, Timestamp),
        )
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.thread.map_or(Scope::Application, |id| Scope::Thread(ThreadId(id)))
    }

    #[must_use]
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            scope: self.scope(),
            metric: self.metric.into(),
            top: self.top,
            hot_threshold: self.hot_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["rtprof", "./session"]);
        assert_eq!(args.top, 10);
        assert_eq!(args.scope(), Scope::Application);
        assert_eq!(args.time_frame(), TimeFrame::FULL);
        assert_eq!(Metric::from(args.metric), Metric::Samples);
        assert!(args.session_options().tracked_classes.is_empty());
    }

    #[test]
    fn test_thread_frame_and_tracked_types() {
        let args = Args::parse_from([
            "rtprof",
            "./session",
            "--thread",
            "3",
            "--metric",
            "memory",
            "--from",
            "100",
            "--track-type",
            "7",
            "--track-type",
            "9",
        ]);
        assert_eq!(args.scope(), Scope::Thread(ThreadId(3)));
        assert_eq!(args.time_frame(), TimeFrame::new(Timestamp(100), Timestamp::MAX));
        assert_eq!(args.report_options().metric, Metric::Memory);
        assert_eq!(args.session_options().tracked_classes, vec![ClassId(7), ClassId(9)]);
    }
}
