//! # rtprof - Main Entry Point
//!
//! Loads one session directory, rebuilds statistics for the requested time
//! frame, prints a summary and optionally writes exports:
//! - `--export report.json`: full JSON report
//! - `--export-timeline jobs.json`: GC/JIT intervals for chrome://tracing

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;

use rtprof::cli::Args;
use rtprof::domain::{LoadError, Metric};
use rtprof::export::{ChromeTraceExporter, SessionReport};
use rtprof::profiling::{IngestProgress, Scope, Session, TimeFrame};
use rtprof::trace_data::load_session;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<UsageError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Arguments that parse but make no sense together
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct UsageError(String);

fn run() -> Result<()> {
    let args = Args::parse();

    let frame = args.time_frame();
    if frame.start > frame.end {
        return Err(UsageError(format!(
            "--from {} is after --to {}",
            frame.start.0, frame.end.0
        ))
        .into());
    }

    let mut session = load_with_progress(&args)?;
    if frame != TimeFrame::FULL {
        session.build_statistics(frame);
    }

    if let Scope::Thread(id) = args.scope() {
        if session.statistics(Scope::Thread(id)).is_none() {
            return Err(UsageError(format!("thread {id} has no samples in this session")).into());
        }
    }

    print_summary(&session, &args);

    if let Some(ref path) = args.export {
        let report = SessionReport::build(&session, &args.report_options());
        let file = File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        report.write(BufWriter::new(file)).context("Failed to export report")?;
        if !args.quiet {
            println!("saved: {}", path.display());
        }
    }

    if let Some(ref path) = args.export_timeline {
        let exporter = ChromeTraceExporter::from_session(&session);
        let file = File::create(path)
            .with_context(|| format!("Failed to create timeline file {}", path.display()))?;
        exporter.export(BufWriter::new(file)).context("Failed to export timeline")?;
        if !args.quiet {
            println!("saved: {} ({} intervals)", path.display(), exporter.event_count());
        }
    }

    Ok(())
}

/// Load the session while a side thread prints ingestion progress
fn load_with_progress(args: &Args) -> Result<Session> {
    let options = args.session_options();
    if args.quiet {
        return load_session(&args.session, &options, None).map_err(load_context);
    }

    let (tx, rx) = bounded::<IngestProgress>(8);
    let printer = thread::spawn(move || {
        let mut stderr = std::io::stderr();
        for progress in rx {
            let tick = progress.last_tick.map_or_else(|| "-".to_string(), |t| t.to_string());
            // Progress output is best effort
            let _ = write!(
                stderr,
                "\r   Ingesting: {} events, {} samples, at {tick}   ",
                progress.events, progress.samples
            );
            if progress.done {
                let _ = writeln!(stderr);
            }
        }
    });

    let result = load_session(&args.session, &options, Some(tx));
    // The sender went away with the processor, so the printer drains and exits
    let _ = printer.join();
    result.map_err(load_context)
}

fn load_context(err: LoadError) -> anyhow::Error {
    anyhow::Error::new(err).context("Failed to load session")
}

fn print_summary(session: &Session, args: &Args) {
    let scope = args.scope();
    let metric: Metric = args.metric.into();
    let info = session.info();
    let Some(stats) = session.statistics(scope) else { return };
    let totals = stats.totals();

    if !args.quiet {
        println!("rtprof v{}", env!("CARGO_PKG_VERSION"));
        println!("session: {}", info.name);
        if let Some(ref runtime) = info.runtime {
            println!("runtime: {runtime}");
        }
        println!("processors: {}", info.processor_count);
        let frame = session.time_frame();
        if frame != TimeFrame::FULL {
            println!("time frame: [{}, {}]", frame.start, frame.end);
        }
        let counters = session.counters();
        if counters.corrupt_deltas > 0 || counters.dropped_jobs > 0 {
            println!(
                "warnings: {} corrupt stack deltas, {} unpaired job markers",
                counters.corrupt_deltas, counters.dropped_jobs
            );
        }
    }

    match scope {
        Scope::Application => println!("\nAPPLICATION"),
        Scope::Thread(id) => println!("\nTHREAD {id}"),
    }
    println!(
        "  samples: {}   time: {}ms   memory: {} bytes",
        totals.samples, totals.time, totals.memory
    );

    println!("\nTOP METHODS (by exclusive {metric})");
    for entry in session.top_methods(scope, metric, args.top) {
        println!(
            "  {:>6.2}%  {:>10}  {:>10}  {}",
            entry.exclusive_percent, entry.exclusive, entry.inclusive, entry.name
        );
    }

    let lines = session.top_lines(scope, metric, args.top);
    if !lines.is_empty() {
        println!("\nTOP LINES (by exclusive {metric})");
        for entry in lines {
            println!("  {:>10}  {:>10}  {}", entry.exclusive, entry.inclusive, entry.location);
        }
    }

    let hot = session.hot_paths(scope, metric, args.hot_threshold);
    if !hot.is_empty() {
        println!("\nHOT PATHS (>= {}% of application {metric})", args.hot_threshold);
        for path in hot {
            println!("  {:>6.2}%  {}", path.percent, path.name);
            for ancestor in path.path.iter().rev() {
                println!("           ← {ancestor}");
            }
        }
    }

    if scope == Scope::Application && !args.quiet {
        let gc = session.gc_items();
        let jit = session.jit_items();
        if !gc.is_empty() || !jit.is_empty() {
            let pause: u64 = gc.iter().map(|g| g.pause()).sum();
            let compile: u64 = jit.iter().map(|j| j.duration()).sum();
            println!("\nJOBS");
            println!("  GC:  {} collections, {pause}ms paused", gc.len());
            println!("  JIT: {} compilations, {compile}ms compiling", jit.len());
        }

        println!("\nTHREADS");
        for thread in session.thread_summaries() {
            let name = thread.name.as_deref().unwrap_or("-");
            println!(
                "  {:<6} {:<20} samples: {:<8} time: {}ms",
                thread.id.to_string(),
                name,
                thread.totals.samples,
                thread.totals.time
            );
        }
    }

    info!("Summary printed for {} threads", session.thread_ids().len());
}
