use std::fs;
use std::path::PathBuf;

use rtprof::domain::{LoadError, Metric, ThreadId};
use rtprof::export::{ChromeTraceExporter, ReportOptions, SessionReport};
use rtprof::profiling::{Scope, SessionOptions};
use rtprof::trace_data::{load_session, EVENTS_FILE, SYSINFO_FILE};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/simple_session")
}

#[test]
fn test_report_is_valid_json() {
    let session = load_session(&fixture(), &SessionOptions::default(), None)
        .expect("Failed to load fixture session");
    let report = SessionReport::build(&session, &ReportOptions::default());

    let mut buffer = Vec::new();
    report.write(&mut buffer).expect("Failed to write report");
    let parsed: serde_json::Value = serde_json::from_slice(&buffer).expect("Invalid JSON");

    assert_eq!(parsed["session"]["name"], "simple_session");
    assert_eq!(parsed["metric"], "samples");
    assert_eq!(parsed["totals"]["samples"], 20);
    assert_eq!(parsed["top_methods"][0]["name"], "App.Program.Compute");
    assert_eq!(parsed["call_tree"]["counters"]["samples_inclusive"], 20);
    assert_eq!(parsed["gc"]["count"], 1);
    assert_eq!(parsed["jit"]["functions"][0]["name"], "App.Program.Compute");
    assert_eq!(parsed["jobs"][0]["intervals"].as_array().map(Vec::len), Some(3));
    // Pause marker serializes as null
    assert!(parsed["cpu"][3]["percent"].is_null());
    assert_eq!(parsed["allocations"][0]["name"], "App.Buffer");
}

#[test]
fn test_thread_report_scopes_rankings() {
    let session = load_session(&fixture(), &SessionOptions::default(), None)
        .expect("Failed to load fixture session");
    let options = ReportOptions {
        scope: Scope::Thread(ThreadId(2)),
        metric: Metric::Time,
        ..ReportOptions::default()
    };
    let report = SessionReport::build(&session, &options);

    assert_eq!(report.thread, Some(ThreadId(2)));
    assert_eq!(report.totals.time, 150);
    assert_eq!(report.top_methods.len(), 1);
    assert_eq!(report.top_methods[0].name, "App.Program.Log");
    // Thread 2 never ran a job
    assert!(report.jobs.is_empty());
}

#[test]
fn test_timeline_export() {
    let session = load_session(&fixture(), &SessionOptions::default(), None)
        .expect("Failed to load fixture session");
    let exporter = ChromeTraceExporter::from_session(&session);
    assert_eq!(exporter.event_count(), 3);

    let mut buffer = Vec::new();
    exporter.export(&mut buffer).expect("Failed to export timeline");
    let parsed: serde_json::Value = serde_json::from_slice(&buffer).expect("Invalid JSON");

    assert_eq!(parsed["displayTimeUnit"], "ms");
    let events = parsed["traceEvents"].as_array().expect("traceEvents array");
    assert!(events.iter().filter(|e| e["ph"] == "X").all(|e| e["dur"].as_f64().is_some()));
    assert!(events.iter().any(|e| e["ph"] == "M" && e["args"]["name"] == "Main Thread"));
}

#[test]
fn test_missing_and_empty_files_fail_the_load() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
    assert!(matches!(err, LoadError::MissingFile { .. }));

    fs::write(dir.path().join(SYSINFO_FILE), "").expect("write sysinfo");
    let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
    assert!(matches!(err, LoadError::EmptyFile { .. }));

    fs::write(dir.path().join(SYSINFO_FILE), r#"{"start_time_ms": 5}"#).expect("write sysinfo");
    fs::write(dir.path().join(EVENTS_FILE), "").expect("write events");
    let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
    assert!(matches!(err, LoadError::EmptyFile { .. }));
    assert!(err.to_string().contains("events.jsonl"));
}
