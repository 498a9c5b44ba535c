//! Session files on disk
//!
//! A session directory holds two files:
//!
//! ```text
//! <session>/
//!   sysinfo.json   {"start_time_ms": 1700000000000, "processor_count": 8, ...}
//!   events.jsonl   one TraceEvent per line, in stream order
//! ```
//!
//! Loading streams `events.jsonl` line by line through an [`EventProcessor`];
//! nothing but the current line is held in memory. Any failure here is fatal
//! for the load and no partial session is returned.

use crossbeam_channel::Sender;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rtprof_common::TraceEvent;

use crate::domain::LoadError;
use crate::profiling::{EventProcessor, IngestProgress, Session, SessionInfo, SessionOptions};

pub const SYSINFO_FILE: &str = "sysinfo.json";
pub const EVENTS_FILE: &str = "events.jsonl";

/// On-disk shape of `sysinfo.json`
#[derive(Debug, Deserialize)]
struct SysInfo {
    start_time_ms: Option<u64>,
    #[serde(default)]
    processor_count: Option<u32>,
    #[serde(default)]
    runtime: Option<String>,
    #[serde(default)]
    device: Option<String>,
}

/// Display name of a session: its directory name
#[must_use]
pub fn session_name(dir: &Path) -> String {
    dir.file_name()
        .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Path of a required session file, checked to exist and be non-empty
fn required_file(dir: &Path, name: &str, session: &str) -> Result<PathBuf, LoadError> {
    let path = dir.join(name);
    let metadata = match std::fs::metadata(&path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::MissingFile { session: session.to_string(), path });
        }
        Err(e) => return Err(e.into()),
    };
    if metadata.len() == 0 {
        return Err(LoadError::EmptyFile { session: session.to_string(), path });
    }
    Ok(path)
}

/// Read `sysinfo.json`
///
/// # Errors
/// Returns [`LoadError`] if the file is missing, empty, malformed, or has no
/// start time.
pub fn read_session_info(dir: &Path) -> Result<SessionInfo, LoadError> {
    let session = session_name(dir);
    let path = required_file(dir, SYSINFO_FILE, &session)?;
    let content = std::fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Err(LoadError::EmptyFile { session, path });
    }
    let sysinfo: SysInfo = serde_json::from_str(&content).map_err(|source| {
        LoadError::InvalidRecord { session: session.clone(), line: source.line(), source }
    })?;
    let Some(start_time_ms) = sysinfo.start_time_ms else {
        return Err(LoadError::NoStartTime { session });
    };

    Ok(SessionInfo {
        name: session,
        start_time_ms,
        processor_count: sysinfo.processor_count.unwrap_or(1).max(1),
        runtime: sysinfo.runtime,
        device: sysinfo.device,
    })
}

/// Load and ingest a whole session directory
///
/// # Errors
/// Returns [`LoadError`] if either session file is missing or empty, the
/// system info has no start time, or an event line cannot be decoded.
pub fn load_session(
    dir: &Path,
    options: &SessionOptions,
    progress_tx: Option<Sender<IngestProgress>>,
) -> Result<Session, LoadError> {
    let info = read_session_info(dir)?;
    let session = info.name.clone();
    let path = required_file(dir, EVENTS_FILE, &session)?;
    log::info!("Loading session {session} from {}", dir.display());

    let mut processor = EventProcessor::new(info, options, progress_tx);
    let reader = BufReader::new(File::open(&path)?);
    let mut records = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TraceEvent = serde_json::from_str(&line).map_err(|source| {
            LoadError::InvalidRecord { session: session.clone(), line: index + 1, source }
        })?;
        processor.process_event(&event);
        records += 1;
    }
    if records == 0 {
        return Err(LoadError::EmptyFile { session, path });
    }

    Ok(processor.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_session(sysinfo: &str, events: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SYSINFO_FILE), sysinfo).unwrap();
        fs::write(dir.path().join(EVENTS_FILE), events).unwrap();
        dir
    }

    const EVENTS: &str = r#"{"kind":"function_name","id":1,"name":"Main"}

{"kind":"stack_sample","thread":1,"tick":10,"match_prefix":0,"stack_size":0,"new_frames":[{"function":1}],"samples":2}
"#;

    #[test]
    fn test_load_minimal_session() {
        let dir = write_session(r#"{"start_time_ms": 1000, "processor_count": 4}"#, EVENTS);
        let session = load_session(dir.path(), &SessionOptions::default(), None).unwrap();

        assert_eq!(session.info().start_time_ms, 1000);
        assert_eq!(session.info().processor_count, 4);
        assert_eq!(session.counters().events, 2);
        assert_eq!(session.counters().samples, 1);
    }

    #[test]
    fn test_missing_events_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SYSINFO_FILE), r#"{"start_time_ms": 1}"#).unwrap();

        let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
        assert!(matches!(err, LoadError::MissingFile { .. }));
    }

    #[test]
    fn test_empty_events_file() {
        let dir = write_session(r#"{"start_time_ms": 1}"#, "");
        let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
        assert!(matches!(err, LoadError::EmptyFile { .. }));

        let dir = write_session(r#"{"start_time_ms": 1}"#, "\n\n");
        let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
        assert!(matches!(err, LoadError::EmptyFile { .. }));
    }

    #[test]
    fn test_sysinfo_without_start_time() {
        let dir = write_session(r#"{"processor_count": 2}"#, EVENTS);
        let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
        assert!(matches!(err, LoadError::NoStartTime { .. }));
    }

    #[test]
    fn test_invalid_record_reports_line() {
        let dir = write_session(r#"{"start_time_ms": 1}"#, "{\"kind\":\"function_name\",\"id\":1,\"name\":\"A\"}\nnot json\n");
        let err = load_session(dir.path(), &SessionOptions::default(), None).unwrap_err();
        match err {
            LoadError::InvalidRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
