//! Ingestion knobs

use std::time::Duration;

use crate::domain::ClassId;

/// Options fixed for the lifetime of one ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Classes that get a live-object series from heap censuses
    pub tracked_classes: Vec<ClassId>,
    /// Overrides the processor count recorded with the session
    pub processor_count: Option<u32>,
    /// Emit progress at most every this many events...
    pub progress_every_events: u64,
    /// ...or this much wall time, whichever comes first
    pub progress_every: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tracked_classes: Vec::new(),
            processor_count: None,
            progress_every_events: 100_000,
            progress_every: Duration::from_millis(250),
        }
    }
}
