//! Throttled ingestion progress
//!
//! Progress goes out over a bounded channel with `try_send`: if the observer
//! is slow the update is dropped, ingestion never waits on it. Marshaling to
//! a UI thread is the receiver's business.

use crossbeam_channel::{Sender, TrySendError};
use std::time::{Duration, Instant};

use crate::domain::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestProgress {
    pub events: u64,
    pub samples: u64,
    pub last_tick: Option<Timestamp>,
    /// Set on the final update
    pub done: bool,
}

/// Emits at most one update per `every_events` events or `every` wall time,
/// whichever comes first
#[derive(Debug)]
pub struct ProgressReporter {
    tx: Option<Sender<IngestProgress>>,
    every_events: u64,
    every: Duration,
    pending: u64,
    last_emit: Instant,
    /// Updates dropped because the channel was full
    pub dropped: u64,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(tx: Option<Sender<IngestProgress>>, every_events: u64, every: Duration) -> Self {
        Self {
            tx,
            every_events: every_events.max(1),
            every,
            pending: 0,
            last_emit: Instant::now(),
            dropped: 0,
        }
    }

    /// Count one event and maybe emit `progress`
    pub fn tick(&mut self, progress: impl FnOnce() -> IngestProgress) {
        if self.tx.is_none() {
            return;
        }
        self.pending += 1;
        if self.pending < self.every_events && self.last_emit.elapsed() < self.every {
            return;
        }
        self.emit(progress());
    }

    /// Emit the final update regardless of throttling
    pub fn finish(&mut self, progress: IngestProgress) {
        self.emit(IngestProgress { done: true, ..progress });
    }

    fn emit(&mut self, progress: IngestProgress) {
        let Some(ref tx) = self.tx else { return };
        match tx.try_send(progress) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped += 1,
            // Observer went away; stop reporting
            Err(TrySendError::Disconnected(_)) => self.tx = None,
        }
        self.pending = 0;
        self.last_emit = Instant::now();
    }
}
