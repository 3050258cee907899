//! Optional stage timing hooks
//!
//! A host application can pass anything that tracks progress stages; the
//! pipeline only needs to say when its stage starts and stops.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receives start/stop notifications for one ingestion run
#[cfg_attr(test, mockall::automock)]
pub trait StageTimer: Send + Sync {
    fn start_timing(&self);
    fn stop_timing(&self);
}

/// Timer that logs the elapsed time of each run
#[derive(Debug)]
pub struct LogTimer {
    label: String,
    started: Mutex<Option<Instant>>,
    last: Mutex<Option<Duration>>,
}

impl LogTimer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started: Mutex::new(None),
            last: Mutex::new(None),
        }
    }

    /// Duration of the most recently completed run
    pub fn last_elapsed(&self) -> Option<Duration> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StageTimer for LogTimer {
    fn start_timing(&self) {
        *self.started.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        tracing::debug!("{}: started", self.label);
    }

    fn stop_timing(&self) {
        let started = self.started.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(started) = started {
            let elapsed = started.elapsed();
            *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(elapsed);
            tracing::info!("{}: finished in {:.2?}", self.label, elapsed);
        }
    }
}
