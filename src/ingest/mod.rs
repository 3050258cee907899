//! Ingestion pipeline
//!
//! Runs the inspection tool against a capture, parses its stdout on one
//! producer thread, and hands records to a consumer through a bounded queue.
//!
//! # Architecture
//!
//! - [`IngestPipeline`] - producer side; owns the interner, parser settings and queue sender
//! - [`PacketReceiver`] - consumer side; yields batches or single records in line order
//! - [`IngestMessage`] - what travels through the queue
//! - [`CancelHandle`] - cooperative cancellation shared between both sides
//! - [`LineSource`] - where lines come from ([`ToolProcess`] or any reader)
//!
//! The queue holds at most `queue_capacity` batches. When it is full the
//! producer blocks, which in turn stops it from reading the tool's stdout, so
//! the tool itself is throttled by the pipe. Memory stays bounded by
//! [`PipelineConfig::max_buffered_records`](crate::config::PipelineConfig::max_buffered_records).
//!
//! # Example
//!
//! ```ignore
//! use packet_ingest::config::IngestConfig;
//! use packet_ingest::ingest::IngestPipeline;
//!
//! let (pipeline, receiver) = IngestPipeline::new(IngestConfig::default());
//! let producer = pipeline.spawn_capture("trace.pcapng".into())?;
//!
//! for record in receiver.by_ref() {
//!     println!("{} {} -> {}", record.frame_number, record.source, record.destination);
//! }
//! let summary = producer.join().expect("producer panicked")?;
//! ```

pub mod source;
pub mod timing;
pub mod worker;

pub use source::{LineSource, ReaderSource, ToolProcess};
pub use timing::{LogTimer, StageTimer};
pub use worker::Producer;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::parser::{FailureSnapshot, FailureTracker, LineParser, StringInterner};
use crate::types::PacketRecord;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Message sent from the producer to the consumer
#[derive(Debug, Clone)]
pub enum IngestMessage {
    /// Records in line order; never empty
    Batch(Vec<PacketRecord>),
    /// Last message of a run
    Finished(IngestSummary),
}

/// Totals for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Lines read from the source, blank ones included
    pub lines_read: u64,
    /// Blank or whitespace-only lines (not failures)
    pub blank_lines: u64,
    pub records_emitted: u64,
    /// Parsed records that never reached the consumer (cancellation or a dropped receiver)
    pub records_discarded: u64,
    pub batches_sent: u64,
    /// Sends that found the queue full and had to wait
    pub blocked_sends: u64,
    pub failures: FailureSnapshot,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    /// Tool exit code, when the source was a process
    pub exit_code: Option<i32>,
    pub distinct_addresses: usize,
    pub distinct_protocols: usize,
}

/// Cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the producer to stop; the tool process is killed and the pending batch dropped
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Consumer side of a pipeline
///
/// Iterating yields single records; [`recv`](Self::recv) and friends yield
/// whole queue messages. Mixing both styles is fine, records are never skipped.
pub struct PacketReceiver {
    receiver: Receiver<IngestMessage>,
    failures: Arc<FailureTracker>,
    cancel: CancelHandle,
    pending: std::vec::IntoIter<PacketRecord>,
    summary: Option<IngestSummary>,
}

impl PacketReceiver {
    /// Block until the next message; `None` once the producer is gone
    pub fn recv(&mut self) -> Option<IngestMessage> {
        if let Some(batch) = self.take_pending() {
            return Some(IngestMessage::Batch(batch));
        }
        let message = self.receiver.recv().ok()?;
        Some(self.observe(message))
    }

    /// Receive a message without blocking
    pub fn try_recv(&mut self) -> Option<IngestMessage> {
        if let Some(batch) = self.take_pending() {
            return Some(IngestMessage::Batch(batch));
        }
        match self.receiver.try_recv() {
            Ok(message) => Some(self.observe(message)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Receive a message, waiting at most `timeout`
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<IngestMessage>> {
        if let Some(batch) = self.take_pending() {
            return Ok(Some(IngestMessage::Batch(batch)));
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(self.observe(message))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(IngestError::Channel("producer disconnected".to_string()))
            }
        }
    }

    /// Drain all currently queued messages without blocking
    pub fn drain(&mut self) -> Vec<IngestMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Running failure counters; valid while the run is still in progress
    pub fn failures(&self) -> FailureSnapshot {
        self.failures.snapshot()
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.total()
    }

    /// Summary of the run, once the final message has been received
    pub fn summary(&self) -> Option<&IngestSummary> {
        self.summary.as_ref()
    }

    /// Handle for cancelling the producer from the consumer side
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn take_pending(&mut self) -> Option<Vec<PacketRecord>> {
        let rest: Vec<PacketRecord> = self.pending.by_ref().collect();
        (!rest.is_empty()).then_some(rest)
    }

    fn observe(&mut self, message: IngestMessage) -> IngestMessage {
        if let IngestMessage::Finished(summary) = &message {
            self.summary = Some(summary.clone());
        }
        message
    }
}

impl Iterator for PacketReceiver {
    type Item = PacketRecord;

    fn next(&mut self) -> Option<PacketRecord> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(record);
            }
            match self.receiver.recv().ok()? {
                IngestMessage::Batch(batch) => self.pending = batch.into_iter(),
                IngestMessage::Finished(summary) => {
                    self.summary = Some(summary);
                    return None;
                }
            }
        }
    }
}

/// Producer side of a pipeline
///
/// A pipeline performs a single run; `run*` consume it so the interner and
/// counters can never leak from one run into the next.
pub struct IngestPipeline {
    config: IngestConfig,
    interner: Arc<StringInterner>,
    failures: Arc<FailureTracker>,
    sender: Sender<IngestMessage>,
    cancel: CancelHandle,
    timer: Option<Arc<dyn StageTimer>>,
}

impl IngestPipeline {
    /// Create a pipeline and its receiver
    pub fn new(config: IngestConfig) -> (Self, PacketReceiver) {
        tracing::debug!(
            "Pipeline: batch_size={}, queue_capacity={}, layout={:?}",
            config.pipeline.batch_size,
            config.pipeline.queue_capacity,
            config.parser.layout()
        );
        let (sender, receiver) = bounded(config.pipeline.queue_capacity.max(1));
        let failures = Arc::new(FailureTracker::new());
        let cancel = CancelHandle::new();

        let pipeline = Self {
            config,
            interner: Arc::new(StringInterner::new()),
            failures: Arc::clone(&failures),
            sender,
            cancel: cancel.clone(),
            timer: None,
        };
        let receiver = PacketReceiver {
            receiver,
            failures,
            cancel,
            pending: Vec::new().into_iter(),
            summary: None,
        };
        (pipeline, receiver)
    }

    /// Attach a stage timer notified around the run
    pub fn with_timer(mut self, timer: Arc<dyn StageTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Interner used for this run's addresses and protocol labels
    pub fn interner(&self) -> &Arc<StringInterner> {
        &self.interner
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run the tool against `capture` and stream its output to the receiver
    pub fn run_capture(self, capture: impl Into<PathBuf>) -> Result<IngestSummary> {
        let capture = capture.into();
        let layout = self.config.parser.layout();
        let mut process = match ToolProcess::spawn(&self.config.tool, &capture, layout) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!("Could not start ingestion of {:?}: {}", capture, e);
                return Err(e);
            }
        };
        self.run(&mut process)
    }

    /// Run the producer loop over any line source on the current thread
    pub fn run(self, source: &mut dyn LineSource) -> Result<IngestSummary> {
        let parser = LineParser::with_failures(
            Arc::clone(&self.interner),
            self.config.parser.layout(),
            Arc::clone(&self.failures),
        );
        let batch_size = self.config.pipeline.batch_size;
        let producer = Producer::new(parser, self.sender, self.cancel, batch_size);

        if let Some(timer) = &self.timer {
            timer.start_timing();
        }
        let result = producer.run(source);
        if let Some(timer) = &self.timer {
            timer.stop_timing();
        }
        result
    }

    /// Start [`run_capture`](Self::run_capture) on a dedicated thread
    pub fn spawn_capture(self, capture: PathBuf) -> Result<JoinHandle<Result<IngestSummary>>> {
        std::thread::Builder::new()
            .name("ingest-producer".to_string())
            .spawn(move || self.run_capture(capture))
            .map_err(|e| IngestError::Io(e).with_context("Spawning producer thread"))
    }

    /// Start [`run`](Self::run) over an owned source on a dedicated thread
    pub fn spawn<S>(self, mut source: S) -> Result<JoinHandle<Result<IngestSummary>>>
    where
        S: LineSource + 'static,
    {
        std::thread::Builder::new()
            .name("ingest-producer".to_string())
            .spawn(move || self.run(&mut source))
            .map_err(|e| IngestError::Io(e).with_context("Spawning producer thread"))
    }
}
