//! Producer loop
//!
//! One producer reads the source sequentially, parses each line, and sends
//! records to the consumer in batches. It suspends in exactly two places:
//! waiting for the next line and waiting for queue capacity. While it waits
//! for capacity it keeps polling the cancel flag, so a stalled consumer can
//! always be cancelled out of.
//!
//! Records are sent in line order and never reordered.

use super::source::LineSource;
use super::{CancelHandle, IngestMessage, IngestSummary};
use crate::error::{IngestError, Result};
use crate::parser::LineParser;
use crate::types::PacketRecord;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// How often a blocked send re-checks the cancel flag
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of handing a batch to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Cancelled,
    Disconnected,
}

/// Why the read loop stopped
#[derive(Debug)]
enum Stop {
    EndOfOutput,
    Cancelled,
    ReceiverGone,
    ReadFailed(IngestError),
}

/// The producer side of one ingestion run
pub struct Producer {
    parser: LineParser,
    sender: Sender<IngestMessage>,
    cancel: CancelHandle,
    batch_size: usize,
    summary: IngestSummary,
}

impl Producer {
    pub fn new(
        parser: LineParser,
        sender: Sender<IngestMessage>,
        cancel: CancelHandle,
        batch_size: usize,
    ) -> Self {
        Self {
            parser,
            sender,
            cancel,
            batch_size: batch_size.max(1),
            summary: IngestSummary::default(),
        }
    }

    /// Drain `source` to the queue
    ///
    /// Always sends a final [`IngestMessage::Finished`] unless the receiver
    /// is gone. Errors are pipeline-level only: a read failure or a tool that
    /// exited with a failure status. Records sent before the error stay valid.
    pub fn run(mut self, source: &mut dyn LineSource) -> Result<IngestSummary> {
        let started = Instant::now();
        tracing::info!("Ingesting from {}", source.describe());

        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        let mut batch: Vec<PacketRecord> = Vec::with_capacity(self.batch_size);

        let stop = loop {
            if self.cancel.is_cancelled() {
                break Stop::Cancelled;
            }

            match source.read_line(&mut buf) {
                Ok(true) => {}
                Ok(false) => break Stop::EndOfOutput,
                Err(e) => break Stop::ReadFailed(e),
            }

            // A line read after cancellation is discarded unparsed
            if self.cancel.is_cancelled() {
                break Stop::Cancelled;
            }

            self.summary.lines_read += 1;
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => Cow::Borrowed(line),
                Err(_) => String::from_utf8_lossy(&buf),
            };

            match self.parser.parse_line(&line) {
                Ok(record) => batch.push(record),
                // Counted failures are tallied by the parser's tracker
                Err(e) if !e.is_counted() => self.summary.blank_lines += 1,
                Err(_) => {}
            }

            if batch.len() >= self.batch_size {
                match self.deliver(&mut batch) {
                    Delivery::Sent => {}
                    Delivery::Cancelled => break Stop::Cancelled,
                    Delivery::Disconnected => break Stop::ReceiverGone,
                }
            }
        };

        // Trailing partial batch
        let stop = match stop {
            Stop::EndOfOutput if !batch.is_empty() => match self.deliver(&mut batch) {
                Delivery::Sent => Stop::EndOfOutput,
                Delivery::Cancelled => Stop::Cancelled,
                Delivery::Disconnected => Stop::ReceiverGone,
            },
            other => other,
        };

        let mut result = Ok(());
        match stop {
            Stop::EndOfOutput => match source.finish() {
                Ok(code) => self.summary.exit_code = code,
                Err(e) => {
                    if let IngestError::ToolExit { code, .. } = &e {
                        self.summary.exit_code = *code;
                    }
                    tracing::warn!("Source {} failed: {}", source.describe(), e);
                    result = Err(e);
                }
            },
            Stop::Cancelled => {
                tracing::info!("Ingestion cancelled after {} lines", self.summary.lines_read);
                self.summary.cancelled = true;
                source.terminate();
            }
            Stop::ReceiverGone => {
                tracing::warn!("Consumer went away, stopping {}", source.describe());
                source.terminate();
            }
            Stop::ReadFailed(e) => {
                if !batch.is_empty() {
                    let _ = self.deliver(&mut batch);
                }
                source.terminate();
                result = Err(e.with_context(format!("Reading from {}", source.describe())));
            }
        }

        self.summary.records_discarded += batch.len() as u64;
        self.summary.failures = self.parser.failures().snapshot();
        let (addresses, protocols) = self.parser.interner().stats();
        self.summary.distinct_addresses = addresses;
        self.summary.distinct_protocols = protocols;
        self.summary.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Ingestion finished: {} lines, {} records, {} failures in {} ms",
            self.summary.lines_read,
            self.summary.records_emitted,
            self.summary.failures.total,
            self.summary.elapsed_ms
        );

        let summary = self.summary.clone();
        self.send_finished(summary.clone());
        result.map(|()| summary)
    }

    /// Best-effort delivery of the run summary
    ///
    /// Gives up once the receiver is gone or the run is cancelled and the
    /// queue stays full.
    fn send_finished(&self, summary: IngestSummary) {
        let mut message = IngestMessage::Finished(summary);
        loop {
            match self.sender.send_timeout(message, CANCEL_POLL_INTERVAL) {
                Ok(()) | Err(SendTimeoutError::Disconnected(_)) => return,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if self.cancel.is_cancelled() {
                        tracing::debug!("Queue full after cancellation, dropping summary message");
                        return;
                    }
                    message = returned;
                }
            }
        }
    }

    /// Send the current batch, waiting for capacity if the queue is full
    fn deliver(&mut self, batch: &mut Vec<PacketRecord>) -> Delivery {
        let records = std::mem::replace(batch, Vec::with_capacity(self.batch_size));
        let count = records.len() as u64;

        let mut message = match self.sender.try_send(IngestMessage::Batch(records)) {
            Ok(()) => {
                self.record_sent(count);
                return Delivery::Sent;
            }
            Err(TrySendError::Full(message)) => message,
            Err(TrySendError::Disconnected(_)) => {
                self.summary.records_discarded += count;
                return Delivery::Disconnected;
            }
        };

        self.summary.blocked_sends += 1;
        loop {
            match self.sender.send_timeout(message, CANCEL_POLL_INTERVAL) {
                Ok(()) => {
                    self.record_sent(count);
                    return Delivery::Sent;
                }
                Err(SendTimeoutError::Timeout(returned)) => {
                    if self.cancel.is_cancelled() {
                        self.summary.records_discarded += count;
                        return Delivery::Cancelled;
                    }
                    message = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.summary.records_discarded += count;
                    return Delivery::Disconnected;
                }
            }
        }
    }

    fn record_sent(&mut self, count: u64) {
        self.summary.batches_sent += 1;
        self.summary.records_emitted += count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::source::ReaderSource;
    use crate::parser::{FieldLayout, StringInterner};
    use crossbeam_channel::{bounded, Receiver};
    use std::io::Cursor;
    use std::sync::Arc;

    fn line(frame: u32) -> String {
        format!(
            concat!(
                "{}\t1700000000.{:06}\t\t60\t10.0.0.1\t10.0.0.2\t\t\t\t\t5353\t53\tDNS\t",
                "eth:ethertype:ip:udp:dns\tStandard query\t\t\t\t\n"
            ),
            frame, frame
        )
    }

    fn create_test_producer(
        batch_size: usize,
        capacity: usize,
    ) -> (Producer, Receiver<IngestMessage>, CancelHandle) {
        let (tx, rx) = bounded(capacity);
        let cancel = CancelHandle::new();
        let parser = LineParser::new(Arc::new(StringInterner::new()), FieldLayout::default());
        (Producer::new(parser, tx, cancel.clone(), batch_size), rx, cancel)
    }

    fn collect(rx: &Receiver<IngestMessage>) -> (Vec<PacketRecord>, Option<IngestSummary>) {
        let mut records = Vec::new();
        let mut summary = None;
        while let Ok(message) = rx.try_recv() {
            match message {
                IngestMessage::Batch(batch) => records.extend(batch),
                IngestMessage::Finished(s) => summary = Some(s),
            }
        }
        (records, summary)
    }

    #[test]
    fn test_batches_and_final_flush() {
        let (producer, rx, _) = create_test_producer(4, 16);
        let input: String = (1..=10).map(line).collect();
        let mut source = ReaderSource::new(Cursor::new(input), "memory");

        let summary = producer.run(&mut source).unwrap();
        assert_eq!(summary.records_emitted, 10);
        assert_eq!(summary.batches_sent, 3);
        assert_eq!(summary.lines_read, 10);

        let (records, finished) = collect(&rx);
        let frames: Vec<u32> = records.iter().map(|r| r.frame_number).collect();
        assert_eq!(frames, (1..=10).collect::<Vec<_>>());
        assert_eq!(finished.unwrap(), summary);
    }

    #[test]
    fn test_blank_and_bad_lines_accounted() {
        let (producer, rx, _) = create_test_producer(100, 4);
        let input = format!("{}\n   \nbroken line\n{}", line(1), line(2));
        let mut source = ReaderSource::new(Cursor::new(input), "memory");

        let summary = producer.run(&mut source).unwrap();
        assert_eq!(summary.lines_read, 5);
        assert_eq!(summary.blank_lines, 2);
        assert_eq!(summary.records_emitted, 2);
        assert_eq!(summary.failures.total, 1);
        assert_eq!(summary.failures.first_line.as_deref(), Some("broken line"));
        assert_eq!(summary.distinct_addresses, 2);

        let (records, _) = collect(&rx);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_cancel_before_start() {
        let (producer, rx, cancel) = create_test_producer(2, 4);
        cancel.cancel();
        let mut source = ReaderSource::new(Cursor::new(line(1)), "memory");

        let summary = producer.run(&mut source).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.lines_read, 0);

        let (records, finished) = collect(&rx);
        assert!(records.is_empty());
        assert!(finished.unwrap().cancelled);
    }

    #[test]
    fn test_cancel_while_blocked_on_full_queue() {
        // Capacity 1 with batch size 1: the second batch blocks forever
        let (producer, rx, cancel) = create_test_producer(1, 1);
        let input: String = (1..=5).map(line).collect();

        let handle = std::thread::spawn(move || {
            let mut source = ReaderSource::new(Cursor::new(input), "memory");
            producer.run(&mut source)
        });

        std::thread::sleep(Duration::from_millis(100));
        cancel.cancel();
        let summary = handle.join().unwrap().unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.records_emitted, 1);
        assert_eq!(summary.blocked_sends, 1);
        assert!(summary.records_discarded >= 1);
        assert_eq!(
            summary.lines_read,
            summary.records_emitted
                + summary.records_discarded
                + summary.failures.total
                + summary.blank_lines
        );

        let first = rx.try_recv().unwrap();
        assert!(matches!(first, IngestMessage::Batch(ref b) if b[0].frame_number == 1));
    }

    #[test]
    fn test_receiver_dropped_stops_producer() {
        let (producer, rx, _) = create_test_producer(1, 1);
        drop(rx);
        let input: String = (1..=5).map(line).collect();
        let mut source = ReaderSource::new(Cursor::new(input), "memory");

        let summary = producer.run(&mut source).unwrap();
        assert_eq!(summary.records_emitted, 0);
        assert_eq!(summary.lines_read, 1);
        assert_eq!(summary.records_discarded, 1);
        assert!(!summary.cancelled);
    }
}
