//! Per-line orchestration and failure accounting
//!
//! A line moves through tokenize -> core decode -> classify -> tier extraction
//! and comes out as one [`PacketRecord`] or one [`LineError`]. Failures are
//! ordinary values: a multi-million line run is expected to contain some
//! malformed lines and must not stop for them.

use super::classifier::ProtocolClassifier;
use super::decoder::{
    decode_tcp_flags, decode_timestamp, parse_u16, parse_u32, select_address, select_port,
};
use super::fields::{core, FieldLayout, MAX_FIELDS, MIN_DELIMITERS};
use super::intern::StringInterner;
use super::tiers::TierExtractor;
use super::tokenizer::FieldTable;
use crate::types::{PacketRecord, TcpControl, UNSPECIFIED_ADDRESS};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// How many frame-zero anomalies are logged before going quiet
const FRAME_ZERO_LOG_LIMIT: u64 = 10;

/// Why a line did not produce a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Empty or whitespace-only; skipped without being counted
    #[error("blank line")]
    Blank,

    /// Not enough columns for the mandatory prefix
    #[error("expected at least {expected} delimiters, found {found}")]
    Structural { found: usize, expected: usize },

    /// A mandatory column did not parse
    #[error("unparsable mandatory field {field}")]
    Type { field: &'static str },

    /// A value parsed but is not believable
    #[error("rejected value: {reason}")]
    Semantic { reason: &'static str },
}

impl LineError {
    /// Whether this outcome counts as a parse failure
    pub fn is_counted(&self) -> bool {
        !matches!(self, LineError::Blank)
    }
}

/// Point-in-time copy of the failure counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureSnapshot {
    pub total: u64,
    pub structural: u64,
    pub type_errors: u64,
    pub semantic: u64,
    /// The first offending raw line, verbatim
    pub first_line: Option<String>,
}

/// Running parse-failure counters
///
/// Shared between the producer (the only writer) and whoever wants to read a
/// live count, so everything is atomic.
#[derive(Debug, Default)]
pub struct FailureTracker {
    structural: AtomicU64,
    type_errors: AtomicU64,
    semantic: AtomicU64,
    first_line: OnceLock<String>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one failure; the raw line is kept only for the first one
    pub fn record(&self, error: &LineError, line: &str) {
        let counter = match error {
            LineError::Blank => return,
            LineError::Structural { .. } => &self.structural,
            LineError::Type { .. } => &self.type_errors,
            LineError::Semantic { .. } => &self.semantic,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if self.first_line.get().is_none() {
            let _ = self.first_line.set(line.to_string());
        }
    }

    /// Total counted failures
    pub fn total(&self) -> u64 {
        self.structural.load(Ordering::Relaxed)
            + self.type_errors.load(Ordering::Relaxed)
            + self.semantic.load(Ordering::Relaxed)
    }

    pub fn semantic_count(&self) -> u64 {
        self.semantic.load(Ordering::Relaxed)
    }

    pub fn first_line(&self) -> Option<&str> {
        self.first_line.get().map(String::as_str)
    }

    pub fn snapshot(&self) -> FailureSnapshot {
        let structural = self.structural.load(Ordering::Relaxed);
        let type_errors = self.type_errors.load(Ordering::Relaxed);
        let semantic = self.semantic.load(Ordering::Relaxed);
        FailureSnapshot {
            total: structural + type_errors + semantic,
            structural,
            type_errors,
            semantic,
            first_line: self.first_line.get().cloned(),
        }
    }
}

/// Turns lines of tool output into packet records
#[derive(Debug, Clone)]
pub struct LineParser {
    interner: Arc<StringInterner>,
    classifier: ProtocolClassifier,
    tiers: TierExtractor,
    failures: Arc<FailureTracker>,
}

impl LineParser {
    pub fn new(interner: Arc<StringInterner>, layout: FieldLayout) -> Self {
        Self::with_failures(interner, layout, Arc::new(FailureTracker::new()))
    }

    /// Build a parser that reports into an existing tracker
    pub fn with_failures(
        interner: Arc<StringInterner>,
        layout: FieldLayout,
        failures: Arc<FailureTracker>,
    ) -> Self {
        Self {
            classifier: ProtocolClassifier::new(Arc::clone(&interner)),
            interner,
            tiers: TierExtractor::new(layout),
            failures,
        }
    }

    pub fn failures(&self) -> &Arc<FailureTracker> {
        &self.failures
    }

    pub fn interner(&self) -> &Arc<StringInterner> {
        &self.interner
    }

    /// Parse one line, counting any failure
    pub fn parse(&self, line: &str) -> Option<PacketRecord> {
        self.parse_line(line).ok()
    }

    /// Parse one line, counting any failure and returning why it failed
    pub fn parse_line(&self, line: &str) -> Result<PacketRecord, LineError> {
        let line = strip_line_ending(line);
        self.decode(line).inspect_err(|error| {
            if let LineError::Semantic { reason } = error {
                if self.failures.semantic_count() < FRAME_ZERO_LOG_LIMIT {
                    tracing::warn!("Dropping line with {}: {:.120}", reason, line);
                }
            }
            self.failures.record(error, line);
        })
    }

    /// Decode one line without touching the failure counters
    pub fn decode(&self, line: &str) -> Result<PacketRecord, LineError> {
        let line = strip_line_ending(line);
        if line.trim().is_empty() {
            return Err(LineError::Blank);
        }

        let table = FieldTable::<MAX_FIELDS>::new(line);
        if table.delimiter_count() < MIN_DELIMITERS {
            return Err(LineError::Structural {
                found: table.delimiter_count(),
                expected: MIN_DELIMITERS,
            });
        }

        let frame_number = parse_u32(table.field(core::FRAME_NUMBER))
            .ok_or(LineError::Type { field: "frame.number" })?;
        let timestamp = decode_timestamp(
            table.field(core::EPOCH_TIME),
            table.field(core::FORMATTED_TIME),
        )
        .ok_or(LineError::Type {
            field: "frame.time_epoch",
        })?;
        let length = parse_u16(table.field(core::FRAME_LENGTH))
            .ok_or(LineError::Type { field: "frame.len" })?;

        if frame_number == 0 {
            return Err(LineError::Semantic {
                reason: "frame number 0",
            });
        }

        let source = select_address(table.field(core::IPV4_SOURCE), table.field(core::IPV6_SOURCE))
            .unwrap_or(UNSPECIFIED_ADDRESS);
        let destination = select_address(
            table.field(core::IPV4_DESTINATION),
            table.field(core::IPV6_DESTINATION),
        )
        .unwrap_or(UNSPECIFIED_ADDRESS);

        let info = table.field(core::INFO);
        let (transport, application) = self.classifier.classify(
            table.field(core::DISPLAY_PROTOCOL),
            table.field(core::PROTOCOL_STACK),
            info,
        );

        let tcp = TcpControl {
            flags: decode_tcp_flags(table.field(core::TCP_FLAGS)),
            sequence: parse_u32(table.field(core::TCP_SEQUENCE)).unwrap_or(0),
            acknowledgment: parse_u32(table.field(core::TCP_ACKNOWLEDGMENT)).unwrap_or(0),
            window: parse_u32(table.field(core::TCP_WINDOW)).unwrap_or(0),
        };

        Ok(PacketRecord {
            frame_number,
            timestamp,
            length,
            source: self.interner.address(source),
            destination: self.interner.address(destination),
            source_port: select_port(
                table.field(core::TCP_SOURCE_PORT),
                table.field(core::UDP_SOURCE_PORT),
            ),
            destination_port: select_port(
                table.field(core::TCP_DESTINATION_PORT),
                table.field(core::UDP_DESTINATION_PORT),
            ),
            transport,
            application,
            info: Box::from(info),
            tcp,
            credentials: self.tiers.credentials(&table),
            os_fingerprint: self.tiers.os_fingerprint(&table),
        })
    }
}

fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
