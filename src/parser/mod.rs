//! Line parsing for tool field output
//!
//! Everything in here is synchronous and CPU-only. The hot path (tokenize,
//! decode core columns, classify) borrows from the input line and allocates
//! only when a new distinct string has to be interned or the info column is
//! copied into the record.
//!
//! # Components
//!
//! - [`tokenizer`] - tab positions into a fixed stack buffer
//! - [`decoder`] - column slices to integers, timestamps, addresses, ports
//! - [`classifier`] - transport and application labels
//! - [`tiers`] - gated extraction of credential and OS-fingerprint columns
//! - [`intern`] - per-run string pools
//! - [`line`] - the per-line orchestration and failure counters
//!
//! # Example
//!
//! ```ignore
//! use packet_ingest::parser::{FieldLayout, LineParser, StringInterner};
//! use std::sync::Arc;
//!
//! let parser = LineParser::new(Arc::new(StringInterner::new()), FieldLayout::default());
//! if let Some(record) = parser.parse(line) {
//!     println!("{} {} -> {}", record.frame_number, record.source, record.destination);
//! }
//! println!("{} bad lines", parser.failures().total());
//! ```

pub mod classifier;
pub mod decoder;
pub mod fields;
pub mod intern;
pub mod line;
pub mod tiers;
pub mod tokenizer;

pub use classifier::{classify_transport, ProtocolClassifier};
pub use fields::{FieldLayout, CORE_FIELD_COUNT, MAX_FIELDS};
pub use intern::{InternPool, StringInterner};
pub use line::{FailureSnapshot, FailureTracker, LineError, LineParser};
pub use tiers::TierExtractor;
pub use tokenizer::{find_delimiters, FieldTable};
