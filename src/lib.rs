//! # packet-ingest: packet capture field ingestion
//!
//! Turns the tab-separated field output of a packet inspection tool (tshark)
//! into typed [`PacketRecord`]s and streams them to a consumer.
//!
//! ## Architecture
//!
//! - **Parser**: zero-copy tokenizer, field decoders, protocol classifier and
//!   tiered extraction of optional credential and OS-fingerprint columns
//! - **Interning**: addresses and protocol labels are shared `Arc<str>` handles
//! - **Ingest**: one producer thread drives the tool and parses its stdout
//! - **Communication**: a bounded crossbeam channel carries record batches,
//!   so a slow consumer throttles the producer instead of growing memory
//!
//! ## Configuration
//!
//! Settings live in `config.toml` under the platform config directory
//! (see [`config`]). Every value has a default, so the file is optional.
//!
//! ## Example
//!
//! ```ignore
//! use packet_ingest::{IngestConfig, IngestPipeline};
//!
//! let (pipeline, receiver) = IngestPipeline::new(IngestConfig::load_or_default());
//! let producer = pipeline.spawn_capture("trace.pcapng".into())?;
//!
//! for record in receiver {
//!     if record.has_credentials() {
//!         println!("frame {} carries credentials", record.frame_number);
//!     }
//! }
//! let summary = producer.join().expect("producer panicked")?;
//! println!("{} records, {} failures", summary.records_emitted, summary.failures.total);
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod parser;
pub mod types;

// Re-export commonly used types
pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use ingest::{CancelHandle, IngestMessage, IngestPipeline, IngestSummary, PacketReceiver};
pub use parser::{LineError, LineParser, StringInterner};
pub use types::{PacketRecord, TransportProtocol};
