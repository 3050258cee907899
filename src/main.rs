//! packet-ingest - Main Entry Point
//!
//! Runs the inspection tool against one capture file and either prints every
//! record as NDJSON or a per-protocol count. The run summary goes to stderr
//! as JSON.

use anyhow::Context;
use clap::Parser;
use packet_ingest::config::{IngestConfig, LoggingConfig};
use packet_ingest::ingest::LogTimer;
use packet_ingest::{IngestPipeline, PacketRecord};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "packet-ingest", version, about = "Ingest tshark field output from a capture")]
struct Cli {
    /// Capture file handed to the inspection tool
    capture: PathBuf,

    /// Configuration file; defaults to the per-user config if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print every record as a JSON line instead of per-protocol counts
    #[arg(long)]
    ndjson: bool,
}

/// Install the global subscriber; the guard must live until exit
fn init_logging(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .boxed();

    let (file_layer, guard) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Opening log file {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn write_record(out: &mut impl Write, record: &PacketRecord) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config = match &args.config {
        Some(path) => IngestConfig::load(path).with_context(|| format!("Loading {:?}", path))?,
        None => IngestConfig::load_or_default(),
    };
    let _log_guard = init_logging(&config.logging)?;

    tracing::info!("Starting packet-ingest on {:?}", args.capture);

    let (pipeline, mut receiver) = IngestPipeline::new(config);
    let pipeline = pipeline.with_timer(Arc::new(LogTimer::new("ingest")));
    let cancel = pipeline.cancel_handle();
    let producer = pipeline.spawn_capture(args.capture.clone())?;

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut per_protocol: BTreeMap<String, u64> = BTreeMap::new();

    for record in receiver.by_ref() {
        if args.ndjson {
            if let Err(e) = write_record(&mut out, &record) {
                // Usually a closed pipe
                tracing::warn!("Output failed, cancelling: {}", e);
                cancel.cancel();
                break;
            }
        } else {
            *per_protocol.entry(record.protocol_label().to_string()).or_default() += 1;
        }
    }
    // Unblock a producer waiting on queue capacity
    drop(receiver);

    let result = producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;

    if !args.ndjson {
        for (protocol, count) in &per_protocol {
            writeln!(out, "{:<16} {}", protocol, count)?;
        }
    }
    if let Err(e) = out.flush() {
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(e.into());
        }
    }

    let summary = result.with_context(|| format!("Ingesting {:?}", args.capture))?;
    eprintln!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.failures.total > 0 {
        tracing::warn!(
            "{} lines failed to parse; first: {:.200}",
            summary.failures.total,
            summary.failures.first_line.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}
