//! Configuration module for packet-ingest
//!
//! Configuration is a TOML file. Every section and key is optional; missing
//! values fall back to the defaults below.
//!
//! # Location
//!
//! When no path is given, `config.toml` is looked up in the platform config
//! directory under `packet-ingest`:
//!
//! - **Linux**: `~/.config/packet-ingest/config.toml`
//! - **macOS**: `~/Library/Application Support/packet-ingest/config.toml`
//! - **Windows**: `%APPDATA%\packet-ingest\config.toml`
//!
//! # Example
//!
//! ```toml
//! [tool]
//! binary = "/usr/bin/tshark"
//!
//! [pipeline]
//! batch_size = 100
//! queue_capacity = 64
//!
//! [parser]
//! credentials = true
//! os_fingerprint = false
//!
//! [logging]
//! filter = "info,packet_ingest=debug"
//! file = "/var/log/packet-ingest.log"
//! ```

use crate::error::{IngestError, Result};
use crate::parser::FieldLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "packet-ingest";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default inspection tool binary, resolved through `PATH`
pub const DEFAULT_TOOL_BINARY: &str = "tshark";

/// Default number of records per queue message
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default queue capacity, in batches
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default tracing filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,packet_ingest=debug";

/// Get the path of the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// External inspection tool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Binary to spawn
    pub binary: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_TOOL_BINARY),
        }
    }
}

/// Producer/queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records grouped into one queue message
    pub batch_size: usize,
    /// Maximum batches waiting in the queue before the producer blocks
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Upper bound on records held by the queue plus the batch being filled
    pub fn max_buffered_records(&self) -> usize {
        self.batch_size * (self.queue_capacity + 1)
    }
}

/// Which optional column tiers to request and decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub credentials: bool,
    pub os_fingerprint: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            credentials: true,
            os_fingerprint: true,
        }
    }
}

impl ParserConfig {
    pub fn layout(&self) -> FieldLayout {
        FieldLayout::new(self.credentials, self.os_fingerprint)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    /// Optional log file, written in addition to stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            file: None,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub tool: ToolConfig,
    pub pipeline: PipelineConfig,
    pub parser: ParserConfig,
    pub logging: LoggingConfig,
}

impl IngestConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            IngestError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the default config file, returning defaults if it is missing or broken
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                IngestError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| IngestError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            IngestError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(IngestError::Config(
                "pipeline.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(IngestError::Config(
                "pipeline.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.tool.binary.as_os_str().is_empty() {
            return Err(IngestError::Config("tool.binary must not be empty".to_string()));
        }
        Ok(())
    }
}
