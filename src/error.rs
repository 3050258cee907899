//! Error handling for packet-ingest
//!
//! Only pipeline-level failures live here. A line that fails to parse is an
//! expected event and is reported through [`crate::parser::LineError`] and the
//! failure counters instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ingestion runs
#[derive(Error, Debug)]
pub enum IngestError {
    /// The inspection tool could not be started
    #[error("Failed to start {binary}: {source}")]
    ToolSpawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The inspection tool exited with a failure status
    #[error("Inspection tool exited with status {}: {stderr}", exit_code_label(.code))]
    ToolExit { code: Option<i32>, stderr: String },

    /// The capture file handed to the tool does not exist or is not a file
    #[error("Capture file not found: {}", .0.display())]
    CaptureNotFound(PathBuf),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        IngestError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error came from the external tool rather than our own IO
    pub fn is_tool_failure(&self) -> bool {
        match self {
            IngestError::ToolSpawn { .. } | IngestError::ToolExit { .. } => true,
            IngestError::WithContext { source, .. } => source.is_tool_failure(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for IngestError {
    fn from(err: toml::de::Error) -> Self {
        IngestError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Serialization(err.to_string())
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| IngestError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| IngestError::Io(e).with_context(f()))
    }
}
