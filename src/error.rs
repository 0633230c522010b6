//! Error types for portsweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Per-port failures never
//! show up here: they are recorded as data in the scan outcome. These types
//! cover the conditions that stop a run before or after the sweep.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for a scan run.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Report directory {path} is unusable: {reason}")]
    ReportDirectory { path: PathBuf, reason: String },

    #[error("Failed to open report file {path}: {source}")]
    ReportOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report sink is still referenced by a running worker")]
    SinkInUse,

    #[error("Slot scheduler closed while dispatching port {0}")]
    SchedulerClosed(u16),

    #[error("No free slot found after permit grant for port {0}")]
    SlotTableExhausted(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading or saving the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("Invalid settings format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidFormat(e.to_string())
    }
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for settings operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
