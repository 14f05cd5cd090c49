//! Error types for refectory core.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for refectory operations.
#[derive(Debug, Error)]
pub enum RefectoryError {
    /// Configuration rejected or unparsable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        /// File that was being read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Scenario replay diverged from the expected table state.
    #[error("Scenario diverged: {0}")]
    Scenario(String),

    /// Raised by the dining monitor.
    #[error("Monitor error: {0}")]
    Monitor(#[from] refectory_monitor::MonitorError),

    /// Raised by the staging alley.
    #[error("Alley error: {0}")]
    Alley(#[from] refectory_alley::AlleyError),

    /// A blocking agent task panicked or was cancelled.
    #[error("Agent task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
