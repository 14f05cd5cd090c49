//! Error types for the staging alley.

use thiserror::Error;

/// Result type alias for alley operations.
pub type Result<T> = std::result::Result<T, AlleyError>;

/// Errors raised by the alley and its runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlleyError {
    /// Run settings rejected before any worker started.
    #[error("invalid alley settings: {0}")]
    InvalidSettings(String),

    /// Cart unloaded a box without a reserved slot.
    #[error("deposit called without a reserved slot")]
    NotReserved,

    /// Forklift reported a placed box that it never took.
    #[error("vacate called with no box taken from the alley")]
    NothingToVacate,

    /// A cart or the forklift thread panicked.
    #[error("worker '{0}' panicked")]
    WorkerPanicked(String),
}
