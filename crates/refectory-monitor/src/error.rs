//! Error types for the dining monitor.
//!
//! Usage errors are returned to the caller. Invariant violations are
//! constructed only to be raised as a panic by the monitor.

use thiserror::Error;

use crate::agent::AgentPhase;

/// Result of a monitor call.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while arbitrating piles between agents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Pool conservation or allocation bookkeeping is broken.
    ///
    /// This is a defect in the monitor itself. The monitor never returns
    /// it from a public operation; it panics with this message instead.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Agent id outside `[0, seats)`.
    #[error("invalid agent id {id}: table has {seats} seats")]
    InvalidAgentId {
        /// The offending id
        id: usize,
        /// Number of seats at the table
        seats: usize,
    },

    /// The table cannot be laid with fewer than two seats.
    #[error("invalid seat count {seats}: at least 2 seats are required")]
    InvalidSeatCount {
        /// Requested seat count
        seats: usize,
    },

    /// Shutdown refused because agents are still parked in `request`.
    #[error("shutdown refused: agents {blocked:?} are blocked waiting for units")]
    ShutdownWhileBlocked {
        /// Seats currently waiting
        blocked: Vec<usize>,
    },

    /// Release called for an agent that holds no units.
    #[error("agent {id} cannot release while {phase}")]
    NotEating {
        /// The releasing agent
        id: usize,
        /// Phase the agent was actually in
        phase: AgentPhase,
    },

    /// Request issued for an agent that is already hungry or eating.
    #[error("agent {id} cannot request while {phase}")]
    AlreadyActive {
        /// The requesting agent
        id: usize,
        /// Phase the agent was actually in
        phase: AgentPhase,
    },

    /// Request issued after the monitor was shut down.
    #[error("monitor has been shut down")]
    ShutDown,

    /// A bounded request expired before units became available.
    #[error("agent {id} timed out waiting for units")]
    TimedOut {
        /// The agent whose request was withdrawn
        id: usize,
    },
}
