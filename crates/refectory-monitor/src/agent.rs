//! Per-agent records kept by the monitor.

use serde::{Deserialize, Serialize};

use crate::pool::Side;

/// Lifecycle phase of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AgentPhase {
    /// Not interested in units.
    #[default]
    Thinking,
    /// Inside `request`, waiting for three units.
    Hungry,
    /// Holding three units.
    Eating,
}

impl std::fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thinking => f.write_str("thinking"),
            Self::Hungry => f.write_str("hungry"),
            Self::Eating => f.write_str("eating"),
        }
    }
}

/// Monitor-owned record for one seat.
///
/// Only the monitor mutates these fields, and only under its lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct AgentState {
    pub(crate) phase: AgentPhase,
    /// Pile that supplied two units for the current meal.
    pub(crate) heavy_side: Option<Side>,
    /// Set by `evaluate` when units were granted; consumed by `request`.
    pub(crate) eligible: bool,
    pub(crate) meals: u64,
    pub(crate) waits: u64,
}

impl AgentState {
    /// The allocation this agent currently holds, if any.
    pub(crate) fn holding(&self) -> Option<Side> {
        match self.phase {
            AgentPhase::Eating => self.heavy_side,
            _ => None,
        }
    }

    pub(crate) fn snapshot(&self, seat: usize) -> AgentSnapshot {
        AgentSnapshot {
            seat,
            phase: self.phase,
            heavy_side: self.heavy_side,
            meals: self.meals,
            waits: self.waits,
        }
    }
}

/// Read-only copy of one agent's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Seat index.
    pub seat: usize,
    /// Phase at the time of the snapshot.
    pub phase: AgentPhase,
    /// Heavy side of the current meal, if eating.
    pub heavy_side: Option<Side>,
    /// Meals granted so far.
    pub meals: u64,
    /// Times the agent had to park in `request`.
    pub waits: u64,
}
