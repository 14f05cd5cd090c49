//! # Resource Pool
//!
//! The piles laid out around the table. Pile `i` sits between agent
//! `i - 1` and agent `i`; agent `i` draws from its own pile and from the
//! pile on its right, `(i + 1) mod N`.
//!
//! ## Allocation Rule
//!
//! An agent needs three units. It may take them whenever the two piles it
//! can reach hold more than two units between them:
//!
//! | `units[seat]` | `units[right]` | Taken from seat | Taken from right | Heavy side |
//! |---------------|----------------|-----------------|------------------|------------|
//! | 2             | 1 or 2         | 2               | 1                | `Left`     |
//! | 1             | 2              | 1               | 2                | `Right`    |
//!
//! The test is on the combined count, never per pile: the agent does not
//! care which neighbor supplies the extra unit.
//!
//! ## Invariants
//!
//! - Every pile holds between 0 and [`PILE_SIZE`] units
//! - `sum(units) == PILE_SIZE * N` at all times
//! - A grant always leaves both piles non-negative
//!
//! The pool performs no locking of its own. The [`Monitor`](crate::Monitor)
//! owns it behind its exclusive lock.

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Units initially laid on every pile.
pub const PILE_SIZE: u8 = 2;

/// Units an agent needs to eat.
pub const UNITS_PER_MEAL: u8 = 3;

/// Which of an agent's two piles supplied two units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Two units from the agent's own pile, one from the right pile.
    Left,
    /// One unit from the agent's own pile, two from the right pile.
    Right,
}

impl Side {
    /// Units this allocation takes from `(own pile, right pile)`.
    #[inline]
    #[must_use]
    pub const fn split(self) -> (u8, u8) {
        match self {
            Self::Left => (2, 1),
            Self::Right => (1, 2),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Index of the seat to the left of `seat` on a table of `seats`.
#[inline]
#[must_use]
pub const fn left(seat: usize, seats: usize) -> usize {
    (seat + seats - 1) % seats
}

/// Index of the seat to the right of `seat` on a table of `seats`.
#[inline]
#[must_use]
pub const fn right(seat: usize, seats: usize) -> usize {
    (seat + 1) % seats
}

/// Per-seat unit counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePool {
    units: Vec<u8>,
}

impl ResourcePool {
    /// Lays `seats` full piles.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidSeatCount`] for fewer than two seats:
    /// with a single seat the "two adjacent piles" are the same pile.
    pub fn new(seats: usize) -> Result<Self> {
        if seats < 2 {
            return Err(MonitorError::InvalidSeatCount { seats });
        }
        Ok(Self {
            units: vec![PILE_SIZE; seats],
        })
    }

    /// Number of piles (equal to the number of seats).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Always false; a pool has at least two piles.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Current unit counts, indexed by pile.
    #[must_use]
    pub fn units(&self) -> &[u8] {
        &self.units
    }

    /// Total units on the table.
    #[must_use]
    pub fn total(&self) -> usize {
        self.units.iter().map(|&u| usize::from(u)).sum()
    }

    /// Units reachable from `seat`: its own pile plus the right pile.
    #[inline]
    #[must_use]
    pub fn available_to(&self, seat: usize) -> u8 {
        self.units[seat] + self.units[right(seat, self.len())]
    }

    /// Attempts to take three units for `seat`.
    ///
    /// Returns the heavy side on success and leaves the pool untouched on
    /// `None`. Callers must hold the monitor lock and pass a valid seat.
    pub fn try_take_three(&mut self, seat: usize) -> Option<Side> {
        if self.available_to(seat) < UNITS_PER_MEAL {
            return None;
        }
        let side = if self.units[seat] == PILE_SIZE {
            Side::Left
        } else {
            Side::Right
        };
        let (own, other) = side.split();
        let r = right(seat, self.len());
        self.units[seat] -= own;
        self.units[r] -= other;
        Some(side)
    }

    /// Returns the three units `seat` took with the given heavy side.
    ///
    /// # Errors
    ///
    /// [`MonitorError::InvariantViolation`] if giving back would overfill a
    /// pile, i.e. the units were never taken. The pool is unchanged.
    pub fn give_back(&mut self, seat: usize, side: Side) -> Result<()> {
        let (own, other) = side.split();
        let r = right(seat, self.len());
        if self.units[seat] + own > PILE_SIZE || self.units[r] + other > PILE_SIZE {
            return Err(MonitorError::InvariantViolation(format!(
                "seat {seat} returning {side}-heavy units would overfill piles {seat}/{r}: {:?}",
                self.units
            )));
        }
        self.units[seat] += own;
        self.units[r] += other;
        Ok(())
    }

    /// Checks the pool against the allocations currently held.
    ///
    /// Replays every `(seat, heavy side)` in `holdings` onto a full table
    /// and requires the result to equal the live counters exactly. This
    /// covers conservation and overlap in one pass.
    ///
    /// # Errors
    ///
    /// [`MonitorError::InvariantViolation`] describing the first mismatch.
    pub fn verify<I>(&self, holdings: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, Side)>,
    {
        let seats = self.len();
        let mut expected = vec![i16::from(PILE_SIZE); seats];
        for (seat, side) in holdings {
            let (own, other) = side.split();
            expected[seat] -= i16::from(own);
            expected[right(seat, seats)] -= i16::from(other);
        }

        for (pile, (&live, &want)) in self.units.iter().zip(expected.iter()).enumerate() {
            if want < 0 {
                return Err(MonitorError::InvariantViolation(format!(
                    "pile {pile} is over-allocated by {} units",
                    -want
                )));
            }
            if i16::from(live) != want {
                return Err(MonitorError::InvariantViolation(format!(
                    "pile {pile} holds {live} units, held allocations account for {want}"
                )));
            }
        }
        Ok(())
    }
}
