//! # Staging Alley
//!
//! A narrow alley where carts unload boxes for a single forklift. Two
//! independent locks keep carts and forklift from contending on one
//! mutex:
//!
//! | Lock | Guards | Meaning |
//! |------|--------|---------|
//! | cart lock | `cart_view` | Slots claimed: boxes being unloaded, waiting, or still on the forklift |
//! | forklift lock | `forklift_view` | Boxes fully unloaded and ready to take |
//!
//! Each side decides inside its lock and acts outside it: a cart reserves a
//! slot, then unloads without holding anything; the forklift takes a box,
//! then places it without holding anything.
//!
//! ## Invariants
//!
//! - `forklift_view <= cart_view <= capacity`
//! - A slot is released (`vacate`) only after its box has been placed, so a
//!   cart can never unload into an alley that is physically full

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AlleyError, Result};

/// The shared alley.
#[derive(Debug)]
pub struct Alley {
    capacity: usize,
    cart_view: Mutex<usize>,
    forklift_view: Mutex<usize>,
    box_ready: Condvar,
    unloaded: AtomicU64,
    brought_back: AtomicU64,
    placed: AtomicU64,
}

impl Alley {
    /// Creates an empty alley with room for `capacity` boxes.
    ///
    /// # Errors
    ///
    /// [`AlleyError::InvalidSettings`] for a zero capacity.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(AlleyError::InvalidSettings(
                "alley capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            cart_view: Mutex::new(0),
            forklift_view: Mutex::new(0),
            box_ready: Condvar::new(),
            unloaded: AtomicU64::new(0),
            brought_back: AtomicU64::new(0),
            placed: AtomicU64::new(0),
        })
    }

    /// Number of boxes the alley can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cart side: claims a slot if one is free.
    ///
    /// On `true` the cart must unload and then call [`deposit`](Self::deposit).
    /// On `false` it should bring its box back.
    pub fn try_reserve(&self) -> bool {
        let mut claimed = self.cart_view.lock();
        if *claimed < self.capacity {
            *claimed += 1;
            true
        } else {
            false
        }
    }

    /// Cart side: the reserved box is on the alley floor.
    ///
    /// # Errors
    ///
    /// [`AlleyError::NotReserved`] if every claimed slot already holds a
    /// ready box.
    pub fn deposit(&self) -> Result<()> {
        // Cart lock before forklift lock; nothing takes them the other way.
        let claimed = self.cart_view.lock();
        let mut ready = self.forklift_view.lock();
        if *ready >= *claimed {
            return Err(AlleyError::NotReserved);
        }
        drop(claimed);
        *ready += 1;
        self.unloaded.fetch_add(1, Ordering::Relaxed);
        self.box_ready.notify_one();
        Ok(())
    }

    /// Cart side: records a box carried back because the alley was full.
    pub fn bring_back(&self) {
        self.brought_back.fetch_add(1, Ordering::Relaxed);
    }

    /// Forklift side: takes a box, waiting up to `timeout` for one.
    ///
    /// On `true` the forklift must place it and then call
    /// [`vacate`](Self::vacate).
    pub fn take(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready = self.forklift_view.lock();
        while *ready == 0 {
            if self.box_ready.wait_until(&mut ready, deadline).timed_out() {
                break;
            }
        }
        if *ready > 0 {
            *ready -= 1;
            true
        } else {
            false
        }
    }

    /// Forklift side: the taken box has been placed and its slot is free.
    ///
    /// # Errors
    ///
    /// [`AlleyError::NothingToVacate`] if no slot is claimed.
    pub fn vacate(&self) -> Result<()> {
        let mut claimed = self.cart_view.lock();
        if *claimed == 0 {
            return Err(AlleyError::NothingToVacate);
        }
        *claimed -= 1;
        self.placed.fetch_add(1, Ordering::Relaxed);
        debug!("alley slot freed, {} still claimed", *claimed);
        Ok(())
    }

    /// Boxes ready for the forklift right now.
    #[must_use]
    pub fn waiting(&self) -> usize {
        *self.forklift_view.lock()
    }

    /// Slots currently claimed by carts.
    #[must_use]
    pub fn claimed(&self) -> usize {
        *self.cart_view.lock()
    }

    /// Counter snapshot. Views are read one lock at a time.
    #[must_use]
    pub fn stats(&self) -> AlleyStats {
        AlleyStats {
            capacity: self.capacity,
            unloaded: self.unloaded.load(Ordering::Relaxed),
            brought_back: self.brought_back.load(Ordering::Relaxed),
            placed: self.placed.load(Ordering::Relaxed),
            claimed: self.claimed(),
            waiting: self.waiting(),
        }
    }
}

/// Counters of an alley.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlleyStats {
    /// Slots in the alley.
    pub capacity: usize,
    /// Boxes unloaded onto the alley floor.
    pub unloaded: u64,
    /// Boxes carts carried back because the alley was full.
    pub brought_back: u64,
    /// Boxes the forklift placed.
    pub placed: u64,
    /// Slots claimed by carts at the time of the snapshot.
    pub claimed: usize,
    /// Boxes ready for the forklift at the time of the snapshot.
    pub waiting: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(matches!(Alley::new(0), Err(AlleyError::InvalidSettings(_))));
    }

    #[test]
    fn test_reserve_until_full() {
        let alley = Alley::new(3).unwrap();
        assert!(alley.try_reserve());
        assert!(alley.try_reserve());
        assert!(alley.try_reserve());
        assert!(!alley.try_reserve());
        assert_eq!(alley.claimed(), 3);
        assert_eq!(alley.waiting(), 0);
    }

    #[test]
    fn test_slot_frees_only_after_placing() {
        let alley = Alley::new(1).unwrap();
        assert!(alley.try_reserve());
        alley.deposit().unwrap();

        assert!(alley.take(Duration::from_millis(1)));
        // Box is on the forklift, the slot is still claimed.
        assert!(!alley.try_reserve());

        alley.vacate().unwrap();
        assert!(alley.try_reserve());
    }

    #[test]
    fn test_take_times_out_on_empty_alley() {
        let alley = Alley::new(2).unwrap();
        assert!(!alley.take(Duration::from_millis(5)));
    }

    #[test]
    fn test_take_wakes_on_deposit() {
        let alley = std::sync::Arc::new(Alley::new(2).unwrap());
        let forklift = {
            let alley = std::sync::Arc::clone(&alley);
            std::thread::spawn(move || alley.take(Duration::from_secs(5)))
        };

        assert!(alley.try_reserve());
        alley.deposit().unwrap();
        assert!(forklift.join().unwrap());
    }

    #[test]
    fn test_vacate_without_take() {
        let alley = Alley::new(2).unwrap();
        assert_eq!(alley.vacate(), Err(AlleyError::NothingToVacate));
    }

    #[test]
    fn test_stats_count_every_outcome() {
        let alley = Alley::new(1).unwrap();
        assert!(alley.try_reserve());
        alley.deposit().unwrap();
        assert!(!alley.try_reserve());
        alley.bring_back();
        assert!(alley.take(Duration::from_millis(1)));
        alley.vacate().unwrap();

        let stats = alley.stats();
        assert_eq!(stats.unloaded, 1);
        assert_eq!(stats.brought_back, 1);
        assert_eq!(stats.placed, 1);
        assert_eq!(stats.claimed, 0);
        assert_eq!(stats.waiting, 0);
    }

    #[test]
    fn test_deposit_requires_reservation() {
        let alley = Alley::new(2).unwrap();
        assert_eq!(alley.deposit(), Err(AlleyError::NotReserved));

        assert!(alley.try_reserve());
        alley.deposit().unwrap();
        // The one claimed slot already holds its box.
        assert_eq!(alley.deposit(), Err(AlleyError::NotReserved));
        assert_eq!(alley.waiting(), 1);
        assert_eq!(alley.stats().unloaded, 1);
    }

    #[test]
    fn test_take_waits_out_full_timeout() {
        let alley = Alley::new(1).unwrap();
        let started = Instant::now();
        assert!(!alley.take(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
