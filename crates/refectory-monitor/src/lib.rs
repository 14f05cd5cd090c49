//! # Dining Monitor
//!
//! A monitor that hands out three units at a time from two adjacent piles
//! of two. Agents sit in a ring; pile `i` lies between agent `i - 1` and
//! agent `i`, and each agent eats with either two units from its own pile
//! and one from the right pile, or one and two.
//!
//! ## Guarantees
//!
//! - **Mutual exclusion**: no unit is ever held by two agents
//! - **Conservation**: `sum(units) == 2N` in every reachable state
//! - **No deadlock**: a grant takes all three units atomically, so no agent
//!   ever holds part of an allocation while waiting for the rest
//! - **Targeted wake-up**: a release re-evaluates only the two neighbors
//!   that share its piles
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`ResourcePool`] | Per-pile unit counters and the allocation rule |
//! | [`AgentPhase`] | THINKING / HUNGRY / EATING lifecycle |
//! | [`Monitor`] | Lock, per-seat conditions, `request` / `release` |
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use refectory_monitor::Monitor;
//!
//! let monitor = Arc::new(Monitor::new(5)?);
//!
//! let handles: Vec<_> = (0..5)
//!     .map(|seat| {
//!         let monitor = Arc::clone(&monitor);
//!         thread::spawn(move || {
//!             for _ in 0..3 {
//!                 let _side = monitor.request(seat)?;
//!                 // ... eat, outside the lock ...
//!                 monitor.release(seat)?;
//!             }
//!             Ok::<(), refectory_monitor::MonitorError>(())
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap()?;
//! }
//!
//! assert_eq!(monitor.status_report().total_meals, 15);
//! monitor.shutdown()?;
//! # Ok::<(), refectory_monitor::MonitorError>(())
//! ```

mod agent;
mod error;
mod monitor;
mod pool;

pub use agent::{AgentPhase, AgentSnapshot};
pub use error::{MonitorError, Result};
pub use monitor::{Monitor, TableSnapshot, TableStatus};
pub use pool::{left, right, ResourcePool, Side, PILE_SIZE, UNITS_PER_MEAL};
