//! # Staging Alley
//!
//! Bounded producer/consumer handoff: a fixed set of carts unload boxes
//! into a narrow alley, and a single forklift takes them away to place
//! them. The alley holds at most `capacity` boxes; a cart that finds it
//! full brings its box back instead of waiting.
//!
//! Carts and forklift synchronize through two independent counting locks,
//! one per side. The slow work (driving, unloading, placing) always
//! happens after the lock is dropped.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use refectory_alley::{run, AlleySettings};
//!
//! let settings = AlleySettings::new()
//!     .with_carts(3)
//!     .with_capacity(2)
//!     .with_max_action(Duration::from_millis(2))
//!     .with_duration(Duration::from_millis(30));
//!
//! let report = run(&settings)?;
//! assert_eq!(report.stats.unloaded, report.stats.placed);
//! # Ok::<(), refectory_alley::AlleyError>(())
//! ```

mod alley;
mod error;
mod runner;

pub use alley::{Alley, AlleyStats};
pub use error::{AlleyError, Result};
pub use runner::{run, AlleyReport, AlleySettings};
