//! Drives carts and the forklift against one [`Alley`].
//!
//! Every action is simulated with a random sleep of 1 to `max` ms. Carts
//! keep bringing boxes until the run duration elapses. The forklift keeps
//! working until every cart has stopped and the alley is empty, so a
//! finished run always has `unloaded == placed`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alley::{Alley, AlleyStats};
use crate::error::{AlleyError, Result};

/// How long the forklift waits for a box before re-checking for shutdown.
const FORKLIFT_POLL: Duration = Duration::from_millis(20);

/// Parameters of an alley run.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use refectory_alley::AlleySettings;
///
/// let settings = AlleySettings::new()
///     .with_carts(4)
///     .with_capacity(2)
///     .with_duration(Duration::from_millis(100));
/// assert_eq!(settings.carts, 4);
/// ```
#[derive(Debug, Clone)]
pub struct AlleySettings {
    /// Number of supplier carts.
    pub carts: usize,
    /// Boxes the alley can hold.
    pub capacity: usize,
    /// Longest time to pick up a box and drive to the alley.
    pub max_pick_up: Duration,
    /// Longest time to unload a box.
    pub max_unload: Duration,
    /// Longest time for the forklift to place a box and return.
    pub max_place: Duration,
    /// Longest time to bring a box back from a full alley.
    pub max_bring_back: Duration,
    /// How long carts keep working.
    pub duration: Duration,
}

impl AlleySettings {
    /// Creates settings with default values.
    ///
    /// Defaults:
    /// - 10 carts, capacity 5
    /// - every action up to 300 ms
    /// - 4 s run
    #[must_use]
    pub const fn new() -> Self {
        Self {
            carts: 10,
            capacity: 5,
            max_pick_up: Duration::from_millis(300),
            max_unload: Duration::from_millis(300),
            max_place: Duration::from_millis(300),
            max_bring_back: Duration::from_millis(300),
            duration: Duration::from_secs(4),
        }
    }

    /// Sets the number of carts.
    #[must_use]
    pub const fn with_carts(mut self, carts: usize) -> Self {
        self.carts = carts;
        self
    }

    /// Sets the alley capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the same upper bound for every simulated action.
    #[must_use]
    pub const fn with_max_action(mut self, max: Duration) -> Self {
        self.max_pick_up = max;
        self.max_unload = max;
        self.max_place = max;
        self.max_bring_back = max;
        self
    }

    /// Sets the run duration.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.carts == 0 {
            return Err(AlleyError::InvalidSettings(
                "at least one cart is required".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(AlleyError::InvalidSettings(
                "alley capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AlleySettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlleyReport {
    /// Final counters.
    pub stats: AlleyStats,
    /// Boxes each cart unloaded, by cart index.
    pub unloaded_per_cart: Vec<u64>,
    /// Wall-clock length of the run.
    pub elapsed: Duration,
}

/// Sleeps for a random 1..=`max` ms.
fn do_action(worker: &str, action: &str, max: Duration) {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX).max(1);
    let delay = rand::thread_rng().gen_range(1..=max_ms);
    debug!("{}: {} ({} ms)", worker, action, delay);
    thread::sleep(Duration::from_millis(delay));
}

fn cart(alley: &Alley, index: usize, settings: &AlleySettings, deadline: Instant) -> Result<u64> {
    let name = format!("cart-{index}");
    let mut unloaded = 0;

    while Instant::now() < deadline {
        do_action(&name, "pick up box and go to alley", settings.max_pick_up);
        if alley.try_reserve() {
            do_action(&name, "unload box", settings.max_unload);
            alley.deposit()?;
            unloaded += 1;
        } else {
            do_action(&name, "bring box back", settings.max_bring_back);
            alley.bring_back();
        }
    }

    debug!("{} done after unloading {} boxes", name, unloaded);
    Ok(unloaded)
}

fn forklift(alley: &Alley, settings: &AlleySettings, carts_done: &AtomicBool) -> Result<()> {
    loop {
        if alley.take(FORKLIFT_POLL) {
            do_action("forklift", "place box and return to alley", settings.max_place);
            alley.vacate()?;
        } else if carts_done.load(Ordering::Acquire) && alley.claimed() == 0 {
            return Ok(());
        }
    }
}

/// Runs the carts and forklift to completion.
///
/// # Errors
///
/// - [`AlleyError::InvalidSettings`] for zero carts or zero capacity
/// - [`AlleyError::WorkerPanicked`] if any worker thread panicked
/// - errors raised by the forklift
pub fn run(settings: &AlleySettings) -> Result<AlleyReport> {
    settings.validate()?;
    let alley = Alley::new(settings.capacity)?;
    let carts_done = AtomicBool::new(false);
    let started = Instant::now();
    let deadline = started + settings.duration;

    info!(
        "Alley run: {} carts, capacity {}, {:?}",
        settings.carts, settings.capacity, settings.duration
    );

    let (unloaded_per_cart, forklift_result) = thread::scope(|scope| {
        let forklift_handle = scope.spawn(|| forklift(&alley, settings, &carts_done));
        let cart_handles: Vec<_> = (0..settings.carts)
            .map(|index| {
                let alley = &alley;
                scope.spawn(move || cart(alley, index, settings, deadline))
            })
            .collect();

        let unloaded: Result<Vec<u64>> = cart_handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| {
                handle
                    .join()
                    .map_err(|_| AlleyError::WorkerPanicked(format!("cart-{index}")))
                    .and_then(|result| result)
            })
            .collect();
        carts_done.store(true, Ordering::Release);

        let placed = forklift_handle
            .join()
            .map_err(|_| AlleyError::WorkerPanicked("forklift".to_string()))
            .and_then(|result| result);
        (unloaded, placed)
    });

    let unloaded_per_cart = unloaded_per_cart?;
    forklift_result?;

    let stats = alley.stats();
    info!(
        "Alley run finished: {} unloaded, {} brought back, {} placed",
        stats.unloaded, stats.brought_back, stats.placed
    );

    Ok(AlleyReport {
        stats,
        unloaded_per_cart,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_builder() {
        let settings = AlleySettings::new()
            .with_carts(3)
            .with_capacity(2)
            .with_max_action(Duration::from_millis(5))
            .with_duration(Duration::from_millis(50));

        assert_eq!(settings.carts, 3);
        assert_eq!(settings.capacity, 2);
        assert_eq!(settings.max_unload, Duration::from_millis(5));
        assert_eq!(settings.max_bring_back, Duration::from_millis(5));
        assert_eq!(settings.duration, Duration::from_millis(50));
    }

    #[test]
    fn test_rejects_no_carts() {
        let settings = AlleySettings::new().with_carts(0);
        assert!(matches!(run(&settings), Err(AlleyError::InvalidSettings(_))));
    }

    #[test]
    fn test_short_run_drains_alley() {
        let settings = AlleySettings::new()
            .with_carts(4)
            .with_capacity(2)
            .with_max_action(Duration::from_millis(3))
            .with_duration(Duration::from_millis(100));

        let report = run(&settings).unwrap();
        assert_eq!(report.stats.unloaded, report.stats.placed);
        assert_eq!(report.stats.claimed, 0);
        assert_eq!(report.stats.waiting, 0);
        assert_eq!(report.unloaded_per_cart.len(), 4);
        assert_eq!(
            report.unloaded_per_cart.iter().sum::<u64>(),
            report.stats.unloaded
        );
    }
}
