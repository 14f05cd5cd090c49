//! The dining table runner.
//!
//! This module drives one agent loop per seat against a shared
//! [`Monitor`]. Each loop is a plain client of the monitor: think, request,
//! eat, release. Thinking and eating happen with no lock held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use refectory_monitor::{Monitor, MonitorError, Side, TableSnapshot, TableStatus};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{config::TableConfig, error::RefectoryError, Result};

/// Cloneable handle that asks every agent to stop after its current cycle.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests a stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What one agent did during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutcome {
    /// Seat index.
    pub seat: usize,
    /// Completed meals.
    pub meals: u64,
    /// Meals eaten with two units from the own pile.
    pub left_heavy: u64,
    /// Meals eaten with two units from the right pile.
    pub right_heavy: u64,
    /// Requests withdrawn after the request timeout.
    pub gave_up: u64,
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningReport {
    /// Per-agent outcomes, by seat.
    pub agents: Vec<AgentOutcome>,
    /// Table state after every agent stopped.
    pub snapshot: TableSnapshot,
    /// Monitor counters after every agent stopped.
    pub status: TableStatus,
    /// Wall-clock length of the run.
    pub elapsed: Duration,
}

impl DiningReport {
    /// Total meals across all agents.
    #[must_use]
    pub fn total_meals(&self) -> u64 {
        self.agents.iter().map(|a| a.meals).sum()
    }

    /// Pretty JSON rendering for the CLI.
    ///
    /// # Errors
    ///
    /// [`RefectoryError::Config`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RefectoryError::Config(e.to_string()))
    }
}

/// A dining table: one monitor and the configuration of its agents.
///
/// # Example
///
/// ```rust,no_run
/// use refectory_core::{Table, TableConfig};
///
/// # async fn demo() -> refectory_core::Result<()> {
/// let table = Table::new(TableConfig::default().with_cycles(Some(3)))?;
/// let report = table.run().await?;
/// assert_eq!(report.total_meals(), 15);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Table {
    config: TableConfig,
    monitor: Arc<Monitor>,
    stop: StopHandle,
}

impl Table {
    /// Lays the table described by `config`.
    ///
    /// # Errors
    ///
    /// [`RefectoryError::Config`] if the configuration is invalid.
    pub fn new(config: TableConfig) -> Result<Self> {
        config.validate()?;
        let monitor = Arc::new(Monitor::new(config.seats)?);
        Ok(Self {
            config,
            monitor,
            stop: StopHandle::default(),
        })
    }

    /// The shared monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Handle for stopping the run from elsewhere (e.g. Ctrl-C).
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs every agent until its cycles are done or a stop is requested,
    /// then shuts the monitor down.
    ///
    /// Agents run on blocking threads because `request` parks the thread.
    ///
    /// # Errors
    ///
    /// - [`RefectoryError::Monitor`] if an agent hit a monitor error
    /// - [`RefectoryError::Join`] if an agent thread panicked
    pub async fn run(self) -> Result<DiningReport> {
        let started = Instant::now();
        info!(
            "Table running with {} seats, cycles {:?}",
            self.config.seats, self.config.cycles
        );

        let reporter = self.config.report_interval_ms.map(|ms| {
            let monitor = Arc::clone(&self.monitor);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(ms));
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let status = monitor.status_report();
                    info!(
                        "{} meals, {} eating, {} hungry, {} units on table",
                        status.total_meals, status.eating, status.hungry, status.units_on_table
                    );
                }
            })
        });

        let mut agents = JoinSet::new();
        for seat in 0..self.config.seats {
            let monitor = Arc::clone(&self.monitor);
            let config = self.config.clone();
            let stop = self.stop.clone();
            agents.spawn_blocking(move || dine(seat, &monitor, &config, &stop));
        }

        let mut outcomes = Vec::with_capacity(self.config.seats);
        let mut failure = None;
        while let Some(joined) = agents.join_next().await {
            match joined.map_err(RefectoryError::from).and_then(|r| r) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    warn!("Agent failed: {}", err);
                    // Let the others finish their cycle so nobody stays parked.
                    self.stop.stop();
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
            }
        }

        if let Some(reporter) = reporter {
            reporter.abort();
        }
        if let Some(err) = failure {
            return Err(err);
        }

        self.monitor.shutdown()?;
        outcomes.sort_by_key(|o| o.seat);

        let report = DiningReport {
            agents: outcomes,
            snapshot: self.monitor.snapshot(),
            status: self.monitor.status_report(),
            elapsed: started.elapsed(),
        };
        info!(
            "Table finished: {} meals in {:?}",
            report.total_meals(),
            report.elapsed
        );
        Ok(report)
    }
}

/// Sleeps for a random 1..=`max_ms` ms; zero means no pause.
fn pause(seat: usize, what: &str, max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(1..=max_ms);
    debug!("seat {} {} for {} ms", seat, what, ms);
    std::thread::sleep(Duration::from_millis(ms));
}

/// One agent's think → request → eat → release loop.
fn dine(
    seat: usize,
    monitor: &Monitor,
    config: &TableConfig,
    stop: &StopHandle,
) -> Result<AgentOutcome> {
    let mut outcome = AgentOutcome {
        seat,
        ..AgentOutcome::default()
    };
    let timeout = config.request_timeout();

    while !stop.is_stopped() && config.cycles.map_or(true, |cycles| outcome.meals < cycles) {
        pause(seat, "thinking", config.think_ms);

        let granted = match timeout {
            Some(timeout) => monitor.request_timeout(seat, timeout),
            None => monitor.request(seat),
        };
        let side = match granted {
            Ok(side) => side,
            Err(MonitorError::TimedOut { .. }) => {
                outcome.gave_up += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        pause(seat, "eating", config.eat_ms);
        monitor.release(seat)?;

        outcome.meals += 1;
        match side {
            Side::Left => outcome.left_heavy += 1,
            Side::Right => outcome.right_heavy += 1,
        }
    }

    debug!("seat {} leaves the table after {} meals", seat, outcome.meals);
    Ok(outcome)
}
