//! Deterministic replay of the five-seat walkthrough.
//!
//! Seats 0 and 1 eat, seat 2 blocks, and the two releases hand seat 2 its
//! units. Every step is checked against the expected pile counts, so the
//! replay doubles as a self-test of the allocation rule.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use refectory_monitor::{AgentPhase, Monitor, Side};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{error::RefectoryError, Result};

/// How long to wait for the blocked seat to show up as hungry.
const PARK_TIMEOUT: Duration = Duration::from_secs(5);

/// One observed step of the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// What happened.
    pub action: String,
    /// Pile counts after the step.
    pub units: Vec<u8>,
    /// Seats eating after the step.
    pub eating: Vec<usize>,
    /// Seats waiting after the step.
    pub hungry: Vec<usize>,
}

fn observe(monitor: &Monitor, action: impl Into<String>, expected: &[u8]) -> Result<ScenarioStep> {
    let snapshot = monitor.snapshot();
    let action = action.into();
    if snapshot.units != expected {
        return Err(RefectoryError::Scenario(format!(
            "after '{action}' expected units {expected:?}, found {:?}",
            snapshot.units
        )));
    }

    let hungry = snapshot
        .agents
        .iter()
        .filter(|a| a.phase == AgentPhase::Hungry)
        .map(|a| a.seat)
        .collect();
    let step = ScenarioStep {
        action,
        units: snapshot.units.clone(),
        eating: snapshot.eating(),
        hungry,
    };
    info!("{}: units {:?}", step.action, step.units);
    Ok(step)
}

fn expect_side(seat: usize, got: Side, want: Side) -> Result<()> {
    if got == want {
        Ok(())
    } else {
        Err(RefectoryError::Scenario(format!(
            "seat {seat} took a {got}-heavy allocation, expected {want}-heavy"
        )))
    }
}

/// Replays the walkthrough and returns every observed step.
///
/// # Errors
///
/// [`RefectoryError::Scenario`] if any step diverges, or a monitor error.
pub fn replay() -> Result<Vec<ScenarioStep>> {
    replay_on(&Arc::new(Monitor::new(5)?), PARK_TIMEOUT)
}

fn replay_on(monitor: &Arc<Monitor>, park_timeout: Duration) -> Result<Vec<ScenarioStep>> {
    let mut steps = vec![observe(monitor, "table laid", &[2, 2, 2, 2, 2])?];

    expect_side(0, monitor.request(0)?, Side::Left)?;
    steps.push(observe(monitor, "seat 0 eats", &[0, 1, 2, 2, 2])?);

    expect_side(1, monitor.request(1)?, Side::Right)?;
    steps.push(observe(monitor, "seat 1 eats", &[0, 0, 0, 2, 2])?);

    let waiter = {
        let monitor = Arc::clone(monitor);
        thread::spawn(move || monitor.request(2))
    };
    let handed_over = hand_over(monitor, park_timeout, &mut steps);
    if handed_over.is_err() {
        // Seat 2 is parked until both neighbors give their units back.
        for seat in [0, 1] {
            let _ = monitor.release(seat);
        }
    }
    let granted = waiter
        .join()
        .map_err(|_| RefectoryError::Scenario("seat 2 thread panicked".to_string()))?;
    if let Err(err) = handed_over {
        if granted.is_ok() {
            monitor.release(2)?;
        }
        return Err(err);
    }

    expect_side(2, granted?, Side::Left)?;
    steps.push(observe(
        monitor,
        "seat 1 releases, seat 2 eats",
        &[2, 2, 0, 1, 2],
    )?);

    monitor.release(2)?;
    steps.push(observe(monitor, "seat 2 releases", &[2, 2, 2, 2, 2])?);
    monitor.shutdown()?;

    Ok(steps)
}

/// Waits for seat 2 to park, then releases seats 0 and 1.
fn hand_over(
    monitor: &Monitor,
    park_timeout: Duration,
    steps: &mut Vec<ScenarioStep>,
) -> Result<()> {
    let deadline = Instant::now() + park_timeout;
    while monitor.phase(2)? != AgentPhase::Hungry {
        if Instant::now() > deadline {
            return Err(RefectoryError::Scenario(
                "seat 2 never started waiting".to_string(),
            ));
        }
        thread::sleep(Duration::from_millis(1));
    }
    steps.push(observe(monitor, "seat 2 waits", &[0, 0, 0, 2, 2])?);

    monitor.release(0)?;
    steps.push(observe(monitor, "seat 0 releases", &[2, 1, 0, 2, 2])?);

    monitor.release(1)?;
    Ok(())
}
