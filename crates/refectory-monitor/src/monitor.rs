//! # Dining Monitor
//!
//! Arbitrates the piles between agents. One exclusive lock guards the
//! pool and every agent record; each agent owns a private condition so a
//! release wakes only the neighbors it could have helped.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Monitor                    │
//! │  ┌───────────────────────────────────────┐  │
//! │  │ Mutex<Table>                          │  │
//! │  │   ResourcePool   units[0..N]          │  │
//! │  │   AgentState     phase, heavy, flag   │  │
//! │  └───────────────────────────────────────┘  │
//! │  Condvar[0..N]   one per seat               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! - `request`: mark HUNGRY, evaluate, park until granted
//! - `release`: return units, mark THINKING, evaluate left then right neighbor
//! - `evaluate`: a HUNGRY agent whose two piles hold more than two units is
//!   granted on the spot and its condition is signalled
//!
//! Units are moved inside `evaluate`, so a woken agent only has to consume
//! its eligibility flag. The wait still sits in a re-check loop: a wake is
//! a hint, not a grant.
//!
//! ## Invariants
//!
//! Checked after every mutation. A violation means the locking discipline
//! was bypassed and the monitor panics rather than correcting it.
//!
//! ## Example
//!
//! ```rust
//! use refectory_monitor::{Monitor, Side};
//!
//! let monitor = Monitor::new(5)?;
//!
//! let side = monitor.request(0)?;
//! assert_eq!(side, Side::Left);
//! assert_eq!(monitor.snapshot().units, vec![0, 1, 2, 2, 2]);
//!
//! monitor.release(0)?;
//! monitor.shutdown()?;
//! # Ok::<(), refectory_monitor::MonitorError>(())
//! ```

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::{AgentPhase, AgentSnapshot, AgentState};
use crate::error::{MonitorError, Result};
use crate::pool::{left, right, ResourcePool, Side};

/// Everything guarded by the monitor lock.
#[derive(Debug)]
struct Table {
    pool: ResourcePool,
    agents: Vec<AgentState>,
    closed: bool,
    /// Grants made while evaluating a neighbor after a release.
    release_grants: u64,
}

impl Table {
    /// Grants `seat` three units if it is hungry and its piles allow it.
    ///
    /// Returns true when a grant was made and the seat was signalled.
    fn evaluate(&mut self, seat: usize, conditions: &[Condvar]) -> bool {
        let Self { pool, agents, .. } = self;
        let agent = &mut agents[seat];

        match agent.phase {
            AgentPhase::Hungry => {
                if let Some(side) = pool.try_take_three(seat) {
                    agent.phase = AgentPhase::Eating;
                    agent.heavy_side = Some(side);
                    agent.eligible = true;
                    agent.meals += 1;
                    conditions[seat].notify_one();
                    debug!("seat {} granted 3 units ({}-heavy)", seat, side);
                    return true;
                }
                agent.eligible = false;
                debug!(
                    "seat {} waiting, only {} units available",
                    seat,
                    pool.available_to(seat)
                );
            }
            // A granted agent that has not yet consumed its flag keeps it.
            AgentPhase::Eating => {}
            AgentPhase::Thinking => agent.eligible = false,
        }
        false
    }

    fn enforce_invariants(&self) {
        let holdings = self
            .agents
            .iter()
            .enumerate()
            .filter_map(|(seat, agent)| agent.holding().map(|side| (seat, side)));
        if let Err(err) = self.pool.verify(holdings) {
            panic!("{err}");
        }
    }

    fn blocked(&self) -> Vec<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.phase == AgentPhase::Hungry)
            .map(|(seat, _)| seat)
            .collect()
    }
}

/// The monitor shared by every agent at the table.
///
/// # Thread Safety
///
/// `Monitor` is `Send + Sync`. Share it behind an `Arc`; every agent
/// thread calls [`request`](Self::request) and [`release`](Self::release)
/// for its own seat only.
#[derive(Debug)]
pub struct Monitor {
    table: Mutex<Table>,
    conditions: Box<[Condvar]>,
    seats: usize,
}

impl Monitor {
    /// Lays a table of `seats` full piles with every agent thinking.
    ///
    /// # Errors
    ///
    /// [`MonitorError::InvalidSeatCount`] for fewer than two seats.
    pub fn new(seats: usize) -> Result<Self> {
        let pool = ResourcePool::new(seats)?;
        let conditions = (0..seats).map(|_| Condvar::new()).collect();

        info!("Monitor initialized with {} seats", seats);

        Ok(Self {
            table: Mutex::new(Table {
                pool,
                agents: vec![AgentState::default(); seats],
                closed: false,
                release_grants: 0,
            }),
            conditions,
            seats,
        })
    }

    /// Number of seats at the table.
    #[inline]
    #[must_use]
    pub const fn seats(&self) -> usize {
        self.seats
    }

    /// Blocks until `id` holds three units and returns the heavy side.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::InvalidAgentId`] for an id outside the table
    /// - [`MonitorError::AlreadyActive`] if the agent is hungry or eating
    /// - [`MonitorError::ShutDown`] after [`shutdown`](Self::shutdown)
    pub fn request(&self, id: usize) -> Result<Side> {
        self.acquire(id, None)
    }

    /// Like [`request`](Self::request), but gives up after `timeout`.
    ///
    /// A withdrawn agent goes back to THINKING without units. A grant
    /// that lands as the timer fires is kept and returned.
    ///
    /// # Errors
    ///
    /// Everything [`request`](Self::request) returns, plus
    /// [`MonitorError::TimedOut`].
    pub fn request_timeout(&self, id: usize, timeout: Duration) -> Result<Side> {
        self.acquire(id, Some(Instant::now() + timeout))
    }

    fn acquire(&self, id: usize, deadline: Option<Instant>) -> Result<Side> {
        self.check_id(id)?;
        let mut table = self.table.lock();

        if table.closed {
            return Err(MonitorError::ShutDown);
        }
        let phase = table.agents[id].phase;
        if phase != AgentPhase::Thinking {
            return Err(MonitorError::AlreadyActive { id, phase });
        }

        table.agents[id].phase = AgentPhase::Hungry;
        debug!("seat {} hungry", id);
        table.evaluate(id, &self.conditions);
        table.enforce_invariants();

        if !table.agents[id].eligible {
            table.agents[id].waits += 1;
        }

        while !table.agents[id].eligible {
            match deadline {
                None => self.conditions[id].wait(&mut table),
                Some(deadline) => {
                    let timed_out = self.conditions[id]
                        .wait_until(&mut table, deadline)
                        .timed_out();
                    if timed_out && !table.agents[id].eligible {
                        let agent = &mut table.agents[id];
                        agent.phase = AgentPhase::Thinking;
                        agent.eligible = false;
                        debug!("seat {} withdrew its request", id);
                        return Err(MonitorError::TimedOut { id });
                    }
                }
            }
        }

        let agent = &mut table.agents[id];
        agent.eligible = false;
        match agent.heavy_side {
            Some(side) => Ok(side),
            None => panic!(
                "{}",
                MonitorError::InvariantViolation(format!(
                    "seat {id} was signalled eligible without an allocation"
                ))
            ),
        }
    }

    /// Returns the units held by `id` and re-evaluates both neighbors.
    ///
    /// Never blocks. May wake zero, one or two neighbors.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::InvalidAgentId`] for an id outside the table
    /// - [`MonitorError::NotEating`] if `id` holds nothing; the pool is
    ///   left untouched
    pub fn release(&self, id: usize) -> Result<()> {
        self.check_id(id)?;
        let mut table = self.table.lock();

        let agent = &table.agents[id];
        let Some(side) = agent.holding() else {
            let phase = agent.phase;
            warn!("seat {} released while {}", id, phase);
            return Err(MonitorError::NotEating { id, phase });
        };

        if let Err(err) = table.pool.give_back(id, side) {
            panic!("{err}");
        }
        let agent = &mut table.agents[id];
        agent.phase = AgentPhase::Thinking;
        agent.heavy_side = None;
        agent.eligible = false;
        debug!("seat {} released 3 units ({}-heavy)", id, side);

        let mut woken = 0;
        for neighbor in [left(id, self.seats), right(id, self.seats)] {
            if table.evaluate(neighbor, &self.conditions) {
                woken += 1;
            }
        }
        table.release_grants += woken;
        table.enforce_invariants();

        Ok(())
    }

    /// Stops accepting requests.
    ///
    /// Agents still holding units may release them afterwards. Calling it
    /// twice is harmless.
    ///
    /// # Errors
    ///
    /// [`MonitorError::ShutdownWhileBlocked`] if any agent is parked in
    /// `request`. Nothing changes; coordinate quiescence and retry.
    pub fn shutdown(&self) -> Result<()> {
        let mut table = self.table.lock();

        let blocked = table.blocked();
        if !blocked.is_empty() {
            warn!("Shutdown refused, seats {:?} still waiting", blocked);
            return Err(MonitorError::ShutdownWhileBlocked { blocked });
        }

        if !table.closed {
            table.closed = true;
            info!(
                "Monitor shut down after {} meals",
                table.agents.iter().map(|a| a.meals).sum::<u64>()
            );
        }
        Ok(())
    }

    /// Returns true once [`shutdown`](Self::shutdown) succeeded.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.table.lock().closed
    }

    /// Current phase of `id`.
    ///
    /// # Errors
    ///
    /// [`MonitorError::InvalidAgentId`] for an id outside the table.
    pub fn phase(&self, id: usize) -> Result<AgentPhase> {
        self.check_id(id)?;
        Ok(self.table.lock().agents[id].phase)
    }

    /// Consistent copy of the pool and every agent record.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let table = self.table.lock();
        TableSnapshot {
            units: table.pool.units().to_vec(),
            agents: table
                .agents
                .iter()
                .enumerate()
                .map(|(seat, agent)| agent.snapshot(seat))
                .collect(),
            closed: table.closed,
        }
    }

    /// Aggregate counters for logging.
    #[must_use]
    pub fn status_report(&self) -> TableStatus {
        let table = self.table.lock();
        let count = |phase: AgentPhase| table.agents.iter().filter(|a| a.phase == phase).count();

        TableStatus {
            seats: self.seats,
            thinking: count(AgentPhase::Thinking),
            hungry: count(AgentPhase::Hungry),
            eating: count(AgentPhase::Eating),
            units_on_table: table.pool.total(),
            total_meals: table.agents.iter().map(|a| a.meals).sum(),
            total_waits: table.agents.iter().map(|a| a.waits).sum(),
            release_grants: table.release_grants,
            closed: table.closed,
        }
    }

    fn check_id(&self, id: usize) -> Result<()> {
        if id < self.seats {
            Ok(())
        } else {
            Err(MonitorError::InvalidAgentId {
                id,
                seats: self.seats,
            })
        }
    }
}

/// Point-in-time copy of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Units on each pile.
    pub units: Vec<u8>,
    /// Every agent record, by seat.
    pub agents: Vec<AgentSnapshot>,
    /// Whether the monitor has been shut down.
    pub closed: bool,
}

impl TableSnapshot {
    /// Seats currently eating.
    #[must_use]
    pub fn eating(&self) -> Vec<usize> {
        self.agents
            .iter()
            .filter(|a| a.phase == AgentPhase::Eating)
            .map(|a| a.seat)
            .collect()
    }
}

/// Status report of the monitor.
///
/// Provides a snapshot of all counters for logging/debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStatus {
    /// Seats at the table.
    pub seats: usize,
    /// Agents currently thinking.
    pub thinking: usize,
    /// Agents waiting in `request`.
    pub hungry: usize,
    /// Agents holding units.
    pub eating: usize,
    /// Units lying on the piles.
    pub units_on_table: usize,
    /// Meals granted since start.
    pub total_meals: u64,
    /// Times any agent had to park.
    pub total_waits: u64,
    /// Grants triggered by a neighbor's release.
    pub release_grants: u64,
    /// Whether the monitor has been shut down.
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// Spins until `seat` reaches `phase`.
    fn wait_for_phase(monitor: &Monitor, seat: usize, phase: AgentPhase) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.phase(seat).unwrap() != phase {
            assert!(Instant::now() < deadline, "seat {seat} never became {phase}");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn table(seats: usize) -> (Table, Vec<Condvar>) {
        let table = Table {
            pool: ResourcePool::new(seats).unwrap(),
            agents: vec![AgentState::default(); seats],
            closed: false,
            release_grants: 0,
        };
        (table, (0..seats).map(|_| Condvar::new()).collect())
    }

    #[test]
    fn test_evaluate_keeps_flag_of_granted_seat() {
        let (mut table, conditions) = table(5);
        table.agents[1].phase = AgentPhase::Hungry;
        assert!(table.evaluate(1, &conditions));
        assert_eq!(table.agents[1].phase, AgentPhase::Eating);
        assert!(table.agents[1].eligible);
        let units = table.pool.units().to_vec();

        // The second neighbor's release re-evaluates seat 1 before it woke.
        assert!(!table.evaluate(1, &conditions));
        assert!(table.agents[1].eligible);
        assert_eq!(table.agents[1].meals, 1);
        assert_eq!(table.pool.units(), units.as_slice());
        table.enforce_invariants();
    }

    #[test]
    fn test_evaluate_clears_flag_of_thinking_and_blocked_seats() {
        let (mut table, conditions) = table(3);
        table.agents[0].eligible = true;
        assert!(!table.evaluate(0, &conditions));
        assert!(!table.agents[0].eligible);

        table.agents[0].phase = AgentPhase::Hungry;
        assert!(table.evaluate(0, &conditions));
        // Seat 2 sees pile 2 full but pile 0 empty.
        table.agents[2].phase = AgentPhase::Hungry;
        table.agents[2].eligible = true;
        assert!(!table.evaluate(2, &conditions));
        assert!(!table.agents[2].eligible);
        assert_eq!(table.agents[2].phase, AgentPhase::Hungry);
    }

    #[test]
    fn test_monitor_creation() {
        let monitor = Monitor::new(5).unwrap();
        let snapshot = monitor.snapshot();

        assert_eq!(monitor.seats(), 5);
        assert_eq!(snapshot.units, vec![2; 5]);
        assert!(snapshot
            .agents
            .iter()
            .all(|a| a.phase == AgentPhase::Thinking && a.heavy_side.is_none()));
        assert!(!snapshot.closed);
    }

    #[test]
    fn test_invalid_seat_count() {
        assert!(matches!(
            Monitor::new(1),
            Err(MonitorError::InvalidSeatCount { seats: 1 })
        ));
    }

    #[test]
    fn test_invalid_agent_id() {
        let monitor = Monitor::new(3).unwrap();
        assert_eq!(
            monitor.request(3),
            Err(MonitorError::InvalidAgentId { id: 3, seats: 3 })
        );
        assert_eq!(
            monitor.release(7),
            Err(MonitorError::InvalidAgentId { id: 7, seats: 3 })
        );
        assert!(monitor.phase(3).is_err());
    }

    #[test]
    fn test_single_request_succeeds_immediately() {
        for seat in 0..5 {
            let monitor = Monitor::new(5).unwrap();
            assert_eq!(monitor.request(seat).unwrap(), Side::Left);
            assert_eq!(monitor.phase(seat).unwrap(), AgentPhase::Eating);
            assert_eq!(monitor.snapshot().units.iter().sum::<u8>(), 7);
        }
    }

    #[test]
    fn test_release_restores_pool() {
        let monitor = Monitor::new(5).unwrap();
        monitor.request(2).unwrap();
        monitor.release(2).unwrap();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.units, vec![2; 5]);
        assert_eq!(snapshot.agents[2].phase, AgentPhase::Thinking);
        assert_eq!(snapshot.agents[2].meals, 1);
    }

    #[test]
    fn test_double_release_rejected() {
        let monitor = Monitor::new(5).unwrap();
        monitor.request(0).unwrap();
        monitor.release(0).unwrap();

        assert_eq!(
            monitor.release(0),
            Err(MonitorError::NotEating {
                id: 0,
                phase: AgentPhase::Thinking
            })
        );
        assert_eq!(monitor.snapshot().units, vec![2; 5]);
    }

    #[test]
    fn test_request_while_eating_rejected() {
        let monitor = Monitor::new(5).unwrap();
        monitor.request(1).unwrap();
        assert_eq!(
            monitor.request(1),
            Err(MonitorError::AlreadyActive {
                id: 1,
                phase: AgentPhase::Eating
            })
        );
    }

    #[test]
    fn test_non_adjacent_agents_eat_together() {
        let monitor = Monitor::new(5).unwrap();
        monitor.request(0).unwrap();
        monitor.request(2).unwrap();

        assert_eq!(monitor.snapshot().eating(), vec![0, 2]);
        assert_eq!(monitor.snapshot().units, vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_scenario_neighbor_release_wakes_waiter() {
        let monitor = Arc::new(Monitor::new(5).unwrap());

        assert_eq!(monitor.request(0).unwrap(), Side::Left);
        assert_eq!(monitor.snapshot().units, vec![0, 1, 2, 2, 2]);

        assert_eq!(monitor.request(1).unwrap(), Side::Right);
        assert_eq!(monitor.snapshot().units, vec![0, 0, 0, 2, 2]);

        let waiter = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.request(2))
        };
        wait_for_phase(&monitor, 2, AgentPhase::Hungry);
        assert_eq!(monitor.snapshot().units, vec![0, 0, 0, 2, 2]);

        monitor.release(0).unwrap();
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.units, vec![2, 1, 0, 2, 2]);
        assert_eq!(snapshot.agents[2].phase, AgentPhase::Hungry);
        assert_eq!(snapshot.agents[4].phase, AgentPhase::Thinking);

        monitor.release(1).unwrap();
        assert_eq!(waiter.join().unwrap(), Ok(Side::Left));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.eating(), vec![2]);
        assert_eq!(snapshot.units, vec![2, 2, 0, 1, 2]);
        assert_eq!(snapshot.agents[2].waits, 1);
        assert_eq!(monitor.status_report().release_grants, 1);
    }

    #[test]
    fn test_request_timeout_withdraws_cleanly() {
        let monitor = Monitor::new(3).unwrap();
        monitor.request(0).unwrap();

        // Seat 2 reaches piles 2 and 0, which hold only two units.
        let result = monitor.request_timeout(2, Duration::from_millis(20));
        assert_eq!(result, Err(MonitorError::TimedOut { id: 2 }));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.agents[2].phase, AgentPhase::Thinking);
        assert_eq!(snapshot.units, vec![0, 1, 2]);

        // The withdrawn agent is not granted by a later release.
        monitor.release(0).unwrap();
        assert_eq!(monitor.phase(2).unwrap(), AgentPhase::Thinking);
        assert_eq!(monitor.snapshot().units, vec![2, 2, 2]);
    }

    #[test]
    fn test_request_timeout_granted_in_time() {
        let monitor = Monitor::new(5).unwrap();
        assert_eq!(
            monitor.request_timeout(4, Duration::from_millis(10)),
            Ok(Side::Left)
        );
    }

    #[test]
    fn test_shutdown_refused_while_blocked() {
        let monitor = Arc::new(Monitor::new(3).unwrap());
        monitor.request(0).unwrap();

        let waiter = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.request(2))
        };
        wait_for_phase(&monitor, 2, AgentPhase::Hungry);

        assert_eq!(
            monitor.shutdown(),
            Err(MonitorError::ShutdownWhileBlocked { blocked: vec![2] })
        );
        assert!(!monitor.is_shut_down());

        monitor.release(0).unwrap();
        assert!(waiter.join().unwrap().is_ok());
        monitor.shutdown().unwrap();
        assert!(monitor.is_shut_down());
    }

    #[test]
    fn test_shutdown_rejects_requests_but_accepts_release() {
        let monitor = Monitor::new(4).unwrap();
        monitor.request(3).unwrap();
        monitor.shutdown().unwrap();
        monitor.shutdown().unwrap();

        assert_eq!(monitor.request(1), Err(MonitorError::ShutDown));
        monitor.release(3).unwrap();
        assert_eq!(monitor.snapshot().units, vec![2; 4]);
    }

    #[test]
    fn test_status_report() {
        let monitor = Monitor::new(5).unwrap();
        monitor.request(0).unwrap();
        monitor.request(3).unwrap();
        monitor.release(0).unwrap();

        let status = monitor.status_report();
        assert_eq!(status.seats, 5);
        assert_eq!(status.eating, 1);
        assert_eq!(status.thinking, 4);
        assert_eq!(status.hungry, 0);
        assert_eq!(status.units_on_table, 7);
        assert_eq!(status.total_meals, 2);
        assert_eq!(status.total_waits, 0);
        assert!(!status.closed);
    }
}
