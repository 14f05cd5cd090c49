//! Configuration types for refectory.

use std::path::Path;
use std::time::Duration;

use refectory_alley::AlleySettings;
use serde::{Deserialize, Serialize};

use crate::{error::RefectoryError, Result};

/// Top-level configuration.
///
/// Every section falls back to its defaults, so a file only needs the
/// keys it changes:
///
/// ```toml
/// [table]
/// seats = 7
/// cycles = 20
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefectoryConfig {
    /// Dining table configuration.
    pub table: TableConfig,

    /// Staging alley configuration.
    pub alley: AlleyConfig,
}

impl RefectoryConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// [`RefectoryError::Config`] for malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| RefectoryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// - [`RefectoryError::ConfigIo`] if the file cannot be read
    /// - [`RefectoryError::Config`] if it is malformed or invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RefectoryError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) when the file exists.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// [`RefectoryError::Config`] naming the first invalid key.
    pub fn validate(&self) -> Result<()> {
        self.table.validate()?;
        self.alley.validate()
    }
}

/// Dining table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Number of seats, agents and piles.
    pub seats: usize,

    /// Longest think time per cycle, in milliseconds.
    pub think_ms: u64,

    /// Longest eat time per cycle, in milliseconds.
    pub eat_ms: u64,

    /// Meals per agent. `None` runs until stopped.
    pub cycles: Option<u64>,

    /// Give up a request after this many milliseconds and think again.
    pub request_timeout_ms: Option<u64>,

    /// Interval between status log lines while running.
    pub report_interval_ms: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            seats: 5,
            think_ms: 200,
            eat_ms: 200,
            cycles: Some(10),
            request_timeout_ms: None,
            report_interval_ms: Some(1000),
        }
    }
}

impl TableConfig {
    /// Sets the number of seats.
    #[must_use]
    pub const fn with_seats(mut self, seats: usize) -> Self {
        self.seats = seats;
        self
    }

    /// Sets the longest think and eat times.
    #[must_use]
    pub const fn with_durations(mut self, think_ms: u64, eat_ms: u64) -> Self {
        self.think_ms = think_ms;
        self.eat_ms = eat_ms;
        self
    }

    /// Sets the meals per agent.
    #[must_use]
    pub const fn with_cycles(mut self, cycles: Option<u64>) -> Self {
        self.cycles = cycles;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Sets the status report interval.
    #[must_use]
    pub const fn with_report_interval(mut self, interval_ms: Option<u64>) -> Self {
        self.report_interval_ms = interval_ms;
        self
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.seats < 2 {
            return Err(RefectoryError::Config(format!(
                "table.seats must be at least 2, got {}",
                self.seats
            )));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(RefectoryError::Config(
                "table.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.report_interval_ms == Some(0) {
            return Err(RefectoryError::Config(
                "table.report_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Staging alley configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlleyConfig {
    /// Number of supplier carts.
    pub carts: usize,

    /// Boxes the alley can hold.
    pub capacity: usize,

    /// Longest pick-up drive, in milliseconds.
    pub max_pick_up_ms: u64,

    /// Longest unload, in milliseconds.
    pub max_unload_ms: u64,

    /// Longest place-and-return trip of the forklift, in milliseconds.
    pub max_place_ms: u64,

    /// Longest trip bringing a box back, in milliseconds.
    pub max_bring_back_ms: u64,

    /// How long carts keep working, in milliseconds.
    pub duration_ms: u64,
}

impl Default for AlleyConfig {
    fn default() -> Self {
        Self {
            carts: 10,
            capacity: 5,
            max_pick_up_ms: 300,
            max_unload_ms: 300,
            max_place_ms: 300,
            max_bring_back_ms: 300,
            duration_ms: 4000,
        }
    }
}

impl AlleyConfig {
    /// Converts to runner settings.
    #[must_use]
    pub fn to_settings(&self) -> AlleySettings {
        AlleySettings {
            carts: self.carts,
            capacity: self.capacity,
            max_pick_up: Duration::from_millis(self.max_pick_up_ms),
            max_unload: Duration::from_millis(self.max_unload_ms),
            max_place: Duration::from_millis(self.max_place_ms),
            max_bring_back: Duration::from_millis(self.max_bring_back_ms),
            duration: Duration::from_millis(self.duration_ms),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.carts == 0 {
            return Err(RefectoryError::Config(
                "alley.carts must be at least 1".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(RefectoryError::Config(
                "alley.capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
