//! # Refectory Core
//!
//! Runs agents against the dining monitor and the staging alley, and
//! loads the configuration that shapes both.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    REFECTORY CORE                       │
//! ├─────────────────────────────────────────────────────────┤
//! │                                                         │
//! │     RefectoryConfig ──┬──────────────────┐              │
//! │                       ▼                  ▼              │
//! │              ┌─────────────────┐  ┌─────────────┐       │
//! │              │      Table      │  │  run_alley  │       │
//! │              │ (agent loops)   │  │             │       │
//! │              └────────┬────────┘  └──────┬──────┘       │
//! │                       ▼                  ▼              │
//! │              ┌─────────────────┐  ┌─────────────┐       │
//! │              │     Monitor     │  │    Alley    │       │
//! │              └─────────────────┘  └─────────────┘       │
//! │                                                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use refectory_core::{RefectoryConfig, Table};
//!
//! let config = RefectoryConfig::load_or_default("config/refectory.toml")?;
//! let table = Table::new(config.table)?;
//!
//! let stop = table.stop_handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     stop.stop();
//! });
//!
//! let report = table.run().await?;
//! println!("{} meals", report.total_meals());
//! ```
//!
//! ## Notes
//!
//! - Agent loops run on blocking threads; `request` parks its thread
//! - A stop request lets every agent finish its current meal
//! - The monitor is shut down only after every agent has left

mod config;
mod error;
mod scenario;
mod table;

pub use config::{AlleyConfig, RefectoryConfig, TableConfig};
pub use error::RefectoryError;
pub use scenario::{replay, ScenarioStep};
pub use table::{AgentOutcome, DiningReport, StopHandle, Table};

// Monitor and alley types that appear in reports
pub use refectory_alley::{AlleyReport, AlleySettings, AlleyStats};
pub use refectory_monitor::{AgentPhase, Monitor, MonitorError, Side, TableSnapshot, TableStatus};

/// Core result type for refectory operations.
pub type Result<T> = std::result::Result<T, RefectoryError>;

/// Runs the staging alley described by `config` on a blocking thread.
///
/// # Errors
///
/// - [`RefectoryError::Config`] if the configuration is invalid
/// - [`RefectoryError::Alley`] if the run fails
/// - [`RefectoryError::Join`] if the runner thread panicked
pub async fn run_alley(config: &AlleyConfig) -> Result<AlleyReport> {
    config.validate()?;
    let settings = config.to_settings();
    let report = tokio::task::spawn_blocking(move || refectory_alley::run(&settings)).await??;
    Ok(report)
}
