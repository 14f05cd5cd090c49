//! Refectory CLI - run the dining monitor and the staging alley

use anyhow::Context;
use clap::Parser;
use refectory_core::{RefectoryConfig, Table};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refectory")]
#[command(about = "Refectory - three-unit dining monitor and staging alley")]
struct Cli {
    /// TOML file with [table] and [alley] sections
    #[arg(short, long, global = true, default_value = "config/refectory.toml")]
    config: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Seat the agents and run the dining table
    Dine {
        /// Override the number of seats
        #[arg(long)]
        seats: Option<usize>,
        /// Override the meals per agent
        #[arg(long)]
        cycles: Option<u64>,
        /// Run until Ctrl-C instead of a fixed number of meals
        #[arg(long, conflicts_with = "cycles")]
        forever: bool,
    },
    /// Run the carts and forklift around the staging alley
    Alley {
        /// Override the number of carts
        #[arg(long)]
        carts: Option<usize>,
        /// Override the run duration in milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,
    },
    /// Replay the five-seat walkthrough step by step
    Scenario,
    /// Validate the configuration file without running anything
    Check,
}

fn print_report<T: Serialize + std::fmt::Debug>(report: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report:#?}");
    }
    Ok(())
}

/// Loads the configuration. `check` insists on the file; the run commands
/// fall back to defaults when it is absent.
fn load_config(path: &str, require_file: bool) -> anyhow::Result<RefectoryConfig> {
    let config = if require_file {
        RefectoryConfig::load(path)
    } else {
        RefectoryConfig::load_or_default(path)
    };
    config.with_context(|| format!("loading {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let require_file = matches!(cli.command, Some(Commands::Check));
    let mut config = load_config(&cli.config, require_file)?;

    match cli.command {
        Some(Commands::Dine {
            seats,
            cycles,
            forever,
        }) => {
            if let Some(seats) = seats {
                config.table.seats = seats;
            }
            if forever {
                config.table.cycles = None;
            } else if cycles.is_some() {
                config.table.cycles = cycles;
            }
            config.validate()?;

            let table = Table::new(config.table)?;
            let stop = table.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Ctrl-C received, letting agents finish their meal");
                    stop.stop();
                }
            });

            let report = table.run().await?;
            print_report(&report, cli.json)?;
        }
        Some(Commands::Alley { carts, duration_ms }) => {
            if let Some(carts) = carts {
                config.alley.carts = carts;
            }
            if let Some(duration_ms) = duration_ms {
                config.alley.duration_ms = duration_ms;
            }

            let report = refectory_core::run_alley(&config.alley).await?;
            print_report(&report, cli.json)?;
        }
        Some(Commands::Scenario) => {
            let steps = refectory_core::replay()?;
            if cli.json {
                print_report(&steps, true)?;
            } else {
                for step in &steps {
                    println!(
                        "{:<32} units {:?}  eating {:?}  hungry {:?}",
                        step.action, step.units, step.eating, step.hungry
                    );
                }
            }
        }
        Some(Commands::Check) => {
            config.validate()?;
            info!("Configuration {} is valid", cli.config);
            println!("Config OK: {} seats, {} carts", config.table.seats, config.alley.carts);
        }
        None => {
            println!("Refectory v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
