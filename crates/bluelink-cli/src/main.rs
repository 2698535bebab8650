//! Bluelink CLI - command-line tool for Hyundai, Kia and Genesis vehicles
//!
//! Logs in with the configured account, then runs one command.

mod commands;
mod config;
mod output;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bluelink_client::{
    HeatedFeatures, Region, SessionController, StartOptions, StaticStamp, Vehicle,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AccountArgs, Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "bluelink")]
#[command(author, version, about = "Hyundai / Kia / Genesis connected vehicle CLI")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    account: AccountArgs,

    /// Configuration file path
    #[arg(short, long, env = "BLUELINK_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and show the session
    Login,

    /// Enter the PIN to obtain a control token
    Pin,

    /// Start the engine with climate control
    Start {
        /// Turn on climate control
        #[arg(long)]
        hvac: bool,

        /// Target temperature in Fahrenheit
        #[arg(long, default_value = "70")]
        temperature: f64,

        /// Engine run time in minutes
        #[arg(long, default_value = "10")]
        duration: u32,

        /// Turn on the defroster
        #[arg(long)]
        defrost: bool,

        /// Heated zone code: 0 off, 1 steering wheel and rear window,
        /// 2 rear window, 3 steering wheel
        #[arg(long, default_value = "0")]
        heated_features: i64,

        /// Seat setting as SEAT=STATUS, e.g. driverSeat=8 (repeatable)
        #[arg(long = "seat", value_parser = parse_seat)]
        seats: Vec<(String, i64)>,
    },

    /// Stop the engine
    Stop,

    /// Lock the doors
    Lock,

    /// Unlock the doors
    Unlock,

    /// Show the raw vehicle status
    Status {
        /// Poll the vehicle instead of the cached status
        #[arg(long)]
        refresh: bool,
    },

    /// Show the odometer reading
    Odometer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(&cli.account, cli.no_color)?;
    tracing::debug!(
        brand = %merged.controller.brand,
        region = %merged.controller.region,
        vehicle = merged.vehicle.is_some(),
        "Configuration loaded"
    );
    let ctx = OutputContext::new(cli.output, merged.no_color, cli.quiet);

    let controller = Arc::new(create_controller(&merged)?);
    controller.login().await.context("Login failed")?;

    match &cli.command {
        Commands::Login => commands::login(&controller, &ctx).await?,

        Commands::Pin => {
            commands::pin(&controller, merged.controller.pin.as_deref(), &ctx).await?;
        }

        Commands::Start {
            hvac,
            temperature,
            duration,
            defrost,
            heated_features,
            seats,
        } => {
            let options = StartOptions {
                hvac: *hvac,
                duration: *duration,
                temperature: *temperature,
                defrost: *defrost,
                heated_features: HeatedFeatures::Code(*heated_features),
                seat_climate_settings: (!seats.is_empty())
                    .then(|| seats.iter().cloned().collect::<BTreeMap<_, _>>()),
            };
            let vehicle = create_vehicle(&merged, &controller)?;
            commands::start(&vehicle, &options, &ctx).await?;
        }

        Commands::Stop => commands::stop(&create_vehicle(&merged, &controller)?, &ctx).await?,

        Commands::Lock => commands::lock(&create_vehicle(&merged, &controller)?, &ctx).await?,

        Commands::Unlock => {
            commands::unlock(&create_vehicle(&merged, &controller)?, &ctx).await?;
        }

        Commands::Status { refresh } => {
            let vehicle = create_vehicle(&merged, &controller)?;
            commands::status(&vehicle, *refresh, &ctx).await?;
        }

        Commands::Odometer => {
            commands::odometer(&create_vehicle(&merged, &controller)?, &ctx).await?;
        }
    }

    Ok(())
}

/// Create a session controller for the merged configuration
fn create_controller(merged: &MergedConfig) -> Result<SessionController> {
    let stamp = Arc::new(StaticStamp::new(merged.stamp.clone()));
    SessionController::new(merged.controller.clone(), stamp)
        .context("Failed to create session controller")
}

/// Bind the configured vehicle to the session
fn create_vehicle(merged: &MergedConfig, controller: &Arc<SessionController>) -> Result<Vehicle> {
    if merged.controller.region != Region::Us {
        bail!("Vehicle commands are only available in the US region");
    }
    let Some(config) = merged.vehicle.clone() else {
        bail!("No [vehicle] section in the config file");
    };
    Ok(Vehicle::new(config, controller.clone()))
}

fn parse_seat(raw: &str) -> std::result::Result<(String, i64), String> {
    let (seat, status) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SEAT=STATUS, got '{}'", raw))?;
    let status = status
        .trim()
        .parse()
        .map_err(|_| format!("seat status must be a number, got '{}'", status))?;
    Ok((seat.trim().to_string(), status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seat() {
        assert_eq!(parse_seat("driverSeat=8"), Ok(("driverSeat".to_string(), 8)));
        assert!(parse_seat("driverSeat").is_err());
        assert!(parse_seat("driverSeat=hot").is_err());
    }

    #[test]
    fn test_cli_parses_start_options() {
        let cli = Cli::try_parse_from([
            "bluelink",
            "--brand",
            "hyundai",
            "start",
            "--hvac",
            "--seat",
            "driverSeat=8",
            "--seat",
            "passengerSeat=6",
        ])
        .unwrap();
        match cli.command {
            Commands::Start { hvac, seats, temperature, .. } => {
                assert!(hvac);
                assert_eq!(temperature, 70.0);
                assert_eq!(seats.len(), 2);
            }
            _ => panic!("Expected start command"),
        }
    }
}
