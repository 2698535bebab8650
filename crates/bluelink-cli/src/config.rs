//! Configuration file handling for the bluelink CLI

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bluelink_client::{ControllerConfig, VehicleConfig};
use bluelink_core::{Brand, Credentials, Region};
use serde::{Deserialize, Serialize};

/// Contents of `config.toml`
///
/// ```toml
/// username = "me@example.com"
/// password = "secret"
/// pin = "1234"
/// brand = "hyundai"
/// region = "US"
/// stamp = "..."
///
/// [vehicle]
/// vin = "KMHL14JA5PA000001"
/// regId = "H00000000"
/// generation = "2"
/// brandIndicator = "H"
/// engineType = "ICE"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub username: Option<String>,
    pub password: Option<String>,
    pub pin: Option<String>,
    pub brand: Option<String>,
    pub region: Option<String>,
    pub language: Option<String>,
    /// Precomputed `Stamp` header value
    pub stamp: Option<String>,
    pub vehicle: Option<VehicleConfig>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

/// Account settings given on the command line or in the environment
#[derive(Debug, Clone, Default, clap::Args)]
pub struct AccountArgs {
    /// Account username (usually an email address)
    #[arg(long, env = "BLUELINK_USERNAME")]
    pub username: Option<String>,

    /// Account password (for Kia EU, the refresh token)
    #[arg(long, env = "BLUELINK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Vehicle control PIN
    #[arg(long, env = "BLUELINK_PIN", hide_env_values = true)]
    pub pin: Option<String>,

    /// Brand: hyundai, kia or genesis
    #[arg(long, env = "BLUELINK_BRAND")]
    pub brand: Option<String>,

    /// Region: US or EU
    #[arg(long, env = "BLUELINK_REGION")]
    pub region: Option<String>,

    /// Session language (EU only)
    #[arg(long, env = "BLUELINK_LANGUAGE")]
    pub language: Option<String>,

    /// Vehicle identification number; overrides the config file
    #[arg(long, env = "BLUELINK_VIN")]
    pub vin: Option<String>,

    /// Stamp header value
    #[arg(long, env = "BLUELINK_STAMP", hide_env_values = true)]
    pub stamp: Option<String>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("bluelink");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: &AccountArgs, no_color: bool) -> Result<MergedConfig> {
        let pick = |arg: &Option<String>, file: &Option<String>| arg.clone().or_else(|| file.clone());

        let Some(username) = pick(&args.username, &self.username) else {
            bail!("No username given (use --username, BLUELINK_USERNAME or the config file)");
        };
        let Some(password) = pick(&args.password, &self.password) else {
            bail!("No password given (use --password, BLUELINK_PASSWORD or the config file)");
        };
        let brand: Brand = pick(&args.brand, &self.brand)
            .as_deref()
            .unwrap_or("hyundai")
            .parse()?;
        let region: Region = pick(&args.region, &self.region)
            .as_deref()
            .unwrap_or("US")
            .parse()?;

        let vehicle = match (self.vehicle.clone(), args.vin.clone()) {
            (Some(mut vehicle), Some(vin)) => {
                vehicle.vin = vin;
                Some(vehicle)
            }
            (vehicle, _) => vehicle,
        };

        Ok(MergedConfig {
            controller: ControllerConfig {
                credentials: Credentials::new(username, password),
                brand,
                region,
                language: pick(&args.language, &self.language),
                pin: pick(&args.pin, &self.pin),
            },
            stamp: pick(&args.stamp, &self.stamp).unwrap_or_default(),
            vehicle,
            no_color: no_color || self.no_color.unwrap_or(false),
        })
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub controller: ControllerConfig,
    pub stamp: String,
    pub vehicle: Option<VehicleConfig>,
    pub no_color: bool,
}
