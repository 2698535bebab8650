//! Output formatting for the bluelink CLI (text or json)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text and tables (default)
    #[default]
    Text,
    /// JSON
    Json,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet && self.format == OutputFormat::Text {
            println!("{}", msg.green());
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Text => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
    }

    /// Print a single row as a table or JSON object
    pub fn print_one<T: Tabled + Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => println!("{}", Table::new([data])),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
            ),
        }
    }

    /// Print raw JSON as returned by the backend
    pub fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        );
    }
}

/// Odometer reading
#[derive(Debug, Tabled, Serialize)]
pub struct OdometerRow {
    #[tabled(rename = "VIN")]
    pub vin: String,
    #[tabled(rename = "Odometer")]
    pub value: f64,
    #[tabled(rename = "Unit")]
    pub unit: u8,
}
