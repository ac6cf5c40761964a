//! Command-line interface for the `fltops` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AlertsCommand, AuditCommand, ConfigCommand, FlightCommand, FlightLogArgs, FleetCommand,
    JsonArgs, MaintenanceCommand, RoleArg, StatusArg, TelemetryCommand,
};

use crate::logging::Verbosity;

/// fltops - Flight operations records with a tamper-evident audit trail
///
/// Registers the fleet, logs flights, telemetry, and maintenance, raises
/// maintenance-threshold alerts, and keeps a hash-chained ledger of every
/// change.
#[derive(Debug, Parser)]
#[command(name = "fltops")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Username recorded as the actor of changes
    #[arg(long, global = true, value_name = "USERNAME")]
    pub actor: Option<String>,

    /// Client address recorded with changes
    #[arg(long, global = true, value_name = "ADDR")]
    pub origin: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage bases, aircraft, pilots, crew, and accounts
    #[command(subcommand)]
    Fleet(FleetCommand),

    /// Log and manage maintenance
    #[command(subcommand)]
    Maintenance(MaintenanceCommand),

    /// Inspect maintenance alerts
    #[command(subcommand)]
    Alerts(AlertsCommand),

    /// Log and manage flights
    #[command(subcommand)]
    Flight(FlightCommand),

    /// Record in-flight telemetry
    #[command(subcommand)]
    Telemetry(TelemetryCommand),

    /// Read and verify the audit ledger
    #[command(subcommand)]
    Audit(AuditCommand),

    /// Show today's operational dashboard
    Dashboard(JsonArgs),

    /// Show database status
    Status(JsonArgs),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
