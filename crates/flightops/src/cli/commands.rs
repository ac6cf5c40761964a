//! CLI command definitions.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand, ValueEnum};

use crate::model::{AircraftStatus, Role};

/// Fleet registry commands.
#[derive(Debug, Subcommand)]
pub enum FleetCommand {
    /// Register an operating base
    AddBase {
        /// Unique base name
        name: String,
        /// Where the base is
        #[arg(short, long, default_value = "")]
        location: String,
    },

    /// Register an aircraft
    AddAircraft {
        /// Unique tail number
        tail_number: String,
        /// Aircraft model
        model: String,
        /// Home base id
        #[arg(long)]
        base: i64,
        /// Aircraft type
        #[arg(long = "type", default_value = "")]
        aircraft_type: String,
        /// Hours at which maintenance is due
        #[arg(long, default_value_t = crate::model::fleet::DEFAULT_THRESHOLD_HOURS)]
        threshold: f64,
    },

    /// Change an aircraft's availability
    SetStatus {
        /// Aircraft id
        aircraft: i64,
        /// New status
        #[arg(value_enum)]
        status: StatusArg,
    },

    /// Register a pilot
    AddPilot {
        /// Full name
        name: String,
        /// Rank
        #[arg(short, long, default_value = "")]
        rank: String,
        /// Contact details
        #[arg(long, default_value = "")]
        contact: String,
    },

    /// Register a crew member
    AddCrew {
        /// Full name
        name: String,
        /// Rank
        #[arg(short, long, default_value = "")]
        rank: String,
        /// Crew position
        #[arg(long, default_value = "")]
        role: String,
    },

    /// Create a user account
    AddAccount {
        /// Unique username
        username: String,
        /// Access role
        #[arg(value_enum, default_value = "auditor")]
        role: RoleArg,
    },

    /// Change a user's role
    SetRole {
        /// Username
        username: String,
        /// New role
        #[arg(value_enum)]
        role: RoleArg,
    },

    /// List bases, aircraft, pilots, and crew
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Maintenance log commands.
#[derive(Debug, Subcommand)]
pub enum MaintenanceCommand {
    /// Log maintenance and check the aircraft's threshold
    Log {
        /// Aircraft id
        aircraft: i64,
        /// Cumulative airframe hours
        hours: f64,
        /// Date of the last service (YYYY-MM-DD)
        #[arg(long)]
        service_date: NaiveDate,
        /// Component status
        #[arg(long, default_value = "")]
        components: String,
        /// Notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Change a maintenance log and recheck the threshold
    Update {
        /// Maintenance log id
        id: i64,
        /// Move the log to this aircraft
        #[arg(long)]
        aircraft: Option<i64>,
        /// New cumulative hours
        #[arg(long)]
        hours: Option<f64>,
        /// New service date
        #[arg(long)]
        service_date: Option<NaiveDate>,
        /// New component status
        #[arg(long)]
        components: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a maintenance log and its alerts
    Delete {
        /// Maintenance log id
        id: i64,
    },

    /// List maintenance logs, newest first
    List {
        /// Only this aircraft
        #[arg(short, long)]
        aircraft: Option<i64>,
        /// Maximum number of logs
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Alert commands.
#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// List maintenance alerts
    List {
        /// Include resolved alerts
        #[arg(short, long)]
        all: bool,
        /// Only alerts for this role
        #[arg(short, long)]
        role: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Flight log commands.
#[derive(Debug, Subcommand)]
pub enum FlightCommand {
    /// Log a flight
    Log(FlightLogArgs),

    /// Record or clear a flight's actual arrival
    Arrive {
        /// Flight id
        id: i64,
        /// Arrival time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Remove a recorded arrival instead, making the flight active again
        #[arg(long, conflicts_with = "at")]
        clear: bool,
    },

    /// Delete a flight and its telemetry
    Delete {
        /// Flight id
        id: i64,
    },

    /// List recent flights
    List {
        /// Maximum number of flights
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Arguments for logging a flight.
#[derive(Debug, Args)]
pub struct FlightLogArgs {
    /// Aircraft id
    pub aircraft: i64,
    /// Pilot id
    #[arg(short, long)]
    pub pilot: Option<i64>,
    /// Crew member ids
    #[arg(long, value_delimiter = ',')]
    pub crew: Vec<i64>,
    /// Mission type
    #[arg(short, long, default_value = "")]
    pub mission: String,
    /// Actual departure (RFC 3339)
    #[arg(long)]
    pub atd: DateTime<Utc>,
    /// Estimated arrival (RFC 3339)
    #[arg(long)]
    pub eta: DateTime<Utc>,
    /// Actual arrival (RFC 3339)
    #[arg(long)]
    pub ata: Option<DateTime<Utc>>,
    /// Hours flown
    #[arg(long)]
    pub hours: f64,
    /// Fuel consumed
    #[arg(long, default_value = "0")]
    pub fuel: f64,
    /// Departure base id
    #[arg(long)]
    pub from: i64,
    /// Arrival base id
    #[arg(long)]
    pub to: i64,
    /// Free-text remarks
    #[arg(long, default_value = "")]
    pub remarks: String,
}

/// Telemetry commands.
#[derive(Debug, Subcommand)]
pub enum TelemetryCommand {
    /// Record a telemetry sample
    Record {
        /// Flight id
        flight: i64,
        /// Sample time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Altitude in feet
        #[arg(long)]
        altitude: f64,
        /// Ground speed in knots
        #[arg(long)]
        speed: f64,
        /// Engine temperature
        #[arg(long, default_value = "0")]
        engine_temp: f64,
        /// Fuel remaining
        #[arg(long, default_value = "0")]
        fuel_level: f64,
        /// Heading in degrees
        #[arg(long, default_value = "0")]
        heading: f64,
    },

    /// List a flight's samples, oldest first
    List {
        /// Flight id
        flight: i64,
        /// Maximum number of samples
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Audit ledger commands.
#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// List ledger entries, newest first
    List {
        /// Only entries recorded by this username
        #[arg(short, long)]
        user: Option<String>,
        /// Only entries about this entity type (requires --id)
        #[arg(short, long, requires = "id")]
        entity: Option<String>,
        /// Entity id for --entity
        #[arg(long)]
        id: Option<i64>,
        /// Maximum number of entries
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Replay the checksum chain
    Verify {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Arguments for commands that only toggle JSON output.
#[derive(Debug, Args)]
pub struct JsonArgs {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Aircraft status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Ready for tasking
    Available,
    /// Flying a mission
    InMission,
    /// Grounded for maintenance
    InMaintenance,
}

impl From<StatusArg> for AircraftStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Available => Self::Available,
            StatusArg::InMission => Self::InMission,
            StatusArg::InMaintenance => Self::InMaintenance,
        }
    }
}

/// Account role argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Full access
    Admin,
    /// Flight logging
    FlightOps,
    /// Maintenance logging
    Maintenance,
    /// Read access including the ledger
    Commander,
    /// Ledger review
    Auditor,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::FlightOps => Self::FlightOps,
            RoleArg::Maintenance => Self::Maintenance,
            RoleArg::Commander => Self::Commander,
            RoleArg::Auditor => Self::Auditor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_arg_conversion() {
        assert_eq!(
            AircraftStatus::from(StatusArg::InMaintenance),
            AircraftStatus::InMaintenance
        );
        assert_eq!(
            AircraftStatus::from(StatusArg::Available),
            AircraftStatus::Available
        );
    }

    #[test]
    fn test_role_arg_conversion() {
        assert_eq!(Role::from(RoleArg::FlightOps), Role::FlightOps);
        assert_eq!(Role::from(RoleArg::Auditor), Role::Auditor);
    }

    #[test]
    fn test_role_arg_names_match_stored_names() {
        for arg in RoleArg::value_variants() {
            let name = arg.to_possible_value().unwrap();
            assert_eq!(name.get_name(), Role::from(*arg).as_str().replace('_', "-"));
        }
    }
}
