//! Fleet registry records: bases, aircraft, pilots, crew, and accounts.

use serde::{Deserialize, Serialize};

use super::text_enum;

/// An operating base. Aircraft are homed at a base and flights depart from
/// and arrive at bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Storage identifier.
    pub id: i64,
    /// Unique base name.
    pub name: String,
    /// Free-text location.
    pub location: String,
}

/// Fields for registering a base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBase {
    /// Unique base name.
    pub name: String,
    /// Free-text location.
    pub location: String,
}

/// Operational availability of an airframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftStatus {
    /// Ready for tasking.
    #[default]
    Available,
    /// Currently flying a mission.
    InMission,
    /// Grounded for maintenance.
    InMaintenance,
}

text_enum!(AircraftStatus, "aircraft status", {
    Available => "available",
    InMission => "in_mission",
    InMaintenance => "in_maintenance",
});

/// An airframe in the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    /// Storage identifier.
    pub id: i64,
    /// Unique registration, e.g. `GAF-002`.
    pub tail_number: String,
    /// Broad category, e.g. `Transport`.
    pub aircraft_type: String,
    /// Airframe model, e.g. `L-39`.
    pub model: String,
    /// Cumulative flight hours at which maintenance is due.
    pub maintenance_threshold_hours: f64,
    /// Current availability.
    pub status: AircraftStatus,
    /// Home base.
    pub home_base_id: i64,
}

/// Default maintenance interval for newly registered aircraft.
pub const DEFAULT_THRESHOLD_HOURS: f64 = 100.0;

/// Fields for registering an aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAircraft {
    /// Unique registration.
    pub tail_number: String,
    /// Broad category; may be empty.
    #[serde(default)]
    pub aircraft_type: String,
    /// Airframe model.
    pub model: String,
    /// Maintenance interval in flight hours, at least 1.
    #[serde(default = "default_threshold")]
    pub maintenance_threshold_hours: f64,
    /// Initial availability.
    #[serde(default)]
    pub status: AircraftStatus,
    /// Home base.
    pub home_base_id: i64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD_HOURS
}

impl NewAircraft {
    /// Registration with the default threshold and `available` status.
    #[must_use]
    pub fn new(tail_number: impl Into<String>, model: impl Into<String>, home_base_id: i64) -> Self {
        Self {
            tail_number: tail_number.into(),
            aircraft_type: String::new(),
            model: model.into(),
            maintenance_threshold_hours: DEFAULT_THRESHOLD_HOURS,
            status: AircraftStatus::Available,
            home_base_id,
        }
    }

    /// Override the maintenance threshold.
    #[must_use]
    pub fn with_threshold(mut self, hours: f64) -> Self {
        self.maintenance_threshold_hours = hours;
        self
    }

    /// The same registration with its tail number in canonical form.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            tail_number: normalize_tail_number(&self.tail_number),
            ..self.clone()
        }
    }
}

/// Canonical tail number: surrounding whitespace removed, upper case.
#[must_use]
pub fn normalize_tail_number(tail_number: &str) -> String {
    tail_number.trim().to_uppercase()
}

/// A pilot who can be assigned to flights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pilot {
    /// Storage identifier.
    pub id: i64,
    /// Display name, snapshotted onto flights.
    pub full_name: String,
    /// Rank, e.g. `Flt Lt`.
    pub rank: String,
    /// Contact details; may be empty.
    pub contact_info: String,
    /// Whether the pilot is on the active roster.
    pub is_active: bool,
}

/// Fields for adding a pilot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPilot {
    /// Display name.
    pub full_name: String,
    /// Rank.
    pub rank: String,
    /// Contact details.
    #[serde(default)]
    pub contact_info: String,
}

/// A crew member who can be attached to flights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crew {
    /// Storage identifier.
    pub id: i64,
    /// Display name.
    pub full_name: String,
    /// Rank.
    pub rank: String,
    /// Crew position, e.g. `Loadmaster`.
    pub role: String,
    /// Whether the crew member can be tasked.
    pub is_available: bool,
}

/// Fields for adding a crew member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCrew {
    /// Display name.
    pub full_name: String,
    /// Rank.
    pub rank: String,
    /// Crew position.
    pub role: String,
}

/// Account role. Determines what a caller may do; the audited write path
/// checks it before every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access.
    Admin,
    /// Flight operations officer.
    FlightOps,
    /// Maintenance officer; receives threshold alerts.
    Maintenance,
    /// Read-only command view.
    Commander,
    /// Read-only audit view.
    #[default]
    Auditor,
}

text_enum!(Role, "role", {
    Admin => "admin",
    FlightOps => "flight_ops",
    Maintenance => "maintenance",
    Commander => "commander",
    Auditor => "auditor",
});

impl Role {
    /// Register and remove bases, aircraft, pilots, and crew.
    #[must_use]
    pub fn can_manage_fleet(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Create accounts and change roles.
    #[must_use]
    pub fn can_manage_accounts(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Create and amend flight logs and telemetry.
    #[must_use]
    pub fn can_log_flights(self) -> bool {
        matches!(self, Self::Admin | Self::FlightOps)
    }

    /// Create and amend maintenance logs.
    #[must_use]
    pub fn can_log_maintenance(self) -> bool {
        matches!(self, Self::Admin | Self::Maintenance)
    }

    /// Read the audit trail.
    #[must_use]
    pub fn can_read_audit(self) -> bool {
        matches!(self, Self::Admin | Self::Commander | Self::Auditor)
    }
}

/// An authenticated principal. Appears as the actor on audit entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Storage identifier.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Current role.
    pub role: Role,
}
