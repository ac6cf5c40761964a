//! Maintenance logs and the threshold alerts derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::text_enum;
use crate::error::ValidationErrors;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Needs immediate attention.
    High,
    /// Routine.
    #[default]
    Medium,
    /// Informational.
    Low,
}

text_enum!(Severity, "severity", {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// A persisted maintenance log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    /// Storage identifier.
    pub id: i64,
    /// Aircraft serviced.
    pub aircraft_id: i64,
    /// Cumulative airframe hours at the time of the log.
    pub total_flight_hours: f64,
    /// Date of the last service.
    pub last_service_date: NaiveDate,
    /// Free-text component status.
    pub component_status: String,
    /// Free-text notes.
    pub notes: String,
    /// Account that logged the entry.
    pub recorded_by: Option<i64>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// Fields for logging maintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaintenanceRecord {
    /// Aircraft serviced.
    pub aircraft_id: i64,
    /// Cumulative airframe hours, at least 0.
    pub total_flight_hours: f64,
    /// Date of the last service.
    pub last_service_date: NaiveDate,
    /// Free-text component status.
    #[serde(default)]
    pub component_status: String,
    /// Free-text notes.
    #[serde(default)]
    pub notes: String,
}

impl NewMaintenanceRecord {
    /// Check field constraints.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the hour count is negative or NaN.
    pub fn validate(&self) -> crate::Result<()> {
        check_hours(self.total_flight_hours).finish()
    }
}

/// A partial update to a maintenance log. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenancePatch {
    /// Aircraft the log belongs to, for a log filed against the wrong one.
    pub aircraft_id: Option<i64>,
    /// New cumulative hours.
    pub total_flight_hours: Option<f64>,
    /// New service date.
    pub last_service_date: Option<NaiveDate>,
    /// New component status.
    pub component_status: Option<String>,
    /// New notes.
    pub notes: Option<String>,
}

impl MaintenancePatch {
    /// Overlay this patch on a stored record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the resulting hour count is invalid.
    pub fn apply(&self, record: &MaintenanceRecord) -> crate::Result<MaintenanceRecord> {
        let mut merged = record.clone();
        if let Some(aircraft_id) = self.aircraft_id {
            merged.aircraft_id = aircraft_id;
        }
        if let Some(hours) = self.total_flight_hours {
            merged.total_flight_hours = hours;
        }
        if let Some(date) = self.last_service_date {
            merged.last_service_date = date;
        }
        if let Some(status) = &self.component_status {
            merged.component_status.clone_from(status);
        }
        if let Some(notes) = &self.notes {
            merged.notes.clone_from(notes);
        }
        check_hours(merged.total_flight_hours).finish()?;
        Ok(merged)
    }
}

fn check_hours(hours: f64) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if hours.is_nan() || hours < 0.0 {
        errors.add(
            "total_flight_hours",
            "Ensure this value is greater than or equal to 0.",
        );
    }
    errors
}

/// A maintenance-threshold alert. At most one exists per
/// (aircraft, maintenance record) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Storage identifier.
    pub id: i64,
    /// Aircraft concerned.
    pub aircraft_id: i64,
    /// Maintenance log that raised the alert.
    pub maintenance_record_id: i64,
    /// Short headline.
    pub title: String,
    /// Operator-facing text.
    pub message: String,
    /// Severity.
    pub severity: Severity,
    /// Whether the latest log for the pair is below threshold.
    pub is_resolved: bool,
    /// Role expected to act on the alert.
    pub recipient_role: String,
    /// When the alert was first raised.
    pub created_at: DateTime<Utc>,
}
