//! Flight mission-status derivation.
//!
//! Runs on every flight create and update, before anything is stored:
//!
//! 1. A legacy departure time is adopted as ATD when no ATD was supplied.
//! 2. On update, absent fields fall back to the stored flight.
//! 3. The merged fields are validated; every failure is reported at once.
//! 4. The pilot's current name is captured, the legacy departure time is
//!    pinned to ATD, and the status is derived from ATA.

use chrono::{DateTime, Utc};

use crate::error::{Result, ValidationErrors};
use crate::model::{FlightDraft, FlightPatch, FlightRecord, MissionStatus, Pilot};

/// Flight fields after the legacy departure time has been folded in and any
/// stored values have been merged, but before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightFields {
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Assigned pilot.
    pub pilot_id: Option<i64>,
    /// Attached crew members.
    pub crew_ids: Vec<i64>,
    /// Free-text mission type.
    pub mission_type: String,
    /// Actual departure.
    pub atd: Option<DateTime<Utc>>,
    /// Estimated arrival.
    pub eta: Option<DateTime<Utc>>,
    /// Actual arrival.
    pub ata: Option<DateTime<Utc>>,
    /// Hours flown.
    pub flight_hours: f64,
    /// Fuel consumed.
    pub fuel_used: f64,
    /// Departure base.
    pub departure_base_id: i64,
    /// Arrival base.
    pub arrival_base_id: i64,
    /// Free-text remarks.
    pub remarks: String,
}

impl FlightFields {
    /// Fields for a new flight.
    #[must_use]
    pub fn from_draft(draft: &FlightDraft) -> Self {
        Self {
            aircraft_id: draft.aircraft_id,
            pilot_id: draft.pilot_id,
            crew_ids: draft.crew_ids.clone(),
            mission_type: draft.mission_type.clone(),
            atd: draft.atd.or(draft.departed_at),
            eta: draft.eta,
            ata: draft.ata,
            flight_hours: draft.flight_hours,
            fuel_used: draft.fuel_used,
            departure_base_id: draft.departure_base_id,
            arrival_base_id: draft.arrival_base_id,
            remarks: draft.remarks.clone(),
        }
    }

    /// Fields for an update: `patch` overlaid on the stored `record`.
    #[must_use]
    pub fn merge(record: &FlightRecord, patch: &FlightPatch) -> Self {
        Self {
            aircraft_id: patch.aircraft_id.unwrap_or(record.aircraft_id),
            pilot_id: patch.pilot_id.or(record.pilot_id),
            crew_ids: patch
                .crew_ids
                .clone()
                .unwrap_or_else(|| record.crew_ids.clone()),
            mission_type: patch
                .mission_type
                .clone()
                .unwrap_or_else(|| record.mission_type.clone()),
            atd: patch.atd.or(patch.departed_at).or(Some(record.atd)),
            eta: patch.eta.or(Some(record.eta)),
            ata: patch.ata.unwrap_or(record.ata),
            flight_hours: patch.flight_hours.unwrap_or(record.flight_hours),
            fuel_used: patch.fuel_used.unwrap_or(record.fuel_used),
            departure_base_id: patch.departure_base_id.unwrap_or(record.departure_base_id),
            arrival_base_id: patch.arrival_base_id.unwrap_or(record.arrival_base_id),
            remarks: patch
                .remarks
                .clone()
                .unwrap_or_else(|| record.remarks.clone()),
        }
    }
}

/// A flight ready to be stored, with every derived field filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFlight {
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Assigned pilot.
    pub pilot_id: Option<i64>,
    /// Captured pilot name.
    pub pilot_name: String,
    /// Attached crew members.
    pub crew_ids: Vec<i64>,
    /// Free-text mission type.
    pub mission_type: String,
    /// Derived lifecycle state.
    pub mission_status: MissionStatus,
    /// Legacy departure time, equal to `atd`.
    pub departed_at: DateTime<Utc>,
    /// Actual departure.
    pub atd: DateTime<Utc>,
    /// Estimated arrival.
    pub eta: DateTime<Utc>,
    /// Actual arrival.
    pub ata: Option<DateTime<Utc>>,
    /// Hours flown.
    pub flight_hours: f64,
    /// Fuel consumed.
    pub fuel_used: f64,
    /// Departure base.
    pub departure_base_id: i64,
    /// Arrival base.
    pub arrival_base_id: i64,
    /// Free-text remarks.
    pub remarks: String,
}

/// `completed` once an actual arrival exists, `active` before.
#[must_use]
pub fn mission_status(ata: Option<DateTime<Utc>>) -> MissionStatus {
    if ata.is_some() {
        MissionStatus::Completed
    } else {
        MissionStatus::Active
    }
}

/// Validate merged flight fields.
///
/// `existing_pilot_name` is the stored snapshot on update (empty on create);
/// a flight whose pilot was removed keeps validating while it has one.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] listing every rule that failed.
pub fn validate(fields: &FlightFields, existing_pilot_name: &str) -> Result<()> {
    let mut errors = ValidationErrors::new();

    if fields.flight_hours.is_nan() || fields.flight_hours <= 0.0 {
        errors.add("flight_hours", "Flight hours must be greater than zero.");
    }
    if fields.fuel_used.is_nan() || fields.fuel_used < 0.0 {
        errors.add("fuel_used", "Fuel used cannot be negative.");
    }

    match (fields.atd, fields.eta) {
        (None, eta) => {
            errors.add("atd", "ATD is required.");
            if eta.is_none() {
                errors.add("eta", "ETA is required.");
            }
        }
        (Some(_), None) => errors.add("eta", "ETA is required."),
        (Some(atd), Some(eta)) => {
            if eta < atd {
                errors.add("eta", "ETA cannot be earlier than ATD.");
            }
        }
    }
    if let (Some(atd), Some(ata)) = (fields.atd, fields.ata) {
        if ata < atd {
            errors.add("ata", "ATA cannot be earlier than ATD.");
        }
    }

    if fields.departure_base_id == fields.arrival_base_id {
        errors.add(
            "arrival_base",
            "Departure and arrival bases must be different.",
        );
    }
    if fields.pilot_id.is_none() && existing_pilot_name.is_empty() {
        errors.add("pilot", "A pilot must be selected for the flight.");
    }

    errors.finish()
}

/// Validate `fields` and fill in the derived values.
///
/// `pilot` is the record named by `fields.pilot_id`, looked up by the caller.
/// Without one the existing snapshot is kept.
///
/// # Errors
///
/// Returns [`crate::Error::Validation`] if any rule fails.
pub fn derive(
    fields: FlightFields,
    pilot: Option<&Pilot>,
    existing_pilot_name: &str,
) -> Result<ResolvedFlight> {
    validate(&fields, existing_pilot_name)?;

    let (Some(atd), Some(eta)) = (fields.atd, fields.eta) else {
        return Err(crate::Error::internal("validated flight is missing ATD or ETA"));
    };
    let pilot_name = pilot.map_or_else(|| existing_pilot_name.to_string(), |p| p.full_name.clone());

    Ok(ResolvedFlight {
        aircraft_id: fields.aircraft_id,
        pilot_id: fields.pilot_id,
        pilot_name,
        crew_ids: fields.crew_ids,
        mission_type: fields.mission_type,
        mission_status: mission_status(fields.ata),
        departed_at: atd,
        atd,
        eta,
        ata: fields.ata,
        flight_hours: fields.flight_hours,
        fuel_used: fields.fuel_used,
        departure_base_id: fields.departure_base_id,
        arrival_base_id: fields.arrival_base_id,
        remarks: fields.remarks,
    })
}
