//! Flight logs and the telemetry samples recorded against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::text_enum;

/// Lifecycle state of a flight, derived from its timing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    /// Departed, not yet landed.
    #[default]
    Active,
    /// Actual arrival recorded.
    Completed,
}

text_enum!(MissionStatus, "mission status", {
    Active => "active",
    Completed => "completed",
});

/// A persisted flight log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Storage identifier.
    pub id: i64,
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Assigned pilot; cleared if the pilot is removed.
    pub pilot_id: Option<i64>,
    /// Pilot name captured when the flight was last written.
    pub pilot_name: String,
    /// Attached crew members.
    pub crew_ids: Vec<i64>,
    /// Free-text mission type, e.g. `Training`.
    pub mission_type: String,
    /// Derived lifecycle state.
    pub mission_status: MissionStatus,
    /// Legacy departure time, always equal to `atd`.
    pub departed_at: DateTime<Utc>,
    /// Actual time of departure.
    pub atd: DateTime<Utc>,
    /// Estimated time of arrival.
    pub eta: DateTime<Utc>,
    /// Actual time of arrival.
    pub ata: Option<DateTime<Utc>>,
    /// Hours flown.
    pub flight_hours: f64,
    /// Fuel consumed.
    pub fuel_used: f64,
    /// Departure base.
    pub departure_base_id: i64,
    /// Arrival base.
    pub arrival_base_id: i64,
    /// Free-text remarks; the dashboard scans these for delays and cancellations.
    pub remarks: String,
    /// Account that logged the flight.
    pub logged_by: Option<i64>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for a new flight.
///
/// The mission status and pilot name are never taken from the caller; both
/// are derived before the flight is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightDraft {
    /// Aircraft flown.
    pub aircraft_id: i64,
    /// Assigned pilot.
    pub pilot_id: Option<i64>,
    /// Attached crew members.
    #[serde(default)]
    pub crew_ids: Vec<i64>,
    /// Free-text mission type.
    #[serde(default)]
    pub mission_type: String,
    /// Legacy departure time, adopted as ATD when ATD is absent.
    pub departed_at: Option<DateTime<Utc>>,
    /// Actual time of departure.
    pub atd: Option<DateTime<Utc>>,
    /// Estimated time of arrival.
    pub eta: Option<DateTime<Utc>>,
    /// Actual time of arrival.
    pub ata: Option<DateTime<Utc>>,
    /// Hours flown.
    pub flight_hours: f64,
    /// Fuel consumed.
    #[serde(default)]
    pub fuel_used: f64,
    /// Departure base.
    pub departure_base_id: i64,
    /// Arrival base.
    pub arrival_base_id: i64,
    /// Free-text remarks.
    #[serde(default)]
    pub remarks: String,
}

/// A partial update to a stored flight. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPatch {
    /// New aircraft.
    pub aircraft_id: Option<i64>,
    /// New pilot.
    pub pilot_id: Option<i64>,
    /// Replacement crew list.
    pub crew_ids: Option<Vec<i64>>,
    /// New mission type.
    pub mission_type: Option<String>,
    /// New legacy departure time.
    pub departed_at: Option<DateTime<Utc>>,
    /// New actual departure.
    pub atd: Option<DateTime<Utc>>,
    /// New estimated arrival.
    pub eta: Option<DateTime<Utc>>,
    /// Actual arrival. `Some(None)` clears a recorded arrival, which puts
    /// the flight back to `active`; in JSON that is an explicit `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ata: Option<Option<DateTime<Utc>>>,
    /// New flight hours.
    pub flight_hours: Option<f64>,
    /// New fuel used.
    pub fuel_used: Option<f64>,
    /// New departure base.
    pub departure_base_id: Option<i64>,
    /// New arrival base.
    pub arrival_base_id: Option<i64>,
    /// New remarks.
    pub remarks: Option<String>,
}

impl FlightPatch {
    /// A patch that only records the actual arrival.
    #[must_use]
    pub fn arrival(ata: DateTime<Utc>) -> Self {
        Self {
            ata: Some(Some(ata)),
            ..Self::default()
        }
    }

    /// A patch that removes a recorded arrival.
    #[must_use]
    pub fn clear_arrival() -> Self {
        Self {
            ata: Some(None),
            ..Self::default()
        }
    }
}

/// A field that is present in the input, even as `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

/// A point-in-time telemetry reading for a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Storage identifier.
    pub id: i64,
    /// Flight the reading belongs to.
    pub flight_id: i64,
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
    /// Altitude in feet.
    pub altitude: f64,
    /// Ground speed in knots.
    pub speed: f64,
    /// Engine temperature.
    pub engine_temp: f64,
    /// Fuel remaining.
    pub fuel_level: f64,
    /// Heading in degrees.
    pub heading: f64,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// Fields for recording a telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTelemetrySample {
    /// Flight the reading belongs to.
    pub flight_id: i64,
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
    /// Altitude in feet.
    pub altitude: f64,
    /// Ground speed in knots.
    pub speed: f64,
    /// Engine temperature.
    pub engine_temp: f64,
    /// Fuel remaining.
    pub fuel_level: f64,
    /// Heading in degrees.
    pub heading: f64,
}

impl NewTelemetrySample {
    /// Check that every reading is a non-negative number.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming each negative or NaN reading.
    pub fn validate(&self) -> crate::Result<()> {
        let mut errors = crate::error::ValidationErrors::new();
        for (field, value) in [
            ("altitude", self.altitude),
            ("speed", self.speed),
            ("engine_temp", self.engine_temp),
            ("fuel_level", self.fuel_level),
            ("heading", self.heading),
        ] {
            if value.is_nan() || value < 0.0 {
                errors.add(field, "Ensure this value is greater than or equal to 0.");
            }
        }
        errors.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> NewTelemetrySample {
        NewTelemetrySample {
            flight_id: 1,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            altitude: 12_000.0,
            speed: 320.0,
            engine_temp: 640.0,
            fuel_level: 71.5,
            heading: 270.0,
        }
    }

    #[test]
    fn test_telemetry_validate_accepts_zero() {
        let mut reading = sample();
        reading.altitude = 0.0;
        reading.speed = 0.0;
        assert!(reading.validate().is_ok());
    }

    #[test]
    fn test_telemetry_validate_rejects_negative() {
        let mut reading = sample();
        reading.speed = -1.0;
        reading.heading = f64::NAN;

        let err = reading.validate().unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.has_field("speed"));
        assert!(errors.has_field("heading"));
    }

    #[test]
    fn test_arrival_patch_only_sets_ata() {
        let ata = Utc.with_ymd_and_hms(2026, 3, 1, 11, 0, 0).unwrap();
        let patch = FlightPatch::arrival(ata);
        assert_eq!(patch.ata, Some(Some(ata)));
        assert!(patch.atd.is_none());
        assert!(patch.flight_hours.is_none());
    }

    #[test]
    fn test_patch_null_ata_means_clear() {
        let patch: FlightPatch = serde_json::from_str(r#"{"ata": null}"#).unwrap();
        assert_eq!(patch, FlightPatch::clear_arrival());

        let patch: FlightPatch = serde_json::from_str(r#"{"remarks": "ok"}"#).unwrap();
        assert!(patch.ata.is_none());
    }

    #[test]
    fn test_mission_status_serde_name() {
        let json = serde_json::to_string(&MissionStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
