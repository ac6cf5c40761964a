//! Read-only operational rollups for the live dashboard.
//!
//! Everything here is recomputed from storage on demand; nothing is cached or
//! written. "Today" is the UTC calendar day containing the instant passed to
//! [`collect`].

use chrono::{DateTime, Duration, NaiveTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{AircraftStatus, FlightRecord, MissionStatus, TelemetrySample};
use crate::storage::{fleet, flights, maintenance, Storage};

/// Default remark patterns that mark a flight as delayed.
pub const DEFAULT_DELAY_PATTERNS: &[&str] = &["(?i)delay|late"];

/// Default remark patterns that mark a flight as cancelled.
pub const DEFAULT_CANCEL_PATTERNS: &[&str] = &["(?i)cancel"];

/// Speed of sound used for the Mach readout, in knots.
const MACH_ONE_KNOTS: f64 = 661.0;

/// Compiled remark classifiers.
#[derive(Debug, Clone)]
pub struct RemarkPatterns {
    delay: Vec<Regex>,
    cancel: Vec<Regex>,
}

impl RemarkPatterns {
    /// Compile delay and cancel patterns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first invalid pattern.
    pub fn new<S: AsRef<str>>(delay: &[S], cancel: &[S]) -> Result<Self> {
        Ok(Self {
            delay: compile(delay)?,
            cancel: compile(cancel)?,
        })
    }

    /// Whether the remarks report a delay.
    #[must_use]
    pub fn is_delayed(&self, remarks: &str) -> bool {
        self.delay.iter().any(|r| r.is_match(remarks))
    }

    /// Whether the remarks report a cancellation.
    #[must_use]
    pub fn is_cancelled(&self, remarks: &str) -> bool {
        self.cancel.iter().any(|r| r.is_match(remarks))
    }
}

impl Default for RemarkPatterns {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            cancel: DEFAULT_CANCEL_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p.as_ref()).map_err(|e| Error::ConfigValidation {
                message: format!("invalid remark pattern {:?}: {e}", p.as_ref()),
            })
        })
        .collect()
}

/// Knobs for [`collect`].
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    /// Remark classifiers.
    pub patterns: RemarkPatterns,
    /// How many aircraft to rank by utilization.
    pub utilization_limit: usize,
    /// How many samples the altitude trend shows.
    pub trend_points: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            patterns: RemarkPatterns::default(),
            utilization_limit: 5,
            trend_points: 18,
        }
    }
}

/// Counts over today's flights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlightSummary {
    /// Flights departing today.
    pub flights_today: usize,
    /// Of those, still active.
    pub active: usize,
    /// Of those, completed.
    pub completed: usize,
    /// Of those, with delay remarks.
    pub delayed: usize,
    /// Of those, with cancel remarks.
    pub cancelled: usize,
    /// Completed and not cancelled.
    pub landed: usize,
    /// Departing later than now and not cancelled.
    pub scheduled: usize,
}

impl FlightSummary {
    /// Tally `flights`, which should all depart today.
    #[must_use]
    pub fn tally(flights: &[FlightRecord], now: DateTime<Utc>, patterns: &RemarkPatterns) -> Self {
        let mut summary = Self {
            flights_today: flights.len(),
            ..Self::default()
        };

        for flight in flights {
            let cancelled = patterns.is_cancelled(&flight.remarks);
            match flight.mission_status {
                MissionStatus::Active => summary.active += 1,
                MissionStatus::Completed => summary.completed += 1,
            }
            if patterns.is_delayed(&flight.remarks) {
                summary.delayed += 1;
            }
            if cancelled {
                summary.cancelled += 1;
            }
            if flight.departed_at > now && !cancelled {
                summary.scheduled += 1;
            }
        }

        summary.landed = summary.completed.saturating_sub(summary.cancelled);
        summary
    }

    /// Share of today's flights neither delayed nor cancelled, as a
    /// percentage rounded to one decimal. 100.0 with no flights.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn on_time_rate(&self) -> f64 {
        if self.flights_today == 0 {
            return 100.0;
        }
        let on_time = self
            .flights_today
            .saturating_sub(self.delayed)
            .saturating_sub(self.cancelled);
        let rate = on_time as f64 / self.flights_today as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }
}

/// Summed flight hours for one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utilization {
    /// Tail number.
    pub aircraft: String,
    /// Total hours flown.
    pub hours: f64,
}

/// Today's flights by display bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusDistribution {
    /// Active.
    pub airborne: usize,
    /// Completed, not cancelled.
    pub landed: usize,
    /// Not yet departed.
    pub scheduled: usize,
    /// Delay remarks.
    pub delayed: usize,
    /// Cancel remarks.
    pub cancelled: usize,
}

impl From<&FlightSummary> for StatusDistribution {
    fn from(summary: &FlightSummary) -> Self {
        Self {
            airborne: summary.active,
            landed: summary.landed,
            scheduled: summary.scheduled,
            delayed: summary.delayed,
            cancelled: summary.cancelled,
        }
    }
}

/// Readout from the newest telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveFeed {
    /// Ground speed, rounded.
    pub speed_knots: i64,
    /// Altitude, rounded.
    pub altitude_feet: i64,
    /// Altitude in hundreds of feet, e.g. `FL350`.
    pub flight_level: String,
    /// Speed over Mach 1, two decimals.
    pub mach: f64,
    /// Sample time as `hh:mm:ss AM`.
    pub updated_time: String,
}

impl LiveFeed {
    /// Readout for `sample`, or an all-zero readout stamped `now`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_sample(sample: Option<&TelemetrySample>, now: DateTime<Utc>) -> Self {
        let Some(sample) = sample else {
            return Self {
                speed_knots: 0,
                altitude_feet: 0,
                flight_level: "FL000".to_string(),
                mach: 0.0,
                updated_time: clock(now),
            };
        };

        Self {
            speed_knots: sample.speed.round() as i64,
            altitude_feet: sample.altitude.round() as i64,
            flight_level: format!("FL{:03}", (sample.altitude / 100.0).round() as i64),
            mach: (sample.speed / MACH_ONE_KNOTS * 100.0).round() / 100.0,
            updated_time: clock(sample.recorded_at),
        }
    }
}

fn clock(time: DateTime<Utc>) -> String {
    time.format("%I:%M:%S %p").to_string()
}

/// One point on the altitude chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Sample time as `HH:MM`.
    pub time: String,
    /// Altitude in feet.
    pub altitude: f64,
}

impl From<&TelemetrySample> for TrendPoint {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            time: sample.recorded_at.format("%H:%M").to_string(),
            altitude: sample.altitude,
        }
    }
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    /// Aircraft with `available` status.
    pub aircraft_available: i64,
    /// Flights departing today.
    pub flights_today: usize,
    /// Today's flights still active.
    pub active_missions: usize,
    /// Percentage of today's flights on time.
    pub on_time_departure_rate: f64,
    /// Today's flights with delay remarks.
    pub delayed_arrivals: usize,
    /// Today's flights with cancel remarks.
    pub cancelled_flights: usize,
    /// Unresolved maintenance alerts.
    pub maintenance_alerts: i64,
    /// Crew available for tasking.
    pub crew_availability: i64,
    /// Aircraft ranked by hours flown.
    pub aircraft_utilization: Vec<Utilization>,
    /// Today's flights by bucket.
    pub status_distribution: StatusDistribution,
    /// Newest telemetry readout.
    pub live_feed: LiveFeed,
    /// Altitude samples for the newest sample's flight, oldest first.
    pub altitude_trend: Vec<TrendPoint>,
    /// When these metrics were computed.
    pub last_updated: DateTime<Utc>,
}

/// Compute the dashboard as of `now`.
///
/// # Errors
///
/// Returns an error if any underlying query fails.
pub fn collect(
    storage: &Storage,
    now: DateTime<Utc>,
    settings: &DashboardSettings,
) -> Result<DashboardMetrics> {
    let conn = storage.conn();

    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let today = flights::list_departed_between(conn, day_start, day_start + Duration::days(1))?;
    let summary = FlightSummary::tally(&today, now, &settings.patterns);

    let aircraft_utilization = flights::utilization(conn, settings.utilization_limit)?
        .into_iter()
        .map(|(aircraft, hours)| Utilization { aircraft, hours })
        .collect();

    let latest = flights::latest_telemetry(conn)?;
    let altitude_trend = match &latest {
        Some(sample) => flights::telemetry_for_flight(conn, sample.flight_id, settings.trend_points)?
            .iter()
            .map(TrendPoint::from)
            .collect(),
        None => Vec::new(),
    };

    Ok(DashboardMetrics {
        aircraft_available: fleet::count_aircraft_with_status(conn, AircraftStatus::Available)?,
        flights_today: summary.flights_today,
        active_missions: summary.active,
        on_time_departure_rate: summary.on_time_rate(),
        delayed_arrivals: summary.delayed,
        cancelled_flights: summary.cancelled,
        maintenance_alerts: maintenance::count_open_alerts(conn)?,
        crew_availability: fleet::count_available_crew(conn)?,
        aircraft_utilization,
        status_distribution: StatusDistribution::from(&summary),
        live_feed: LiveFeed::from_sample(latest.as_ref(), now),
        altitude_trend,
        last_updated: now,
    })
}
