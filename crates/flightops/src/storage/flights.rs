//! Flight logs, their crew links, and telemetry samples.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{format_time, optional_time_at, sql_limit, time_at};
use crate::error::Result;
use crate::mission::ResolvedFlight;
use crate::model::{FlightRecord, NewTelemetrySample, TelemetrySample};

const FLIGHT_COLUMNS: &str = "id, aircraft_id, pilot_id, pilot_name, mission_type, \
     mission_status, departed_at, atd, eta, ata, flight_hours, fuel_used, departure_base_id, \
     arrival_base_id, remarks, logged_by, created_at, updated_at";

const TELEMETRY_COLUMNS: &str =
    "id, flight_id, recorded_at, altitude, speed, engine_temp, fuel_level, heading, created_at";

// === Flights ===

/// Insert a derived flight and its crew links.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_flight(
    conn: &Connection,
    flight: &ResolvedFlight,
    logged_by: Option<i64>,
    now: DateTime<Utc>,
) -> Result<FlightRecord> {
    let now_text = format_time(&now);
    conn.execute(
        r"
        INSERT INTO flights
            (aircraft_id, pilot_id, pilot_name, mission_type, mission_status, departed_at,
             atd, eta, ata, flight_hours, fuel_used, departure_base_id, arrival_base_id,
             remarks, logged_by, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
        ",
        params![
            flight.aircraft_id,
            flight.pilot_id,
            flight.pilot_name,
            flight.mission_type,
            flight.mission_status,
            format_time(&flight.departed_at),
            format_time(&flight.atd),
            format_time(&flight.eta),
            flight.ata.as_ref().map(format_time),
            flight.flight_hours,
            flight.fuel_used,
            flight.departure_base_id,
            flight.arrival_base_id,
            flight.remarks,
            logged_by,
            now_text,
        ],
    )?;

    let id = conn.last_insert_rowid();
    replace_crew(conn, id, &flight.crew_ids)?;
    debug!("Inserted flight {} ({})", id, flight.mission_status);

    Ok(record_from(id, flight, logged_by, now, now))
}

/// Overwrite a stored flight with freshly derived values.
///
/// Returns the stored record, or `None` if the flight does not exist.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn update_flight(
    conn: &Connection,
    id: i64,
    flight: &ResolvedFlight,
    now: DateTime<Utc>,
) -> Result<Option<FlightRecord>> {
    let affected = conn.execute(
        r"
        UPDATE flights SET
            aircraft_id = ?1, pilot_id = ?2, pilot_name = ?3, mission_type = ?4,
            mission_status = ?5, departed_at = ?6, atd = ?7, eta = ?8, ata = ?9,
            flight_hours = ?10, fuel_used = ?11, departure_base_id = ?12,
            arrival_base_id = ?13, remarks = ?14, updated_at = ?15
        WHERE id = ?16
        ",
        params![
            flight.aircraft_id,
            flight.pilot_id,
            flight.pilot_name,
            flight.mission_type,
            flight.mission_status,
            format_time(&flight.departed_at),
            format_time(&flight.atd),
            format_time(&flight.eta),
            flight.ata.as_ref().map(format_time),
            flight.flight_hours,
            flight.fuel_used,
            flight.departure_base_id,
            flight.arrival_base_id,
            flight.remarks,
            format_time(&now),
            id,
        ],
    )?;
    if affected == 0 {
        return Ok(None);
    }

    replace_crew(conn, id, &flight.crew_ids)?;
    get_flight(conn, id)
}

fn replace_crew(conn: &Connection, flight_id: i64, crew_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM flight_crew WHERE flight_id = ?1", [flight_id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO flight_crew (flight_id, crew_id) VALUES (?1, ?2)")?;
    for crew_id in crew_ids {
        stmt.execute(params![flight_id, crew_id])?;
    }
    Ok(())
}

fn crew_of(conn: &Connection, flight_id: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT crew_id FROM flight_crew WHERE flight_id = ?1 ORDER BY crew_id")?;
    let ids = stmt
        .query_map([flight_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn record_from(
    id: i64,
    flight: &ResolvedFlight,
    logged_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> FlightRecord {
    let mut crew_ids = flight.crew_ids.clone();
    crew_ids.sort_unstable();
    crew_ids.dedup();

    FlightRecord {
        id,
        aircraft_id: flight.aircraft_id,
        pilot_id: flight.pilot_id,
        pilot_name: flight.pilot_name.clone(),
        crew_ids,
        mission_type: flight.mission_type.clone(),
        mission_status: flight.mission_status,
        departed_at: flight.departed_at,
        atd: flight.atd,
        eta: flight.eta,
        ata: flight.ata,
        flight_hours: flight.flight_hours,
        fuel_used: flight.fuel_used,
        departure_base_id: flight.departure_base_id,
        arrival_base_id: flight.arrival_base_id,
        remarks: flight.remarks.clone(),
        logged_by,
        created_at,
        updated_at,
    }
}

/// Delete a flight, its crew links, and its telemetry.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_flight(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM flights WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

/// Get a flight with its crew links.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_flight(conn: &Connection, id: i64) -> Result<Option<FlightRecord>> {
    let flight = conn
        .query_row(
            &format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = ?1"),
            [id],
            row_to_flight,
        )
        .optional()?;
    flight.map(|f| with_crew(conn, f)).transpose()
}

/// Most recent flights by departure, newest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<FlightRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FLIGHT_COLUMNS} FROM flights ORDER BY departed_at DESC, id DESC LIMIT ?1"
    ))?;
    let flights = stmt
        .query_map([sql_limit(limit)], row_to_flight)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    flights.into_iter().map(|f| with_crew(conn, f)).collect()
}

/// Flights whose departure falls in `[start, end)`, oldest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_departed_between(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<FlightRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FLIGHT_COLUMNS} FROM flights \
         WHERE departed_at >= ?1 AND departed_at < ?2 ORDER BY departed_at, id"
    ))?;
    let flights = stmt
        .query_map(
            params![format_time(&start), format_time(&end)],
            row_to_flight,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(flights)
}

/// Aircraft ranked by summed flight hours, highest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn utilization(conn: &Connection, limit: usize) -> Result<Vec<(String, f64)>> {
    let mut stmt = conn.prepare(
        r"
        SELECT a.tail_number, COALESCE(SUM(f.flight_hours), 0.0) AS total_hours
        FROM flights f JOIN aircraft a ON a.id = f.aircraft_id
        GROUP BY a.id
        ORDER BY total_hours DESC, a.tail_number ASC
        LIMIT ?1
        ",
    )?;
    let rows = stmt
        .query_map([sql_limit(limit)], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn with_crew(conn: &Connection, mut flight: FlightRecord) -> Result<FlightRecord> {
    flight.crew_ids = crew_of(conn, flight.id)?;
    Ok(flight)
}

fn row_to_flight(row: &Row<'_>) -> rusqlite::Result<FlightRecord> {
    Ok(FlightRecord {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        pilot_id: row.get(2)?,
        pilot_name: row.get(3)?,
        crew_ids: Vec::new(),
        mission_type: row.get(4)?,
        mission_status: row.get(5)?,
        departed_at: time_at(row, 6)?,
        atd: time_at(row, 7)?,
        eta: time_at(row, 8)?,
        ata: optional_time_at(row, 9)?,
        flight_hours: row.get(10)?,
        fuel_used: row.get(11)?,
        departure_base_id: row.get(12)?,
        arrival_base_id: row.get(13)?,
        remarks: row.get(14)?,
        logged_by: row.get(15)?,
        created_at: time_at(row, 16)?,
        updated_at: time_at(row, 17)?,
    })
}

// === Telemetry ===

/// Insert a telemetry sample.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_telemetry(
    conn: &Connection,
    sample: &NewTelemetrySample,
    now: DateTime<Utc>,
) -> Result<TelemetrySample> {
    conn.execute(
        r"
        INSERT INTO telemetry
            (flight_id, recorded_at, altitude, speed, engine_temp, fuel_level, heading, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            sample.flight_id,
            format_time(&sample.recorded_at),
            sample.altitude,
            sample.speed,
            sample.engine_temp,
            sample.fuel_level,
            sample.heading,
            format_time(&now),
        ],
    )?;

    Ok(TelemetrySample {
        id: conn.last_insert_rowid(),
        flight_id: sample.flight_id,
        recorded_at: sample.recorded_at,
        altitude: sample.altitude,
        speed: sample.speed,
        engine_temp: sample.engine_temp,
        fuel_level: sample.fuel_level,
        heading: sample.heading,
        created_at: now,
    })
}

/// Overwrite a sample's readings.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn update_telemetry(conn: &Connection, id: i64, sample: &NewTelemetrySample) -> Result<bool> {
    let affected = conn.execute(
        r"
        UPDATE telemetry SET
            flight_id = ?1, recorded_at = ?2, altitude = ?3, speed = ?4,
            engine_temp = ?5, fuel_level = ?6, heading = ?7
        WHERE id = ?8
        ",
        params![
            sample.flight_id,
            format_time(&sample.recorded_at),
            sample.altitude,
            sample.speed,
            sample.engine_temp,
            sample.fuel_level,
            sample.heading,
            id,
        ],
    )?;
    Ok(affected > 0)
}

/// Delete a sample.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_telemetry(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM telemetry WHERE id = ?1", [id])?;
    Ok(affected > 0)
}

/// Get a sample by id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_telemetry(conn: &Connection, id: i64) -> Result<Option<TelemetrySample>> {
    Ok(conn
        .query_row(
            &format!("SELECT {TELEMETRY_COLUMNS} FROM telemetry WHERE id = ?1"),
            [id],
            row_to_sample,
        )
        .optional()?)
}

/// The most recently taken sample across all flights.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn latest_telemetry(conn: &Connection) -> Result<Option<TelemetrySample>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {TELEMETRY_COLUMNS} FROM telemetry \
                 ORDER BY recorded_at DESC, id DESC LIMIT 1"
            ),
            [],
            row_to_sample,
        )
        .optional()?)
}

/// The first `limit` samples of one flight, oldest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn telemetry_for_flight(
    conn: &Connection,
    flight_id: i64,
    limit: usize,
) -> Result<Vec<TelemetrySample>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TELEMETRY_COLUMNS} FROM telemetry WHERE flight_id = ?1 \
         ORDER BY recorded_at ASC, id ASC LIMIT ?2"
    ))?;
    let samples = stmt
        .query_map(params![flight_id, sql_limit(limit)], row_to_sample)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(samples)
}

fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<TelemetrySample> {
    Ok(TelemetrySample {
        id: row.get(0)?,
        flight_id: row.get(1)?,
        recorded_at: time_at(row, 2)?,
        altitude: row.get(3)?,
        speed: row.get(4)?,
        engine_temp: row.get(5)?,
        fuel_level: row.get(6)?,
        heading: row.get(7)?,
        created_at: time_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::{derive, FlightFields};
    use crate::model::{FlightDraft, MissionStatus, NewCrew};
    use crate::storage::fleet;
    use crate::storage::test_support::*;
    use crate::Storage;

    fn resolved(storage: &Storage, seed: &Seed, day: u32, hours: f64) -> ResolvedFlight {
        let draft = FlightDraft {
            aircraft_id: seed.aircraft,
            pilot_id: Some(seed.pilot),
            mission_type: "Patrol".to_string(),
            atd: Some(at(day, 8)),
            eta: Some(at(day, 10)),
            flight_hours: hours,
            departure_base_id: seed.accra,
            arrival_base_id: seed.tamale,
            ..FlightDraft::default()
        };
        let pilot = storage.pilot(seed.pilot).unwrap();
        derive(FlightFields::from_draft(&draft), pilot.as_ref(), "").unwrap()
    }

    fn sample(flight_id: i64, hour: u32, altitude: f64) -> NewTelemetrySample {
        NewTelemetrySample {
            flight_id,
            recorded_at: at(3, hour),
            altitude,
            speed: 300.0,
            engine_temp: 600.0,
            fuel_level: 50.0,
            heading: 90.0,
        }
    }

    #[test]
    fn test_insert_and_get_flight() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let mut flight = resolved(&storage, &seed, 3, 2.0);
        let crew = storage
            .write(|tx| {
                fleet::insert_crew(
                    tx,
                    &NewCrew {
                        full_name: "Esi Mensah".to_string(),
                        rank: "Cpl".to_string(),
                        role: "Navigator".to_string(),
                    },
                )
            })
            .unwrap();
        flight.crew_ids = vec![crew, crew];

        let stored = storage
            .write(|tx| insert_flight(tx, &flight, None, at(3, 7)))
            .unwrap();
        let loaded = storage.flight(stored.id).unwrap().unwrap();

        assert_eq!(loaded, stored);
        assert_eq!(loaded.crew_ids, vec![crew]);
        assert_eq!(loaded.pilot_name, "Ama Owusu");
        assert_eq!(loaded.mission_status, MissionStatus::Active);
    }

    #[test]
    fn test_update_flight_replaces_fields() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let flight = resolved(&storage, &seed, 3, 2.0);
        let stored = storage
            .write(|tx| insert_flight(tx, &flight, None, at(3, 7)))
            .unwrap();

        let mut changed = flight.clone();
        changed.ata = Some(at(3, 10));
        changed.mission_status = MissionStatus::Completed;
        let updated = storage
            .write(|tx| update_flight(tx, stored.id, &changed, at(3, 11)))
            .unwrap()
            .unwrap();

        assert_eq!(updated.mission_status, MissionStatus::Completed);
        assert_eq!(updated.ata, Some(at(3, 10)));
        assert_eq!(updated.created_at, at(3, 7));
        assert_eq!(updated.updated_at, at(3, 11));

        let missing = storage
            .write(|tx| update_flight(tx, 999, &changed, at(3, 11)))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_pilot_delete_keeps_snapshot() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let flight = resolved(&storage, &seed, 3, 2.0);
        let stored = storage
            .write(|tx| insert_flight(tx, &flight, None, at(3, 7)))
            .unwrap();

        storage.write(|tx| fleet::delete_pilot(tx, seed.pilot)).unwrap();
        let loaded = storage.flight(stored.id).unwrap().unwrap();
        assert_eq!(loaded.pilot_id, None);
        assert_eq!(loaded.pilot_name, "Ama Owusu");
    }

    #[test]
    fn test_departed_between_and_utilization() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        for (day, hours) in [(3, 2.0), (3, 1.5), (4, 3.0)] {
            let flight = resolved(&storage, &seed, day, hours);
            storage
                .write(|tx| insert_flight(tx, &flight, None, at(day, 7)))
                .unwrap();
        }

        let today = list_departed_between(storage.conn(), at(3, 0), at(4, 0)).unwrap();
        assert_eq!(today.len(), 2);

        let ranked = utilization(storage.conn(), 5).unwrap();
        assert_eq!(ranked, vec![("GAF-002".to_string(), 6.5)]);
    }

    #[test]
    fn test_telemetry_latest_and_trend() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let flight = resolved(&storage, &seed, 3, 2.0);
        let stored = storage
            .write(|tx| insert_flight(tx, &flight, None, at(3, 7)))
            .unwrap();

        storage
            .write(|tx| {
                insert_telemetry(tx, &sample(stored.id, 10, 9000.0), at(3, 10))?;
                insert_telemetry(tx, &sample(stored.id, 8, 1000.0), at(3, 10))?;
                insert_telemetry(tx, &sample(stored.id, 9, 5000.0), at(3, 10))
            })
            .unwrap();

        let latest = latest_telemetry(storage.conn()).unwrap().unwrap();
        assert!((latest.altitude - 9000.0).abs() < f64::EPSILON);

        let trend = storage.telemetry_for(stored.id, 2).unwrap();
        let altitudes: Vec<f64> = trend.iter().map(|s| s.altitude).collect();
        assert_eq!(altitudes, vec![1000.0, 5000.0]);
    }

    #[test]
    fn test_flight_delete_cascades_to_telemetry() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let flight = resolved(&storage, &seed, 3, 2.0);
        let stored = storage
            .write(|tx| insert_flight(tx, &flight, None, at(3, 7)))
            .unwrap();
        let reading = storage
            .write(|tx| insert_telemetry(tx, &sample(stored.id, 9, 100.0), at(3, 9)))
            .unwrap();

        assert!(storage.write(|tx| delete_flight(tx, stored.id)).unwrap());
        assert!(get_telemetry(storage.conn(), reading.id).unwrap().is_none());
    }

    #[test]
    fn test_telemetry_update_and_delete() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let flight = resolved(&storage, &seed, 3, 2.0);
        let stored = storage
            .write(|tx| insert_flight(tx, &flight, None, at(3, 7)))
            .unwrap();
        let reading = storage
            .write(|tx| insert_telemetry(tx, &sample(stored.id, 9, 100.0), at(3, 9)))
            .unwrap();

        assert!(storage
            .write(|tx| update_telemetry(tx, reading.id, &sample(stored.id, 9, 200.0)))
            .unwrap());
        let loaded = get_telemetry(storage.conn(), reading.id).unwrap().unwrap();
        assert!((loaded.altitude - 200.0).abs() < f64::EPSILON);

        assert!(storage.write(|tx| delete_telemetry(tx, reading.id)).unwrap());
        assert!(!storage.write(|tx| delete_telemetry(tx, reading.id)).unwrap());
    }
}
