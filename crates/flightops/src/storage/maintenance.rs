//! Maintenance logs and threshold alerts.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use super::{date_at, delete_error, format_date, format_time, sql_limit, time_at};
use crate::alerts::{AlertDecision, AlertOutcome, AlertTemplate};
use crate::error::Result;
use crate::model::{Alert, MaintenanceRecord, NewMaintenanceRecord};

const RECORD_COLUMNS: &str = "id, aircraft_id, total_flight_hours, last_service_date, \
     component_status, notes, recorded_by, created_at";

const ALERT_COLUMNS: &str = "id, aircraft_id, maintenance_record_id, title, message, severity, \
     is_resolved, recipient_role, created_at";

// === Records ===

/// Insert a maintenance log.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_record(
    conn: &Connection,
    record: &NewMaintenanceRecord,
    recorded_by: Option<i64>,
    now: DateTime<Utc>,
) -> Result<MaintenanceRecord> {
    conn.execute(
        r"
        INSERT INTO maintenance_records
            (aircraft_id, total_flight_hours, last_service_date, component_status, notes,
             recorded_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ",
        params![
            record.aircraft_id,
            record.total_flight_hours,
            format_date(record.last_service_date),
            record.component_status,
            record.notes,
            recorded_by,
            format_time(&now),
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!("Inserted maintenance record {} for aircraft {}", id, record.aircraft_id);

    Ok(MaintenanceRecord {
        id,
        aircraft_id: record.aircraft_id,
        total_flight_hours: record.total_flight_hours,
        last_service_date: record.last_service_date,
        component_status: record.component_status.clone(),
        notes: record.notes.clone(),
        recorded_by,
        created_at: now,
    })
}

/// Overwrite the mutable fields of a stored log.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn update_record(conn: &Connection, record: &MaintenanceRecord) -> Result<bool> {
    let affected = conn.execute(
        r"
        UPDATE maintenance_records
        SET aircraft_id = ?1, total_flight_hours = ?2, last_service_date = ?3,
            component_status = ?4, notes = ?5
        WHERE id = ?6
        ",
        params![
            record.aircraft_id,
            record.total_flight_hours,
            format_date(record.last_service_date),
            record.component_status,
            record.notes,
            record.id,
        ],
    )?;
    Ok(affected > 0)
}

/// Point a log's alerts at another aircraft, keeping their state.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn move_alerts(conn: &Connection, record_id: i64, aircraft_id: i64) -> Result<usize> {
    let moved = conn.execute(
        "UPDATE alerts SET aircraft_id = ?1 WHERE maintenance_record_id = ?2",
        params![aircraft_id, record_id],
    )?;
    debug!("Moved {} alert(s) of log {} to aircraft {}", moved, record_id, aircraft_id);
    Ok(moved)
}

/// Delete a log and its alerts.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_record(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM maintenance_records WHERE id = ?1", [id])
        .map_err(|e| delete_error("MaintenanceLog", e))?;
    Ok(affected > 0)
}

/// Get a log by id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_record(conn: &Connection, id: i64) -> Result<Option<MaintenanceRecord>> {
    Ok(conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM maintenance_records WHERE id = ?1"),
            [id],
            row_to_record,
        )
        .optional()?)
}

/// Logs, newest first, optionally for one aircraft.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_records(
    conn: &Connection,
    aircraft_id: Option<i64>,
    limit: usize,
) -> Result<Vec<MaintenanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM maintenance_records \
         WHERE (?1 IS NULL OR aircraft_id = ?1) \
         ORDER BY created_at DESC, id DESC LIMIT ?2"
    ))?;
    let records = stmt
        .query_map(params![aircraft_id, sql_limit(limit)], row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MaintenanceRecord> {
    Ok(MaintenanceRecord {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        total_flight_hours: row.get(2)?,
        last_service_date: date_at(row, 3)?,
        component_status: row.get(4)?,
        notes: row.get(5)?,
        recorded_by: row.get(6)?,
        created_at: time_at(row, 7)?,
    })
}

// === Alerts ===

/// Apply an engine decision to the alert for one (aircraft, log) pair.
///
/// Raising inserts the alert if the pair has none and otherwise overwrites
/// it and forces it open. Clearing resolves an open alert and leaves the
/// row in place.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn apply_decision(
    conn: &Connection,
    aircraft_id: i64,
    record_id: i64,
    decision: &AlertDecision,
    now: DateTime<Utc>,
) -> Result<AlertOutcome> {
    match decision {
        AlertDecision::Raise(template) => raise(conn, aircraft_id, record_id, template, now),
        AlertDecision::Clear => clear(conn, aircraft_id, record_id),
    }
}

fn raise(
    conn: &Connection,
    aircraft_id: i64,
    record_id: i64,
    template: &AlertTemplate,
    now: DateTime<Utc>,
) -> Result<AlertOutcome> {
    let inserted = conn.execute(
        r"
        INSERT INTO alerts
            (aircraft_id, maintenance_record_id, title, message, severity, is_resolved,
             recipient_role, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)
        ON CONFLICT (aircraft_id, maintenance_record_id) DO NOTHING
        ",
        params![
            aircraft_id,
            record_id,
            template.title,
            template.message,
            template.severity,
            template.recipient_role,
            format_time(&now),
        ],
    )?;

    if inserted > 0 {
        let alert_id = conn.last_insert_rowid();
        debug!("Opened alert {} for maintenance record {}", alert_id, record_id);
        return Ok(AlertOutcome::Opened { alert_id });
    }

    let (alert_id, was_resolved): (i64, bool) = conn.query_row(
        "SELECT id, is_resolved FROM alerts WHERE aircraft_id = ?1 AND maintenance_record_id = ?2",
        params![aircraft_id, record_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    conn.execute(
        r"
        UPDATE alerts
        SET title = ?1, message = ?2, severity = ?3, recipient_role = ?4, is_resolved = 0
        WHERE id = ?5
        ",
        params![
            template.title,
            template.message,
            template.severity,
            template.recipient_role,
            alert_id,
        ],
    )?;

    if was_resolved {
        warn!(
            "Reopened resolved alert {} for maintenance record {}",
            alert_id, record_id
        );
        Ok(AlertOutcome::Reopened { alert_id })
    } else {
        Ok(AlertOutcome::Refreshed { alert_id })
    }
}

fn clear(conn: &Connection, aircraft_id: i64, record_id: i64) -> Result<AlertOutcome> {
    let open: Option<i64> = conn
        .query_row(
            "SELECT id FROM alerts \
             WHERE aircraft_id = ?1 AND maintenance_record_id = ?2 AND is_resolved = 0",
            params![aircraft_id, record_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(alert_id) = open else {
        return Ok(AlertOutcome::Unchanged);
    };

    conn.execute("UPDATE alerts SET is_resolved = 1 WHERE id = ?1", [alert_id])?;
    debug!("Resolved alert {} for maintenance record {}", alert_id, record_id);
    Ok(AlertOutcome::Resolved { alert_id })
}

/// The alert for one pair, if any.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn find_alert(conn: &Connection, aircraft_id: i64, record_id: i64) -> Result<Option<Alert>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {ALERT_COLUMNS} FROM alerts \
                 WHERE aircraft_id = ?1 AND maintenance_record_id = ?2"
            ),
            params![aircraft_id, record_id],
            row_to_alert,
        )
        .optional()?)
}

/// Alerts, newest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_alerts(
    conn: &Connection,
    open_only: bool,
    recipient_role: Option<&str>,
) -> Result<Vec<Alert>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALERT_COLUMNS} FROM alerts \
         WHERE (?1 = 0 OR is_resolved = 0) AND (?2 IS NULL OR recipient_role = ?2) \
         ORDER BY created_at DESC, id DESC"
    ))?;
    let alerts = stmt
        .query_map(params![open_only, recipient_role], row_to_alert)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(alerts)
}

/// Number of unresolved alerts.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn count_open_alerts(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM alerts WHERE is_resolved = 0",
        [],
        |row| row.get(0),
    )?)
}

fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        aircraft_id: row.get(1)?,
        maintenance_record_id: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        severity: row.get(5)?,
        is_resolved: row.get(6)?,
        recipient_role: row.get(7)?,
        created_at: time_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::alerts::{evaluate, DEFAULT_RECIPIENT_ROLE};
    use crate::model::Severity;
    use crate::storage::test_support::*;
    use crate::Storage;

    fn log(storage: &mut Storage, aircraft_id: i64, hours: f64) -> MaintenanceRecord {
        let new = NewMaintenanceRecord {
            aircraft_id,
            total_flight_hours: hours,
            last_service_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            component_status: "nominal".to_string(),
            notes: String::new(),
        };
        storage
            .write(|tx| insert_record(tx, &new, None, at(2, 9)))
            .unwrap()
    }

    fn decide(storage: &mut Storage, record: &MaintenanceRecord) -> AlertOutcome {
        let decision = evaluate(
            "GAF-002",
            record.total_flight_hours,
            100.0,
            DEFAULT_RECIPIENT_ROLE,
        );
        storage
            .write(|tx| apply_decision(tx, record.aircraft_id, record.id, &decision, at(2, 9)))
            .unwrap()
    }

    #[test]
    fn test_record_round_trip() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let record = log(&mut storage, seed.aircraft, 42.5);

        let loaded = storage.maintenance_record(record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(storage.maintenance_records(Some(seed.aircraft), 10).unwrap().len(), 1);
        assert!(storage.maintenance_records(Some(999), 10).unwrap().is_empty());
    }

    #[test]
    fn test_raise_opens_then_refreshes() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let record = log(&mut storage, seed.aircraft, 120.0);

        let first = decide(&mut storage, &record);
        assert!(matches!(first, AlertOutcome::Opened { .. }));

        let second = decide(&mut storage, &record);
        assert_eq!(second, AlertOutcome::Refreshed { alert_id: first.alert_id().unwrap() });

        let alerts = storage.alerts(false, None).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::High);
        assert!(!alerts[0].is_resolved);
    }

    #[test]
    fn test_clear_resolves_without_deleting() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let mut record = log(&mut storage, seed.aircraft, 120.0);
        decide(&mut storage, &record);

        record.total_flight_hours = 80.0;
        let outcome = decide(&mut storage, &record);
        assert!(matches!(outcome, AlertOutcome::Resolved { .. }));

        let alert = storage.alert_for(seed.aircraft, record.id).unwrap().unwrap();
        assert!(alert.is_resolved);
        assert!(storage.alerts(true, None).unwrap().is_empty());

        assert_eq!(decide(&mut storage, &record), AlertOutcome::Unchanged);
    }

    #[test]
    fn test_raise_reopens_resolved_alert() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let mut record = log(&mut storage, seed.aircraft, 120.0);
        let opened = decide(&mut storage, &record);

        record.total_flight_hours = 50.0;
        decide(&mut storage, &record);
        record.total_flight_hours = 130.0;
        let reopened = decide(&mut storage, &record);

        assert_eq!(
            reopened,
            AlertOutcome::Reopened {
                alert_id: opened.alert_id().unwrap()
            }
        );
        let alert = storage.alert_for(seed.aircraft, record.id).unwrap().unwrap();
        assert!(!alert.is_resolved);
        assert!(alert.message.contains("recorded 130.0 flight hours"));
    }

    #[test]
    fn test_clear_without_alert_is_unchanged() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let record = log(&mut storage, seed.aircraft, 10.0);
        assert_eq!(decide(&mut storage, &record), AlertOutcome::Unchanged);
        assert!(storage.alert_for(seed.aircraft, record.id).unwrap().is_none());
    }

    #[test]
    fn test_list_alerts_by_role() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let record = log(&mut storage, seed.aircraft, 150.0);
        decide(&mut storage, &record);

        assert_eq!(storage.alerts(true, Some("maintenance")).unwrap().len(), 1);
        assert!(storage.alerts(true, Some("commander")).unwrap().is_empty());
        assert_eq!(count_open_alerts(storage.conn()).unwrap(), 1);
    }

    #[test]
    fn test_delete_record_cascades_to_alert() {
        let mut storage = create_test_storage();
        let seed = seed(&mut storage);
        let record = log(&mut storage, seed.aircraft, 150.0);
        decide(&mut storage, &record);

        assert!(storage.write(|tx| delete_record(tx, record.id)).unwrap());
        assert!(storage.alerts(false, None).unwrap().is_empty());
    }
}
