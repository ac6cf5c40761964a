//! Storage layer for flightops.
//!
//! This module provides `SQLite`-based persistent storage for the fleet
//! registry, flight and maintenance logs, threshold alerts, and the audit
//! ledger. Reads go through [`Storage`] methods; writes go through
//! [`Storage::write`], which runs a closure inside one `BEGIN IMMEDIATE`
//! transaction so that an entity change and its ledger entry commit or roll
//! back together.

pub mod fleet;
pub mod flights;
pub mod ledger;
pub mod maintenance;
pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{ffi, Connection, OptionalExtension, Row, ToSql, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::ledger::{ActionKind, AuditEntry, ChainReport};
use crate::model::{
    Account, Aircraft, AircraftStatus, Alert, Base, Crew, FlightRecord, MaintenanceRecord,
    MissionStatus, Pilot, Role, Severity, TelemetrySample,
};

/// Default time a writer waits for the database lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Storage engine for flight operations records.
///
/// Owns a single connection. Writes take `&mut self`, so within one process
/// they are already serialized; `BEGIN IMMEDIATE` extends that to other
/// processes sharing the database file.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Like [`Storage::open`], with an explicit lock wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::configure(&conn, busy_timeout)?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        Self::configure(&conn, DEFAULT_BUSY_TIMEOUT)?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(())
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside one IMMEDIATE transaction.
    ///
    /// The write lock is held from the first statement, so the ledger tail
    /// read by `f` cannot move before commit. Any error rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or a database error from begin/commit.
    pub fn write<T>(&mut self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // === Fleet ===

    /// Get a base by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn base(&self, id: i64) -> Result<Option<Base>> {
        fleet::get_base(&self.conn, id)
    }

    /// All bases by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn bases(&self) -> Result<Vec<Base>> {
        fleet::list_bases(&self.conn)
    }

    /// Get an aircraft by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn aircraft(&self, id: i64) -> Result<Option<Aircraft>> {
        fleet::get_aircraft(&self.conn, id)
    }

    /// Get an aircraft by tail number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn aircraft_by_tail(&self, tail_number: &str) -> Result<Option<Aircraft>> {
        fleet::find_aircraft_by_tail(&self.conn, tail_number)
    }

    /// The whole fleet by tail number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn fleet(&self) -> Result<Vec<Aircraft>> {
        fleet::list_aircraft(&self.conn)
    }

    /// Get a pilot by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pilot(&self, id: i64) -> Result<Option<Pilot>> {
        fleet::get_pilot(&self.conn, id)
    }

    /// All pilots by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pilots(&self) -> Result<Vec<Pilot>> {
        fleet::list_pilots(&self.conn)
    }

    /// All crew members by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn crew(&self) -> Result<Vec<Crew>> {
        fleet::list_crew(&self.conn)
    }

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn account(&self, id: i64) -> Result<Option<Account>> {
        fleet::get_account(&self.conn, id)
    }

    /// Get an account by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        fleet::find_account(&self.conn, username)
    }

    /// All accounts by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn accounts(&self) -> Result<Vec<Account>> {
        fleet::list_accounts(&self.conn)
    }

    // === Flights ===

    /// Get a flight with its crew links.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn flight(&self, id: i64) -> Result<Option<FlightRecord>> {
        flights::get_flight(&self.conn, id)
    }

    /// Most recent flights by departure, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_flights(&self, limit: usize) -> Result<Vec<FlightRecord>> {
        flights::list_recent(&self.conn, limit)
    }

    /// Telemetry for one flight, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn telemetry_for(&self, flight_id: i64, limit: usize) -> Result<Vec<TelemetrySample>> {
        flights::telemetry_for_flight(&self.conn, flight_id, limit)
    }

    // === Maintenance ===

    /// Get a maintenance log by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn maintenance_record(&self, id: i64) -> Result<Option<MaintenanceRecord>> {
        maintenance::get_record(&self.conn, id)
    }

    /// Maintenance logs, newest first, optionally for one aircraft.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn maintenance_records(
        &self,
        aircraft_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<MaintenanceRecord>> {
        maintenance::list_records(&self.conn, aircraft_id, limit)
    }

    /// The alert for one (aircraft, maintenance log) pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn alert_for(&self, aircraft_id: i64, record_id: i64) -> Result<Option<Alert>> {
        maintenance::find_alert(&self.conn, aircraft_id, record_id)
    }

    /// Alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn alerts(&self, open_only: bool, recipient_role: Option<&str>) -> Result<Vec<Alert>> {
        maintenance::list_alerts(&self.conn, open_only, recipient_role)
    }

    // === Ledger ===

    /// Most recent ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        ledger::list_recent(&self.conn, limit)
    }

    /// Ledger entries recorded by one account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_entries_by_actor(&self, actor_id: i64, limit: usize) -> Result<Vec<AuditEntry>> {
        ledger::list_by_actor(&self.conn, actor_id, limit)
    }

    /// Ledger entries about one record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_entries_for(&self, entity_type: &str, entity_id: i64) -> Result<Vec<AuditEntry>> {
        ledger::list_by_entity(&self.conn, entity_type, entity_id)
    }

    /// Get a ledger entry by sequence id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn audit_entry(&self, id: i64) -> Result<Option<AuditEntry>> {
        ledger::get(&self.conn, id)
    }

    /// Replay the whole ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn verify_ledger(&self) -> Result<ChainReport> {
        ledger::verify(&self.conn)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let last_audit: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            aircraft: count("SELECT COUNT(*) FROM aircraft")?,
            flights: count("SELECT COUNT(*) FROM flights")?,
            maintenance_records: count("SELECT COUNT(*) FROM maintenance_records")?,
            open_alerts: count("SELECT COUNT(*) FROM alerts WHERE is_resolved = 0")?,
            audit_entries: count("SELECT COUNT(*) FROM audit_log")?,
            last_audit_at: last_audit.and_then(|s| parse_time(0, &s).ok()),
            db_size_bytes,
        })
    }

    /// Direct access for read-only aggregations.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StorageStats {
    /// Registered aircraft.
    pub aircraft: i64,
    /// Logged flights.
    pub flights: i64,
    /// Maintenance logs.
    pub maintenance_records: i64,
    /// Unresolved alerts.
    pub open_alerts: i64,
    /// Ledger entries.
    pub audit_entries: i64,
    /// When the newest ledger entry was appended.
    pub last_audit_at: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Convert a `usize` limit into a `LIMIT` parameter.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Render a timestamp for storage.
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Render a date for storage.
pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_time(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a timestamp column.
pub(crate) fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_time(idx, &text)
}

/// Read a nullable timestamp column.
pub(crate) fn optional_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_time(idx, &t)).transpose()
}

/// Read a date column.
pub(crate) fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Classify a failed delete: a foreign-key refusal means other rows still
/// point at the target.
pub(crate) fn delete_error(entity: &str, err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return Error::Protected {
                entity: entity.to_string(),
            };
        }
    }
    err.into()
}

/// Stores a text enum under its `as_str` name.
macro_rules! sql_text_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    )+};
}

sql_text_enum!(
    ActionKind,
    AircraftStatus,
    MissionStatus,
    Role,
    Severity,
);


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let storage = create_test_storage();
        let enabled: i64 = storage
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let mut storage = create_test_storage();
        let result: Result<()> = storage.write(|tx| {
            tx.execute(
                "INSERT INTO bases (name, location) VALUES ('Kumasi', 'Ashanti')",
                [],
            )?;
            Err(Error::internal("abort"))
        });
        assert!(result.is_err());
        assert!(storage.bases().unwrap().is_empty());
    }

    #[test]
    fn test_time_round_trip_keeps_order() {
        let early = at(1, 9);
        let late = early + chrono::Duration::microseconds(1);
        assert!(format_time(&early) < format_time(&late));
        assert_eq!(parse_time(0, &format_time(&late)).unwrap(), late);
    }

    #[test]
    fn test_bad_time_is_conversion_failure() {
        let err = parse_time(3, "yesterday").unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, _)
        ));
    }

    #[test]
    fn test_enum_columns_round_trip() {
        let storage = create_test_storage();
        let role: Role = storage
            .conn()
            .query_row("SELECT ?1", [Role::FlightOps], |row| row.get(0))
            .unwrap();
        assert_eq!(role, Role::FlightOps);

        let bad: rusqlite::Result<Severity> =
            storage.conn().query_row("SELECT 'critical'", [], |row| row.get(0));
        assert!(bad.is_err());
    }

    #[test]
    fn test_stats_counts() {
        let mut storage = create_test_storage();
        seed(&mut storage);

        let stats = storage.stats().unwrap();
        assert_eq!(stats.aircraft, 1);
        assert_eq!(stats.flights, 0);
        assert_eq!(stats.audit_entries, 0);
        assert_eq!(stats.last_audit_at, None);
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_storage_file_operations() {
        let temp_dir = std::env::temp_dir().join(format!(
            "flightops_test_{}",
            std::process::id()
        ));
        let db_path = temp_dir.join("nested").join("test.db");

        {
            let mut storage = Storage::open(&db_path).unwrap();
            seed(&mut storage);
            assert_eq!(storage.path(), db_path.as_path());
        }

        let storage = Storage::open(&db_path).unwrap();
        assert_eq!(storage.fleet().unwrap().len(), 1);
        assert!(storage.stats().unwrap().db_size_bytes > 0);

        let _ = std::fs::remove_dir_all(&temp_dir);
    }
}
