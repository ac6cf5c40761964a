//! `SQLite` schema definitions for flightops.
//!
//! Timestamps are RFC 3339 text in UTC with microsecond precision, so they
//! order correctly as strings. Dates are `YYYY-MM-DD`.

/// Operating bases.
pub const CREATE_BASES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS bases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    location TEXT NOT NULL
)
";

/// Accounts that act on the system.
pub const CREATE_ACCOUNTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'auditor'
)
";

/// Airframes.
pub const CREATE_AIRCRAFT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aircraft (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tail_number TEXT NOT NULL UNIQUE COLLATE NOCASE,
    aircraft_type TEXT NOT NULL DEFAULT '',
    model TEXT NOT NULL,
    maintenance_threshold_hours REAL NOT NULL DEFAULT 100.0
        CHECK (maintenance_threshold_hours >= 1),
    status TEXT NOT NULL DEFAULT 'available',
    home_base_id INTEGER NOT NULL REFERENCES bases(id) ON DELETE RESTRICT
)
";

/// Pilots.
pub const CREATE_PILOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS pilots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    rank TEXT NOT NULL,
    contact_info TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 1
)
";

/// Crew members.
pub const CREATE_CREW_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS crew (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    full_name TEXT NOT NULL,
    rank TEXT NOT NULL,
    role TEXT NOT NULL,
    is_available INTEGER NOT NULL DEFAULT 1
)
";

/// Flight logs.
pub const CREATE_FLIGHTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id) ON DELETE CASCADE,
    pilot_id INTEGER REFERENCES pilots(id) ON DELETE SET NULL,
    pilot_name TEXT NOT NULL DEFAULT '',
    mission_type TEXT NOT NULL,
    mission_status TEXT NOT NULL DEFAULT 'active',
    departed_at TEXT NOT NULL,
    atd TEXT NOT NULL,
    eta TEXT NOT NULL,
    ata TEXT,
    flight_hours REAL NOT NULL,
    fuel_used REAL NOT NULL,
    departure_base_id INTEGER NOT NULL REFERENCES bases(id) ON DELETE RESTRICT,
    arrival_base_id INTEGER NOT NULL REFERENCES bases(id) ON DELETE RESTRICT,
    remarks TEXT NOT NULL DEFAULT '',
    logged_by INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Index for newest-first flight listing and per-day counts.
pub const CREATE_FLIGHTS_DEPARTED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_departed_at ON flights(departed_at DESC)
";

/// Flight to crew links.
pub const CREATE_FLIGHT_CREW_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flight_crew (
    flight_id INTEGER NOT NULL REFERENCES flights(id) ON DELETE CASCADE,
    crew_id INTEGER NOT NULL REFERENCES crew(id) ON DELETE CASCADE,
    PRIMARY KEY (flight_id, crew_id)
)
";

/// Telemetry samples.
pub const CREATE_TELEMETRY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS telemetry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flight_id INTEGER NOT NULL REFERENCES flights(id) ON DELETE CASCADE,
    recorded_at TEXT NOT NULL,
    altitude REAL NOT NULL,
    speed REAL NOT NULL,
    engine_temp REAL NOT NULL,
    fuel_level REAL NOT NULL,
    heading REAL NOT NULL,
    created_at TEXT NOT NULL
)
";

/// Index for latest-sample and per-flight trend queries.
pub const CREATE_TELEMETRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_telemetry_flight_time ON telemetry(flight_id, recorded_at)
";

/// Maintenance logs.
pub const CREATE_MAINTENANCE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS maintenance_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id) ON DELETE CASCADE,
    total_flight_hours REAL NOT NULL CHECK (total_flight_hours >= 0),
    last_service_date TEXT NOT NULL,
    component_status TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    recorded_by INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
)
";

/// Threshold alerts; one per (aircraft, maintenance log).
pub const CREATE_ALERTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aircraft_id INTEGER NOT NULL REFERENCES aircraft(id) ON DELETE CASCADE,
    maintenance_record_id INTEGER NOT NULL
        REFERENCES maintenance_records(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'medium',
    is_resolved INTEGER NOT NULL DEFAULT 0,
    recipient_role TEXT NOT NULL DEFAULT 'maintenance',
    created_at TEXT NOT NULL,
    UNIQUE (aircraft_id, maintenance_record_id)
)
";

/// Index for open-alert counts.
pub const CREATE_ALERTS_OPEN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_alerts_resolved ON alerts(is_resolved)
";

/// The audit ledger.
///
/// `actor_id` carries no foreign key: clearing it when an account is removed
/// would rewrite a ledger row and invalidate its checksum. `previous_checksum`
/// is unique so two appends can never claim the same predecessor.
pub const CREATE_AUDIT_LOG_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id INTEGER,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id INTEGER,
    description TEXT NOT NULL,
    origin TEXT,
    created_at TEXT NOT NULL,
    previous_checksum TEXT NOT NULL UNIQUE,
    checksum TEXT NOT NULL
)
";

/// Index for newest-first ledger listing.
pub const CREATE_AUDIT_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_audit_log_created_at ON audit_log(created_at DESC)
";

/// Index for per-entity ledger queries.
pub const CREATE_AUDIT_ENTITY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_audit_log_entity ON audit_log(entity_type, entity_id)
";

/// Rejects any UPDATE of a ledger row.
pub const CREATE_AUDIT_NO_UPDATE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS audit_log_no_update
BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END
";

/// Rejects any DELETE of a ledger row.
pub const CREATE_AUDIT_NO_DELETE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit log is append-only');
END
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_BASES_TABLE,
    CREATE_ACCOUNTS_TABLE,
    CREATE_AIRCRAFT_TABLE,
    CREATE_PILOTS_TABLE,
    CREATE_CREW_TABLE,
    CREATE_FLIGHTS_TABLE,
    CREATE_FLIGHTS_DEPARTED_INDEX,
    CREATE_FLIGHT_CREW_TABLE,
    CREATE_TELEMETRY_TABLE,
    CREATE_TELEMETRY_INDEX,
    CREATE_MAINTENANCE_TABLE,
    CREATE_ALERTS_TABLE,
    CREATE_ALERTS_OPEN_INDEX,
    CREATE_AUDIT_LOG_TABLE,
    CREATE_AUDIT_CREATED_INDEX,
    CREATE_AUDIT_ENTITY_INDEX,
    CREATE_AUDIT_NO_UPDATE_TRIGGER,
    CREATE_AUDIT_NO_DELETE_TRIGGER,
    CREATE_METADATA_TABLE,
];
