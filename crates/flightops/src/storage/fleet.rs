//! Bases, aircraft, pilots, crew, and accounts.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::delete_error;
use crate::error::Result;
use crate::model::{
    Account, Aircraft, AircraftStatus, Base, Crew, NewAircraft, NewBase, NewCrew, NewPilot, Pilot,
    Role,
};

const AIRCRAFT_COLUMNS: &str = "id, tail_number, aircraft_type, model, \
     maintenance_threshold_hours, status, home_base_id";

// === Bases ===

/// Insert a base, returning its id.
///
/// # Errors
///
/// Returns [`crate::Error::Conflict`] if the name is taken.
pub fn insert_base(conn: &Connection, base: &NewBase) -> Result<i64> {
    conn.execute(
        "INSERT INTO bases (name, location) VALUES (?1, ?2)",
        params![base.name, base.location],
    )?;
    let id = conn.last_insert_rowid();
    debug!("Inserted base {} with id {}", base.name, id);
    Ok(id)
}

/// Get a base by id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_base(conn: &Connection, id: i64) -> Result<Option<Base>> {
    Ok(conn
        .query_row(
            "SELECT id, name, location FROM bases WHERE id = ?1",
            [id],
            row_to_base,
        )
        .optional()?)
}

/// All bases by name.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_bases(conn: &Connection) -> Result<Vec<Base>> {
    let mut stmt = conn.prepare("SELECT id, name, location FROM bases ORDER BY name")?;
    let bases = stmt
        .query_map([], row_to_base)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(bases)
}

/// Delete a base. Returns `false` if it did not exist.
///
/// # Errors
///
/// Returns [`crate::Error::Protected`] while aircraft or flights reference it.
pub fn delete_base(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM bases WHERE id = ?1", [id])
        .map_err(|e| delete_error("Base", e))?;
    Ok(affected > 0)
}

fn row_to_base(row: &Row<'_>) -> rusqlite::Result<Base> {
    Ok(Base {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
    })
}

// === Aircraft ===

/// Insert an aircraft, returning its id.
///
/// # Errors
///
/// Returns [`crate::Error::Conflict`] if the tail number is taken.
pub fn insert_aircraft(conn: &Connection, aircraft: &NewAircraft) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO aircraft
            (tail_number, aircraft_type, model, maintenance_threshold_hours, status, home_base_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            aircraft.tail_number,
            aircraft.aircraft_type,
            aircraft.model,
            aircraft.maintenance_threshold_hours,
            aircraft.status,
            aircraft.home_base_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!("Inserted aircraft {} with id {}", aircraft.tail_number, id);
    Ok(id)
}

/// Get an aircraft by id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_aircraft(conn: &Connection, id: i64) -> Result<Option<Aircraft>> {
    Ok(conn
        .query_row(
            &format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE id = ?1"),
            [id],
            row_to_aircraft,
        )
        .optional()?)
}

/// Get an aircraft by tail number, ignoring case and surrounding spaces.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn find_aircraft_by_tail(conn: &Connection, tail_number: &str) -> Result<Option<Aircraft>> {
    Ok(conn
        .query_row(
            &format!("SELECT {AIRCRAFT_COLUMNS} FROM aircraft WHERE tail_number = ?1"),
            [tail_number.trim()],
            row_to_aircraft,
        )
        .optional()?)
}

/// The whole fleet by tail number.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_aircraft(conn: &Connection) -> Result<Vec<Aircraft>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AIRCRAFT_COLUMNS} FROM aircraft ORDER BY tail_number"
    ))?;
    let aircraft = stmt
        .query_map([], row_to_aircraft)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(aircraft)
}

/// Change an aircraft's availability. Returns `false` if it did not exist.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn set_aircraft_status(conn: &Connection, id: i64, status: AircraftStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE aircraft SET status = ?1 WHERE id = ?2",
        params![status, id],
    )?;
    Ok(affected > 0)
}

/// Count aircraft in `status`.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn count_aircraft_with_status(conn: &Connection, status: AircraftStatus) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM aircraft WHERE status = ?1",
        [status],
        |row| row.get(0),
    )?)
}

/// Delete an aircraft together with its flights, maintenance logs, and alerts.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_aircraft(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM aircraft WHERE id = ?1", [id])
        .map_err(|e| delete_error("Aircraft", e))?;
    Ok(affected > 0)
}

fn row_to_aircraft(row: &Row<'_>) -> rusqlite::Result<Aircraft> {
    Ok(Aircraft {
        id: row.get(0)?,
        tail_number: row.get(1)?,
        aircraft_type: row.get(2)?,
        model: row.get(3)?,
        maintenance_threshold_hours: row.get(4)?,
        status: row.get(5)?,
        home_base_id: row.get(6)?,
    })
}

// === Pilots ===

/// Insert a pilot, returning its id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_pilot(conn: &Connection, pilot: &NewPilot) -> Result<i64> {
    conn.execute(
        "INSERT INTO pilots (full_name, rank, contact_info) VALUES (?1, ?2, ?3)",
        params![pilot.full_name, pilot.rank, pilot.contact_info],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get a pilot by id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_pilot(conn: &Connection, id: i64) -> Result<Option<Pilot>> {
    Ok(conn
        .query_row(
            "SELECT id, full_name, rank, contact_info, is_active FROM pilots WHERE id = ?1",
            [id],
            row_to_pilot,
        )
        .optional()?)
}

/// All pilots by name.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_pilots(conn: &Connection) -> Result<Vec<Pilot>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, rank, contact_info, is_active FROM pilots ORDER BY full_name",
    )?;
    let pilots = stmt
        .query_map([], row_to_pilot)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(pilots)
}

/// Rename a pilot. Flights keep their snapshot until they are next written.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn rename_pilot(conn: &Connection, id: i64, full_name: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE pilots SET full_name = ?1 WHERE id = ?2",
        params![full_name, id],
    )?;
    Ok(affected > 0)
}

/// Delete a pilot. Their flights keep the name snapshot with no pilot link.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_pilot(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn
        .execute("DELETE FROM pilots WHERE id = ?1", [id])
        .map_err(|e| delete_error("Pilot", e))?;
    Ok(affected > 0)
}

fn row_to_pilot(row: &Row<'_>) -> rusqlite::Result<Pilot> {
    Ok(Pilot {
        id: row.get(0)?,
        full_name: row.get(1)?,
        rank: row.get(2)?,
        contact_info: row.get(3)?,
        is_active: row.get(4)?,
    })
}

// === Crew ===

/// Insert a crew member, returning its id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn insert_crew(conn: &Connection, crew: &NewCrew) -> Result<i64> {
    conn.execute(
        "INSERT INTO crew (full_name, rank, role) VALUES (?1, ?2, ?3)",
        params![crew.full_name, crew.rank, crew.role],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All crew members by name.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_crew(conn: &Connection) -> Result<Vec<Crew>> {
    let mut stmt = conn.prepare(
        "SELECT id, full_name, rank, role, is_available FROM crew ORDER BY full_name",
    )?;
    let crew = stmt
        .query_map([], |row| {
            Ok(Crew {
                id: row.get(0)?,
                full_name: row.get(1)?,
                rank: row.get(2)?,
                role: row.get(3)?,
                is_available: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(crew)
}

/// Mark a crew member available or not.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn set_crew_available(conn: &Connection, id: i64, available: bool) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE crew SET is_available = ?1 WHERE id = ?2",
        params![available, id],
    )?;
    Ok(affected > 0)
}

/// Count crew members available for tasking.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn count_available_crew(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM crew WHERE is_available = 1",
        [],
        |row| row.get(0),
    )?)
}

/// First id in `ids` that names no crew member.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn first_missing_crew(conn: &Connection, ids: &[i64]) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT COUNT(*) FROM crew WHERE id = ?1")?;
    for id in ids {
        let count: i64 = stmt.query_row([id], |row| row.get(0))?;
        if count == 0 {
            return Ok(Some(*id));
        }
    }
    Ok(None)
}

// === Accounts ===

/// Insert an account, returning it.
///
/// # Errors
///
/// Returns [`crate::Error::Conflict`] if the username is taken.
pub fn insert_account(conn: &Connection, username: &str, role: Role) -> Result<Account> {
    conn.execute(
        "INSERT INTO accounts (username, role) VALUES (?1, ?2)",
        params![username, role],
    )?;
    Ok(Account {
        id: conn.last_insert_rowid(),
        username: username.to_string(),
        role,
    })
}

/// Get an account by id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get_account(conn: &Connection, id: i64) -> Result<Option<Account>> {
    Ok(conn
        .query_row(
            "SELECT id, username, role FROM accounts WHERE id = ?1",
            [id],
            row_to_account,
        )
        .optional()?)
}

/// Get an account by username.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn find_account(conn: &Connection, username: &str) -> Result<Option<Account>> {
    Ok(conn
        .query_row(
            "SELECT id, username, role FROM accounts WHERE username = ?1",
            [username],
            row_to_account,
        )
        .optional()?)
}

/// All accounts by username.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, username, role FROM accounts ORDER BY username")?;
    let accounts = stmt
        .query_map([], row_to_account)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Change an account's role.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn set_role(conn: &Connection, id: i64, role: Role) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE accounts SET role = ?1 WHERE id = ?2",
        params![role, id],
    )?;
    Ok(affected > 0)
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
    })
}
