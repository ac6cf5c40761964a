//! Ledger persistence.
//!
//! [`append`] must run inside [`super::Storage::write`]: the IMMEDIATE
//! transaction holds the write lock across the tail read and the insert.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{format_time, sql_limit, time_at};
use crate::error::Result;
use crate::ledger::{verify_chain, AuditEntry, ChainReport, NewAuditEntry, GENESIS};

const COLUMNS: &str = "id, actor_id, action, entity_type, entity_id, description, origin, \
     created_at, previous_checksum, checksum";

/// Checksum of the newest entry, or [`GENESIS`] for an empty ledger.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn head_checksum(conn: &Connection) -> Result<String> {
    let head: Option<String> = conn
        .query_row(
            "SELECT checksum FROM audit_log ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(head.unwrap_or_else(|| GENESIS.to_string()))
}

/// Append an entry linked to the current head.
///
/// # Errors
///
/// Returns an error if the insert fails; a second append claiming the same
/// predecessor is rejected as a conflict.
pub fn append(conn: &Connection, entry: &NewAuditEntry, now: DateTime<Utc>) -> Result<AuditEntry> {
    let previous_checksum = head_checksum(conn)?;
    let checksum = entry.checksum_after(&previous_checksum);

    conn.execute(
        r"
        INSERT INTO audit_log
            (actor_id, action, entity_type, entity_id, description, origin,
             created_at, previous_checksum, checksum)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ",
        params![
            entry.actor_id,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.description,
            entry.origin,
            format_time(&now),
            previous_checksum,
            checksum,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(
        "Appended audit entry #{} ({} {})",
        id, entry.action, entry.entity_type
    );

    Ok(AuditEntry {
        id,
        actor_id: entry.actor_id,
        action: entry.action,
        entity_type: entry.entity_type.clone(),
        entity_id: entry.entity_id,
        description: entry.description.clone(),
        origin: entry.origin.clone(),
        created_at: now,
        previous_checksum,
        checksum,
    })
}

/// Get an entry by sequence id.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn get(conn: &Connection, id: i64) -> Result<Option<AuditEntry>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM audit_log WHERE id = ?1"),
            [id],
            row_to_entry,
        )
        .optional()?)
}

/// Most recent entries, newest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM audit_log ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))?;
    let entries = stmt
        .query_map([sql_limit(limit)], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Entries recorded by one account, newest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_by_actor(conn: &Connection, actor_id: i64, limit: usize) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM audit_log WHERE actor_id = ?1 \
         ORDER BY created_at DESC, id DESC LIMIT ?2"
    ))?;
    let entries = stmt
        .query_map(params![actor_id, sql_limit(limit)], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Entries about one record, newest first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_by_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: i64,
) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 \
         ORDER BY created_at DESC, id DESC"
    ))?;
    let entries = stmt
        .query_map(params![entity_type, entity_id], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Every entry in sequence order.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_ascending(conn: &Connection) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM audit_log ORDER BY id ASC"))?;
    let entries = stmt
        .query_map([], row_to_entry)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Replay the stored ledger.
///
/// # Errors
///
/// Returns an error if the ledger cannot be read.
pub fn verify(conn: &Connection) -> Result<ChainReport> {
    let entries = list_ascending(conn)?;
    Ok(verify_chain(&entries))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        action: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        description: row.get(5)?,
        origin: row.get(6)?,
        created_at: time_at(row, 7)?,
        previous_checksum: row.get(8)?,
        checksum: row.get(9)?,
    })
}
