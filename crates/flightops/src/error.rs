//! Error types for flightops.
//!
//! This module defines the crate-wide error type. Validation failures carry
//! field-level messages, storage constraint failures are classified into
//! conflicts and protected deletes, and everything else wraps its source.

use std::fmt;
use std::path::PathBuf;

use rusqlite::ffi;
use serde::Serialize;
use thiserror::Error;

use crate::model::Role;

/// A single rejected field with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Why the value was rejected.
    pub message: String,
}

/// An ordered collection of field-level validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection holding exactly one failure.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a failure for `field`.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Whether no failures were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether at least one failure concerns `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Iterate over the recorded failures in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Turn the collection into a `Result`, failing if anything was recorded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when at least one failure was recorded.
    pub fn finish(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

/// The main error type for flightops operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Domain Errors ===
    /// A write was rejected because one or more fields are invalid.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {message}")]
    Conflict {
        /// The constraint that was violated.
        message: String,
    },

    /// A delete was rejected because other records still reference the row.
    #[error("cannot delete {entity}: it is still referenced by other records")]
    Protected {
        /// Entity type whose delete was refused.
        entity: String,
    },

    /// A referenced record does not exist.
    #[error("{entity} #{id} not found")]
    NotFound {
        /// Entity type that was looked up.
        entity: &'static str,
        /// The identifier that was not found.
        id: i64,
    },

    /// The caller's role does not allow the operation.
    #[error("{username} ({role}) may not {action}")]
    Forbidden {
        /// Account that attempted the write.
        username: String,
        /// The account's role at the time.
        role: Role,
        /// What was attempted, e.g. `log flights`.
        action: &'static str,
    },

    /// An attempt was made to modify or remove an audit entry.
    #[error("audit log is append-only")]
    AppendOnly,

    /// The audit chain failed verification.
    #[error("audit chain integrity violated: {message}")]
    ChainIntegrity {
        /// Description of the first violation found.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[source] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flightops operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::Conflict {
                        message: message
                            .clone()
                            .unwrap_or_else(|| "unique constraint failed".to_string()),
                    };
                }
                ffi::SQLITE_CONSTRAINT_TRIGGER => return Self::AppendOnly,
                _ => {}
            }
        }
        Self::DatabaseQuery(err)
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error for the given entity.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a validation error for a single field.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    /// Check if this error is a validation rejection.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error is a permission rejection.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Check if this error is a uniqueness conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Field-level failures, if this is a validation error.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("Aircraft", 7);
        assert_eq!(err.to_string(), "Aircraft #7 not found");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_validation_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.add("eta", "ETA cannot be earlier than ATD.");
        errors.add("arrival_base", "Departure and arrival bases must be different.");

        let err = Error::Validation(errors);
        let msg = err.to_string();
        assert!(msg.starts_with("validation failed: "));
        assert!(msg.contains("eta: ETA cannot be earlier than ATD."));
        assert!(msg.contains("; arrival_base:"));
    }

    #[test]
    fn test_validation_errors_finish() {
        assert!(ValidationErrors::new().finish().is_ok());

        let result = ValidationErrors::single("pilot", "required").finish();
        let err = result.unwrap_err();
        assert!(err.is_validation());
        assert!(err.validation_errors().unwrap().has_field("pilot"));
    }

    #[test]
    fn test_validation_errors_serialize_as_list() {
        let errors = ValidationErrors::single("flight_hours", "must be positive");
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["field"], "flight_hours");
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let sqlite_err = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err();

        let err: Error = sqlite_err.into();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("t.name"));
    }

    #[test]
    fn test_trigger_abort_becomes_append_only() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (v INTEGER);
             CREATE TRIGGER t_no_delete BEFORE DELETE ON t
             BEGIN SELECT RAISE(ABORT, 'nope'); END;
             INSERT INTO t VALUES (1);",
        )
        .unwrap();
        let sqlite_err = conn.execute("DELETE FROM t", []).unwrap_err();

        let err: Error = sqlite_err.into();
        assert!(matches!(err, Error::AppendOnly));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_forbidden_display() {
        let err = Error::Forbidden {
            username: "abena".to_string(),
            role: Role::Auditor,
            action: "log maintenance",
        };
        assert_eq!(err.to_string(), "abena (auditor) may not log maintenance");
        assert!(err.is_forbidden());
    }

    #[test]
    fn test_protected_display() {
        let err = Error::Protected {
            entity: "Base".to_string(),
        };
        assert!(err.to_string().contains("Base"));
        assert!(err.to_string().contains("referenced"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
