//! Error types for Lets Try Core

use rusqlite::ffi;
use thiserror::Error;

use crate::metadata::ResolveError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write
    #[error("Duplicate: {0}")]
    Duplication(String),

    /// A business rule rejected the operation
    #[error("Invalid state: {0}")]
    StateViolation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The store is in a shape the operation did not expect
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Unknown column \"{column}\" for {entity}")]
    UnknownColumn { entity: &'static str, column: String },

    #[error("Column \"{column}\" of {entity} is compared more than once")]
    RepeatedFilter { entity: &'static str, column: String },

    #[error("Column \"{column}\" of {entity} is not a foreign key to {target}")]
    NotForeignKey {
        entity: &'static str,
        column: String,
        target: &'static str,
    },

    #[error("Metadata lookup failed: {0}")]
    Metadata(#[from] ResolveError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Trigger messages that report a missing referent rather than a rule violation
const NOT_FOUND_SUFFIX: &str = "not found";

impl Error {
    /// Translate a storage failure into the error taxonomy.
    ///
    /// UNIQUE and PRIMARY KEY failures become [`Error::Duplication`], messages
    /// raised by triggers become [`Error::StateViolation`] (or
    /// [`Error::NotFound`] when the trigger reports a missing row) and foreign
    /// key failures become [`Error::NotFound`]. Everything else stays a
    /// [`Error::Database`].
    pub fn from_storage(err: rusqlite::Error) -> Self {
        let (code, message) = match &err {
            rusqlite::Error::SqliteFailure(e, msg) if e.code == ffi::ErrorCode::ConstraintViolation => {
                (e.extended_code, msg.clone().unwrap_or_default())
            }
            _ => return Error::Database(err),
        };

        match code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Error::Duplication(message)
            }
            ffi::SQLITE_CONSTRAINT_TRIGGER if message.ends_with(NOT_FOUND_SUFFIX) => {
                Error::NotFound(message)
            }
            ffi::SQLITE_CONSTRAINT_TRIGGER => Error::StateViolation(message),
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Error::NotFound(message),
            _ => Error::Database(err),
        }
    }

    pub fn is_duplication(&self) -> bool {
        matches!(self, Error::Duplication(_))
    }

    pub fn is_state_violation(&self) -> bool {
        matches!(self, Error::StateViolation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE);
             CREATE TRIGGER t_guard BEFORE INSERT ON t
             WHEN NEW.name = 'closed' BEGIN SELECT RAISE(ABORT, 'ballot not open'); END;
             CREATE TRIGGER t_missing BEFORE INSERT ON t
             WHEN NEW.name = 'ghost' BEGIN SELECT RAISE(ABORT, 'ballot not found'); END;",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_unique_is_duplication() {
        let conn = conn();
        conn.execute("INSERT INTO t (name) VALUES ('a')", []).unwrap();
        let err = conn
            .execute("INSERT INTO t (name) VALUES ('a')", [])
            .map_err(Error::from_storage)
            .unwrap_err();
        assert!(err.is_duplication(), "{err}");
    }

    #[test]
    fn test_trigger_is_state_violation() {
        let conn = conn();
        let err = conn
            .execute("INSERT INTO t (name) VALUES ('closed')", [])
            .map_err(Error::from_storage)
            .unwrap_err();
        assert!(err.is_state_violation());
        assert!(err.to_string().contains("ballot not open"));
    }

    #[test]
    fn test_trigger_not_found() {
        let conn = conn();
        let err = conn
            .execute("INSERT INTO t (name) VALUES ('ghost')", [])
            .map_err(Error::from_storage)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let conn = conn();
        let err = conn
            .execute("INSERT INTO missing (x) VALUES (1)", [])
            .map_err(Error::from_storage)
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
