//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;

use crate::models::{BallotState, GameState};

/// Storage format shared with SQLite's `DATETIME()`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way SQLite's `DATETIME('now')` does
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Drop sub-second precision so a value survives a round trip unchanged
pub fn truncate_timestamp(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

/// Parse a timestamp stored in column `idx`
pub fn parse_timestamp(idx: usize, s: &str) -> Result<DateTime<Utc>, SqlError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| SqlError::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse an optional timestamp stored in column `idx`
pub fn parse_timestamp_opt(idx: usize, s: Option<String>) -> Result<Option<DateTime<Utc>>, SqlError> {
    s.map(|s| parse_timestamp(idx, &s)).transpose()
}

fn invalid_text(idx: usize, kind: &str, s: &str) -> SqlError {
    SqlError::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {kind} \"{s}\"").into(),
    )
}

pub fn parse_game_state(idx: usize, s: &str) -> Result<GameState, SqlError> {
    GameState::from_str(s).ok_or_else(|| invalid_text(idx, "game state", s))
}

pub fn parse_ballot_state(idx: usize, s: &str) -> Result<BallotState, SqlError> {
    BallotState::from_str(s).ok_or_else(|| invalid_text(idx, "ballot state", s))
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
