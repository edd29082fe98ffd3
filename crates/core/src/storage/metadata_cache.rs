//! Metadata cache storage operations

use chrono::{DateTime, Datelike, Duration, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, instrument};

use super::parse::{format_timestamp, OptionalExt};
use crate::error::Result;
use crate::metadata::GameMetadata;

/// Oldest fetch time still within `freshness`.
///
/// A window reaching back past year 1 yields the empty string, which every
/// stored timestamp sorts after.
fn cutoff(freshness: Duration) -> String {
    Utc::now()
        .checked_sub_signed(freshness.max(Duration::zero()))
        .filter(|t| t.year() >= 1)
        .map(|t| format_timestamp(&t))
        .unwrap_or_default()
}

/// Cached external metadata keyed by normalized identity
pub struct MetadataCacheStore<'a> {
    conn: &'a Connection,
}

impl<'a> MetadataCacheStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Entry for `identity` fetched within the last `freshness`
    #[instrument(skip(self))]
    pub fn get(&self, identity: &str, freshness: Duration) -> Result<Option<GameMetadata>> {
        let cutoff = cutoff(freshness);
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM metadata_cache WHERE identity = ?1 AND date_fetched > ?2",
                params![identity, cutoff],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Store an entry fetched now
    pub fn put(&self, identity: &str, metadata: &GameMetadata) -> Result<()> {
        self.put_at(identity, metadata, Utc::now())
    }

    /// Store an entry unless a newer one is already cached
    #[instrument(skip(self, metadata))]
    pub fn put_at(
        &self,
        identity: &str,
        metadata: &GameMetadata,
        fetched: DateTime<Utc>,
    ) -> Result<()> {
        let payload = serde_json::to_string(metadata)?;
        self.conn.execute(
            "INSERT INTO metadata_cache (identity, payload, date_fetched) VALUES (?1, ?2, ?3)
             ON CONFLICT (identity) DO UPDATE SET
                payload = excluded.payload,
                date_fetched = excluded.date_fetched
             WHERE date_fetched <= excluded.date_fetched",
            params![identity, payload, format_timestamp(&fetched)],
        )?;
        debug!(identity, "Cached game metadata");
        Ok(())
    }

    /// Drop entries older than `freshness`, returning how many were removed
    #[instrument(skip(self))]
    pub fn purge_stale(&self, freshness: Duration) -> Result<usize> {
        let cutoff = cutoff(freshness);
        let removed = self.conn.execute(
            "DELETE FROM metadata_cache WHERE date_fetched <= ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }
}
