//! SQLite storage layer for Lets Try

mod ballots;
mod catalog;
mod descriptor;
mod entities;
mod guilds;
mod metadata_cache;
mod migrations;
mod parse;
pub mod repository;
pub mod statement;
mod traits;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::Result;

pub use ballots::{BallotStore, Standing};
pub use catalog::CatalogStore;
pub use descriptor::{Column, EntityDescriptor};
pub use entities::{BALLOT, BALLOT_GAME, BALLOT_VOTE, GAME, PROPOSAL};
pub use guilds::{GuildStores, DATABASE_FILE};
pub use metadata_cache::MetadataCacheStore;
pub use repository::{Criteria, Selection};
pub use statement::{Direction, Logic};
pub use traits::{Entity, FromRow};

/// How long a writer waits for a competing connection's lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Main database handle, one per community
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::get_current_version(&self.conn)
    }

    /// Underlying connection, for the generic repository operations
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Games and proposals
    pub fn catalog(&self) -> CatalogStore<'_> {
        CatalogStore::new(&self.conn)
    }

    /// Ballots, their games and votes
    pub fn ballots(&self) -> BallotStore<'_> {
        BallotStore::new(&self.conn)
    }

    pub fn metadata_cache(&self) -> MetadataCacheStore<'_> {
        MetadataCacheStore::new(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.schema_version().unwrap() > 0);
    }

    #[test]
    fn test_reopen_file_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATABASE_FILE);

        let version = Database::open(&path).unwrap().schema_version().unwrap();
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.schema_version().unwrap(), version);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let enabled: bool = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(enabled);
    }
}
