//! Database migration system
//!
//! Tracks schema versions and applies migrations in order. The business
//! rules that must hold under concurrent writers (one proposal per user,
//! electable games only, votes only while a ballot is open) live in the
//! schema as constraints and triggers, so they are checked by the same
//! statement that performs the write.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Catalog: games and proposals",
        sql: r#"
            CREATE TABLE IF NOT EXISTS games (
                game_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'submitted'
                    CHECK (state IN ('submitted', 'accepted', 'rejected', 'elected', 'done', 'orphaned')),
                UNIQUE (name, url)
            );

            -- One live proposal per user
            CREATE TABLE IF NOT EXISTS proposals (
                discord_user_id INTEGER PRIMARY KEY,
                date_created TEXT NOT NULL DEFAULT (DATETIME('now')),
                game_id INTEGER NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(game_id) ON DELETE CASCADE
            );

            CREATE TRIGGER IF NOT EXISTS proposals_electable
            BEFORE INSERT ON proposals
            WHEN (SELECT state FROM games WHERE game_id = NEW.game_id) IN ('rejected', 'done')
            BEGIN
                SELECT RAISE(ABORT, 'game not open for proposal');
            END;

            -- The last proposer of a submitted game retracted
            CREATE TRIGGER IF NOT EXISTS proposals_orphan
            AFTER DELETE ON proposals
            WHEN NOT EXISTS (SELECT 1 FROM proposals WHERE game_id = OLD.game_id)
            BEGIN
                UPDATE games SET state = 'orphaned'
                WHERE game_id = OLD.game_id AND state = 'submitted';
            END;

            CREATE TRIGGER IF NOT EXISTS proposals_revive
            AFTER INSERT ON proposals
            BEGIN
                UPDATE games SET state = 'submitted'
                WHERE game_id = NEW.game_id AND state = 'orphaned';
            END;
        "#,
    },
    Migration {
        version: 2,
        description: "Ballots, ballot games and votes",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ballots (
                ballot_id INTEGER PRIMARY KEY AUTOINCREMENT,
                discord_thread_id INTEGER NOT NULL UNIQUE,
                date_created TEXT NOT NULL DEFAULT (DATETIME('now')),
                date_open TEXT NOT NULL DEFAULT (DATETIME('now')),
                date_close TEXT NOT NULL DEFAULT (DATETIME('now', '+3 days')),
                staging INTEGER NOT NULL DEFAULT 1 CHECK (staging IN (0, 1))
            );

            CREATE TABLE IF NOT EXISTS ballot_games (
                votes INTEGER NOT NULL DEFAULT 0 CHECK (votes >= 0),
                ballot_id INTEGER NOT NULL,
                game_id INTEGER NOT NULL,
                PRIMARY KEY (ballot_id, game_id),
                FOREIGN KEY (ballot_id) REFERENCES ballots(ballot_id) ON DELETE CASCADE,
                FOREIGN KEY (game_id) REFERENCES games(game_id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS ballot_votes (
                discord_user_id INTEGER NOT NULL,
                ballot_id INTEGER NOT NULL,
                game_id INTEGER NOT NULL,
                PRIMARY KEY (ballot_id, discord_user_id),
                FOREIGN KEY (ballot_id) REFERENCES ballots(ballot_id) ON DELETE CASCADE,
                FOREIGN KEY (ballot_id, game_id)
                    REFERENCES ballot_games(ballot_id, game_id) ON DELETE CASCADE
            );

            -- State is derived from the clock on every read, never stored
            CREATE VIEW IF NOT EXISTS ballots_view AS
            SELECT
                ballot_id,
                discord_thread_id,
                date_created,
                date_open,
                date_close,
                staging,
                CASE
                    WHEN staging THEN 'staging'
                    WHEN DATETIME('now') < date_open THEN 'submitted'
                    WHEN DATETIME('now') < date_close THEN 'open'
                    ELSE 'closed'
                END AS state
            FROM ballots;

            CREATE TRIGGER IF NOT EXISTS ballots_submit
            BEFORE UPDATE OF staging ON ballots
            WHEN OLD.staging = 1 AND NEW.staging = 0
                AND NOT EXISTS (SELECT 1 FROM ballot_games WHERE ballot_id = NEW.ballot_id)
            BEGIN
                SELECT RAISE(ABORT, 'no games in ballot');
            END;

            CREATE TRIGGER IF NOT EXISTS ballot_games_electable
            BEFORE INSERT ON ballot_games
            WHEN (SELECT state FROM games WHERE game_id = NEW.game_id) IN ('rejected', 'done')
            BEGIN
                SELECT RAISE(ABORT, 'game not open for ballots');
            END;

            CREATE TRIGGER IF NOT EXISTS ballot_votes_guard
            BEFORE INSERT ON ballot_votes
            BEGIN
                SELECT RAISE(ABORT, 'ballot not found')
                WHERE NOT EXISTS (SELECT 1 FROM ballots WHERE ballot_id = NEW.ballot_id);

                SELECT RAISE(ABORT, 'ballot not open')
                WHERE (SELECT state FROM ballots_view WHERE ballot_id = NEW.ballot_id) <> 'open';

                SELECT RAISE(ABORT, 'ballot game not found')
                WHERE NOT EXISTS (
                    SELECT 1 FROM ballot_games
                    WHERE ballot_id = NEW.ballot_id AND game_id = NEW.game_id
                );
            END;

            CREATE TRIGGER IF NOT EXISTS ballot_votes_tally
            AFTER INSERT ON ballot_votes
            BEGIN
                UPDATE ballot_games SET votes = votes + 1
                WHERE ballot_id = NEW.ballot_id AND game_id = NEW.game_id;
            END;
        "#,
    },
    Migration {
        version: 3,
        description: "Game metadata cache",
        sql: r#"
            CREATE TABLE IF NOT EXISTS metadata_cache (
                identity TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                date_fetched TEXT NOT NULL DEFAULT (DATETIME('now'))
            );
        "#,
    },
    Migration {
        version: 4,
        description: "Add indexes for query performance",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_games_state ON games(state);
            CREATE INDEX IF NOT EXISTS idx_proposals_game ON proposals(game_id);
            CREATE INDEX IF NOT EXISTS idx_ballot_games_game ON ballot_games(game_id);
            CREATE INDEX IF NOT EXISTS idx_ballot_votes_game ON ballot_votes(ballot_id, game_id);
            CREATE INDEX IF NOT EXISTS idx_metadata_fetched ON metadata_cache(date_fetched);
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
pub(crate) fn get_current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}

/// Record that a migration was applied
fn record_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Run all pending migrations.
///
/// Pending migrations are applied as one unit: either the store reaches the
/// latest version or it is left untouched.
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    init_migrations_table(&tx)?;

    let current_version = get_current_version(&tx)?;
    info!(current_version, "Checking for pending migrations");

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                description = migration.description,
                "Applying migration"
            );

            tx.execute_batch(migration.sql)?;
            record_migration(&tx, migration)?;
        }
    }

    let new_version = get_current_version(&tx)?;
    tx.commit()?;

    if new_version > current_version {
        info!(
            from = current_version,
            to = new_version,
            "Database schema updated"
        );
    }

    Ok(())
}
