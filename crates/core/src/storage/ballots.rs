//! Ballot storage operations
//!
//! Ballot state is never written: it is derived by `ballots_view` from the
//! clock on every read, so it can advance (submitted → open → closed)
//! without any write. Voting rules are enforced by the schema at the same
//! statement as the vote insert.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::parse::truncate_timestamp;
use super::repository::{self as repo, Criteria};
use super::statement::Direction;
use crate::error::{Error, Result};
use crate::invariants::{assert_ballot_invariants, assert_standings_invariants};
use crate::models::{
    close_after, default_ballot_duration, Ballot, BallotGame, BallotState, BallotVote, Game,
    GameState,
};

/// A linked game and its tally
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub game: Game,
    pub votes: i64,
}

/// Ballot storage operations
pub struct BallotStore<'a> {
    conn: &'a Connection,
}

impl<'a> BallotStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a staging ballot for a thread with the default voting window
    pub fn create(&self, discord_thread_id: i64) -> Result<Ballot> {
        self.create_with_window(discord_thread_id, default_ballot_duration())
    }

    /// Create a staging ballot opening now and closing after `window`
    #[instrument(skip(self))]
    pub fn create_with_window(&self, discord_thread_id: i64, window: Duration) -> Result<Ballot> {
        let now = truncate_timestamp(Utc::now());
        let mut ballot = Ballot::new(discord_thread_id, now, window)?;
        repo::insert(self.conn, &mut ballot)?;
        repo::refresh(self.conn, &mut ballot)?;
        assert_ballot_invariants(&ballot);
        info!(ballot_id = ballot.id(), "Ballot created");
        Ok(ballot)
    }

    pub fn ballot(&self, ballot_id: i64) -> Result<Option<Ballot>> {
        repo::select_one(self.conn, &Criteria::any().eq("ballot_id", ballot_id))
    }

    pub fn ballot_by_thread(&self, discord_thread_id: i64) -> Result<Option<Ballot>> {
        repo::select_one(
            self.conn,
            &Criteria::any().eq("discord_thread_id", discord_thread_id),
        )
    }

    /// Ballots that are open or waiting to open, oldest first
    pub fn active_ballots(&self) -> Result<Vec<Ballot>> {
        let mut selection = repo::select::<Ballot>(
            self.conn,
            &Criteria::all().order_by("ballot_id", Direction::Asc),
        )?;
        let mut ballots = Vec::new();
        for ballot in selection.iter()? {
            let ballot = ballot?;
            if matches!(ballot.state, BallotState::Open | BallotState::Submitted) {
                ballots.push(ballot);
            }
        }
        Ok(ballots)
    }

    /// Link a game to the ballot
    #[instrument(skip(self, ballot, game), fields(ballot_id = ballot.id(), game_id = game.id()))]
    pub fn add_game(&self, ballot: &Ballot, game: &Game) -> Result<BallotGame> {
        let mut link = BallotGame::new(ballot.id(), game.id());
        if let Err(e) = repo::insert(self.conn, &mut link) {
            warn!(error = %e, "Game not added to ballot");
            return Err(match e {
                Error::StateViolation(_) => Error::StateViolation(format!(
                    "game \"{}\" is already {} and cannot be added to a ballot",
                    game.name, game.state
                )),
                Error::Duplication(_) => {
                    Error::Duplication(format!("game \"{}\" is already in the ballot", game.name))
                }
                other => other,
            });
        }
        info!("Game added to ballot");
        Ok(link)
    }

    /// Unlink a game, discarding the votes cast for it
    #[instrument(skip(self, ballot, game), fields(ballot_id = ballot.id(), game_id = game.id()))]
    pub fn remove_game(&self, ballot: &Ballot, game: &Game) -> Result<()> {
        let link = BallotGame::new(ballot.id(), game.id());
        if repo::delete(self.conn, &link)? == 0 {
            return Err(Error::NotFound(format!(
                "game \"{}\" is not in the ballot",
                game.name
            )));
        }
        info!("Game removed from ballot");
        Ok(())
    }

    /// Linked games, most votes first; ties go to the earliest added game
    pub fn games(&self, ballot: &Ballot) -> Result<Vec<Standing>> {
        let pairs: Vec<(BallotGame, Game)> = repo::join_select(
            self.conn,
            "game_id",
            &Criteria::any()
                .eq("ballot_id", ballot.id())
                .order_by("votes", Direction::Desc)
                .order_by("game_id", Direction::Asc),
        )?
        .all()?;

        let standings: Vec<Standing> = pairs
            .into_iter()
            .map(|(link, game)| Standing {
                game,
                votes: link.votes,
            })
            .collect();
        assert_standings_invariants(&standings);
        Ok(standings)
    }

    /// Close the ballot `duration` after it opens
    #[instrument(skip(self, ballot), fields(ballot_id = ballot.id()))]
    pub fn set_duration(&self, ballot: &mut Ballot, duration: Duration) -> Result<()> {
        ballot.date_close = close_after(ballot.date_open, duration)?;
        self.write(ballot, "date_close")?;
        info!(date_close = %ballot.date_close, "Ballot duration changed");
        Ok(())
    }

    /// Move the opening time; `when` at or before now opens the ballot
    #[instrument(skip(self, ballot), fields(ballot_id = ballot.id()))]
    pub fn set_open(&self, ballot: &mut Ballot, when: DateTime<Utc>) -> Result<()> {
        ballot.date_open = truncate_timestamp(when);
        self.write(ballot, "date_open")?;
        info!(date_open = %ballot.date_open, "Ballot open date changed");
        Ok(())
    }

    /// Close the ballot immediately
    #[instrument(skip(self, ballot), fields(ballot_id = ballot.id()))]
    pub fn close_now(&self, ballot: &mut Ballot) -> Result<()> {
        ballot.date_close = truncate_timestamp(Utc::now());
        self.write(ballot, "date_close")?;
        info!("Ballot closed");
        Ok(())
    }

    /// Finish staging. Rejected while no game is linked.
    #[instrument(skip(self, ballot), fields(ballot_id = ballot.id()))]
    pub fn submit(&self, ballot: &mut Ballot) -> Result<()> {
        ballot.staging = false;
        if let Err(e) = self.write(ballot, "staging") {
            warn!(error = %e, "Ballot not submitted");
            ballot.staging = true;
            return Err(e);
        }
        info!(state = %ballot.state, "Ballot submitted");
        Ok(())
    }

    /// Write one column and reload the ballot with its derived state
    fn write(&self, ballot: &mut Ballot, column: &str) -> Result<()> {
        if repo::update_columns(self.conn, ballot, &[column])? == 0 {
            return Err(Error::NotFound(format!("ballot {}", ballot.id())));
        }
        repo::refresh(self.conn, ballot)?;
        assert_ballot_invariants(ballot);
        Ok(())
    }

    /// Cast the user's vote.
    ///
    /// The ballot must be open at the moment the vote is written, whatever
    /// state the caller last saw. A second vote by the same user is a
    /// duplication.
    #[instrument(skip(self, ballot, game), fields(ballot_id = ballot.id(), game_id = game.id()))]
    pub fn cast_vote(&self, ballot: &Ballot, user: i64, game: &Game) -> Result<BallotVote> {
        let mut vote = BallotVote {
            discord_user_id: user,
            ballot_id: ballot.id(),
            game_id: game.id(),
        };
        if let Err(e) = repo::insert(self.conn, &mut vote) {
            warn!(user, error = %e, "Vote rejected");
            return Err(match e {
                Error::Duplication(_) => {
                    Error::Duplication(format!("user {user} already voted on this ballot"))
                }
                other => other,
            });
        }
        info!(user, "Vote cast");
        Ok(vote)
    }

    /// The user's vote on the ballot and the game it went to
    pub fn vote_of(&self, ballot: &Ballot, user: i64) -> Result<Option<(BallotVote, Game)>> {
        repo::join_select(
            self.conn,
            "game_id",
            &Criteria::every()
                .eq("ballot_id", ballot.id())
                .eq("discord_user_id", user),
        )?
        .first()
    }

    /// Elect the winning game of a closed ballot.
    ///
    /// The game with the most votes wins; ties go to the lowest game id.
    /// Runs as one transaction: either the winner is elected or nothing
    /// changes.
    #[instrument(skip(self, ballot), fields(ballot_id = ballot.id()))]
    pub fn finalize(&self, ballot: &Ballot) -> Result<Game> {
        // Write lock first: a read lock cannot be upgraded while another
        // connection is writing
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let current: Ballot = repo::select_one(&tx, &Criteria::key_of(ballot))?
            .ok_or_else(|| Error::NotFound(format!("ballot {}", ballot.id())))?;
        if current.state != BallotState::Closed {
            return Err(Error::StateViolation(format!(
                "ballot not closed (currently {})",
                current.state
            )));
        }

        let winner: BallotGame = repo::select_one(
            &tx,
            &Criteria::any()
                .eq("ballot_id", current.id())
                .order_by("votes", Direction::Desc)
                .order_by("game_id", Direction::Asc)
                .limit(1),
        )?
        .ok_or_else(|| Error::Integrity(format!("ballot {} has no eligible game", current.id())))?;

        let mut game: Game = repo::select_one(&tx, &Criteria::any().eq("game_id", winner.game_id))?
            .ok_or_else(|| Error::Integrity(format!("game {} vanished", winner.game_id)))?;
        game.state = GameState::Elected;
        if repo::update_columns(&tx, &game, &["state"])? != 1 {
            return Err(Error::Integrity(format!("failed electing game {}", game.id())));
        }

        tx.commit()?;
        info!(game_id = game.id(), votes = winner.votes, "Ballot finalized");
        Ok(game)
    }
}
