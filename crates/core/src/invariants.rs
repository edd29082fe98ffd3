//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Ballot, BallotState};
use crate::storage::Standing;

/// Validate that a Ballot read from the store is internally consistent
pub fn assert_ballot_invariants(ballot: &Ballot) {
    debug_assert!(
        ballot.ballot_id.is_some(),
        "Ballot for thread {} was never stored",
        ballot.discord_thread_id
    );

    // Only staging ballots report the staging state
    debug_assert_eq!(
        ballot.staging,
        ballot.state == BallotState::Staging,
        "Ballot {:?} has staging={} but state {}",
        ballot.ballot_id,
        ballot.staging,
        ballot.state
    );
}

/// Validate that standings are tallied and ordered the way finalization reads them
pub fn assert_standings_invariants(standings: &[Standing]) {
    for standing in standings {
        debug_assert!(
            standing.votes >= 0,
            "Game {:?} has negative tally {}",
            standing.game.game_id,
            standing.votes
        );
    }

    for pair in standings.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        debug_assert!(
            a.votes > b.votes || (a.votes == b.votes && a.game.game_id < b.game.game_id),
            "Standings out of order: {:?} ({}) before {:?} ({})",
            a.game.game_id,
            a.votes,
            b.game.game_id,
            b.votes
        );
    }
}
