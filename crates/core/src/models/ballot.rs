//! Ballot, ballot-game link and vote models

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default voting window of a freshly created ballot, in hours
pub const DEFAULT_BALLOT_HOURS: i64 = 72;

pub fn default_ballot_duration() -> Duration {
    Duration::hours(DEFAULT_BALLOT_HOURS)
}

/// Closing time of a ballot opening at `date_open` and lasting `duration`.
///
/// Negative durations are rejected, as are closing times past year 9999,
/// which the stored timestamp format cannot represent.
pub fn close_after(date_open: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    if duration < Duration::zero() {
        return Err(Error::StateViolation("ballot duration is negative".into()));
    }
    date_open
        .checked_add_signed(duration)
        .filter(|close| close.year() <= 9999)
        .ok_or_else(|| Error::StateViolation("ballot duration out of range".into()))
}

/// Derived ballot lifecycle. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BallotState {
    /// Being assembled, not yet submitted
    Staging,
    /// Submitted, waiting for `date_open`
    Submitted,
    Open,
    Closed,
}

impl BallotState {
    /// Compute the state from the persisted fields and a point in time.
    pub fn derive(
        staging: bool,
        date_open: DateTime<Utc>,
        date_close: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        if staging {
            BallotState::Staging
        } else if now < date_open {
            BallotState::Submitted
        } else if now < date_close {
            BallotState::Open
        } else {
            BallotState::Closed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BallotState::Staging => "staging",
            BallotState::Submitted => "submitted",
            BallotState::Open => "open",
            BallotState::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "staging" => Some(BallotState::Staging),
            "submitted" => Some(BallotState::Submitted),
            "open" => Some(BallotState::Open),
            "closed" => Some(BallotState::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BallotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed vote scoped to one discussion thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    /// Assigned by the store on insert
    pub ballot_id: Option<i64>,
    pub discord_thread_id: i64,
    pub date_created: DateTime<Utc>,
    pub date_open: DateTime<Utc>,
    pub date_close: DateTime<Utc>,
    pub staging: bool,
    /// State as computed by the store when this row was read
    pub state: BallotState,
}

impl Ballot {
    /// A staging ballot opening now and closing after `window`
    pub fn new(discord_thread_id: i64, now: DateTime<Utc>, window: Duration) -> Result<Self> {
        Ok(Self {
            ballot_id: None,
            discord_thread_id,
            date_created: now,
            date_open: now,
            date_close: close_after(now, window)?,
            staging: true,
            state: BallotState::Staging,
        })
    }

    /// The stored id, or 0 for a ballot that was never inserted
    pub fn id(&self) -> i64 {
        self.ballot_id.unwrap_or_default()
    }

    /// State at an arbitrary instant, independent of when the row was read
    pub fn state_at(&self, now: DateTime<Utc>) -> BallotState {
        BallotState::derive(self.staging, self.date_open, self.date_close, now)
    }

    pub fn duration(&self) -> Duration {
        self.date_close - self.date_open
    }
}

/// Link between a ballot and a game, carrying the vote tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotGame {
    pub votes: i64,
    pub ballot_id: i64,
    pub game_id: i64,
}

impl BallotGame {
    pub fn new(ballot_id: i64, game_id: i64) -> Self {
        Self {
            votes: 0,
            ballot_id,
            game_id,
        }
    }
}

/// One participant's vote on one ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotVote {
    pub discord_user_id: i64,
    pub ballot_id: i64,
    pub game_id: i64,
}
