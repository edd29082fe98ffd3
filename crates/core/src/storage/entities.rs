//! Entity descriptions of the Lets Try relations

use rusqlite::types::Value;
use rusqlite::Row;

use super::descriptor::{Column, EntityDescriptor};
use super::parse::{format_timestamp, parse_ballot_state, parse_game_state, parse_timestamp, parse_timestamp_opt};
use super::traits::{Entity, FromRow};
use crate::models::{Ballot, BallotGame, BallotVote, Game, Proposal};

pub static GAME: EntityDescriptor = EntityDescriptor {
    name: "Game",
    table: "games",
    view: None,
    columns: &[
        Column::new("game_id"),
        Column::new("name"),
        Column::new("url"),
        Column::new("state"),
    ],
    primary_key: None,
};

pub static PROPOSAL: EntityDescriptor = EntityDescriptor {
    name: "Proposal",
    table: "proposals",
    view: None,
    columns: &[
        Column::new("discord_user_id"),
        Column::new("date_created"),
        Column::foreign("game_id", &GAME),
    ],
    primary_key: None,
};

pub static BALLOT: EntityDescriptor = EntityDescriptor {
    name: "Ballot",
    table: "ballots",
    view: Some("ballots_view"),
    columns: &[
        Column::new("ballot_id"),
        Column::new("discord_thread_id"),
        Column::new("date_created"),
        Column::new("date_open"),
        Column::new("date_close"),
        Column::new("staging"),
        Column::computed("state"),
    ],
    primary_key: None,
};

pub static BALLOT_GAME: EntityDescriptor = EntityDescriptor {
    name: "BallotGame",
    table: "ballot_games",
    view: None,
    columns: &[
        Column::new("votes"),
        Column::foreign("ballot_id", &BALLOT),
        Column::foreign("game_id", &GAME),
    ],
    primary_key: Some(&["ballot_id", "game_id"]),
};

pub static BALLOT_VOTE: EntityDescriptor = EntityDescriptor {
    name: "BallotVote",
    table: "ballot_votes",
    view: None,
    columns: &[
        Column::new("discord_user_id"),
        Column::foreign("ballot_id", &BALLOT),
        Column::foreign("game_id", &GAME),
    ],
    primary_key: Some(&["ballot_id", "discord_user_id"]),
};

fn optional_int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

impl FromRow for Game {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Game {
            game_id: row.get(offset)?,
            name: row.get(offset + 1)?,
            url: row.get(offset + 2)?,
            state: parse_game_state(offset + 3, &row.get::<_, String>(offset + 3)?)?,
        })
    }

    fn width() -> usize {
        GAME.width()
    }
}

impl Entity for Game {
    fn descriptor() -> &'static EntityDescriptor {
        &GAME
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "game_id" => optional_int(self.game_id),
            "name" => text(&self.name),
            "url" => text(&self.url),
            "state" => text(self.state.as_str()),
            _ => Value::Null,
        }
    }

    fn set_generated_key(&mut self, key: i64) {
        self.game_id = Some(key);
    }
}

impl FromRow for Proposal {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Proposal {
            discord_user_id: row.get(offset)?,
            date_created: parse_timestamp_opt(offset + 1, row.get(offset + 1)?)?,
            game_id: row.get(offset + 2)?,
        })
    }

    fn width() -> usize {
        PROPOSAL.width()
    }
}

impl Entity for Proposal {
    fn descriptor() -> &'static EntityDescriptor {
        &PROPOSAL
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "discord_user_id" => Value::Integer(self.discord_user_id),
            "date_created" => self
                .date_created
                .map(|dt| Value::Text(format_timestamp(&dt)))
                .unwrap_or(Value::Null),
            "game_id" => Value::Integer(self.game_id),
            _ => Value::Null,
        }
    }
}

impl FromRow for Ballot {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Ballot {
            ballot_id: row.get(offset)?,
            discord_thread_id: row.get(offset + 1)?,
            date_created: parse_timestamp(offset + 2, &row.get::<_, String>(offset + 2)?)?,
            date_open: parse_timestamp(offset + 3, &row.get::<_, String>(offset + 3)?)?,
            date_close: parse_timestamp(offset + 4, &row.get::<_, String>(offset + 4)?)?,
            staging: row.get(offset + 5)?,
            state: parse_ballot_state(offset + 6, &row.get::<_, String>(offset + 6)?)?,
        })
    }

    fn width() -> usize {
        BALLOT.width()
    }
}

impl Entity for Ballot {
    fn descriptor() -> &'static EntityDescriptor {
        &BALLOT
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "ballot_id" => optional_int(self.ballot_id),
            "discord_thread_id" => Value::Integer(self.discord_thread_id),
            "date_created" => Value::Text(format_timestamp(&self.date_created)),
            "date_open" => Value::Text(format_timestamp(&self.date_open)),
            "date_close" => Value::Text(format_timestamp(&self.date_close)),
            "staging" => Value::Integer(self.staging as i64),
            "state" => text(self.state.as_str()),
            _ => Value::Null,
        }
    }

    fn set_generated_key(&mut self, key: i64) {
        self.ballot_id = Some(key);
    }
}

impl FromRow for BallotGame {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(BallotGame {
            votes: row.get(offset)?,
            ballot_id: row.get(offset + 1)?,
            game_id: row.get(offset + 2)?,
        })
    }

    fn width() -> usize {
        BALLOT_GAME.width()
    }
}

impl Entity for BallotGame {
    fn descriptor() -> &'static EntityDescriptor {
        &BALLOT_GAME
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "votes" => Value::Integer(self.votes),
            "ballot_id" => Value::Integer(self.ballot_id),
            "game_id" => Value::Integer(self.game_id),
            _ => Value::Null,
        }
    }
}

impl FromRow for BallotVote {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(BallotVote {
            discord_user_id: row.get(offset)?,
            ballot_id: row.get(offset + 1)?,
            game_id: row.get(offset + 2)?,
        })
    }

    fn width() -> usize {
        BALLOT_VOTE.width()
    }
}

impl Entity for BallotVote {
    fn descriptor() -> &'static EntityDescriptor {
        &BALLOT_VOTE
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "discord_user_id" => Value::Integer(self.discord_user_id),
            "ballot_id" => Value::Integer(self.ballot_id),
            "game_id" => Value::Integer(self.game_id),
            _ => Value::Null,
        }
    }
}
