use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use letstry_core::GameState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Operate Lets Try game proposals and ballots.")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Guild whose store to operate on.
    #[arg(long, global = true, default_value_t = 0)]
    pub guild: i64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or migrate the guild's store.
    Bootstrap,
    /// Manage the game catalog.
    #[command(subcommand)]
    Games(GamesCommand),
    /// Propose a game on behalf of a user.
    Propose {
        #[arg(long)]
        user: i64,
        /// Canonical URL; without one the name is resolved through the metadata cache.
        #[arg(long)]
        url: Option<String>,
        name: String,
    },
    /// Retract a user's proposal.
    Retract {
        #[arg(long)]
        user: i64,
    },
    /// List ballots that are open or waiting to open.
    Ballots,
    /// Manage one ballot, identified by its thread.
    Ballot(BallotArgs),
    /// Maintain the metadata cache.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Manage guild stores.
    #[command(subcommand)]
    Guilds(GuildsCommand),
}

#[derive(Subcommand, Debug)]
pub enum GamesCommand {
    /// List games, by default those still in the running.
    List {
        #[arg(long, value_enum, value_delimiter = ',')]
        state: Option<Vec<StateArg>>,
    },
    /// Add a game directly.
    Add { name: String, url: String },
    Accept { name: String },
    Reject { name: String },
    Done { name: String },
    /// Delete a game with its proposals, ballot links and votes.
    Delete { name: String },
}

#[derive(Args, Debug)]
pub struct BallotArgs {
    /// Discussion thread of the ballot.
    #[arg(long)]
    pub thread: i64,

    #[command(subcommand)]
    pub action: BallotAction,
}

#[derive(Subcommand, Debug)]
pub enum BallotAction {
    /// Create a staging ballot with the configured window.
    Create,
    Show,
    Add { game: String },
    Remove { game: String },
    /// Finish staging.
    Submit,
    /// Set the opening time: "now" or an RFC 3339 timestamp.
    Open {
        #[arg(value_parser = parse_when)]
        when: DateTime<Utc>,
    },
    /// Close the ballot this many hours after it opens.
    Duration {
        #[arg(allow_negative_numbers = true)]
        hours: i64,
    },
    /// Close the ballot immediately.
    Close,
    Vote {
        #[arg(long)]
        user: i64,
        game: String,
    },
    /// Elect the winner of a closed ballot.
    Finalize {
        /// Channel to announce the winner to.
        #[arg(long)]
        announce_channel: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Drop entries past the freshness window.
    Prune,
}

#[derive(Subcommand, Debug)]
pub enum GuildsCommand {
    List,
    /// Delete a guild's storage.
    Remove { guild_id: i64 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StateArg {
    Submitted,
    Accepted,
    Rejected,
    Elected,
    Done,
    Orphaned,
}

impl From<StateArg> for GameState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Submitted => GameState::Submitted,
            StateArg::Accepted => GameState::Accepted,
            StateArg::Rejected => GameState::Rejected,
            StateArg::Elected => GameState::Elected,
            StateArg::Done => GameState::Done,
            StateArg::Orphaned => GameState::Orphaned,
        }
    }
}

fn parse_when(value: &str) -> Result<DateTime<Utc>, String> {
    if value.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|when| when.with_timezone(&Utc))
        .map_err(|e| format!("expected \"now\" or an RFC 3339 timestamp: {e}"))
}
