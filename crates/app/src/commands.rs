//! Command execution against a guild's store

use std::collections::HashMap;

use letstry_core::settings::ANNOUNCEMENT_CHANNEL;
use letstry_core::{
    announce_winner, Announcement, Ballot, CachedResolver, CatalogStore, Database, Error, Game,
    GameState, Result,
};
use tracing::instrument;

use crate::cli::{
    BallotAction, BallotArgs, CacheCommand, Cli, Command, GamesCommand, GuildsCommand,
};
use crate::sources::OfflineSource;
use crate::state::AppState;
use crate::town_crier::TownCrier;

/// Run one command, returning the lines to print
#[instrument(skip_all, fields(guild = cli.guild))]
pub async fn run(state: &mut AppState, cli: Cli) -> Result<Vec<String>> {
    let guild = cli.guild;
    match cli.command {
        Command::Guilds(command) => guilds(state, command),
        Command::Bootstrap => {
            let version = state.guild(guild)?.schema_version()?;
            Ok(vec![format!("guild {guild} ready at schema version {version}")])
        }
        Command::Games(command) => games(state.guild(guild)?, command),
        Command::Propose { user, url, name } => {
            let freshness = state.config.metadata_freshness()?;
            let db = state.guild(guild)?;
            let resolver = CachedResolver::new(db.metadata_cache(), &OfflineSource, freshness);
            let (_, game) = db
                .catalog()
                .propose(user, &name, url.as_deref(), &resolver)
                .await?;
            Ok(vec![format!("user {user} proposed {}", describe(&game))])
        }
        Command::Retract { user } => {
            let game = state.guild(guild)?.catalog().retract(user)?;
            Ok(vec![format!("user {user} retracted {}", describe(&game))])
        }
        Command::Ballots => {
            let ballots = state.guild(guild)?.ballots().active_ballots()?;
            Ok(ballots.iter().map(describe_ballot).collect())
        }
        Command::Ballot(args) => {
            let window = state.config.ballot_duration()?;
            ballot(state.guild(guild)?, args, window).await
        }
        Command::Cache(CacheCommand::Prune) => {
            let freshness = state.config.metadata_freshness()?;
            let removed = state.guild(guild)?.metadata_cache().purge_stale(freshness)?;
            Ok(vec![format!("removed {removed} stale metadata entries")])
        }
    }
}

fn guilds(state: &mut AppState, command: GuildsCommand) -> Result<Vec<String>> {
    match command {
        GuildsCommand::List => Ok(state
            .guilds()
            .known_guilds()?
            .into_iter()
            .map(|id| id.to_string())
            .collect()),
        GuildsCommand::Remove { guild_id } => {
            state.guilds().remove(guild_id)?;
            Ok(vec![format!("guild {guild_id} removed")])
        }
    }
}

/// Administrative state change of a catalog game
type Transition<'s> = fn(&CatalogStore<'s>, &mut Game) -> Result<()>;

fn games(db: &Database, command: GamesCommand) -> Result<Vec<String>> {
    let catalog = db.catalog();
    let (mut game, transition): (Game, Transition<'_>) = match command {
        GamesCommand::List { state } => {
            let states: Option<Vec<GameState>> =
                state.map(|states| states.into_iter().map(GameState::from).collect());
            let games = catalog.list_games(states.as_deref())?;
            return Ok(games.iter().map(describe).collect());
        }
        GamesCommand::Add { name, url } => {
            let game = catalog.add_game(&name, &url)?;
            return Ok(vec![format!("added {}", describe(&game))]);
        }
        GamesCommand::Delete { name } => {
            let game = find_game(db, &name)?;
            catalog.delete_game(&game)?;
            return Ok(vec![format!("deleted {}", describe(&game))]);
        }
        GamesCommand::Accept { name } => (find_game(db, &name)?, CatalogStore::accept),
        GamesCommand::Reject { name } => (find_game(db, &name)?, CatalogStore::reject),
        GamesCommand::Done { name } => (find_game(db, &name)?, CatalogStore::mark_done),
    };

    transition(&catalog, &mut game)?;
    Ok(vec![describe(&game)])
}

async fn ballot(
    db: &Database,
    args: BallotArgs,
    window: chrono::Duration,
) -> Result<Vec<String>> {
    let store = db.ballots();
    let thread = args.thread;
    let existing = || -> Result<Ballot> {
        store
            .ballot_by_thread(thread)?
            .ok_or_else(|| Error::NotFound(format!("no ballot for thread {thread}")))
    };

    let ballot = match args.action {
        BallotAction::Create => store.create_with_window(thread, window)?,
        BallotAction::Show => existing()?,
        BallotAction::Add { game } => {
            let ballot = existing()?;
            store.add_game(&ballot, &find_game(db, &game)?)?;
            ballot
        }
        BallotAction::Remove { game } => {
            let ballot = existing()?;
            store.remove_game(&ballot, &find_game(db, &game)?)?;
            ballot
        }
        BallotAction::Submit => {
            let mut ballot = existing()?;
            store.submit(&mut ballot)?;
            ballot
        }
        BallotAction::Open { when } => {
            let mut ballot = existing()?;
            store.set_open(&mut ballot, when)?;
            ballot
        }
        BallotAction::Duration { hours } => {
            let duration = chrono::Duration::try_hours(hours)
                .ok_or_else(|| Error::StateViolation("ballot duration out of range".into()))?;
            let mut ballot = existing()?;
            store.set_duration(&mut ballot, duration)?;
            ballot
        }
        BallotAction::Close => {
            let mut ballot = existing()?;
            store.close_now(&mut ballot)?;
            ballot
        }
        BallotAction::Vote { user, game } => {
            let game = find_game(db, &game)?;
            store.cast_vote(&existing()?, user, &game)?;
            return Ok(vec![format!("user {user} voted for {}", describe(&game))]);
        }
        BallotAction::Finalize { announce_channel } => {
            let ballot = existing()?;
            let winner = store.finalize(&ballot)?;
            let standings = store.games(&ballot)?;
            let mut lines = vec![format!("winner: {}", describe(&winner))];

            let settings: HashMap<String, String> = announce_channel
                .map(|channel| (ANNOUNCEMENT_CHANNEL.to_string(), channel))
                .into_iter()
                .collect();
            let announcement = Announcement::new(ballot, winner, standings);
            if announce_winner(&settings, &TownCrier::new(), &announcement).await? {
                lines.push("winner announced".to_string());
            }
            return Ok(lines);
        }
    };

    let mut lines = vec![describe_ballot(&ballot)];
    for standing in store.games(&ballot)? {
        lines.push(format!("  {:>4}  {}", standing.votes, describe(&standing.game)));
    }
    Ok(lines)
}

/// Resolve a game by exact name
fn find_game(db: &Database, name: &str) -> Result<Game> {
    db.catalog()
        .get_game(name, None)?
        .ok_or_else(|| Error::NotFound(format!("game \"{name}\"")))
}

fn describe(game: &Game) -> String {
    format!("#{} {} [{}] {}", game.id(), game.name, game.state, game.url)
}

fn describe_ballot(ballot: &Ballot) -> String {
    format!(
        "ballot #{} thread {} [{}] open {} close {}",
        ballot.id(),
        ballot.discord_thread_id,
        ballot.state,
        ballot.date_open.format("%Y-%m-%d %H:%M"),
        ballot.date_close.format("%Y-%m-%d %H:%M"),
    )
}
