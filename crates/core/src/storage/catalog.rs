//! Catalog storage operations: games and proposals

use rusqlite::Connection;
use tracing::{info, instrument, warn};

use super::repository::{self as repo, Criteria};
use super::statement::Direction;
use crate::error::{Error, Result};
use crate::metadata::MetadataSource;
use crate::models::{Game, GameState, Proposal};

/// Catalog storage operations
pub struct CatalogStore<'a> {
    conn: &'a Connection,
}

impl<'a> CatalogStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Add a game in the `submitted` state
    #[instrument(skip(self))]
    pub fn add_game(&self, name: &str, url: &str) -> Result<Game> {
        let mut game = Game::new(name, url);
        repo::insert(self.conn, &mut game)?;
        info!(game_id = game.id(), "Game added");
        Ok(game)
    }

    /// Find a game by name, or by url when one is given
    pub fn get_game(&self, name: &str, url: Option<&str>) -> Result<Option<Game>> {
        let mut criteria = Criteria::any().eq("name", name.to_string());
        if let Some(url) = url {
            criteria = criteria.eq("url", url.to_string());
        }
        repo::select_one(self.conn, &criteria.order_by("game_id", Direction::Asc))
    }

    pub fn game(&self, game_id: i64) -> Result<Option<Game>> {
        repo::select_one(self.conn, &Criteria::any().eq("game_id", game_id))
    }

    /// Look a game up, adding it when it is unknown.
    ///
    /// Without a url the game is resolved through `source` first, so the
    /// stored name and url are the canonical ones.
    #[instrument(skip(self, source))]
    pub async fn get_or_add_game<S>(&self, name: &str, url: Option<&str>, source: &S) -> Result<Game>
    where
        S: MetadataSource + ?Sized,
    {
        if let Some(game) = self.get_game(name, url)? {
            return Ok(game);
        }

        let Some(url) = url else {
            let metadata = source.resolve(name).await?;
            if let Some(game) = self.get_game(&metadata.name, Some(&metadata.url))? {
                return Ok(game);
            }
            return self.add_game(&metadata.name, &metadata.url);
        };

        self.add_game(name, url)
    }

    /// Propose a game on behalf of `user`.
    ///
    /// Fails with a duplication when the user already has a live proposal,
    /// and with a state violation when the game no longer takes proposals.
    #[instrument(skip(self, source))]
    pub async fn propose<S>(
        &self,
        user: i64,
        name: &str,
        url: Option<&str>,
        source: &S,
    ) -> Result<(Proposal, Game)>
    where
        S: MetadataSource + ?Sized,
    {
        let mut game = self.get_or_add_game(name, url, source).await?;
        let mut proposal = Proposal::new(user, game.id());

        if let Err(e) = repo::insert(self.conn, &mut proposal) {
            warn!(user, game_id = game.id(), error = %e, "Proposal rejected");
            return Err(match e {
                Error::StateViolation(_) => Error::StateViolation(format!(
                    "game \"{}\" is {} and not taking proposals",
                    game.name, game.state
                )),
                Error::Duplication(_) => {
                    Error::Duplication(format!("user {user} already has an active proposal"))
                }
                other => other,
            });
        }

        repo::refresh(self.conn, &mut proposal)?;
        repo::refresh(self.conn, &mut game)?;
        info!(user, game_id = game.id(), "Game proposed");
        Ok((proposal, game))
    }

    /// Retract the user's proposal, returning the game it referenced.
    ///
    /// The game becomes `orphaned` when it was `submitted` and this was its
    /// last proposal.
    #[instrument(skip(self))]
    pub fn retract(&self, user: i64) -> Result<Game> {
        let (proposal, mut game) = self
            .proposal_of(user)?
            .ok_or_else(|| Error::NotFound(format!("user {user} has no active proposal")))?;

        if repo::delete(self.conn, &proposal)? == 0 {
            return Err(Error::NotFound(format!("user {user} has no active proposal")));
        }
        repo::refresh(self.conn, &mut game)?;

        if game.state == GameState::Orphaned {
            info!(user, game_id = game.id(), "Proposal retracted, game orphaned");
        } else {
            info!(user, game_id = game.id(), "Proposal retracted");
        }
        Ok(game)
    }

    /// The user's live proposal and the game it nominates
    pub fn proposal_of(&self, user: i64) -> Result<Option<(Proposal, Game)>> {
        repo::join_select(self.conn, "game_id", &Criteria::any().eq("discord_user_id", user))?.first()
    }

    /// Live proposals of a game, oldest first
    pub fn proposers(&self, game: &Game) -> Result<Vec<Proposal>> {
        repo::select(
            self.conn,
            &Criteria::any()
                .eq("game_id", game.id())
                .order_by("date_created", Direction::Asc)
                .order_by("discord_user_id", Direction::Asc),
        )?
        .all()
    }

    pub fn accept(&self, game: &mut Game) -> Result<()> {
        self.set_state(game, GameState::Accepted)
    }

    pub fn reject(&self, game: &mut Game) -> Result<()> {
        self.set_state(game, GameState::Rejected)
    }

    pub fn mark_done(&self, game: &mut Game) -> Result<()> {
        self.set_state(game, GameState::Done)
    }

    /// Overwrite the state of a game, whatever its current state
    #[instrument(skip(self, game), fields(game_id = game.id()))]
    pub fn set_state(&self, game: &mut Game, state: GameState) -> Result<()> {
        let previous = game.state;
        game.state = state;
        if repo::update_columns(self.conn, game, &["state"])? == 0 {
            game.state = previous;
            return Err(Error::NotFound(format!("game \"{}\"", game.name)));
        }
        info!(from = %previous, to = %state, "Game state changed");
        Ok(())
    }

    /// Games in any of `states`, by age; `None` lists the default set
    pub fn list_games(&self, states: Option<&[GameState]>) -> Result<Vec<Game>> {
        let states = states.unwrap_or(GameState::listed_by_default());
        let mut selection = repo::select::<Game>(
            self.conn,
            &Criteria::all().order_by("game_id", Direction::Asc),
        )?;
        let mut games = Vec::new();
        for game in selection.iter()? {
            let game = game?;
            if states.contains(&game.state) {
                games.push(game);
            }
        }
        Ok(games)
    }

    /// Administrative delete, including proposals, ballot links and votes
    #[instrument(skip(self, game), fields(game_id = game.id()))]
    pub fn delete_game(&self, game: &Game) -> Result<()> {
        if repo::delete(self.conn, game)? == 0 {
            return Err(Error::NotFound(format!("game \"{}\"", game.name)));
        }
        info!("Game deleted");
        Ok(())
    }
}
