//! Application state management

use std::path::Path;

use letstry_core::{Config, Database, GuildStores, Result};
use tracing::debug;

/// Main application state
pub struct AppState {
    pub config: Config,
    guilds: GuildStores,
}

impl AppState {
    /// Load the configuration, from `config_path` or the platform default
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path)?,
            None => Config::load(&Config::default_path()?)?,
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let data_dir = config.data_dir()?;
        debug!(data_dir = %data_dir.display(), "Using data directory");
        let guilds = GuildStores::new(&data_dir)?;
        Ok(Self { config, guilds })
    }

    /// Store of one guild, created on first use
    pub fn guild(&mut self, guild_id: i64) -> Result<&Database> {
        self.guilds.get(guild_id)
    }

    pub fn guilds(&mut self) -> &mut GuildStores {
        &mut self.guilds
    }
}
