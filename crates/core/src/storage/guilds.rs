//! Per-community store registry
//!
//! Every guild gets its own database under `<data_dir>/guilds/<guild_id>/`.
//! Stores are opened and migrated on first use and kept open afterwards.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use super::Database;
use crate::error::Result;

/// File name of a guild's database
pub const DATABASE_FILE: &str = "letstry.db";

const GUILDS_DIR: &str = "guilds";

/// Open guild stores, keyed by guild id
pub struct GuildStores {
    base_path: PathBuf,
    open: HashMap<i64, Database>,
}

impl GuildStores {
    /// Registry rooted at `data_dir`
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let base_path = data_dir.as_ref().join(GUILDS_DIR);
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            open: HashMap::new(),
        })
    }

    /// Directory holding a guild's storage
    pub fn guild_path(&self, guild_id: i64) -> PathBuf {
        self.base_path.join(guild_id.to_string())
    }

    /// The guild's store, bootstrapping it on first use
    #[instrument(skip(self))]
    pub fn get(&mut self, guild_id: i64) -> Result<&Database> {
        let path = self.guild_path(guild_id);
        match self.open.entry(guild_id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                fs::create_dir_all(&path)?;
                let db = Database::open(path.join(DATABASE_FILE))?;
                info!(guild_id, "Guild store opened");
                Ok(entry.insert(db))
            }
        }
    }

    pub fn is_open(&self, guild_id: i64) -> bool {
        self.open.contains_key(&guild_id)
    }

    /// Guilds with storage on disk, in ascending id order
    pub fn known_guilds(&self) -> Result<Vec<i64>> {
        let mut guilds = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
                guilds.push(id);
            }
        }
        guilds.sort_unstable();
        Ok(guilds)
    }

    /// Close the guild's store and delete its storage
    #[instrument(skip(self))]
    pub fn remove(&mut self, guild_id: i64) -> Result<()> {
        self.open.remove(&guild_id);
        let path = self.guild_path(guild_id);
        if path.exists() {
            fs::remove_dir_all(&path)?;
            info!(guild_id, "Guild store deleted");
        }
        Ok(())
    }
}
