//! Proposal model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant's pending nomination of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub discord_user_id: i64,
    /// Filled in by the store
    pub date_created: Option<DateTime<Utc>>,
    pub game_id: i64,
}

impl Proposal {
    pub fn new(discord_user_id: i64, game_id: i64) -> Self {
        Self {
            discord_user_id,
            date_created: None,
            game_id,
        }
    }
}
