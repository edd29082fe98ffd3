//! Game model - a candidate item for ballots

use serde::{Deserialize, Serialize};

/// Lifecycle of a game in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    /// Proposed by at least one participant
    #[default]
    Submitted,
    Accepted,
    Rejected,
    /// Won a ballot
    Elected,
    Done,
    /// Every proposer retracted
    Orphaned,
}

impl GameState {
    pub const ALL: [GameState; 6] = [
        GameState::Submitted,
        GameState::Accepted,
        GameState::Rejected,
        GameState::Elected,
        GameState::Done,
        GameState::Orphaned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Submitted => "submitted",
            GameState::Accepted => "accepted",
            GameState::Rejected => "rejected",
            GameState::Elected => "elected",
            GameState::Done => "done",
            GameState::Orphaned => "orphaned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "submitted" => Some(GameState::Submitted),
            "accepted" => Some(GameState::Accepted),
            "rejected" => Some(GameState::Rejected),
            "elected" => Some(GameState::Elected),
            "done" => Some(GameState::Done),
            "orphaned" => Some(GameState::Orphaned),
            _ => None,
        }
    }

    /// Can a game in this state be proposed or linked to a ballot?
    pub fn is_electable(&self) -> bool {
        !matches!(self, GameState::Rejected | GameState::Done)
    }

    /// States shown when listing without an explicit filter
    pub fn listed_by_default() -> &'static [GameState] {
        &[GameState::Submitted, GameState::Accepted, GameState::Elected]
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A game known to a community's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Assigned by the store on insert
    pub game_id: Option<i64>,
    pub name: String,
    /// Canonical external reference
    pub url: String,
    pub state: GameState,
}

impl Game {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            game_id: None,
            name: name.into(),
            url: url.into(),
            state: GameState::Submitted,
        }
    }

    /// The stored id, or 0 for a game that was never inserted
    pub fn id(&self) -> i64 {
        self.game_id.unwrap_or_default()
    }
}
