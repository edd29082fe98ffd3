//! Town Crier - ballot winner announcer
//!
//! Without a chat connection the operator tool announces winners to the log:
//! a headline for people reading the output and the full result as JSON for
//! anything scraping it.

use std::cell::RefCell;

use async_trait::async_trait;
use letstry_core::{Announcement, Announcer, Result};
use tracing::info;

/// Announces ballot results through `tracing`
#[derive(Default)]
pub struct TownCrier {
    /// Headlines announced so far, per channel
    announced: RefCell<Vec<(i64, String)>>,
}

impl TownCrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announced(&self) -> Vec<(i64, String)> {
        self.announced.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Announcer for TownCrier {
    async fn announce(&self, channel_id: i64, announcement: &Announcement) -> Result<()> {
        let headline = announcement.headline();
        info!(
            channel_id,
            result = %announcement.to_json()?,
            "{}", headline
        );
        self.announced.borrow_mut().push((channel_id, headline));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use letstry_core::{announce_winner, settings::ANNOUNCEMENT_CHANNEL, Ballot, Game, Standing};

    use super::*;

    #[tokio::test]
    async fn test_announces_winner_headline() {
        let mut ballot = Ballot::new(3, Utc::now(), Duration::hours(1)).unwrap();
        ballot.ballot_id = Some(1);
        let winner = Game {
            game_id: Some(2),
            ..Game::new("Celeste", "https://example.com/celeste")
        };
        let announcement = Announcement::new(
            ballot,
            winner.clone(),
            vec![Standing {
                game: winner,
                votes: 4,
            }],
        );
        let settings: HashMap<String, String> =
            [(ANNOUNCEMENT_CHANNEL.to_string(), "55".to_string())].into();

        let crier = TownCrier::new();
        assert!(announce_winner(&settings, &crier, &announcement).await.unwrap());

        let announced = crier.announced();
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].0, 55);
        assert!(announced[0].1.ends_with("Celeste"));
    }
}
