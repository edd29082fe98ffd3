//! Winner announcements
//!
//! The only outbound action of the core: once a ballot is finalized, the
//! winner is sent to the community's announcement channel, if one is set.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::models::{Ballot, Game};
use crate::settings::{Settings, ANNOUNCEMENT_CHANNEL};
use crate::storage::Standing;

/// Result of a finalized ballot
#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub ballot: Ballot,
    pub winner: Game,
    /// Final tallies, winner first
    pub standings: Vec<Standing>,
}

impl Announcement {
    pub fn new(ballot: Ballot, winner: Game, standings: Vec<Standing>) -> Self {
        Self {
            ballot,
            winner,
            standings,
        }
    }

    pub fn headline(&self) -> String {
        format!(
            "A ballot just completed! Congratulations to the winner: {}",
            self.winner.name
        )
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Delivers announcements to a channel
#[async_trait(?Send)]
pub trait Announcer {
    async fn announce(&self, channel_id: i64, announcement: &Announcement) -> Result<()>;
}

/// Announce the winner to the configured channel.
///
/// Returns whether anything was sent: without a configured channel this is
/// a no-op. A channel setting that is not a channel id is a state violation.
#[instrument(skip_all, fields(ballot_id = announcement.ballot.id()))]
pub async fn announce_winner<S, A>(
    settings: &S,
    announcer: &A,
    announcement: &Announcement,
) -> Result<bool>
where
    S: Settings + ?Sized,
    A: Announcer + ?Sized,
{
    let Some(channel) = settings.get(ANNOUNCEMENT_CHANNEL) else {
        debug!("No announcement channel configured");
        return Ok(false);
    };
    let channel_id: i64 = channel.trim().parse().map_err(|_| {
        Error::StateViolation(format!("announcement channel \"{channel}\" is not a channel id"))
    })?;

    announcer.announce(channel_id, announcement).await?;
    info!(channel_id, game_id = announcement.winner.id(), "Winner announced");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::{Duration, Utc};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(i64, String)>>,
    }

    #[async_trait(?Send)]
    impl Announcer for Recorder {
        async fn announce(&self, channel_id: i64, announcement: &Announcement) -> Result<()> {
            self.sent
                .borrow_mut()
                .push((channel_id, announcement.winner.name.clone()));
            Ok(())
        }
    }

    fn announcement() -> Announcement {
        let mut ballot = Ballot::new(10, Utc::now(), Duration::days(3)).unwrap();
        ballot.ballot_id = Some(1);
        let winner = Game {
            game_id: Some(4),
            ..Game::new("Hades", "https://example.com/hades")
        };
        let standings = vec![Standing {
            game: winner.clone(),
            votes: 3,
        }];
        Announcement::new(ballot, winner, standings)
    }

    fn settings(channel: Option<&str>) -> HashMap<String, String> {
        channel
            .map(|c| (ANNOUNCEMENT_CHANNEL.to_string(), c.to_string()))
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_announces_to_configured_channel() {
        let recorder = Recorder::default();
        let sent = announce_winner(&settings(Some("1234")), &recorder, &announcement())
            .await
            .unwrap();

        assert!(sent);
        assert_eq!(*recorder.sent.borrow(), vec![(1234, "Hades".to_string())]);
    }

    #[tokio::test]
    async fn test_unset_channel_is_noop() {
        let recorder = Recorder::default();
        let sent = announce_winner(&settings(None), &recorder, &announcement())
            .await
            .unwrap();

        assert!(!sent);
        assert!(recorder.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_channel_is_state_violation() {
        let recorder = Recorder::default();
        let err = announce_winner(&settings(Some("#general")), &recorder, &announcement())
            .await
            .unwrap_err();
        assert!(err.is_state_violation());
    }

    #[test]
    fn test_json_carries_winner_and_standings() {
        let json: serde_json::Value =
            serde_json::from_str(&announcement().to_json().unwrap()).unwrap();
        assert_eq!(json["winner"]["name"], "Hades");
        assert_eq!(json["standings"][0]["votes"], 3);
        assert_eq!(json["ballot"]["state"], "staging");
    }
}
