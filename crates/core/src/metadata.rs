//! Game metadata resolution
//!
//! Games are resolved through an external [`MetadataSource`] (a store front,
//! a search index). Results are cached per community, keyed by a normalized
//! identity, and treated as fresh for a bounded window.

use async_trait::async_trait;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::storage::MetadataCacheStore;

/// Default freshness window of cached metadata, in hours
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

static STEAM_APP_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://store\.steampowered\.com/app/([0-9]+)")
        .expect("steam app url pattern is valid")
});

static STEAM_APP_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("steam app id pattern is valid"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// What the external source knows about a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub name: String,
    pub url: String,
    pub description: String,
    pub image: String,
    pub price: f64,
    pub review_count: i64,
    pub review_summary: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("\"{identifier}\" not found{hint}", hint = suggestion_hint(.suggestion.as_deref()))]
    NotFound {
        identifier: String,
        /// Closest match the source offered instead
        suggestion: Option<String>,
    },

    #[error("metadata source unavailable: {0}")]
    Unavailable(String),
}

fn suggestion_hint(suggestion: Option<&str>) -> String {
    suggestion
        .map(|s| format!(", did you mean \"{s}\"?"))
        .unwrap_or_default()
}

impl ResolveError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        ResolveError::NotFound {
            identifier: identifier.into(),
            suggestion: None,
        }
    }
}

/// An external source of game metadata.
///
/// Requests for one community are served one at a time, so implementations
/// need not be `Send`.
#[async_trait(?Send)]
pub trait MetadataSource {
    /// Resolve a name, store URL or app id
    async fn resolve(&self, identifier: &str) -> Result<GameMetadata, ResolveError>;
}

/// Cache key of an identifier.
///
/// Steam store URLs and bare app ids become `steam:<appid>`; anything else
/// becomes `name:` followed by the lowercased, whitespace-collapsed text.
pub fn normalize_identity(identifier: &str) -> String {
    let identifier = identifier.trim();
    if let Some(caps) = STEAM_APP_URL_RE.captures(identifier) {
        return format!("steam:{}", &caps[1]);
    }
    if STEAM_APP_ID_RE.is_match(identifier) {
        return format!("steam:{identifier}");
    }
    let collapsed = WHITESPACE_RE.replace_all(identifier, " ");
    format!("name:{}", collapsed.to_lowercase())
}

/// A [`MetadataSource`] backed by the community's metadata cache.
///
/// Concurrent first lookups of one identity may both reach the source; the
/// later store wins. Cache failures are logged and never fail a lookup.
pub struct CachedResolver<'a, S: ?Sized> {
    cache: MetadataCacheStore<'a>,
    source: &'a S,
    freshness: Duration,
}

impl<'a, S: MetadataSource + ?Sized> CachedResolver<'a, S> {
    pub fn new(cache: MetadataCacheStore<'a>, source: &'a S, freshness: Duration) -> Self {
        Self {
            cache,
            source,
            freshness,
        }
    }

    fn remember(&self, identity: &str, metadata: &GameMetadata) {
        let url_identity = normalize_identity(&metadata.url);
        for key in [identity, url_identity.as_str()] {
            if let Err(e) = self.cache.put(key, metadata) {
                warn!(identity = key, error = %e, "Failed to cache game metadata");
            }
            if url_identity == identity {
                break;
            }
        }
    }
}

#[async_trait(?Send)]
impl<'a, S: MetadataSource + ?Sized> MetadataSource for CachedResolver<'a, S> {
    #[instrument(skip(self))]
    async fn resolve(&self, identifier: &str) -> Result<GameMetadata, ResolveError> {
        let identity = normalize_identity(identifier);

        match self.cache.get(&identity, self.freshness) {
            Ok(Some(cached)) => {
                debug!(identity, "Metadata cache hit");
                return Ok(cached);
            }
            Ok(None) => debug!(identity, "Metadata cache miss"),
            Err(e) => warn!(identity, error = %e, "Failed to read metadata cache"),
        }

        let metadata = self.source.resolve(identifier).await?;
        self.remember(&identity, &metadata);
        Ok(metadata)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use super::*;
    use crate::storage::Database;

    /// In-memory source counting how often it was asked
    pub(crate) struct FakeSource {
        games: HashMap<String, GameMetadata>,
        pub calls: Cell<usize>,
    }

    impl FakeSource {
        pub fn new(games: &[(&str, &str)]) -> Self {
            Self {
                games: games
                    .iter()
                    .map(|(name, url)| (name.to_lowercase(), metadata(name, url)))
                    .collect(),
                calls: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl MetadataSource for FakeSource {
        async fn resolve(&self, identifier: &str) -> Result<GameMetadata, ResolveError> {
            self.calls.set(self.calls.get() + 1);
            let key = identifier.to_lowercase();
            if let Some(game) = self.games.get(&key) {
                return Ok(game.clone());
            }
            let suggestion = self
                .games
                .values()
                .find(|g| g.name.to_lowercase().starts_with(&key))
                .map(|g| g.name.clone());
            Err(ResolveError::NotFound {
                identifier: identifier.to_string(),
                suggestion,
            })
        }
    }

    pub(crate) fn metadata(name: &str, url: &str) -> GameMetadata {
        GameMetadata {
            name: name.to_string(),
            url: url.to_string(),
            description: format!("{name} is a game"),
            image: format!("{url}/header.jpg"),
            price: 19.99,
            review_count: 1200,
            review_summary: "Very Positive".to_string(),
        }
    }

    #[test]
    fn test_normalize_steam_identities() {
        assert_eq!(
            normalize_identity("https://store.steampowered.com/app/753640/Outer_Wilds/"),
            "steam:753640"
        );
        assert_eq!(
            normalize_identity("http://store.steampowered.com/app/753640"),
            "steam:753640"
        );
        assert_eq!(normalize_identity(" 753640 "), "steam:753640");
    }

    #[test]
    fn test_normalize_names() {
        assert_eq!(normalize_identity("Outer   Wilds"), "name:outer wilds");
        assert_eq!(normalize_identity("OUTER\tWILDS"), "name:outer wilds");
        assert_eq!(
            normalize_identity("https://example.com/app/1"),
            "name:https://example.com/app/1"
        );
    }

    #[test]
    fn test_not_found_message_carries_suggestion() {
        let err = ResolveError::NotFound {
            identifier: "hade".to_string(),
            suggestion: Some("Hades".to_string()),
        };
        assert_eq!(err.to_string(), "\"hade\" not found, did you mean \"Hades\"?");
        assert_eq!(
            ResolveError::not_found("zzz").to_string(),
            "\"zzz\" not found"
        );
    }

    #[tokio::test]
    async fn test_cached_resolver_hits_cache() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::new(&[("Hades", "https://store.steampowered.com/app/1145360/")]);
        let resolver = CachedResolver::new(db.metadata_cache(), &source, Duration::hours(24));

        let first = resolver.resolve("Hades").await.unwrap();
        let second = resolver.resolve("  hades ").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.get(), 1);

        // The resolved store URL is cached too
        resolver.resolve("1145360").await.unwrap();
        assert_eq!(source.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_stale_entries_are_refetched() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::new(&[("Celeste", "https://store.steampowered.com/app/504230/")]);
        let resolver = CachedResolver::new(db.metadata_cache(), &source, Duration::zero());

        resolver.resolve("Celeste").await.unwrap();
        resolver.resolve("Celeste").await.unwrap();
        assert_eq!(source.calls.get(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::new(&[("Hades", "https://store.steampowered.com/app/1145360/")]);
        let resolver = CachedResolver::new(db.metadata_cache(), &source, Duration::hours(24));

        let err = resolver.resolve("Had").await.unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                identifier: "Had".to_string(),
                suggestion: Some("Hades".to_string()),
            }
        );
        assert!(resolver.resolve("Had").await.is_err());
        assert_eq!(source.calls.get(), 2);
    }
}
