//! Lets Try Core Library
//!
//! Game proposals, ballots and voting for the Lets Try series: a small
//! descriptor-driven entity layer over SQLite, the catalog and ballot state
//! machines built on it, and the seams to metadata, settings and
//! announcement collaborators.

pub mod announce;
pub mod config;
pub mod error;
pub mod invariants;
pub mod metadata;
pub mod models;
pub mod settings;
pub mod storage;

pub use announce::{announce_winner, Announcement, Announcer};
pub use config::Config;
pub use error::{Error, Result};
pub use metadata::{normalize_identity, CachedResolver, GameMetadata, MetadataSource, ResolveError};
pub use models::*;
pub use settings::Settings;
pub use storage::{
    BallotStore, CatalogStore, Criteria, Database, Entity, GuildStores, MetadataCacheStore,
    Standing,
};
