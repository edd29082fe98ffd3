//! Metadata sources available to the operator tool

use async_trait::async_trait;
use letstry_core::{GameMetadata, MetadataSource, ResolveError};

/// Source used when no storefront is reachable.
///
/// Wrapped in a `CachedResolver`, names resolved earlier are still served
/// from the cache; anything else needs an explicit URL.
pub struct OfflineSource;

#[async_trait(?Send)]
impl MetadataSource for OfflineSource {
    async fn resolve(&self, identifier: &str) -> Result<GameMetadata, ResolveError> {
        Err(ResolveError::Unavailable(format!(
            "no metadata source available to resolve \"{identifier}\", pass --url"
        )))
    }
}
