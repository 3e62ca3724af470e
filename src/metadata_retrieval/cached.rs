//! Cached metadata provider implementation
//!
//! This module provides a caching wrapper for metadata providers that
//! automatically stores and retrieves TV series data from a local cache.

use super::{MetadataProvider, MetadataRetrievalError, SeriesQuery, TVSeries};
use crate::cache::CacheStorage;
use tracing::{debug, warn};

/// A caching wrapper for metadata providers
///
/// This provider wraps another metadata provider and caches the results
/// to avoid redundant network requests. The cache is persistent across
/// application runs.
pub struct CachedMetadataProvider<P>
where
    P: MetadataProvider,
{
    /// The underlying metadata provider
    provider: P,
    /// Cache storage for TV series data
    cache: CacheStorage<TVSeries>,
}

impl<P> CachedMetadataProvider<P>
where
    P: MetadataProvider,
{
    /// Creates a new cached metadata provider wrapping the given provider
    ///
    /// # Arguments
    ///
    /// * `provider` - The metadata provider to wrap
    /// * `cache` - The cache storage to use for caching
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let tvmaze = TvMazeProvider::new();
    /// let cache = CacheStorage::open("metadata", None)?;
    /// let cached = CachedMetadataProvider::new(tvmaze, cache);
    /// ```
    pub fn new(provider: P, cache: CacheStorage<TVSeries>) -> Self {
        Self { provider, cache }
    }

    /// Generates a cache key for a series query
    ///
    /// Names are compared case-insensitively, ids and names never collide.
    fn cache_key(query: &SeriesQuery, language: &str) -> String {
        match query {
            SeriesQuery::Name(name) => format!("name_{}_{}", language, name.to_lowercase()),
            SeriesQuery::Id(id) => format!("id_{language}_{id}"),
        }
    }
}

impl<P> MetadataProvider for CachedMetadataProvider<P>
where
    P: MetadataProvider,
{
    fn fetch_series(
        &self,
        query: &SeriesQuery,
        language: &str,
    ) -> Result<TVSeries, MetadataRetrievalError> {
        let cache_key = Self::cache_key(query, language);

        // Cache failures never prevent metadata retrieval
        match self.cache.load(&cache_key) {
            Ok(Some(series)) => {
                debug!(%query, "Using cached series metadata");
                return Ok(series);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable cache entry"),
        }

        let series = self.provider.fetch_series(query, language)?;

        if let Err(e) = self.cache.store(&cache_key, &series) {
            warn!(error = %e, "Failed to cache series metadata");
        }

        Ok(series)
    }
}
