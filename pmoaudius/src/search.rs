//! Track search against the current Audius node
//!
//! Search never fails from the caller's point of view: an unreachable node
//! or a bad answer yields an empty list and a warning in the logs.

use crate::directory::{NodeDirectory, endpoint};
use crate::error::{AudiusError, Result};
use crate::models::{SearchResponse, Track};
use moka::future::Cache as MokaCache;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default lifetime of memoised search results (5 minutes)
pub const DEFAULT_SEARCH_CACHE_TTL_SECS: u64 = 300;

/// Default number of distinct queries kept in memory
pub const DEFAULT_SEARCH_CACHE_CAPACITY: u64 = 256;

/// Default timeout for search requests
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;

/// Text search over Audius tracks, memoised per exact query
#[derive(Clone)]
pub struct TrackSearchService {
    client: Client,
    directory: Arc<NodeDirectory>,
    app_name: String,
    timeout: Duration,
    cache: MokaCache<String, Vec<Track>>,
}

impl TrackSearchService {
    pub fn new(
        client: Client,
        directory: Arc<NodeDirectory>,
        app_name: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self::with_capacity(client, directory, app_name, ttl, DEFAULT_SEARCH_CACHE_CAPACITY)
    }

    pub fn with_capacity(
        client: Client,
        directory: Arc<NodeDirectory>,
        app_name: impl Into<String>,
        ttl: Duration,
        max_capacity: u64,
    ) -> Self {
        Self {
            client,
            directory,
            app_name: app_name.into(),
            timeout: Duration::from_secs(DEFAULT_SEARCH_TIMEOUT_SECS),
            cache: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Set the search request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search tracks matching `query`
    ///
    /// Blank queries return an empty list without touching the network.
    /// With `use_cache`, a successful answer is reused for identical query
    /// text until the cache TTL elapses, and concurrent identical searches
    /// share one request. Failed searches are not cached.
    pub async fn search(&self, query: &str, use_cache: bool) -> Vec<Track> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        if !use_cache {
            return self.fetch_current(query).await.unwrap_or_default();
        }

        self.cache
            .try_get_with(query.to_string(), self.fetch_current(query))
            .await
            .unwrap_or_default()
    }

    /// Forget the memoised result for one query
    pub async fn invalidate(&self, query: &str) {
        self.cache.invalidate(query).await;
    }

    /// Forget every memoised result
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Number of memoised queries
    pub async fn cached_queries(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Search on the node currently picked by the directory
    async fn fetch_current(&self, query: &str) -> Result<Vec<Track>> {
        let base = self.directory.resolve_base(false).await;

        match self.fetch(&base, query).await {
            Ok(tracks) => {
                debug!(query, node = %base, hits = tracks.len(), "Search completed");
                Ok(tracks)
            }
            Err(e) => {
                warn!(query, node = %base, error = %e, "Search failed");
                Err(e)
            }
        }
    }

    async fn fetch(&self, base: &str, query: &str) -> Result<Vec<Track>> {
        let url = endpoint(
            base,
            &["v1", "tracks", "search"],
            &[("query", query), ("app_name", self.app_name.as_str())],
        )?;

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AudiusError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.data.into_iter().map(Track::from).collect())
    }
}

impl std::fmt::Debug for TrackSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackSearchService")
            .field("app_name", &self.app_name)
            .field("timeout", &self.timeout)
            .field("cached_queries", &self.cache.entry_count())
            .finish()
    }
}
