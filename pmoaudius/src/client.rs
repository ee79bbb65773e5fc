//! HTTP client for the Audius network
//!
//! [`AudiusClient`] wires the node directory, the search service and the
//! stream resolver over one shared `reqwest::Client` and one shared
//! [`NodeDirectory`], so a node rotation triggered by a failed stream
//! lookup is immediately seen by search too.
//!
//! # Example
//!
//! ```no_run
//! use pmoaudius::AudiusClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AudiusClient::new().await?;
//!
//!     let tracks = client.search_tracks("lofi").await;
//!     if let Some(track) = tracks.first() {
//!         let url = client.stream_url(&track.id).await;
//!         println!("{} - {}: {}", track.artist_or_default(), track.title, url);
//!     }
//!     Ok(())
//! }
//! ```

use crate::coordinator::{
    DEFAULT_COOLDOWN_MS, DEFAULT_THROTTLE_MS, PlaybackChangeCoordinator, TrackChangeSink,
};
use crate::directory::{
    DEFAULT_DISCOVERY_TIMEOUT_SECS, DEFAULT_DISCOVERY_URL, DEFAULT_FALLBACK_NODES,
    DEFAULT_NODE_CACHE_TTL_SECS, NodeDirectory,
};
use crate::error::Result;
use crate::models::Track;
use crate::search::{
    DEFAULT_SEARCH_CACHE_CAPACITY, DEFAULT_SEARCH_CACHE_TTL_SECS, TrackSearchService,
};
use crate::stream::{DEFAULT_STREAM_MAX_RETRIES, StreamUrlResolver};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Default application name sent as `app_name`
pub const DEFAULT_APP_NAME: &str = "pmomusic";

/// Default timeout for search and stream requests (15 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "PMOMusic/0.3.10 (pmoaudius)";

/// Audius client
///
/// Cheap to clone: all services are shared.
#[derive(Debug, Clone)]
pub struct AudiusClient {
    client: Client,
    app_name: String,
    directory: Arc<NodeDirectory>,
    search: Arc<TrackSearchService>,
    resolver: Arc<StreamUrlResolver>,
    throttle: Duration,
    cooldown: Duration,
}

impl AudiusClient {
    /// Create a new client with default settings
    pub async fn new() -> Result<Self> {
        Self::builder().build().await
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Application name sent with every request
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Shared node directory
    pub fn directory(&self) -> &Arc<NodeDirectory> {
        &self.directory
    }

    /// Shared search service
    pub fn search(&self) -> &Arc<TrackSearchService> {
        &self.search
    }

    /// Shared stream resolver
    pub fn resolver(&self) -> &Arc<StreamUrlResolver> {
        &self.resolver
    }

    /// Cached search (see [`TrackSearchService::search`])
    pub async fn search_tracks(&self, query: &str) -> Vec<Track> {
        self.search.search(query, true).await
    }

    /// Stream URL with the configured retry budget
    pub async fn stream_url(&self, id_or_permalink: &str) -> String {
        self.resolver.resolve(id_or_permalink).await
    }

    /// Build the playback coordinator for a room
    ///
    /// Call once per active room and share the result with every playback
    /// control of that room.
    pub fn coordinator(&self, sink: Arc<dyn TrackChangeSink>) -> PlaybackChangeCoordinator {
        PlaybackChangeCoordinator::new(sink, self.resolver.clone())
            .with_timing(self.throttle, self.cooldown)
    }
}

/// Builder for configuring an AudiusClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    app_name: String,
    discovery_url: String,
    fallback_nodes: Vec<String>,
    user_agent: String,
    timeout: Duration,
    discovery_timeout: Duration,
    node_cache_ttl: Duration,
    search_cache_ttl: Duration,
    search_cache_capacity: u64,
    stream_max_retries: u32,
    content_host_pattern: Option<String>,
    throttle: Duration,
    cooldown: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            app_name: DEFAULT_APP_NAME.to_string(),
            discovery_url: DEFAULT_DISCOVERY_URL.to_string(),
            fallback_nodes: DEFAULT_FALLBACK_NODES
                .iter()
                .map(|n| n.to_string())
                .collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            discovery_timeout: Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECS),
            node_cache_ttl: Duration::from_secs(DEFAULT_NODE_CACHE_TTL_SECS),
            search_cache_ttl: Duration::from_secs(DEFAULT_SEARCH_CACHE_TTL_SECS),
            search_cache_capacity: DEFAULT_SEARCH_CACHE_CAPACITY,
            stream_max_retries: DEFAULT_STREAM_MAX_RETRIES,
            content_host_pattern: None,
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the `app_name` query parameter
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Set the root registry URL
    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = url.into();
        self
    }

    /// Set the static fallback chain (first entry is used)
    pub fn fallback_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the search/stream request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the registry request timeout
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set how long a resolved node base is reused
    pub fn node_cache_ttl(mut self, ttl: Duration) -> Self {
        self.node_cache_ttl = ttl;
        self
    }

    /// Set how long search results are memoised
    pub fn search_cache_ttl(mut self, ttl: Duration) -> Self {
        self.search_cache_ttl = ttl;
        self
    }

    /// Set how many distinct queries are memoised
    pub fn search_cache_capacity(mut self, capacity: u64) -> Self {
        self.search_cache_capacity = capacity;
        self
    }

    /// Set the stream lookup attempt budget
    pub fn stream_max_retries(mut self, retries: u32) -> Self {
        self.stream_max_retries = retries;
        self
    }

    /// Override the content-host URL pattern
    pub fn content_host_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.content_host_pattern = Some(pattern.into());
        self
    }

    /// Set the coordinator throttle window
    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Set the coordinator cooldown
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Build the client
    pub async fn build(self) -> Result<AudiusClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(&self.user_agent).build()?,
        };

        let directory = Arc::new(
            NodeDirectory::new(
                client.clone(),
                self.discovery_url,
                self.fallback_nodes,
                self.node_cache_ttl,
            )
            .with_timeout(self.discovery_timeout),
        );

        let search = TrackSearchService::with_capacity(
            client.clone(),
            directory.clone(),
            self.app_name.clone(),
            self.search_cache_ttl,
            self.search_cache_capacity,
        )
        .with_timeout(self.timeout);

        let mut resolver =
            StreamUrlResolver::new(client.clone(), directory.clone(), self.app_name.clone())?
                .with_timeout(self.timeout)
                .with_max_retries(self.stream_max_retries);
        if let Some(pattern) = &self.content_host_pattern {
            resolver = resolver.with_content_host_pattern(pattern)?;
        }

        Ok(AudiusClient {
            client,
            app_name: self.app_name,
            directory,
            search: Arc::new(search),
            resolver: Arc::new(resolver),
            throttle: self.throttle,
            cooldown: self.cooldown,
        })
    }
}
