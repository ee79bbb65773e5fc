//! Node discovery for the Audius network
//!
//! Audius has no single API host: any discovery node may be down at any
//! time. [`NodeDirectory`] asks the root registry for the currently healthy
//! nodes, keeps the first one for a TTL, and falls back to a static list
//! when the registry itself is unreachable.

use crate::error::{AudiusError, Result};
use crate::models::DiscoveryResponse;
use reqwest::Client;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Root registry listing healthy node bases
pub const DEFAULT_DISCOVERY_URL: &str = "https://api.audius.co/";

/// Static nodes used when the registry cannot be reached
pub const DEFAULT_FALLBACK_NODES: &[&str] = &[
    "https://discoveryprovider.audius.co",
    "https://discoveryprovider2.audius.co",
    "https://discoveryprovider3.audius.co",
];

/// Default lifetime of a resolved node base (10 minutes)
pub const DEFAULT_NODE_CACHE_TTL_SECS: u64 = 600;

/// Default timeout for registry requests
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
struct CachedBase {
    url: String,
    fetched_at: Instant,
}

/// Resolves and caches a working node base URL
///
/// The cached base is replaced wholesale on every refresh, whether the
/// refresh reached the registry or fell back to the static list.
#[derive(Debug)]
pub struct NodeDirectory {
    client: Client,
    discovery_url: String,
    fallback_nodes: Vec<String>,
    ttl: Duration,
    timeout: Duration,
    cached: RwLock<Option<CachedBase>>,
}

impl NodeDirectory {
    /// Create a directory with the given registry and static fallback chain
    ///
    /// Blank fallback entries are ignored; an empty chain is replaced by
    /// [`DEFAULT_FALLBACK_NODES`].
    pub fn new(
        client: Client,
        discovery_url: impl Into<String>,
        fallback_nodes: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let mut fallback_nodes: Vec<String> = fallback_nodes
            .iter()
            .filter_map(|n| normalize_base(n))
            .collect();
        if fallback_nodes.is_empty() {
            fallback_nodes = DEFAULT_FALLBACK_NODES
                .iter()
                .map(|n| n.to_string())
                .collect();
        }

        Self {
            client,
            discovery_url: discovery_url.into(),
            fallback_nodes,
            ttl,
            timeout: Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECS),
            cached: RwLock::new(None),
        }
    }

    /// Set the registry request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registry URL
    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    /// Static fallback chain, in order
    pub fn fallback_nodes(&self) -> &[String] {
        &self.fallback_nodes
    }

    /// Resolve a node base URL
    ///
    /// Returns the cached base while it is fresh, unless `force_refresh` is
    /// set. Otherwise queries the registry and keeps its first candidate. On
    /// any registry failure the first static fallback node is returned
    /// without verification. Never fails.
    pub async fn resolve_base(&self, force_refresh: bool) -> String {
        if !force_refresh {
            if let Some(url) = self.fresh_base() {
                debug!(node = %url, "Using cached node base");
                return url;
            }
        }

        let base = match self.discover().await {
            Ok(url) => {
                info!(node = %url, "Selected node from registry");
                url
            }
            Err(e) => {
                let fallback = self.static_fallback();
                warn!(
                    error = %e,
                    node = %fallback,
                    "Node registry unavailable, using static fallback"
                );
                fallback
            }
        };

        self.store(base.clone());
        base
    }

    /// Currently cached base, fresh or not, without any network access
    pub fn current_base(&self) -> Option<String> {
        self.read_cache().as_ref().map(|c| c.url.clone())
    }

    /// Drop the cached base so the next resolution hits the registry
    pub fn invalidate(&self) {
        *self.write_cache() = None;
    }

    fn fresh_base(&self) -> Option<String> {
        self.read_cache()
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.url.clone())
    }

    fn store(&self, url: String) {
        *self.write_cache() = Some(CachedBase {
            url,
            fetched_at: Instant::now(),
        });
    }

    fn static_fallback(&self) -> String {
        self.fallback_nodes
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_FALLBACK_NODES[0].to_string())
    }

    async fn discover(&self) -> Result<String> {
        debug!(registry = %self.discovery_url, "Querying node registry");

        let response = self
            .client
            .get(&self.discovery_url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AudiusError::Status {
                status: status.as_u16(),
                url: self.discovery_url.clone(),
            });
        }

        let body: DiscoveryResponse = response.json().await?;

        body.data
            .iter()
            .find_map(|candidate| normalize_base(candidate))
            .ok_or_else(|| AudiusError::empty("registry returned no node"))
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, Option<CachedBase>> {
        self.cached.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_cache(&self) -> std::sync::RwLockWriteGuard<'_, Option<CachedBase>> {
        self.cached.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Trim whitespace and trailing slashes; `None` for blank entries
pub(crate) fn normalize_base(base: &str) -> Option<String> {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build `{base}/{segments...}?{params...}` with proper escaping
pub(crate) fn endpoint(base: &str, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| AudiusError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}
