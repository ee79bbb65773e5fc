//! Playable stream URL resolution
//!
//! Nodes answer the stream lookup in several shapes (see
//! [`StreamPayload`]). A failed lookup rotates to a freshly discovered node
//! before retrying, and an exhausted retry budget still yields a usable,
//! if unverified, URL on the last node.

use crate::directory::{NodeDirectory, endpoint};
use crate::error::{AudiusError, Result};
use crate::models::StreamPayload;
use regex::Regex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// URLs already pointing at Audius content (returned as-is)
pub const DEFAULT_CONTENT_HOST_PATTERN: &str =
    r"(?i)^https?://[a-z0-9.-]*(?:audius|creatornode)[a-z0-9.-]*(?::\d+)?/\S*stream\S*$";

/// Default number of lookup attempts
pub const DEFAULT_STREAM_MAX_RETRIES: u32 = 3;

/// Default timeout for stream lookups
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 15;

/// Resolves a playable URL for a track id or permalink
#[derive(Debug, Clone)]
pub struct StreamUrlResolver {
    client: Client,
    directory: Arc<NodeDirectory>,
    app_name: String,
    timeout: Duration,
    max_retries: u32,
    content_host: Regex,
}

impl StreamUrlResolver {
    /// Create a resolver using [`DEFAULT_CONTENT_HOST_PATTERN`]
    pub fn new(
        client: Client,
        directory: Arc<NodeDirectory>,
        app_name: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            directory,
            app_name: app_name.into(),
            timeout: Duration::from_secs(DEFAULT_STREAM_TIMEOUT_SECS),
            max_retries: DEFAULT_STREAM_MAX_RETRIES,
            content_host: Regex::new(DEFAULT_CONTENT_HOST_PATTERN)?,
        })
    }

    /// Replace the content-host pattern
    pub fn with_content_host_pattern(mut self, pattern: &str) -> Result<Self> {
        self.content_host = Regex::new(pattern)?;
        Ok(self)
    }

    /// Set the lookup timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attempt budget used by [`Self::resolve`]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Attempt budget used by [`Self::resolve`]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// True if `input` is already a content-host stream URL
    pub fn is_content_url(&self, input: &str) -> bool {
        self.content_host.is_match(input.trim())
    }

    /// Resolve with the configured attempt budget
    pub async fn resolve(&self, id_or_permalink: &str) -> String {
        self.resolve_stream_url(id_or_permalink, self.max_retries)
            .await
    }

    /// Resolve a playable URL, trying at most `max_retries` lookups
    ///
    /// Content-host URLs are returned unchanged without network access.
    /// Every attempt after the first forces a new node from the directory.
    /// When all attempts fail, the conventional stream URL on the last
    /// node is returned. Never fails.
    pub async fn resolve_stream_url(&self, id_or_permalink: &str, max_retries: u32) -> String {
        let input = id_or_permalink.trim();
        if self.is_content_url(input) {
            debug!(url = input, "Input is already a content URL");
            return input.to_string();
        }

        let attempts = max_retries.max(1);
        let mut base = self.directory.resolve_base(false).await;

        for attempt in 1..=attempts {
            if attempt > 1 {
                base = self.directory.resolve_base(true).await;
            }

            match self.lookup(&base, input).await {
                Ok(url) => {
                    debug!(track = input, node = %base, attempt, "Stream URL resolved");
                    return url;
                }
                Err(e) => {
                    warn!(
                        track = input,
                        node = %base,
                        attempt,
                        attempts,
                        error = %e,
                        "Stream lookup failed"
                    );
                }
            }
        }

        let fallback = self.fallback_url(&base, input);
        warn!(track = input, url = %fallback, "Stream lookups exhausted, using fallback URL");
        fallback
    }

    /// `{base}/v1/tracks/{id}/stream?app_name={app}`
    pub fn fallback_url(&self, base: &str, id: &str) -> String {
        match self.stream_endpoint(base, id) {
            Ok(url) => url.to_string(),
            Err(_) => format!(
                "{}/v1/tracks/{}/stream?app_name={}",
                base.trim_end_matches('/'),
                id,
                self.app_name
            ),
        }
    }

    fn stream_endpoint(&self, base: &str, id: &str) -> Result<url::Url> {
        endpoint(
            base,
            &["v1", "tracks", id, "stream"],
            &[("app_name", self.app_name.as_str())],
        )
    }

    async fn lookup(&self, base: &str, id: &str) -> Result<String> {
        let url = self.stream_endpoint(base, id)?;

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

        // The node redirected straight to the media: the final URL is the answer
        if is_media(&response) {
            let url = response.url().to_string();
            debug!(url = %url, "Stream lookup answered with media");
            return Ok(url);
        }

        let body = response.text().await?;
        StreamPayload::parse(&body)?
            .into_url()
            .ok_or_else(|| AudiusError::bad_shape("stream answer carries no URL"))
    }
}

fn is_media(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.trim().to_ascii_lowercase();
            ct.starts_with("audio/")
                || ct.starts_with("video/")
                || ct.starts_with("application/octet-stream")
        })
        .unwrap_or(false)
}
