//! Data models for Audius API responses
//!
//! Wire records (`*Response`, `TrackRecord`) mirror what the nodes send;
//! [`Track`] is the immutable value handed to the UI.

use crate::error::{AudiusError, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Discovery
// ============================================================================

/// Response from the root registry (`GET https://api.audius.co/`)
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryResponse {
    /// Candidate node base URLs, healthiest first
    #[serde(default)]
    pub data: Vec<String>,
}

// ============================================================================
// Search
// ============================================================================

/// Response from `/v1/tracks/search`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<TrackRecord>,
}

/// A track as returned by a node
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub user: Option<UserRecord>,
    #[serde(default)]
    pub artwork: Option<Artwork>,
}

/// Uploader of a track
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
}

/// Artwork URLs keyed by square size
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artwork {
    #[serde(rename = "150x150", default)]
    pub small: Option<String>,
    #[serde(rename = "480x480", default)]
    pub medium: Option<String>,
    #[serde(rename = "1000x1000", default)]
    pub large: Option<String>,
}

impl Artwork {
    /// Preferred artwork URL: 480, then 150, then 1000
    pub fn best(&self) -> Option<&str> {
        self.medium
            .as_deref()
            .or(self.small.as_deref())
            .or(self.large.as_deref())
    }
}

/// A searchable, playable track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    /// Opaque Audius track id
    pub id: String,
    pub title: String,
    /// Uploader display name, when the node sent one
    pub artist: Option<String>,
    /// Artwork URL, when the node sent one
    pub artwork_url: Option<String>,
    /// Human-readable path (`/handle/slug`); empty when unknown
    pub permalink: String,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            artwork_url: None,
            permalink: String::new(),
        }
    }

    /// Artist name or a placeholder for display
    pub fn artist_or_default(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown artist")
    }
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        let artist = record.user.and_then(|u| u.name);
        let artwork_url = record
            .artwork
            .as_ref()
            .and_then(Artwork::best)
            .map(str::to_string);

        Self {
            id: record.id,
            title: record.title,
            artist,
            artwork_url,
            permalink: record.permalink.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Stream lookup
// ============================================================================

/// One candidate of a `{ data: [{ url }] }` stream answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
}

/// The accepted shapes of a `/v1/tracks/{id}/stream` answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPayload {
    /// The body is the URL itself (raw text or a JSON string)
    Plain(String),
    /// `{ "data": "https://..." }`
    Data(String),
    /// `{ "url": "https://..." }`
    Url(String),
    /// `{ "data": [{ "url": "https://..." }, ...] }`
    Candidates(Vec<StreamCandidate>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStreamBody {
    Plain(String),
    Data { data: RawStreamData },
    Url { url: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStreamData {
    Url(String),
    Candidates(Vec<StreamCandidate>),
}

impl From<RawStreamBody> for StreamPayload {
    fn from(raw: RawStreamBody) -> Self {
        match raw {
            RawStreamBody::Plain(s) => Self::Plain(s),
            RawStreamBody::Data {
                data: RawStreamData::Url(s),
            } => Self::Data(s),
            RawStreamBody::Data {
                data: RawStreamData::Candidates(c),
            } => Self::Candidates(c),
            RawStreamBody::Url { url } => Self::Url(url),
        }
    }
}

impl StreamPayload {
    /// Classify a response body into one of the accepted shapes
    pub fn parse(body: &str) -> Result<Self> {
        let trimmed = body.trim();

        match serde_json::from_str::<RawStreamBody>(trimmed) {
            // A bare JSON string is only a URL if it looks like one
            Ok(RawStreamBody::Plain(text)) if !is_http_url(&text) => {
                Err(AudiusError::bad_shape(preview(text.trim())))
            }
            Ok(raw) => Ok(raw.into()),
            // Non-JSON text body carrying the URL directly
            Err(_) if is_http_url(trimmed) => Ok(Self::Plain(trimmed.to_string())),
            Err(_) => Err(AudiusError::bad_shape(preview(trimmed))),
        }
    }

    /// The playable URL carried by this payload, first candidate wins
    pub fn into_url(self) -> Option<String> {
        let url = match self {
            Self::Plain(url) | Self::Data(url) | Self::Url(url) => Some(url),
            Self::Candidates(candidates) => candidates.into_iter().next().map(|c| c.url),
        };
        url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
    }
}

fn is_http_url(text: &str) -> bool {
    let text = text.trim();
    text.starts_with("http://") || text.starts_with("https://")
}

fn preview(body: &str) -> String {
    const MAX: usize = 120;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

// ============================================================================
// Playback
// ============================================================================

/// A track change accepted by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackChangeRequest {
    pub track: Track,
    pub stream_url: String,
}

impl PlaybackChangeRequest {
    pub fn new(track: Track, stream_url: impl Into<String>) -> Self {
        Self {
            track,
            stream_url: stream_url.into(),
        }
    }

    /// Payload handed to the synchronization sink
    pub fn to_change(&self) -> TrackChange {
        TrackChange {
            track_id: self.track.id.clone(),
            stream_url: self.stream_url.clone(),
        }
    }
}

/// What the room synchronization sink receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackChange {
    pub track_id: String,
    pub stream_url: String,
}
