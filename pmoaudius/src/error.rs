//! Error types for the Audius client

/// Result type alias for Audius operations
pub type Result<T> = std::result::Result<T, AudiusError>;

/// Errors that can occur when talking to the Audius network
///
/// Most of these never reach the caller of the high-level services: node
/// discovery, search and stream resolution degrade to a safe default and
/// only log the error. They are surfaced by the lower-level helpers and by
/// the playback coordinator's gate.
#[derive(Debug, thiserror::Error)]
pub enum AudiusError {
    /// HTTP request failed (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid content-host pattern
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Node answered with a non-success status
    #[error("Node returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Body parsed but matched none of the accepted shapes
    #[error("Unexpected response shape: {0}")]
    BadResponseShape(String),

    /// Legitimately empty answer (e.g. discovery returned no node)
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Playback change refused: inside the throttle window
    #[error("Playback change throttled")]
    Throttled,

    /// Playback change refused: another change is being applied
    #[error("Playback change already in progress")]
    Busy,

    /// The synchronization sink rejected the change
    #[error("Sink failed to apply track change: {0}")]
    Sink(String),
}

impl AudiusError {
    /// Create a response shape error
    pub fn bad_shape(msg: impl Into<String>) -> Self {
        Self::BadResponseShape(msg.into())
    }

    /// Create an empty result error
    pub fn empty(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    /// Create a sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// True for failures worth retrying against another node
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Json(_)
                | Self::Status { .. }
                | Self::BadResponseShape(_)
                | Self::EmptyResult(_)
        )
    }

    /// True when the coordinator's gate refused the request
    pub fn is_gate_rejection(&self) -> bool {
        matches!(self, Self::Throttled | Self::Busy)
    }
}
