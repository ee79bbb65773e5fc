//! Audius client library for PMOMusic
//!
//! This crate provides a Rust client for the Audius decentralized music
//! network, plus the playback gate used by collaborative listening rooms.
//!
//! # Features
//!
//! - **Node Discovery**: Resolve a working discovery node from the root
//!   registry, cached with a TTL, with a static fallback chain
//! - **Track Search**: Text search with per-query memoisation
//! - **Stream URLs**: Tolerant parsing of the stream lookup answer, retries
//!   that rotate away from dead nodes, and a best-effort fallback URL
//! - **Playback Coordination**: One change at a time, throttle window and
//!   cooldown, queue navigation (select / next / previous)
//! - **Configuration Extension**: All settings under `sources.audius`
//!
//! Discovery, search and stream resolution never return an error: they log
//! and degrade (static node, empty result, conventional stream URL) so that
//! an unreliable network never blocks the UI.
//!
//! # Example
//!
//! ```no_run
//! use pmoaudius::{AudiusClient, Result, TrackChange, TrackChangeSink};
//! use std::sync::Arc;
//!
//! struct Room;
//!
//! #[pmoaudius::async_trait]
//! impl TrackChangeSink for Room {
//!     async fn apply_track_change(&self, change: TrackChange) -> Result<()> {
//!         println!("now playing {} from {}", change.track_id, change.stream_url);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = AudiusClient::new().await?;
//!     let coordinator = client.coordinator(Arc::new(Room));
//!
//!     let queue = client.search_tracks("ambient").await;
//!     coordinator.next(&queue, None).await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod models;
pub mod search;
pub mod stream;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

// Re-exports
pub use client::{AudiusClient, ClientBuilder};
pub use coordinator::{
    ChangeOutcome, PlaybackChangeCoordinator, StreamLocator, TrackChangeSink, next_index,
    previous_index,
};
pub use directory::NodeDirectory;
pub use error::{AudiusError, Result};
pub use models::{PlaybackChangeRequest, StreamCandidate, StreamPayload, Track, TrackChange};
pub use search::TrackSearchService;
pub use stream::StreamUrlResolver;

pub use async_trait::async_trait;

#[cfg(feature = "pmoconfig")]
pub use config_ext::AudiusConfigExt;
