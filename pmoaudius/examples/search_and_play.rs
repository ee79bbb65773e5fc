//! Example: search Audius and walk the results like a listening room
//!
//! Run with: cargo run -p pmoaudius --example search_and_play -- "lofi"

use pmoaudius::{
    AudiusConfigExt, ClientBuilder, Result, TrackChange, TrackChangeSink, next_index,
};
use pmoconfig::get_config;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Prints every change instead of broadcasting it to room members
struct PrintingRoom;

#[pmoaudius::async_trait]
impl TrackChangeSink for PrintingRoom {
    async fn apply_track_change(&self, change: TrackChange) -> Result<()> {
        println!("  -> now playing {} ({})", change.track_id, change.stream_url);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();

    let level = config.get_log_min_level()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.to_lowercase()))
        .init();

    if !config.get_audius_enabled()? {
        println!("Audius source is disabled in the configuration");
        return Ok(());
    }

    let query = std::env::args().nth(1).unwrap_or_else(|| "lofi".to_string());

    let client = ClientBuilder::from_config(&config)?.build().await?;
    println!("Using node {}", client.directory().resolve_base(false).await);

    let tracks = client.search_tracks(&query).await;
    println!("Found {} tracks for \"{}\":", tracks.len(), query);
    for (i, track) in tracks.iter().take(10).enumerate() {
        println!("{:>3}. {} - {}", i + 1, track.artist_or_default(), track.title);
    }

    let queue: Vec<_> = tracks.into_iter().take(3).collect();
    let coordinator = client.coordinator(Arc::new(PrintingRoom));

    println!("\nPlaying the first three tracks:");
    let mut current = None;
    for _ in 0..queue.len() {
        let outcome = coordinator.next(&queue, current).await;
        println!("  outcome: {:?}", outcome);

        if outcome.was_accepted() {
            current = next_index(&queue, current).map(|i| &queue[i]);
        }
        tokio::time::sleep(coordinator.throttle() + Duration::from_millis(50)).await;
    }

    Ok(())
}
