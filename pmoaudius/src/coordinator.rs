//! Playback change gate for a collaborative listening room
//!
//! The UI may fire track changes faster than the room can apply them
//! (double clicks, next/next/next, echoes from other listeners). The
//! coordinator lets at most one change through at a time, enforces a
//! minimum interval between accepted changes and keeps the gate closed for
//! a short cooldown after each change so that the sink's own echo is not
//! mistaken for a new request. Rejected requests are dropped, not queued.
//!
//! One coordinator is built per active room and shared by reference with
//! every playback control.

use crate::error::{AudiusError, Result};
use crate::models::{PlaybackChangeRequest, Track, TrackChange};
use crate::stream::StreamUrlResolver;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Minimum interval between two accepted changes
pub const DEFAULT_THROTTLE_MS: u64 = 500;

/// Delay after a change completes before the gate reopens
pub const DEFAULT_COOLDOWN_MS: u64 = 300;

/// Applies an accepted track change to the room
///
/// Implemented by the room synchronization layer.
#[async_trait]
pub trait TrackChangeSink: Send + Sync {
    async fn apply_track_change(&self, change: TrackChange) -> Result<()>;
}

/// Finds a playable URL for a track picked from the queue
#[async_trait]
pub trait StreamLocator: Send + Sync {
    async fn locate(&self, track: &Track) -> String;
}

#[async_trait]
impl StreamLocator for StreamUrlResolver {
    async fn locate(&self, track: &Track) -> String {
        self.resolve(&track.id).await
    }
}

/// What happened to a change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The sink applied the change
    Applied,
    /// The gate accepted the change but the sink failed
    SinkFailed,
    /// Dropped: inside the throttle window
    Throttled,
    /// Dropped: another change was in progress
    Busy,
    /// Nothing to change (unknown track, end of queue, ...)
    Skipped,
}

impl ChangeOutcome {
    /// True if the gate let the request through
    pub fn was_accepted(self) -> bool {
        matches!(self, Self::Applied | Self::SinkFailed)
    }
}

#[derive(Debug, Default)]
struct GateState {
    changing: bool,
    last_accepted: Option<Instant>,
}

/// Closes the gate for as long as it lives
struct ChangeGuard<'a> {
    gate: &'a Mutex<GateState>,
}

impl Drop for ChangeGuard<'_> {
    fn drop(&mut self) {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .changing = false;
    }
}

/// Serializes and throttles track changes for one room
pub struct PlaybackChangeCoordinator {
    sink: Arc<dyn TrackChangeSink>,
    locator: Arc<dyn StreamLocator>,
    throttle: Duration,
    cooldown: Duration,
    gate: Mutex<GateState>,
}

impl PlaybackChangeCoordinator {
    pub fn new(sink: Arc<dyn TrackChangeSink>, locator: Arc<dyn StreamLocator>) -> Self {
        Self {
            sink,
            locator,
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
            gate: Mutex::new(GateState::default()),
        }
    }

    /// Override the throttle window and cooldown
    pub fn with_timing(mut self, throttle: Duration, cooldown: Duration) -> Self {
        self.throttle = throttle;
        self.cooldown = cooldown;
        self
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// True while a change is being applied or cooling down
    pub fn is_changing(&self) -> bool {
        self.lock_gate().changing
    }

    /// Apply a change whose stream URL is already known
    pub async fn request_change(&self, request: PlaybackChangeRequest) -> ChangeOutcome {
        let guard = match self.try_acquire() {
            Ok(guard) => guard,
            Err(e) => return Self::rejected(&request.track.id, e),
        };

        let outcome = self.apply(request.to_change()).await;
        self.settle(guard).await;
        outcome
    }

    /// Play the queue entry with the given id; no-op if it is not queued
    pub async fn select_track(&self, queue: &[Track], track_id: &str) -> ChangeOutcome {
        match queue.iter().find(|t| t.id == track_id) {
            Some(track) => self.change_to(track).await,
            None => {
                debug!(track_id, "Selected track is not in the queue");
                ChangeOutcome::Skipped
            }
        }
    }

    /// Play the entry after `current`, or the first one if nothing plays
    pub async fn next(&self, queue: &[Track], current: Option<&Track>) -> ChangeOutcome {
        match next_index(queue, current) {
            Some(index) => self.change_to(&queue[index]).await,
            None => ChangeOutcome::Skipped,
        }
    }

    /// Play the entry before `current`
    pub async fn previous(&self, queue: &[Track], current: Option<&Track>) -> ChangeOutcome {
        match previous_index(queue, current) {
            Some(index) => self.change_to(&queue[index]).await,
            None => ChangeOutcome::Skipped,
        }
    }

    /// Stream resolution happens after the gate accepted, so dropped
    /// requests cost no network round-trip.
    async fn change_to(&self, track: &Track) -> ChangeOutcome {
        let guard = match self.try_acquire() {
            Ok(guard) => guard,
            Err(e) => return Self::rejected(&track.id, e),
        };

        let stream_url = self.locator.locate(track).await;
        let request = PlaybackChangeRequest::new(track.clone(), stream_url);

        let outcome = self.apply(request.to_change()).await;
        self.settle(guard).await;
        outcome
    }

    fn try_acquire(&self) -> Result<ChangeGuard<'_>> {
        let mut gate = self.lock_gate();

        if gate.changing {
            return Err(AudiusError::Busy);
        }

        let now = Instant::now();
        if let Some(last) = gate.last_accepted {
            if now.saturating_duration_since(last) < self.throttle {
                return Err(AudiusError::Throttled);
            }
        }

        gate.changing = true;
        gate.last_accepted = Some(gate.last_accepted.map_or(now, |last| last.max(now)));

        Ok(ChangeGuard { gate: &self.gate })
    }

    async fn apply(&self, change: TrackChange) -> ChangeOutcome {
        let track_id = change.track_id.clone();

        match self.sink.apply_track_change(change).await {
            Ok(()) => {
                info!(track_id = %track_id, "Track change applied");
                ChangeOutcome::Applied
            }
            Err(e) => {
                warn!(track_id = %track_id, error = %e, "Track change failed");
                ChangeOutcome::SinkFailed
            }
        }
    }

    /// Keep the gate closed for the cooldown, then reopen it
    async fn settle(&self, guard: ChangeGuard<'_>) {
        tokio::time::sleep(self.cooldown).await;
        drop(guard);
    }

    fn rejected(track_id: &str, reason: AudiusError) -> ChangeOutcome {
        debug!(track_id, reason = %reason, "Track change dropped");
        match reason {
            AudiusError::Throttled => ChangeOutcome::Throttled,
            _ => ChangeOutcome::Busy,
        }
    }

    fn lock_gate(&self) -> MutexGuard<'_, GateState> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PlaybackChangeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackChangeCoordinator")
            .field("throttle", &self.throttle)
            .field("cooldown", &self.cooldown)
            .field("gate", &*self.lock_gate())
            .finish()
    }
}

fn position(queue: &[Track], current: Option<&Track>) -> Option<usize> {
    current.and_then(|c| queue.iter().position(|t| t.id == c.id))
}

/// Index after `current`; 0 when nothing plays (or it left the queue)
pub fn next_index(queue: &[Track], current: Option<&Track>) -> Option<usize> {
    if queue.is_empty() {
        return None;
    }

    match position(queue, current) {
        None => Some(0),
        Some(i) if i + 1 < queue.len() => Some(i + 1),
        _ => None,
    }
}

/// Index before `current`; none at the head or when nothing plays
pub fn previous_index(queue: &[Track], current: Option<&Track>) -> Option<usize> {
    match position(queue, current) {
        None | Some(0) => None,
        Some(i) => Some(i - 1),
    }
}
