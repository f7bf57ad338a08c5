//! Event types for the tonearm event system
//!
//! Events originate in the player service and are fanned out to any number
//! of observers over a broadcast channel (served to restricted consumers as
//! SSE). This replaces single-subscriber callback slots with a multi-observer
//! channel; in-process single-consumer hooks keep last-assignment-wins
//! semantics where noted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transport state of the playback engine.
///
/// Transitions happen only through the engine operations
/// (play/pause/resume/seek/stop), never by external mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// No buffer loaded
    Idle,
    /// Fetch/decode in flight for a new buffer
    Loading,
    /// Buffer loaded and output running
    Playing,
    /// Buffer loaded, output halted at a captured offset
    Paused,
}

/// Tonearm event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback of a track started
    PlaybackStarted {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback paused at the given offset
    PlaybackPaused {
        position_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback resumed from the captured offset
    PlaybackResumed {
        position_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback stopped explicitly (not a natural end)
    PlaybackStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic progress report (sent on every progress tick, including
    /// while idle, where both values are zero)
    PlaybackProgress {
        position_ms: u64,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track played through to its natural end
    TrackCompleted {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Lookahead queue contents changed
    QueueChanged {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Master volume changed
    VolumeChanged {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event name used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStarted { .. } => "PlaybackStarted",
            PlayerEvent::PlaybackPaused { .. } => "PlaybackPaused",
            PlayerEvent::PlaybackResumed { .. } => "PlaybackResumed",
            PlayerEvent::PlaybackStopped { .. } => "PlaybackStopped",
            PlayerEvent::PlaybackProgress { .. } => "PlaybackProgress",
            PlayerEvent::TrackCompleted { .. } => "TrackCompleted",
            PlayerEvent::QueueChanged { .. } => "QueueChanged",
            PlayerEvent::VolumeChanged { .. } => "VolumeChanged",
        }
    }
}
