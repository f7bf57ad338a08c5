//! Presentation-facing DTOs shared with restricted consumers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Track summary as served by the library and queue endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_id: Uuid,
    /// Display name derived from the file name
    pub display_name: String,
    /// Absolute path on the privileged side (informational; restricted
    /// consumers obtain bytes through the depot, never from this path)
    pub path: String,
}

/// Lazily extracted tag metadata for a track.
///
/// `art_id` references an embedded-picture blob registered with the
/// resource store; the bytes are served at `GET /depot/{art_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_ms: u64,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub format: Option<String>,
    pub art_id: Option<Uuid>,
}
