//! HTTP request handlers
//!
//! Implements the control endpoints for library, transport, and volume.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::state::PlayerState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tonearm_common::types::{TrackInfo, TrackTags};
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    track_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    position_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: f32, // 0.0-1.0, out-of-range values are clamped
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: f32,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    tracks: Vec<TrackInfo>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    now_playing: Option<TrackInfo>,
    queue: Vec<TrackInfo>,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    track_id: Option<Uuid>,
    position_ms: u64,
    duration_ms: u64,
    state: String,
}

/// Map an internal error to an HTTP status plus JSON status body.
pub fn error_response(e: &Error) -> (StatusCode, Json<StatusResponse>) {
    let status = match e {
        Error::ResourceNotFound(_) | Error::TrackNotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(StatusResponse {
            status: e.to_string(),
        }),
    )
}

fn state_str(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Idle => "idle",
        PlayerState::Loading => "loading",
        PlayerState::Playing => "playing",
        PlayerState::Paused => "paused",
    }
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tonearm-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Library
// ============================================================================

/// GET /library - Scanned tracks in library order
pub async fn list_library(State(ctx): State<AppContext>) -> Json<LibraryResponse> {
    let tracks = ctx
        .controller
        .library_snapshot()
        .iter()
        .map(|t| t.info())
        .collect();
    Json(LibraryResponse { tracks })
}

/// GET /library/:track_id/metadata - Lazily extracted tags
pub async fn track_metadata(
    State(ctx): State<AppContext>,
    Path(track_id): Path<Uuid>,
) -> Result<Json<TrackTags>, (StatusCode, Json<StatusResponse>)> {
    let track = ctx
        .controller
        .track(track_id)
        .ok_or_else(|| error_response(&Error::TrackNotFound(track_id)))?;

    match track.tags(&ctx.store).await {
        Ok(tags) => Ok(Json(tags.clone())),
        Err(e) => {
            error!("Metadata read failed for {}: {}", track.display_name, e);
            Err(error_response(&e))
        }
    }
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /playback/play - Start a library track
pub async fn play(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    info!("Play request for track {}", req.track_id);
    match ctx.controller.play(req.track_id).await {
        Ok(()) => Ok(Json(StatusResponse {
            status: "ok".to_string(),
        })),
        Err(e) => {
            error!("Play command failed: {}", e);
            Err(error_response(&e))
        }
    }
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.pause().await;
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// POST /playback/resume
pub async fn resume(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.resume().await;
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.stop().await;
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// POST /playback/next - Skip to the next queued track
pub async fn skip_next(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.controller.next().await;
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// POST /playback/seek - Move the position (clamped to track duration)
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> Json<StatusResponse> {
    ctx.controller.seek(req.position_ms);
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    let state = ctx.state.player_state().await;
    Json(serde_json::json!({ "state": state_str(state) }))
}

/// GET /playback/position
pub async fn get_position(State(ctx): State<AppContext>) -> Json<PositionResponse> {
    let state = ctx.state.player_state().await;
    Json(PositionResponse {
        track_id: ctx.controller.now_playing().map(|t| t.id),
        position_ms: ctx.engine.position().as_millis() as u64,
        duration_ms: ctx.engine.duration().as_millis() as u64,
        state: state_str(state).to_string(),
    })
}

/// GET /playback/queue
pub async fn get_queue(State(ctx): State<AppContext>) -> Json<QueueResponse> {
    Json(QueueResponse {
        now_playing: ctx.controller.now_playing().map(|t| t.info()),
        queue: ctx
            .controller
            .queue_snapshot()
            .iter()
            .map(|t| t.info())
            .collect(),
    })
}

// ============================================================================
// Volume
// ============================================================================

/// GET /audio/volume
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: ctx.controller.volume(),
    })
}

/// POST /audio/volume - Set volume; out-of-range values are clamped and the
/// applied value is returned
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    let applied = ctx.controller.set_volume(req.volume);
    info!("Volume set to {:.2}", applied);
    Json(VolumeResponse { volume: applied })
}
