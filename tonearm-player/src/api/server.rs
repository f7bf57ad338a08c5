//! HTTP server setup and routing
//!
//! The single privilege boundary of the service: restricted consumers reach
//! the library, transport, and registered resources only through these
//! routes. Anything outside them falls through to a 400.

use crate::error::{Error, Result};
use crate::playback::engine::PlaybackEngine;
use crate::playback::queue::QueueController;
use crate::resolver::Resolver;
use crate::state::SharedState;
use crate::store::ResourceStore;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// **Note:** AppContext implements Clone, which gives us `FromRef<AppContext>`
/// for free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub state: Arc<SharedState>,
    pub engine: Arc<PlaybackEngine>,
    pub controller: Arc<QueueController>,
    pub store: Arc<ResourceStore>,
    pub resolver: Arc<Resolver>,
}

/// Create the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Depot protocol
        .route("/depot/:resource_id", get(super::depot::fetch_resource))
        .route("/resources", post(super::depot::register_path_resource))
        .route("/resources/blob", post(super::depot::register_blob_resource))
        // Library
        .route("/library", get(super::handlers::list_library))
        .route(
            "/library/:track_id/metadata",
            get(super::handlers::track_metadata),
        )
        // Playback control
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/pause", post(super::handlers::pause))
        .route("/playback/resume", post(super::handlers::resume))
        .route("/playback/stop", post(super::handlers::stop))
        .route("/playback/next", post(super::handlers::skip_next))
        .route("/playback/seek", post(super::handlers::seek))
        .route("/playback/state", get(super::handlers::get_playback_state))
        .route("/playback/position", get(super::handlers::get_position))
        .route("/playback/queue", get(super::handlers::get_queue))
        // Volume
        .route("/audio/volume", get(super::handlers::get_volume))
        .route("/audio/volume", post(super::handlers::set_volume))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        // Unknown routes are protocol violations, not missing pages
        .fallback(unknown_route)
        .with_state(ctx)
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn unknown_route() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "status": "unknown route" })),
    )
}

/// Run HTTP API server
pub async fn run(port: u16, ctx: AppContext) -> Result<()> {
    let app = create_router(ctx);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
