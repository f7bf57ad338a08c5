//! tonearm-player - Main entry point
//!
//! Local playback service: scans a music directory, drives the single-buffer
//! transport, and exposes the control surface plus the depot protocol over
//! HTTP on localhost.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tonearm_player::api::{self, AppContext};
use tonearm_player::config::{Config, EngineTuning};
use tonearm_player::library;
use tonearm_player::playback::{AudioSink, CpalSink, NullSink, PlaybackEngine, QueueController};
use tonearm_player::resolver::Resolver;
use tonearm_player::state::SharedState;
use tonearm_player::store::ResourceStore;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tonearm-player
#[derive(Parser, Debug)]
#[command(name = "tonearm-player")]
#[command(about = "Local audio playback service with a resource depot")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "TONEARM_PORT")]
    port: u16,

    /// Root folder containing music files
    #[arg(short, long, env = "TONEARM_MUSIC_DIR")]
    music_dir: PathBuf,

    /// Optional engine tuning TOML file
    #[arg(short, long, env = "TONEARM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tonearm_player=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let tuning = match &args.config {
        Some(path) => EngineTuning::load(path).context("Failed to load tuning config")?,
        None => EngineTuning::default(),
    };
    let config = Config {
        port: args.port,
        music_dir: args.music_dir.clone(),
        tuning,
    };

    info!("Starting tonearm-player on port {}", config.port);
    info!("Music directory: {}", config.music_dir.display());

    let tracks =
        library::scan_library(&config.music_dir).context("Failed to scan music directory")?;

    let state = Arc::new(SharedState::new());
    let store = Arc::new(ResourceStore::new());
    let resolver = Arc::new(Resolver::new(Arc::clone(&store), &config.music_dir));

    // A host without an audio device still serves the full control surface;
    // playback time then runs off the wall clock alone
    let sink: Arc<dyn AudioSink> = match CpalSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!("Audio device unavailable ({}), using silent clock output", e);
            Arc::new(NullSink::new(44100))
        }
    };

    let engine = PlaybackEngine::new(
        Arc::clone(&resolver),
        sink,
        Arc::clone(&state),
        config.tuning.clone(),
    );
    engine.start_progress_reporting();

    let controller = QueueController::new(
        Arc::clone(&engine),
        Arc::clone(&state),
        tracks,
        config.tuning.lookahead_len,
    );
    info!("Playback engine initialized");

    let ctx = AppContext {
        state,
        engine: Arc::clone(&engine),
        controller,
        store,
        resolver,
    };

    api::run(config.port, ctx)
        .await
        .context("HTTP server failed")?;

    engine.shutdown().await;
    info!("tonearm-player stopped");
    Ok(())
}
