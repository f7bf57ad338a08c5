//! Shared test fixtures: generated WAV libraries and a wired-up service.

#![allow(dead_code)]

use axum::http::StatusCode;
use axum::Router;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tonearm_common::events::PlayerEvent;
use tonearm_player::api::{create_router, AppContext};
use tonearm_player::config::EngineTuning;
use tonearm_player::library::{self, Track};
use tonearm_player::playback::{NullSink, PlaybackEngine, QueueController};
use tonearm_player::resolver::Resolver;
use tonearm_player::state::SharedState;
use tonearm_player::store::ResourceStore;
use tokio::sync::broadcast;

pub const TEST_RATE: u32 = 44100;

/// Write a mono 16-bit sine WAV of the given length.
pub fn write_sine_wav(path: &Path, millis: u64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TEST_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (TEST_RATE as u64 * millis / 1000) as u32;
    for n in 0..frames {
        let t = n as f32 / TEST_RATE as f32;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.25;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Tuning with completion thresholds scaled down for sub-second fixtures.
pub fn fast_tuning() -> EngineTuning {
    EngineTuning {
        progress_interval_ms: 20,
        completion_epsilon_ms: 500,
        completion_min_elapsed_ms: 50,
        lookahead_len: 5,
    }
}

/// Fully wired service over a generated WAV library.
pub struct TestHarness {
    _dir: TempDir,
    pub music_dir: PathBuf,
    pub state: Arc<SharedState>,
    pub store: Arc<ResourceStore>,
    pub resolver: Arc<Resolver>,
    pub engine: Arc<PlaybackEngine>,
    pub controller: Arc<QueueController>,
    pub tracks: Vec<Arc<Track>>,
    pub router: Router,
}

impl TestHarness {
    /// Build a library of `names` WAV files (each `millis` long) and wire
    /// the whole service around it with a silent clock sink.
    pub fn new(names: &[&str], millis: u64, tuning: EngineTuning) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            write_sine_wav(&dir.path().join(name), millis);
        }

        let music_dir = dir.path().to_path_buf();
        let tracks = library::scan_library(&music_dir).unwrap();

        let state = Arc::new(SharedState::new());
        let store = Arc::new(ResourceStore::new());
        let resolver = Arc::new(Resolver::new(Arc::clone(&store), &music_dir));
        let engine = PlaybackEngine::new(
            Arc::clone(&resolver),
            Arc::new(NullSink::new(TEST_RATE)),
            Arc::clone(&state),
            tuning.clone(),
        );
        let controller = QueueController::new(
            Arc::clone(&engine),
            Arc::clone(&state),
            tracks.clone(),
            tuning.lookahead_len,
        );
        let router = create_router(AppContext {
            state: Arc::clone(&state),
            engine: Arc::clone(&engine),
            controller: Arc::clone(&controller),
            store: Arc::clone(&store),
            resolver: Arc::clone(&resolver),
        });

        Self {
            _dir: dir,
            music_dir,
            state,
            store,
            resolver,
            engine,
            controller,
            tracks,
            router,
        }
    }

    /// Library track by file name.
    pub fn track(&self, name: &str) -> Arc<Track> {
        self.tracks
            .iter()
            .find(|t| t.display_name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no track named {}", name))
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.controller
            .queue_snapshot()
            .iter()
            .map(|t| t.display_name.clone())
            .collect()
    }

    pub fn now_playing_name(&self) -> Option<String> {
        self.controller.now_playing().map(|t| t.display_name.clone())
    }
}

/// Wait for a broadcast event matching `pred`, or None on timeout.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    timeout: Duration,
    mut pred: F,
) -> Option<PlayerEvent>
where
    F: FnMut(&PlayerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) if pred(&event) => return Some(event),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return None,
        }
    }
}

/// One-shot JSON request against the router.
pub async fn make_request(
    app: &Router,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Option<Value>) {
    let (status, bytes, _content_type) = make_raw_request(
        app,
        method,
        path,
        body.map(|b| (b.to_string().into_bytes(), "application/json")),
    )
    .await;
    let json = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };
    (status, json)
}

/// One-shot request with a raw body; returns status, body bytes, and the
/// response content type.
pub async fn make_raw_request(
    app: &Router,
    method: &str,
    path: &str,
    body: Option<(Vec<u8>, &str)>,
) -> (StatusCode, Vec<u8>, String) {
    use axum::body::Body;
    use http::{Method, Request};
    use tower::ServiceExt;

    let method = match method {
        "GET" => Method::GET,
        "POST" => Method::POST,
        _ => panic!("Unsupported method"),
    };

    let request = match body {
        Some((bytes, content_type)) => Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", content_type)
            .body(Body::from(bytes))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, bytes, content_type)
}
