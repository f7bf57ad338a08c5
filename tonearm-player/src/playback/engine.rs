//! Playback transport
//!
//! Owns at most one decoded buffer and at most one active output node at a
//! time. Position is derived from the wall clock (resume offset plus time
//! since the node started), never from the device, so a headless sink
//! reports the same positions a real device would.
//!
//! Every transport change bumps a generation counter. Async completions
//! (decode results, node done signals) carry the generation they were
//! started under and are discarded if the counter has moved on, so a stale
//! decode or a halted node can never disturb a newer playback.

use crate::config::EngineTuning;
use crate::error::{Error, Result};
use crate::playback::buffer::AudioBuffer;
use crate::playback::decode;
use crate::playback::sink::{AudioSink, SinkHandle, TapBus};
use crate::resolver::Resolver;
use crate::state::SharedState;
use chrono::Utc;
use ringbuf::HeapCons;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tonearm_common::events::{PlayerEvent, PlayerState};
use tracing::{debug, error, info};

/// Result of a play request that ran to the point of starting output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Output started for the requested source.
    Started,
    /// A newer request took over while this one was decoding; its work
    /// was discarded and the newer playback is unaffected.
    Superseded,
}

/// Mutable transport fields, all guarded by one lock.
#[derive(Default)]
struct Transport {
    buffer: Option<Arc<AudioBuffer>>,
    handle: Option<Box<dyn SinkHandle>>,
    /// Position at the moment the current node started (or was paused at).
    offset: Duration,
    /// Set while an output node is running.
    started_at: Option<Instant>,
    paused: bool,
}

pub struct PlaybackEngine {
    resolver: Arc<Resolver>,
    sink: Arc<dyn AudioSink>,
    state: Arc<SharedState>,
    tuning: EngineTuning,
    transport: Mutex<Transport>,
    generation: AtomicU64,
    volume: Arc<Mutex<f32>>,
    taps: Arc<TapBus>,
    /// Single end-of-track subscriber slot; a later registration replaces
    /// an earlier one.
    completion_tx: RwLock<Option<mpsc::UnboundedSender<()>>>,
    progress_task: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<PlaybackEngine>,
}

impl PlaybackEngine {
    pub fn new(
        resolver: Arc<Resolver>,
        sink: Arc<dyn AudioSink>,
        state: Arc<SharedState>,
        tuning: EngineTuning,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            resolver,
            sink,
            state,
            tuning,
            transport: Mutex::new(Transport::default()),
            generation: AtomicU64::new(0),
            volume: Arc::new(Mutex::new(1.0)),
            taps: Arc::new(TapBus::new()),
            completion_tx: RwLock::new(None),
            progress_task: Mutex::new(None),
            weak_self: weak.clone(),
        })
    }

    /// Spawn the periodic progress broadcaster. Idempotent; the task holds
    /// only a weak reference and exits when the engine is dropped.
    pub fn start_progress_reporting(&self) {
        let mut guard = self.progress_task.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let weak = self.weak_self.clone();
        let interval = Duration::from_millis(self.tuning.progress_interval_ms);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else { break };
                let position = engine.position();
                let duration = engine.duration();
                engine.state.broadcast_event(PlayerEvent::PlaybackProgress {
                    position_ms: position.as_millis() as u64,
                    duration_ms: duration.as_millis() as u64,
                    timestamp: Utc::now(),
                });
            }
        }));
    }

    /// Halt output and cancel the progress task.
    pub async fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.teardown_transport();
        if let Some(task) = self.progress_task.lock().unwrap().take() {
            task.abort();
        }
        info!("Playback engine shut down");
    }

    /// Register the end-of-track subscriber. Last registration wins.
    pub fn set_completion_handler(&self, tx: mpsc::UnboundedSender<()>) {
        *self.completion_tx.write().unwrap() = Some(tx);
    }

    /// Start playback of the file at `path` from the beginning, replacing
    /// whatever was playing. Registers the path as a fresh resource, fetches
    /// and decodes it off the async runtime, then starts an output node.
    ///
    /// If a newer play or stop arrives while this one is decoding, the
    /// decoded result is discarded and `Superseded` is returned. On fetch or
    /// decode failure the transport lands in Idle, never half-initialized.
    pub async fn play(&self, path: &Path) -> Result<PlayOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.teardown_transport();
        self.state.set_player_state(PlayerState::Loading).await;

        // Every play registers anew; prior ids for the same path stay valid.
        let resource_id = self.resolver.store().register_path(path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_owned);
        let output_rate = self.sink.sample_rate();

        let decoded: Result<AudioBuffer> = match self.resolver.fetch_bytes(resource_id).await {
            Ok((bytes, _content_type)) => {
                tokio::task::spawn_blocking(move || {
                    decode::decode_bytes(bytes, extension.as_deref(), output_rate)
                })
                .await
                .map_err(|e| Error::Internal(format!("Decode task failed: {}", e)))?
            }
            Err(e) => Err(e),
        };

        let buffer = match decoded {
            Ok(buffer) => Arc::new(buffer),
            Err(e) => {
                error!("Failed to start playback of {}: {}", path.display(), e);
                if self.claim_generation(generation) {
                    self.teardown_transport();
                    self.state.set_player_state(PlayerState::Idle).await;
                }
                return Err(e);
            }
        };

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        {
            let mut transport = self.transport.lock().unwrap();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Discarding superseded decode for {}", path.display());
                return Ok(PlayOutcome::Superseded);
            }
            let handle = match self.sink.begin(
                Arc::clone(&buffer),
                Duration::ZERO,
                Arc::clone(&self.volume),
                Arc::clone(&self.taps),
                done_tx,
            ) {
                Ok(handle) => handle,
                Err(e) => {
                    drop(transport);
                    error!("Failed to open output for {}: {}", path.display(), e);
                    if self.claim_generation(generation) {
                        self.teardown_transport();
                        self.state.set_player_state(PlayerState::Idle).await;
                    }
                    return Err(e);
                }
            };
            transport.buffer = Some(buffer);
            transport.handle = Some(handle);
            transport.offset = Duration::ZERO;
            transport.started_at = Some(Instant::now());
            transport.paused = false;
        }

        self.spawn_completion_listener(generation, done_rx);
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state.set_player_state(PlayerState::Playing).await;
        }
        info!("Playback started: {}", path.display());
        Ok(PlayOutcome::Started)
    }

    /// Freeze the position and halt the output node. Returns false if there
    /// was nothing running to pause (already paused, or idle).
    pub async fn pause(&self) -> bool {
        let changed = {
            let mut transport = self.transport.lock().unwrap();
            if transport.buffer.is_none() || transport.paused || transport.started_at.is_none() {
                false
            } else {
                // The halted node's done signal, if it races in, is stale
                self.generation.fetch_add(1, Ordering::SeqCst);
                transport.offset = Self::position_locked(&transport);
                if let Some(mut handle) = transport.handle.take() {
                    handle.halt();
                }
                transport.started_at = None;
                transport.paused = true;
                true
            }
        };
        if changed {
            self.state.set_player_state(PlayerState::Paused).await;
            debug!("Paused at {:?}", self.position());
        }
        changed
    }

    /// Start a fresh output node at the frozen position. Returns false if
    /// not paused.
    pub async fn resume(&self) -> bool {
        let started = {
            let mut transport = self.transport.lock().unwrap();
            let buffer = match (&transport.buffer, transport.paused) {
                (Some(buffer), true) => Arc::clone(buffer),
                _ => return false,
            };
            let generation = self.generation.load(Ordering::SeqCst);
            let (done_tx, done_rx) = mpsc::unbounded_channel();
            match self.sink.begin(
                buffer,
                transport.offset,
                Arc::clone(&self.volume),
                Arc::clone(&self.taps),
                done_tx,
            ) {
                Ok(handle) => {
                    transport.handle = Some(handle);
                    transport.started_at = Some(Instant::now());
                    transport.paused = false;
                    Some((generation, done_rx))
                }
                Err(e) => {
                    error!("Failed to resume output: {}", e);
                    None
                }
            }
        };
        match started {
            Some((generation, done_rx)) => {
                self.spawn_completion_listener(generation, done_rx);
                self.state.set_player_state(PlayerState::Playing).await;
                true
            }
            None => false,
        }
    }

    /// Move the position, clamped to the buffer duration. While playing the
    /// current node is halted and a fresh one starts at the target; while
    /// paused only the frozen offset moves. Ignored when nothing is loaded.
    pub fn seek(&self, target: Duration) {
        let restarted = {
            let mut transport = self.transport.lock().unwrap();
            let Some(buffer) = transport.buffer.clone() else {
                return;
            };
            let clamped = target.min(buffer.duration());
            if transport.started_at.is_none() {
                transport.offset = clamped;
                None
            } else {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(mut handle) = transport.handle.take() {
                    handle.halt();
                }
                let (done_tx, done_rx) = mpsc::unbounded_channel();
                match self.sink.begin(
                    buffer,
                    clamped,
                    Arc::clone(&self.volume),
                    Arc::clone(&self.taps),
                    done_tx,
                ) {
                    Ok(handle) => {
                        transport.handle = Some(handle);
                        transport.offset = clamped;
                        transport.started_at = Some(Instant::now());
                        Some((generation, done_rx))
                    }
                    Err(e) => {
                        error!("Failed to restart output after seek: {}", e);
                        transport.offset = clamped;
                        transport.started_at = None;
                        transport.paused = true;
                        None
                    }
                }
            }
        };
        if let Some((generation, done_rx)) = restarted {
            self.spawn_completion_listener(generation, done_rx);
        }
        debug!("Seeked to {:?}", self.position());
    }

    /// Halt output, drop the buffer, land in Idle.
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.teardown_transport();
        self.state.set_player_state(PlayerState::Idle).await;
    }

    /// Wall-clock derived position, clamped to the buffer duration.
    pub fn position(&self) -> Duration {
        let transport = self.transport.lock().unwrap();
        Self::position_locked(&transport)
    }

    pub fn duration(&self) -> Duration {
        let transport = self.transport.lock().unwrap();
        transport
            .buffer
            .as_ref()
            .map(|b| b.duration())
            .unwrap_or_default()
    }

    pub fn is_paused(&self) -> bool {
        self.transport.lock().unwrap().paused
    }

    pub fn has_buffer(&self) -> bool {
        self.transport.lock().unwrap().buffer.is_some()
    }

    /// Set the gain, clamped to [0.0, 1.0]; returns the applied value.
    /// Takes effect on the next output callback without restarting playback.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let clamped = volume.clamp(0.0, 1.0);
        *self.volume.lock().unwrap() = clamped;
        clamped
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap()
    }

    /// Attach a read-only signal tap with the given sample capacity.
    pub fn attach_tap(&self, capacity: usize) -> HeapCons<f32> {
        self.taps.attach(capacity)
    }

    fn position_locked(transport: &Transport) -> Duration {
        let Some(buffer) = &transport.buffer else {
            return Duration::ZERO;
        };
        match transport.started_at {
            Some(started) if !transport.paused => {
                (transport.offset + started.elapsed()).min(buffer.duration())
            }
            _ => transport.offset,
        }
    }

    fn teardown_transport(&self) {
        let mut transport = self.transport.lock().unwrap();
        if let Some(mut handle) = transport.handle.take() {
            handle.halt();
        }
        transport.buffer = None;
        transport.offset = Duration::ZERO;
        transport.started_at = None;
        transport.paused = false;
    }

    /// Bump the generation only if it is still `generation`. Returns whether
    /// this call won; a false return means a newer request owns the
    /// transport and cleanup belongs to it.
    fn claim_generation(&self, generation: u64) -> bool {
        self.generation
            .compare_exchange(
                generation,
                generation.wrapping_add(1),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn spawn_completion_listener(
        &self,
        generation: u64,
        mut done_rx: mpsc::UnboundedReceiver<()>,
    ) {
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            if done_rx.recv().await.is_some() {
                if let Some(engine) = weak.upgrade() {
                    engine.on_node_complete(generation).await;
                }
            }
        });
    }

    /// Handle a done signal from an output node started under `generation`.
    ///
    /// Two filters guard against false track endings. The generation check
    /// drops signals from nodes that were superseded before the signal was
    /// processed. The timing check accepts the ending only when the derived
    /// position is within a small epsilon of the full duration and a minimum
    /// time has elapsed, which screens out early aborts that slip past the
    /// generation check.
    async fn on_node_complete(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Ignoring stale completion signal");
            return;
        }

        let (elapsed, duration) = {
            let transport = self.transport.lock().unwrap();
            let Some(buffer) = &transport.buffer else {
                return;
            };
            (Self::position_locked(&transport), buffer.duration())
        };

        let epsilon = Duration::from_millis(self.tuning.completion_epsilon_ms);
        let min_elapsed = Duration::from_millis(self.tuning.completion_min_elapsed_ms);
        if elapsed < min_elapsed || duration.saturating_sub(elapsed) > epsilon {
            debug!(
                "Ignoring spurious completion at {:?} of {:?}",
                elapsed, duration
            );
            return;
        }

        info!("Track completed naturally at {:?}", elapsed);

        // The end-of-track signal goes out before the transport resets, so
        // the subscriber observes the finished track's final state
        let tx = self.completion_tx.read().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }

        // The subscriber may already have started the next track; if so the
        // transport belongs to it and this reset is skipped
        if self.claim_generation(generation) {
            self.teardown_transport();
            self.state.set_player_state(PlayerState::Idle).await;
        }
    }
}
