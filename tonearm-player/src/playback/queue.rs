//! Queue orchestration
//!
//! A sliding playback window over the library order. Playing a track that
//! is not queued rebuilds the queue as that track plus the next few library
//! tracks; when a track ends naturally the window slides by one. The
//! playing track is always a member of the queue while one is set.

use crate::error::{Error, Result};
use crate::library::Track;
use crate::playback::engine::{PlayOutcome, PlaybackEngine};
use crate::state::SharedState;
use chrono::Utc;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tonearm_common::events::PlayerEvent;
use tracing::{info, warn};
use uuid::Uuid;

struct Playlist {
    tracks: Vec<Arc<Track>>,
    queue: Vec<Arc<Track>>,
    now_playing: Option<Arc<Track>>,
}

pub struct QueueController {
    engine: Arc<PlaybackEngine>,
    state: Arc<SharedState>,
    playlist: Mutex<Playlist>,
    lookahead: usize,
}

impl QueueController {
    /// Build the controller and register it as the engine's end-of-track
    /// subscriber. The advance listener holds only a weak reference.
    pub fn new(
        engine: Arc<PlaybackEngine>,
        state: Arc<SharedState>,
        tracks: Vec<Arc<Track>>,
        lookahead: usize,
    ) -> Arc<Self> {
        let controller = Arc::new(Self {
            engine,
            state,
            playlist: Mutex::new(Playlist {
                tracks,
                queue: Vec::new(),
                now_playing: None,
            }),
            lookahead,
        });

        let (done_tx, done_rx) = mpsc::unbounded_channel();
        controller.engine.set_completion_handler(done_tx);
        Self::spawn_advance_listener(Arc::downgrade(&controller), done_rx);

        controller
    }

    fn spawn_advance_listener(weak: Weak<Self>, mut done_rx: mpsc::UnboundedReceiver<()>) {
        tokio::spawn(async move {
            while done_rx.recv().await.is_some() {
                let Some(controller) = weak.upgrade() else { break };
                controller.advance().await;
            }
        });
    }

    /// Start playback of a library track by id.
    pub async fn play(&self, track_id: Uuid) -> Result<()> {
        let track = {
            let playlist = self.playlist.lock().unwrap();
            playlist
                .tracks
                .iter()
                .find(|t| t.id == track_id)
                .cloned()
                .ok_or(Error::TrackNotFound(track_id))?
        };
        self.play_track(track).await
    }

    /// Start playback of `track`, rebuilding the queue around it unless it
    /// is already queued (an already-queued track keeps the current queue
    /// order, so skipping ahead inside the window does not reshape it).
    async fn play_track(&self, track: Arc<Track>) -> Result<()> {
        let (queue_changed, was_other) = {
            let mut playlist = self.playlist.lock().unwrap();
            let mut changed = false;
            if !playlist.queue.iter().any(|t| t.id == track.id) {
                if let Some(idx) = playlist.tracks.iter().position(|t| t.id == track.id) {
                    let mut queue = vec![Arc::clone(&track)];
                    queue.extend(
                        playlist
                            .tracks
                            .iter()
                            .skip(idx + 1)
                            .take(self.lookahead)
                            .cloned(),
                    );
                    playlist.queue = queue;
                    changed = true;
                }
            }
            let was_other = playlist
                .now_playing
                .as_ref()
                .is_some_and(|current| current.id != track.id);
            playlist.now_playing = Some(Arc::clone(&track));
            (changed, was_other)
        };

        if queue_changed {
            self.notify_queue_changed();
        }
        if was_other {
            self.engine.stop().await;
        }

        match self.engine.play(&track.path).await {
            Ok(PlayOutcome::Started) => {
                info!("Now playing: {}", track.display_name);
                self.state.broadcast_event(PlayerEvent::PlaybackStarted {
                    track_id: track.id,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Ok(PlayOutcome::Superseded) => Ok(()),
            Err(e) => {
                warn!("Failed to play {}: {}", track.display_name, e);
                self.stop().await;
                Err(e)
            }
        }
    }

    /// Natural end of the playing track: slide the window and start the
    /// next queued track, or stop at the end of the queue.
    pub async fn advance(&self) {
        self.advance_internal(true).await;
    }

    /// Manual skip to the next queued track. Same selection and window
    /// slide as a natural ending, without reporting the current track as
    /// completed.
    pub async fn next(&self) {
        self.advance_internal(false).await;
    }

    async fn advance_internal(&self, natural: bool) {
        let (finished, next) = {
            let mut playlist = self.playlist.lock().unwrap();
            let Some(finished) = playlist.now_playing.clone() else {
                return;
            };
            let next = playlist
                .queue
                .iter()
                .find(|t| t.id != finished.id)
                .cloned();
            if next.is_some() {
                // Slide: drop the finished track and, if the library
                // continues past the queue tail, append the next track
                let tail_idx = playlist
                    .queue
                    .last()
                    .and_then(|last| playlist.tracks.iter().position(|t| t.id == last.id));
                playlist.queue.retain(|t| t.id != finished.id);
                if let Some(tail_idx) = tail_idx {
                    if tail_idx + 1 < playlist.tracks.len() {
                        let newcomer = Arc::clone(&playlist.tracks[tail_idx + 1]);
                        playlist.queue.push(newcomer);
                    }
                }
            }
            (finished, next)
        };

        if natural {
            self.state.broadcast_event(PlayerEvent::TrackCompleted {
                track_id: finished.id,
                timestamp: Utc::now(),
            });
        }

        match next {
            Some(next) => {
                self.notify_queue_changed();
                if let Err(e) = self.play_track(next).await {
                    warn!("Failed to advance: {}", e);
                }
            }
            None => {
                info!("Queue exhausted, stopping");
                self.stop().await;
            }
        }
    }

    /// Pause if playing; redundant pauses are ignored without an event.
    pub async fn pause(&self) {
        if self.engine.pause().await {
            self.state.broadcast_event(PlayerEvent::PlaybackPaused {
                position_ms: self.engine.position().as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
    }

    /// Resume if paused; redundant resumes are ignored without an event.
    pub async fn resume(&self) {
        if self.engine.resume().await {
            self.state.broadcast_event(PlayerEvent::PlaybackResumed {
                position_ms: self.engine.position().as_millis() as u64,
                timestamp: Utc::now(),
            });
        }
    }

    /// Stop playback and clear the playing marker. The queue itself is kept
    /// so playback can pick up where it left off.
    pub async fn stop(&self) {
        self.engine.stop().await;
        self.playlist.lock().unwrap().now_playing = None;
        self.state.broadcast_event(PlayerEvent::PlaybackStopped {
            timestamp: Utc::now(),
        });
    }

    pub fn seek(&self, position_ms: u64) {
        self.engine.seek(Duration::from_millis(position_ms));
    }

    /// Set the gain; the applied (clamped) value is echoed in the event.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let applied = self.engine.set_volume(volume);
        self.state.broadcast_event(PlayerEvent::VolumeChanged {
            volume: applied,
            timestamp: Utc::now(),
        });
        applied
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    pub fn track(&self, track_id: Uuid) -> Option<Arc<Track>> {
        self.playlist
            .lock()
            .unwrap()
            .tracks
            .iter()
            .find(|t| t.id == track_id)
            .cloned()
    }

    pub fn library_snapshot(&self) -> Vec<Arc<Track>> {
        self.playlist.lock().unwrap().tracks.clone()
    }

    pub fn queue_snapshot(&self) -> Vec<Arc<Track>> {
        self.playlist.lock().unwrap().queue.clone()
    }

    pub fn now_playing(&self) -> Option<Arc<Track>> {
        self.playlist.lock().unwrap().now_playing.clone()
    }

    fn notify_queue_changed(&self) {
        self.state.broadcast_event(PlayerEvent::QueueChanged {
            timestamp: Utc::now(),
        });
    }
}
