//! Shared playback state
//!
//! Thread-safe state shared between the playback engine, queue controller,
//! and HTTP handlers, plus the event broadcast that backs the SSE stream.

use tokio::sync::{broadcast, RwLock};
use tonearm_common::events::PlayerEvent;

pub use tonearm_common::events::PlayerState;

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes. The transport
/// state here is a mirror written only by the engine; the engine's own
/// transport record is authoritative.
pub struct SharedState {
    /// Current transport state
    player_state: RwLock<PlayerState>,

    /// Event broadcaster for SSE and in-process observers
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl SharedState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            player_state: RwLock::new(PlayerState::Idle),
            event_tx,
        }
    }

    /// Broadcast an event to all observers. No receivers is not an error.
    pub fn broadcast_event(&self, event: PlayerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    pub async fn player_state(&self) -> PlayerState {
        *self.player_state.read().await
    }

    pub async fn set_player_state(&self, state: PlayerState) {
        *self.player_state.write().await = state;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_state_is_idle() {
        let state = SharedState::new();
        assert_eq!(state.player_state().await, PlayerState::Idle);

        state.set_player_state(PlayerState::Playing).await;
        assert_eq!(state.player_state().await, PlayerState::Playing);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscriber() {
        let state = SharedState::new();
        let mut rx = state.subscribe_events();

        state.broadcast_event(PlayerEvent::QueueChanged {
            timestamp: chrono::Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "QueueChanged");
    }

    #[test]
    fn broadcast_without_subscribers_is_ok() {
        let state = SharedState::new();
        state.broadcast_event(PlayerEvent::PlaybackStopped {
            timestamp: chrono::Utc::now(),
        });
    }
}
