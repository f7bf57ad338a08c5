//! # Tonearm Player Library
//!
//! Local audio playback engine paired with a content-addressed resource
//! broker ("depot").
//!
//! **Purpose:** Decode audio files, drive a single-buffer transport state
//! machine, manage a lookahead playback queue, and serve registered
//! resources to a restricted presentation layer over HTTP/SSE.
//!
//! **Architecture:** tokio + axum control surface over a symphonia/rubato
//! decode path and a cpal output sink.

pub mod api;
pub mod config;
pub mod error;
pub mod library;
pub mod playback;
pub mod resolver;
pub mod state;
pub mod store;

pub use error::{Error, Result};
pub use state::SharedState;
