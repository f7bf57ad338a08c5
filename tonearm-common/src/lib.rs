//! # Tonearm Common Library
//!
//! Shared code between the player service and restricted front-end
//! processes:
//! - Event types (`PlayerEvent` enum) carried over the SSE stream
//! - Transport state enum (`PlayerState`)
//! - Presentation-facing track/queue DTOs

pub mod events;
pub mod types;

pub use events::{PlayerEvent, PlayerState};
pub use types::{TrackInfo, TrackTags};
