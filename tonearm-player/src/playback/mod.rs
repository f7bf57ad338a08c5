//! Playback: decode, transport state machine, output sinks, queue control

pub mod buffer;
pub mod decode;
pub mod engine;
pub mod queue;
pub mod resample;
pub mod sink;

pub use buffer::AudioBuffer;
pub use engine::{PlayOutcome, PlaybackEngine};
pub use queue::QueueController;
pub use sink::{AudioSink, CpalSink, NullSink, SinkHandle, TapBus};
