//! Decoded audio buffer

use std::time::Duration;

/// A fully decoded track: interleaved stereo f32 samples at a fixed rate.
///
/// Buffers are immutable once decoded and shared between the engine and the
/// active output sink via Arc. At most one buffer is active in the engine at
/// any instant.
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(channels > 0);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Frame index corresponding to a time offset, clamped to the buffer.
    pub fn frame_at(&self, offset: Duration) -> usize {
        let frame = (offset.as_secs_f64() * self.sample_rate as f64) as usize;
        frame.min(self.frames())
    }
}
