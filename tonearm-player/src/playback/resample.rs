//! Sample rate conversion using rubato
//!
//! Decoded audio is converted once, at decode time, to the output sink's
//! rate, so the transport and the sink always agree on frame timing.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio to `output_rate`.
///
/// Returns the input unchanged when the rates already match.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if input_rate == output_rate {
        return Ok(input.to_vec());
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }

    debug!(
        "Resampling from {}Hz to {}Hz ({} channels)",
        input_rate, output_rate, channels
    );

    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input[0].len();

    // FastFixedIn trades a little quality for one-shot whole-buffer use
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        rubato::PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    Ok(interleave(planar_output))
}

/// Convert interleaved samples to planar format.
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame_idx in 0..num_frames {
        for (ch_idx, channel) in planar.iter_mut().enumerate() {
            channel.push(samples[frame_idx * num_channels + ch_idx]);
        }
    }
    planar
}

/// Convert planar samples back to interleaved format.
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }

    let num_channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for channel in planar.iter().take(num_channels) {
            interleaved.push(channel[frame_idx]);
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleave_stereo() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let planar = deinterleave(&interleaved, 2);

        assert_eq!(planar.len(), 2);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn interleave_roundtrip() {
        let planar = vec![vec![1.0, 3.0], vec![2.0, 4.0]];
        assert_eq!(interleave(planar), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn same_rate_is_passthrough() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let output = resample(&input, 44100, 44100, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn rate_conversion_scales_frame_count() {
        let input_rate = 48000;
        let frames = 1000;
        let mut input = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / input_rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            input.push(sample);
            input.push(sample);
        }

        let output = resample(&input, input_rate, 44100, 2).unwrap();
        let output_frames = output.len() / 2;
        let expected = (frames as f64 * 44100.0 / input_rate as f64) as usize;
        assert!(
            output_frames.abs_diff(expected) <= 10,
            "expected ~{} frames, got {}",
            expected,
            output_frames
        );
    }
}
