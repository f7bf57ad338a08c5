//! Audio decoding using symphonia
//!
//! Decodes fetched resource bytes (MP3, FLAC, WAV, OGG/Vorbis, AAC) into a
//! single in-memory buffer of interleaved stereo f32 samples at the output
//! sink's rate. There is no streaming decode: the transport plays exactly
//! one fully decoded buffer.

use crate::error::{Error, Result};
use crate::playback::buffer::AudioBuffer;
use crate::playback::resample;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode audio bytes to a playable buffer at `output_rate`.
///
/// `extension` is an optional format hint (file extension without the dot).
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>, output_rate: u32) -> Result<AudioBuffer> {
    debug!(
        "Decoding {} bytes (hint: {:?}, target rate {}Hz)",
        bytes.len(),
        extension,
        output_rate
    );

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;
    if channels == 0 {
        return Err(Error::Decode("Zero channel count".to_string()));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(e) => {
                // Skip undecodable packets; common for trailing garbage
                warn!("Decode error: {}", e);
                continue;
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode("No audio frames decoded".to_string()));
    }

    let stereo = to_stereo(samples, channels);
    let resampled = resample::resample(&stereo, sample_rate, output_rate, 2)?;

    debug!(
        "Decoded {} stereo frames at {}Hz",
        resampled.len() / 2,
        output_rate
    );

    Ok(AudioBuffer::new(resampled, output_rate, 2))
}

/// Normalize interleaved samples to stereo.
///
/// Mono is duplicated to both channels; wider layouts are folded down to
/// the first two channels.
fn to_stereo(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    match channels {
        2 => samples,
        1 => {
            let mut stereo = Vec::with_capacity(samples.len() * 2);
            for sample in samples {
                stereo.push(sample);
                stereo.push(sample);
            }
            stereo
        }
        n => {
            let n = n as usize;
            let frames = samples.len() / n;
            let mut stereo = Vec::with_capacity(frames * 2);
            for frame_idx in 0..frames {
                stereo.push(samples[frame_idx * n]);
                stereo.push(samples[frame_idx * n + 1]);
            }
            stereo
        }
    }
}
