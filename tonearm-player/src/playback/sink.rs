//! Output sinks
//!
//! An output node plays one decoded buffer from a frame offset until it is
//! halted or runs out of frames. Halted nodes are never restarted: resume
//! and seek always begin a fresh node. A node reports completion at most
//! once over its done channel; halting drops the channel without a signal,
//! so only a node that actually reached the end of its buffer can emit one.
//!
//! Two implementations: `CpalSink` drives a real audio device, `NullSink`
//! advances on the wall clock alone (headless hosts and tests).

use crate::error::{Error, Result};
use crate::playback::buffer::AudioBuffer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Fan-out point for read-only signal observers (spectrum displays etc).
///
/// Taps attach at any time, including mid-playback: the active output node
/// reads the tap list on every callback, so late attachments still receive
/// the live signal. Overflowing a slow tap drops samples for that tap only.
#[derive(Default)]
pub struct TapBus {
    taps: Mutex<Vec<HeapProd<f32>>>,
}

impl TapBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer; returns the consuming end of its ring.
    pub fn attach(&self, capacity: usize) -> HeapCons<f32> {
        let (prod, cons) = HeapRb::<f32>::new(capacity).split();
        self.taps.lock().unwrap().push(prod);
        cons
    }

    /// Publish interleaved samples to every attached tap.
    pub fn publish(&self, samples: &[f32]) {
        let mut taps = self.taps.lock().unwrap();
        for tap in taps.iter_mut() {
            let _ = tap.push_slice(samples);
        }
    }

    pub fn tap_count(&self) -> usize {
        self.taps.lock().unwrap().len()
    }
}

/// Handle to an active output node.
pub trait SinkHandle: Send {
    /// Halt output. The node's done channel closes without a signal.
    fn halt(&mut self);
}

/// Factory for output nodes.
pub trait AudioSink: Send + Sync {
    /// Rate decoded buffers must be delivered at.
    fn sample_rate(&self) -> u32;

    /// Begin output of `buffer` at `offset`. Sends exactly one `()` on
    /// `done` if the buffer plays through to its last frame.
    fn begin(
        &self,
        buffer: Arc<AudioBuffer>,
        offset: Duration,
        volume: Arc<Mutex<f32>>,
        taps: Arc<TapBus>,
        done: tokio::sync::mpsc::UnboundedSender<()>,
    ) -> Result<Box<dyn SinkHandle>>;
}

/// Handle backed by a worker thread; dropping the stop sender ends it.
struct ThreadHandle {
    stop_tx: Option<Sender<()>>,
}

impl SinkHandle for ThreadHandle {
    fn halt(&mut self) {
        self.stop_tx.take();
    }
}

// ============================================================================
// CpalSink
// ============================================================================

/// Output node factory backed by the default cpal device.
pub struct CpalSink {
    sample_rate: u32,
}

impl CpalSink {
    /// Probe the default output device. Prefers 44.1kHz stereo f32 and
    /// falls back to the device default configuration.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

        let (config, _format) = Self::best_config(&device)?;
        info!(
            "Audio device ready: {} at {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0
        );

        Ok(Self {
            sample_rate: config.sample_rate.0,
        })
    }

    fn best_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= 44100
                && config.max_sample_rate().0 >= 44100
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(config) = preferred {
            let sample_format = config.sample_format();
            let config = config.with_sample_rate(cpal::SampleRate(44100)).config();
            return Ok((config, sample_format));
        }

        let config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = config.sample_format();
        Ok((config.into(), sample_format))
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn begin(
        &self,
        buffer: Arc<AudioBuffer>,
        offset: Duration,
        volume: Arc<Mutex<f32>>,
        taps: Arc<TapBus>,
        done: tokio::sync::mpsc::UnboundedSender<()>,
    ) -> Result<Box<dyn SinkHandle>> {
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let start_frame = buffer.frame_at(offset);

        // The cpal stream is not Send on every platform, so the node thread
        // owns it for its whole life and drops it when the stop sender goes.
        std::thread::Builder::new()
            .name("tonearm-output".to_string())
            .spawn(move || {
                if let Err(e) = run_device_stream(buffer, start_frame, volume, taps, done, stop_rx)
                {
                    error!("Output node failed: {}", e);
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        Ok(Box::new(ThreadHandle {
            stop_tx: Some(stop_tx),
        }))
    }
}

/// Body of a device-backed output node thread.
fn run_device_stream(
    buffer: Arc<AudioBuffer>,
    start_frame: usize,
    volume: Arc<Mutex<f32>>,
    taps: Arc<TapBus>,
    done: tokio::sync::mpsc::UnboundedSender<()>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
    let (config, sample_format) = CpalSink::best_config(&device)?;

    let stream = match sample_format {
        SampleFormat::F32 => {
            build_stream::<f32>(&device, &config, buffer, start_frame, volume, taps, done)?
        }
        SampleFormat::I16 => {
            build_stream::<i16>(&device, &config, buffer, start_frame, volume, taps, done)?
        }
        SampleFormat::U16 => {
            build_stream::<u16>(&device, &config, buffer, start_frame, volume, taps, done)?
        }
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    debug!("Output node running from frame {}", start_frame);

    // Block until the handle is halted or dropped, then tear the stream down
    let _ = stop_rx.recv();
    debug!("Output node stopped");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    buffer: Arc<AudioBuffer>,
    start_frame: usize,
    volume: Arc<Mutex<f32>>,
    taps: Arc<TapBus>,
    done: tokio::sync::mpsc::UnboundedSender<()>,
) -> Result<cpal::Stream> {
    let out_channels = config.channels as usize;
    let total_frames = buffer.frames();
    let mut cursor = start_frame;
    let mut done = Some(done);
    let mut tap_chunk: Vec<f32> = Vec::new();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // A node can begin at the buffer end (seek to the duration);
                // it must still report the end it is already at
                if cursor >= total_frames {
                    if let Some(done) = done.take() {
                        let _ = done.send(());
                    }
                }

                let gain = *volume.lock().unwrap();
                tap_chunk.clear();

                for frame in data.chunks_mut(out_channels) {
                    let (left, right) = if cursor < total_frames {
                        let samples = buffer.samples();
                        let base = cursor * 2;
                        (samples[base] * gain, samples[base + 1] * gain)
                    } else {
                        (0.0, 0.0)
                    };

                    frame[0] = T::from_sample(left.clamp(-1.0, 1.0));
                    if out_channels > 1 {
                        frame[1] = T::from_sample(right.clamp(-1.0, 1.0));
                    }
                    tap_chunk.push(left);
                    tap_chunk.push(right);

                    if cursor < total_frames {
                        cursor += 1;
                        if cursor >= total_frames {
                            if let Some(done) = done.take() {
                                let _ = done.send(());
                            }
                        }
                    }
                }

                taps.publish(&tap_chunk);
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}

// ============================================================================
// NullSink
// ============================================================================

/// Wall-clock output node factory with no device behind it.
///
/// Playback timing is derived from the engine clock, not from the sink, so
/// a node that advances a frame cursor in real-time ticks and signals
/// completion at the buffer end is indistinguishable from a real device to
/// the transport. Each tick publishes its slice to the taps, so signal
/// observers see the live signal here too.
pub struct NullSink {
    sample_rate: u32,
}

impl NullSink {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioSink for NullSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn begin(
        &self,
        buffer: Arc<AudioBuffer>,
        offset: Duration,
        volume: Arc<Mutex<f32>>,
        taps: Arc<TapBus>,
        done: tokio::sync::mpsc::UnboundedSender<()>,
    ) -> Result<Box<dyn SinkHandle>> {
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let start_frame = buffer.frame_at(offset);

        std::thread::Builder::new()
            .name("tonearm-null-output".to_string())
            .spawn(move || {
                run_clock_stream(buffer, start_frame, volume, taps, done, stop_rx);
            })
            .map_err(|e| {
                warn!("Failed to spawn null output thread: {}", e);
                Error::AudioOutput(format!("Failed to spawn output thread: {}", e))
            })?;

        Ok(Box::new(ThreadHandle {
            stop_tx: Some(stop_tx),
        }))
    }
}

/// Body of a clock-driven output node thread. A node that begins at the
/// buffer end signals done on its first pass, matching the device path.
fn run_clock_stream(
    buffer: Arc<AudioBuffer>,
    start_frame: usize,
    volume: Arc<Mutex<f32>>,
    taps: Arc<TapBus>,
    done: tokio::sync::mpsc::UnboundedSender<()>,
    stop_rx: Receiver<()>,
) {
    const TICK: Duration = Duration::from_millis(10);
    let total_frames = buffer.frames();
    let frames_per_tick = (buffer.sample_rate() as usize / 100).max(1);
    let channels = buffer.channels() as usize;
    let mut cursor = start_frame;
    let mut chunk: Vec<f32> = Vec::new();

    loop {
        if cursor >= total_frames {
            let _ = done.send(());
            return;
        }
        match stop_rx.recv_timeout(TICK) {
            Err(RecvTimeoutError::Timeout) => {
                let gain = *volume.lock().unwrap();
                let end = (cursor + frames_per_tick).min(total_frames);
                chunk.clear();
                chunk.extend(
                    buffer.samples()[cursor * channels..end * channels]
                        .iter()
                        .map(|s| s * gain),
                );
                taps.publish(&chunk);
                cursor = end;
            }
            _ => {
                // Halted before the buffer ran out; no signal
                return;
            }
        }
    }
}
