//! cpal-backed audio output
//!
//! Provides the real-device implementation of [`AudioOutput`]:
//! - Enumerating output devices
//! - Opening an output stream at the file's exact channel count and rate
//! - Feeding PCM bytes through a lock-free ring buffer into the callback
//!
//! ## Frame-position counter
//!
//! The output callback pops whole frames from the ring buffer, converts them
//! to f32 samples, and advances a shared atomic frame counter by the number
//! of frames actually rendered. Silence emitted during underrun does not
//! advance the counter, so the counter tracks real playback progress rather
//! than callback invocations.
//!
//! The device is never opened at a fallback rate: drift is measured against
//! the file's nominal rate, and a resampled or renegotiated stream would
//! make the measurement meaningless.

use crate::audio::output::{AudioOutput, DeviceError, OpenRequest, OutputFactory, PlaybackMode};
use crate::STREAM_BUFFER_HEADROOM;
use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig, SupportedBufferSize};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Fallback streaming buffer size in frames when the device does not report
/// a minimum buffer size
const DEFAULT_STREAM_BUFFER_FRAMES: usize = 2048;

/// Scratch buffer frames for the callback-side byte-to-f32 conversion
const CALLBACK_SCRATCH_FRAMES: usize = 4096;

/// Audio output device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Whether this is the default output device
    pub is_default: bool,
    /// Number of output channels
    pub output_channels: u16,
    /// Supported sample rates (common rates only)
    pub sample_rates: Vec<u32>,
}

/// List available output devices
///
/// # Returns
/// Vector of device information for all available output devices
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for device in host.output_devices()? {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let is_default = default_output.as_deref() == Some(name.as_str());

        let output_channels = device
            .default_output_config()
            .map(|c| c.channels())
            .unwrap_or(0);

        let common_rates = [8000, 11025, 22050, 44100, 48000, 88200, 96000, 192000];
        let mut sample_rates = Vec::new();
        if let Ok(configs) = device.supported_output_configs() {
            for config in configs {
                for &rate in &common_rates {
                    if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                        && !sample_rates.contains(&rate)
                    {
                        sample_rates.push(rate);
                    }
                }
            }
        }
        sample_rates.sort();

        devices.push(DeviceInfo {
            name,
            is_default,
            output_channels,
            sample_rates,
        });
    }

    Ok(devices)
}

/// cpal-backed output device for one playback round
///
/// Created by [`CpalFactory`], released on drop. PCM bytes written via
/// [`AudioOutput::write`] are queued in a lock-free ring buffer and consumed
/// by the output callback once [`AudioOutput::start`] has been called.
pub struct CpalOutput {
    stream: Stream,
    producer: HeapProd<u8>,
    position: Arc<AtomicU64>,
    playing: Arc<AtomicBool>,
    frame_size: usize,
    chunk_bytes: usize,
}

impl CpalOutput {
    /// Open an output stream on the given device for one round
    fn open(device: &cpal::Device, request: &OpenRequest) -> Result<Self, DeviceError> {
        let format = request.format;
        let frame_size = format.frame_size() as usize;

        let buffer_frames = match request.mode {
            PlaybackMode::Streaming => {
                // Platform minimum buffer, doubled for headroom
                let min_frames = device
                    .default_output_config()
                    .ok()
                    .and_then(|c| match *c.buffer_size() {
                        SupportedBufferSize::Range { min, .. } => Some(min as usize),
                        SupportedBufferSize::Unknown => None,
                    })
                    .unwrap_or(DEFAULT_STREAM_BUFFER_FRAMES);
                min_frames * STREAM_BUFFER_HEADROOM as usize
            }
            // Static mode buffers the entire PCM region up front
            PlaybackMode::Static => request.total_frames as usize,
        };

        let ring = HeapRb::<u8>::new(buffer_frames.max(1) * frame_size);
        let (producer, mut consumer) = ring.split();

        let position = Arc::new(AtomicU64::new(0));
        let playing = Arc::new(AtomicBool::new(false));

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let callback_position = Arc::clone(&position);
        let callback_playing = Arc::clone(&playing);
        let channels = format.channels as usize;
        let bits = format.bits_per_sample;
        let mut scratch = vec![0u8; CALLBACK_SCRATCH_FRAMES * frame_size];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !callback_playing.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    let mut filled = 0usize; // in f32 samples
                    let mut frames_rendered = 0u64;
                    while filled < data.len() {
                        let frames_left = (data.len() - filled) / channels;
                        let want = (frames_left * frame_size).min(scratch.len());
                        if want == 0 {
                            break;
                        }
                        let got = consumer.pop_slice(&mut scratch[..want]);
                        if got == 0 {
                            break;
                        }
                        // Ring buffer holds whole frames only (write() enforces it)
                        debug_assert_eq!(got % frame_size, 0);
                        let frames = got / frame_size;
                        convert_pcm(
                            &scratch[..got],
                            &mut data[filled..filled + frames * channels],
                            bits,
                        );
                        filled += frames * channels;
                        frames_rendered += frames as u64;
                    }
                    data[filled..].fill(0.0);

                    if frames_rendered > 0 {
                        callback_position.fetch_add(frames_rendered, Ordering::Release);
                    }
                },
                move |err| {
                    tracing::error!("Output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| DeviceError::UnsupportedConfig {
                channels: format.channels,
                sample_rate: format.sample_rate,
                reason: e.to_string(),
            })?;

        tracing::debug!(
            channels = format.channels,
            sample_rate = format.sample_rate,
            bits = format.bits_per_sample,
            buffer_frames,
            mode = %request.mode,
            "output_stream_opened"
        );

        Ok(Self {
            stream,
            producer,
            position,
            playing,
            frame_size,
            chunk_bytes: buffer_frames.max(1) * frame_size,
        })
    }
}

impl AudioOutput for CpalOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<usize, DeviceError> {
        if pcm.len() % self.frame_size != 0 {
            return Err(DeviceError::UnalignedWrite(pcm.len()));
        }
        let frames_offered = pcm.len() / self.frame_size;
        let vacant_frames = self.producer.vacant_len() / self.frame_size;
        let take = frames_offered.min(vacant_frames);
        if take > 0 {
            // Whole frames only, and the vacancy check guarantees the push fits
            let pushed = self.producer.push_slice(&pcm[..take * self.frame_size]);
            debug_assert_eq!(pushed, take * self.frame_size);
        }
        Ok(take)
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        self.stream
            .play()
            .map_err(|e| DeviceError::StreamError(e.to_string()))?;
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.playing.store(false, Ordering::Release);
        self.stream
            .pause()
            .map_err(|e| DeviceError::StreamError(e.to_string()))
    }

    fn frame_position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    fn preferred_chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.playing.store(false, Ordering::Release);
        let _ = self.stream.pause();
    }
}

/// Convert interleaved PCM bytes to f32 samples
///
/// 8-bit PCM is unsigned, 16-bit is signed little-endian, per the WAV spec.
fn convert_pcm(bytes: &[u8], out: &mut [f32], bits: u16) {
    match bits {
        8 => {
            for (b, o) in bytes.iter().zip(out.iter_mut()) {
                *o = (*b as f32 - 128.0) / 128.0;
            }
        }
        16 => {
            for (pair, o) in bytes.chunks_exact(2).zip(out.iter_mut()) {
                *o = i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0;
            }
        }
        // Parser only admits 8 or 16 bits
        _ => out.fill(0.0),
    }
}

/// Opens a fresh cpal device per round
pub struct CpalFactory {
    device_name: Option<String>,
}

impl CpalFactory {
    /// Create a factory targeting a named device, or the default output
    /// device when `device_name` is `None`
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl OutputFactory for CpalFactory {
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn AudioOutput>, DeviceError> {
        let host = cpal::default_host();
        let device = match &self.device_name {
            Some(name) => host
                .output_devices()
                .map_err(|e| DeviceError::StreamError(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::DeviceNotFound(name.clone()))?,
            None => host.default_output_device().ok_or(DeviceError::NoDevice)?,
        };

        let output = CpalOutput::open(&device, request)?;
        Ok(Box::new(output))
    }
}
