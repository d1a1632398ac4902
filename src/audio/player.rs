//! Playback session driver
//!
//! One parser output feeds a strategy-selected player: streaming mode reads
//! fixed-size chunks from the byte source and keeps the device buffer fed
//! while playback is underway; static mode reads the entire PCM region into
//! memory and submits it in a single bulk write before starting playback.
//! Both paths bracket the interval with [`PlaybackTimer`] and return one
//! immutable [`TimingResult`].
//!
//! A session owns nothing beyond the duration of `play`: the caller opens
//! the device and the byte source per round and drops both at round end.

use crate::audio::output::{AudioOutput, DeviceError, PlaybackMode};
use crate::audio::timer::{PlaybackTimer, TimerError};
use crate::drift::{self, DriftError, TimingResult};
use crate::wav::parser::{DataRegion, WavFormat};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a playback round
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error(transparent)]
    Drift(#[from] DriftError),

    #[error("source truncated mid-region: {0}")]
    TruncatedSource(std::io::Error),

    #[error("static device refused {refused} frames with buffer space exhausted")]
    StaticBufferFull { refused: u64 },

    #[error("device stopped accepting frames after {waited:?} ({remaining} frames unwritten)")]
    FeedStalled { waited: Duration, remaining: u64 },
}

/// Drives one timed playback round over an open device
#[derive(Debug, Clone, Copy)]
pub struct Player {
    poll_interval: Duration,
    max_wait_margin: Duration,
}

impl Player {
    /// Create a player
    ///
    /// # Arguments
    /// * `poll_interval` - Position polling granularity
    /// * `max_wait_margin` - Slack added on top of the expected duration
    ///   when bounding the completion wait (and bounding the start wait
    ///   on its own)
    pub fn new(poll_interval: Duration, max_wait_margin: Duration) -> Self {
        Self {
            poll_interval,
            max_wait_margin,
        }
    }

    /// Play the PCM region through the device and measure the interval
    ///
    /// The source must be positioned at the first PCM byte (where the
    /// parser leaves it). The device must be freshly opened and not started.
    ///
    /// # Returns
    /// Timing result with measured and expected duration and ppm drift
    pub fn play(
        &self,
        device: &mut dyn AudioOutput,
        source: &mut dyn Read,
        format: &WavFormat,
        region: &DataRegion,
        mode: PlaybackMode,
    ) -> Result<TimingResult, PlaybackError> {
        let total_frames = region.frame_count(format);
        // Rejects zero rate / zero frames before any waiting can begin
        let expected = drift::expected_seconds(total_frames, format.sample_rate)?;

        let completion_bound =
            Duration::from_secs_f64(expected * 2.0) + self.max_wait_margin;
        let timer = PlaybackTimer::new(self.poll_interval, completion_bound);
        let start_timer = PlaybackTimer::new(self.poll_interval, self.max_wait_margin);

        let start_marker = match mode {
            PlaybackMode::Streaming => self.feed_streaming(
                device,
                source,
                format,
                region,
                &start_timer,
                completion_bound,
            )?,
            PlaybackMode::Static => {
                self.feed_static(device, source, format, region, &start_timer)?
            }
        };

        let end_marker = timer.wait_for_completion(device, total_frames)?;
        device.stop()?;

        let actual = end_marker.duration_since(start_marker).as_secs_f64();
        let result = drift::compute(actual, total_frames, format.sample_rate)?;

        tracing::info!(
            mode = %mode,
            frames = total_frames,
            actual_s = %format!("{:.3}", result.actual_seconds),
            expected_s = %format!("{:.3}", result.expected_seconds),
            drift_ppm = %format!("{:.2}", result.drift_ppm),
            "round_measured"
        );

        Ok(result)
    }

    /// Streaming delivery: feed fixed-size chunks until the region is
    /// exhausted, starting the device after the first chunk is queued
    ///
    /// The write back-off carries the same deadline as the completion wait:
    /// a device that stops draining its buffer mid-feed fails the round
    /// instead of spinning forever.
    fn feed_streaming(
        &self,
        device: &mut dyn AudioOutput,
        source: &mut dyn Read,
        format: &WavFormat,
        region: &DataRegion,
        start_timer: &PlaybackTimer,
        feed_bound: Duration,
    ) -> Result<std::time::Instant, PlaybackError> {
        let frame_size = format.frame_size() as usize;
        let chunk_bytes = {
            let preferred = device.preferred_chunk_bytes().max(frame_size);
            preferred - preferred % frame_size
        };
        let mut buf = vec![0u8; chunk_bytes];
        let mut remaining = region.size_bytes as usize;
        let mut start_marker = None;
        let begun = std::time::Instant::now();

        while remaining > 0 {
            let want = chunk_bytes.min(remaining);
            source
                .read_exact(&mut buf[..want])
                .map_err(PlaybackError::TruncatedSource)?;

            let mut offset = 0;
            while offset < want {
                let accepted = device.write(&buf[offset..want])?;
                if accepted == 0 {
                    let waited = begun.elapsed();
                    if waited >= feed_bound {
                        let unwritten = remaining - offset;
                        tracing::warn!(
                            waited_ms = waited.as_millis() as u64,
                            remaining_frames = (unwritten / frame_size) as u64,
                            "streaming_feed_stalled"
                        );
                        return Err(PlaybackError::FeedStalled {
                            waited,
                            remaining: (unwritten / frame_size) as u64,
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                    continue;
                }
                offset += accepted * frame_size;

                if start_marker.is_none() {
                    device.start()?;
                    start_marker = Some(start_timer.wait_for_start(device)?);
                }
            }
            remaining -= want;
        }

        // Region is frame-aligned and nonempty, so the loop always ran
        // at least one accepted write
        Ok(start_marker.expect("nonempty region produced no write"))
    }

    /// Static delivery: read the whole region, one bulk write, then start
    fn feed_static(
        &self,
        device: &mut dyn AudioOutput,
        source: &mut dyn Read,
        format: &WavFormat,
        region: &DataRegion,
        start_timer: &PlaybackTimer,
    ) -> Result<std::time::Instant, PlaybackError> {
        let frame_size = format.frame_size() as usize;
        let mut pcm = vec![0u8; region.size_bytes as usize];
        source
            .read_exact(&mut pcm)
            .map_err(PlaybackError::TruncatedSource)?;

        let mut offset = 0;
        while offset < pcm.len() {
            let accepted = device.write(&pcm[offset..])?;
            if accepted == 0 {
                // Static devices are sized to hold the whole region;
                // refusing frames before start means the buffer is short
                return Err(PlaybackError::StaticBufferFull {
                    refused: ((pcm.len() - offset) / frame_size) as u64,
                });
            }
            offset += accepted * frame_size;
        }

        device.start()?;
        Ok(start_timer.wait_for_start(device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sim::SimulatedOutput;
    use std::io::Cursor;

    /// Device that accepts its first write, then refuses all further
    /// frames while its position counter freezes just past zero
    struct StallingOutput {
        frame_size: usize,
        writes_accepted: u32,
        started: bool,
    }

    impl StallingOutput {
        fn new(frame_size: usize) -> Self {
            Self {
                frame_size,
                writes_accepted: 0,
                started: false,
            }
        }
    }

    impl AudioOutput for StallingOutput {
        fn write(&mut self, pcm: &[u8]) -> Result<usize, DeviceError> {
            if self.writes_accepted > 0 {
                return Ok(0);
            }
            self.writes_accepted += 1;
            Ok(pcm.len() / self.frame_size)
        }

        fn start(&mut self) -> Result<(), DeviceError> {
            self.started = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn frame_position(&self) -> u64 {
            if self.started {
                1
            } else {
                0
            }
        }

        fn preferred_chunk_bytes(&self) -> usize {
            64
        }
    }

    fn format_16_stereo(rate: u32) -> WavFormat {
        WavFormat {
            channels: 2,
            sample_rate: rate,
            bits_per_sample: 16,
        }
    }

    fn player() -> Player {
        Player::new(Duration::from_millis(1), Duration::from_secs(2))
    }

    fn region_for(frames: u32, format: &WavFormat) -> (DataRegion, Vec<u8>) {
        let size = frames * format.frame_size();
        (
            DataRegion {
                byte_offset: 44,
                size_bytes: size,
            },
            vec![0u8; size as usize],
        )
    }

    #[test]
    fn test_static_round_near_zero_drift() {
        let format = format_16_stereo(48000);
        // 0.25s of audio
        let (region, pcm) = region_for(12000, &format);
        let mut device =
            SimulatedOutput::new(format.sample_rate, 4, Duration::from_millis(10));

        let result = player()
            .play(
                &mut device,
                &mut Cursor::new(&pcm),
                &format,
                &region,
                PlaybackMode::Static,
            )
            .unwrap();

        assert!((result.expected_seconds - 0.25).abs() < 1e-9);
        assert!(
            (result.actual_seconds - result.expected_seconds).abs() < 0.05,
            "actual {} vs expected {}",
            result.actual_seconds,
            result.expected_seconds
        );
    }

    #[test]
    fn test_streaming_round_near_zero_drift() {
        let format = format_16_stereo(48000);
        let (region, pcm) = region_for(12000, &format);
        let mut device =
            SimulatedOutput::new(format.sample_rate, 4, Duration::from_millis(10));

        let result = player()
            .play(
                &mut device,
                &mut Cursor::new(&pcm),
                &format,
                &region,
                PlaybackMode::Streaming,
            )
            .unwrap();

        assert!(
            (result.actual_seconds - result.expected_seconds).abs() < 0.05,
            "actual {} vs expected {}",
            result.actual_seconds,
            result.expected_seconds
        );
    }

    #[test]
    fn test_streaming_writes_all_frames() {
        let format = format_16_stereo(48000);
        let (region, pcm) = region_for(9600, &format);
        let mut device =
            SimulatedOutput::new(format.sample_rate, 4, Duration::from_millis(0));

        player()
            .play(
                &mut device,
                &mut Cursor::new(&pcm),
                &format,
                &region,
                PlaybackMode::Streaming,
            )
            .unwrap();

        assert_eq!(device.frames_written(), 9600);
    }

    #[test]
    fn test_truncated_source() {
        let format = format_16_stereo(48000);
        let (region, _) = region_for(12000, &format);
        // Source holds half the region the header promised
        let short = vec![0u8; region.size_bytes as usize / 2];
        let mut device =
            SimulatedOutput::new(format.sample_rate, 4, Duration::from_millis(0));

        let result = player().play(
            &mut device,
            &mut Cursor::new(&short),
            &format,
            &region,
            PlaybackMode::Static,
        );
        assert!(matches!(result, Err(PlaybackError::TruncatedSource(_))));
    }

    #[test]
    fn test_streaming_stalled_device_fails_instead_of_spinning() {
        let format = format_16_stereo(48000);
        // 0.1s of audio; expected 0.1s bounds the feed at 0.2s + margin
        let (region, pcm) = region_for(4800, &format);
        let mut device = StallingOutput::new(format.frame_size() as usize);

        let player = Player::new(Duration::from_millis(1), Duration::from_millis(100));
        let begun = std::time::Instant::now();
        let result = player.play(
            &mut device,
            &mut Cursor::new(&pcm),
            &format,
            &region,
            PlaybackMode::Streaming,
        );

        match result {
            Err(PlaybackError::FeedStalled { remaining, .. }) => {
                assert!(remaining > 0, "stall must leave frames unwritten");
            }
            other => panic!("expected FeedStalled, got {:?}", other.map(|_| ())),
        }
        // Bound is 2 * 0.1s + 0.1s margin; well before the 5s hang horizon
        assert!(
            begun.elapsed() < Duration::from_secs(2),
            "feed back-off must respect its deadline"
        );
    }

    #[test]
    fn test_8bit_mono_round() {
        let format = WavFormat {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 8,
        };
        let frames = 4410u32; // 0.2s
        let region = DataRegion {
            byte_offset: 44,
            size_bytes: frames,
        };
        let pcm = vec![128u8; frames as usize];
        let mut device = SimulatedOutput::new(format.sample_rate, 1, Duration::from_millis(5));

        let result = player()
            .play(
                &mut device,
                &mut Cursor::new(&pcm),
                &format,
                &region,
                PlaybackMode::Static,
            )
            .unwrap();

        assert!((result.expected_seconds - 0.2).abs() < 1e-9);
        assert!((result.actual_seconds - 0.2).abs() < 0.05);
    }
}
