//! Playback interval timing
//!
//! Brackets the playback interval using the device frame-position counter,
//! independent of wall-clock submission time. The start marker is taken when
//! the counter first leaves zero (buffering and device warm-up add variable
//! latency before that transition, so `start()` time is not usable); the end
//! marker is taken when the counter reaches the total expected frame count.
//!
//! Both waits poll with a millisecond-granularity sleep, bounding measurement
//! precision to roughly one poll interval. Both carry an explicit deadline:
//! a stalled counter or an underfed device produces a [`TimerError::Timeout`]
//! instead of spinning forever.

use crate::audio::output::AudioOutput;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur while waiting on the frame-position counter
#[derive(Error, Debug)]
pub enum TimerError {
    #[error("timed out after {waited:?} waiting for frame position {target} (at {position})")]
    Timeout {
        waited: Duration,
        position: u64,
        target: u64,
    },
}

/// Polls the device frame-position counter to bracket playback
#[derive(Debug, Clone, Copy)]
pub struct PlaybackTimer {
    poll_interval: Duration,
    max_wait: Duration,
}

impl PlaybackTimer {
    /// Create a timer with the given poll interval and maximum wait bound
    ///
    /// # Arguments
    /// * `poll_interval` - Sleep between position checks (typically 1 ms)
    /// * `max_wait` - Upper bound for either wait before failing
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Wait until the frame-position counter leaves zero
    ///
    /// # Returns
    /// Wall-clock instant of the first observed nonzero position — the
    /// start marker for the measured interval
    pub fn wait_for_start(&self, device: &dyn AudioOutput) -> Result<Instant, TimerError> {
        self.wait_until(device, 1)
    }

    /// Wait until the frame-position counter reaches `total_frames`
    ///
    /// # Returns
    /// Wall-clock instant at which the position reached or passed the
    /// target — the end marker for the measured interval
    pub fn wait_for_completion(
        &self,
        device: &dyn AudioOutput,
        total_frames: u64,
    ) -> Result<Instant, TimerError> {
        self.wait_until(device, total_frames)
    }

    fn wait_until(&self, device: &dyn AudioOutput, target: u64) -> Result<Instant, TimerError> {
        let begun = Instant::now();
        loop {
            let position = device.frame_position();
            if position >= target {
                return Ok(Instant::now());
            }
            let waited = begun.elapsed();
            if waited >= self.max_wait {
                tracing::warn!(
                    position,
                    target,
                    waited_ms = waited.as_millis() as u64,
                    "position_wait_timeout"
                );
                return Err(TimerError::Timeout {
                    waited,
                    position,
                    target,
                });
            }
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sim::SimulatedOutput;

    fn timer() -> PlaybackTimer {
        PlaybackTimer::new(Duration::from_millis(1), Duration::from_millis(500))
    }

    #[test]
    fn test_wait_for_start_detects_transition() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(10));
        sim.write(&[0u8; 4800 * 4]).unwrap();
        sim.start().unwrap();

        let before = Instant::now();
        let marker = timer().wait_for_start(&sim).unwrap();
        let delay = marker.duration_since(before);

        // Counter leaves zero ~10ms after start; marker should land nearby
        assert!(delay >= Duration::from_millis(9), "delay {:?}", delay);
        assert!(delay < Duration::from_millis(100), "delay {:?}", delay);
    }

    #[test]
    fn test_wait_for_completion() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        // 0.1s of audio
        sim.write(&[0u8; 4800 * 4]).unwrap();
        sim.start().unwrap();

        let start = timer().wait_for_start(&sim).unwrap();
        let end = timer().wait_for_completion(&sim, 4800).unwrap();
        let measured = end.duration_since(start).as_secs_f64();

        assert!(measured > 0.05, "measured {}", measured);
        assert!(measured < 0.2, "measured {}", measured);
    }

    #[test]
    fn test_timeout_on_never_started_device() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        sim.write(&[0u8; 4 * 4]).unwrap();
        // start() never called: position stays at zero

        let result = timer().wait_for_start(&sim);
        assert!(matches!(result, Err(TimerError::Timeout { .. })));
    }

    #[test]
    fn test_timeout_on_stalled_counter() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        // Only 100 frames written; counter stalls there, far from 48000
        sim.write(&[0u8; 100 * 4]).unwrap();
        sim.start().unwrap();

        let result = timer().wait_for_completion(&sim, 48000);
        match result {
            Err(TimerError::Timeout { position, target, .. }) => {
                assert_eq!(position, 100);
                assert_eq!(target, 48000);
            }
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }
}
