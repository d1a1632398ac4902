//! Simulated output device
//!
//! A rate-accurate [`AudioOutput`] whose frame-position counter advances in
//! lock-step with wall-clock time, after a configurable start delay that
//! models device warm-up. Used by the test suite and on machines without
//! audio hardware; the position never exceeds the number of frames written,
//! so underfed playback stalls exactly like a real device.

use crate::audio::output::{AudioOutput, DeviceError, OpenRequest, OutputFactory};
use std::time::{Duration, Instant};

/// Default feed chunk size in bytes
const SIM_CHUNK_BYTES: usize = 4096;

/// Simulated output device advancing at the nominal sample rate
pub struct SimulatedOutput {
    sample_rate: u32,
    frame_size: usize,
    start_delay: Duration,
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    frames_written: u64,
}

impl SimulatedOutput {
    /// Create a simulated device for the given rate and frame size
    ///
    /// # Arguments
    /// * `sample_rate` - Nominal rate the position counter advances at
    /// * `frame_size` - Bytes per frame of the PCM being written
    /// * `start_delay` - Warm-up delay before the counter leaves zero
    pub fn new(sample_rate: u32, frame_size: usize, start_delay: Duration) -> Self {
        Self {
            sample_rate,
            frame_size,
            start_delay,
            started_at: None,
            stopped_at: None,
            frames_written: 0,
        }
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn position_at(&self, now: Instant) -> u64 {
        let started = match self.started_at {
            Some(t) => t + self.start_delay,
            None => return 0,
        };
        let effective_now = match self.stopped_at {
            Some(stop) => stop.min(now),
            None => now,
        };
        if effective_now <= started {
            return 0;
        }
        let elapsed = effective_now.duration_since(started);
        let rendered = (elapsed.as_secs_f64() * self.sample_rate as f64) as u64;
        rendered.min(self.frames_written)
    }
}

impl AudioOutput for SimulatedOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<usize, DeviceError> {
        if pcm.len() % self.frame_size != 0 {
            return Err(DeviceError::UnalignedWrite(pcm.len()));
        }
        let frames = pcm.len() / self.frame_size;
        self.frames_written += frames as u64;
        Ok(frames)
    }

    fn start(&mut self) -> Result<(), DeviceError> {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if self.stopped_at.is_none() {
            self.stopped_at = Some(Instant::now());
        }
        Ok(())
    }

    fn frame_position(&self) -> u64 {
        self.position_at(Instant::now())
    }

    fn preferred_chunk_bytes(&self) -> usize {
        SIM_CHUNK_BYTES
    }
}

/// Opens a fresh [`SimulatedOutput`] per round
pub struct SimFactory {
    start_delay: Duration,
}

impl SimFactory {
    /// Create a factory with the given warm-up delay
    pub fn new(start_delay: Duration) -> Self {
        Self { start_delay }
    }
}

impl OutputFactory for SimFactory {
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn AudioOutput>, DeviceError> {
        Ok(Box::new(SimulatedOutput::new(
            request.format.sample_rate,
            request.format.frame_size() as usize,
            self.start_delay,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_zero_before_start() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        sim.write(&[0u8; 4800 * 4]).unwrap();
        assert_eq!(sim.frame_position(), 0);
    }

    #[test]
    fn test_position_zero_during_start_delay() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(50));
        sim.write(&[0u8; 480 * 4]).unwrap();
        sim.start().unwrap();
        assert_eq!(sim.frame_position(), 0);
    }

    #[test]
    fn test_position_advances_at_rate() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        sim.write(&[0u8; 48000 * 4]).unwrap();
        sim.start().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let pos = sim.frame_position();
        // 50ms at 48kHz is 2400 frames; allow generous scheduling slack
        assert!(pos >= 2000, "position {} too low", pos);
        assert!(pos <= 6000, "position {} too high", pos);
    }

    #[test]
    fn test_position_capped_at_frames_written() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        sim.write(&[0u8; 100 * 4]).unwrap();
        sim.start().unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sim.frame_position(), 100);
    }

    #[test]
    fn test_position_freezes_on_stop() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        sim.write(&[0u8; 48000 * 4]).unwrap();
        sim.start().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        sim.stop().unwrap();

        let frozen = sim.frame_position();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sim.frame_position(), frozen);
    }

    #[test]
    fn test_unaligned_write_rejected() {
        let mut sim = SimulatedOutput::new(48000, 4, Duration::from_millis(0));
        let result = sim.write(&[0u8; 7]);
        assert!(matches!(result, Err(DeviceError::UnalignedWrite(7))));
    }
}
