//! Drift calculation
//!
//! Derives the expected playback duration from frame count and nominal
//! sample rate, compares it to the measured duration, and expresses the
//! deviation in parts-per-million. A frame is one sample per channel,
//! counted once regardless of channel count.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from drift computation
///
/// Both variants are malformed-input conditions caught before any division,
/// never silently propagated as non-finite values.
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("sample rate is zero")]
    ZeroSampleRate,

    #[error("expected duration is zero (no frames)")]
    ZeroDuration,
}

/// Timing outcome of a single playback round
///
/// Computed once per session and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// Measured wall-clock playback duration in seconds
    pub actual_seconds: f64,
    /// Nominal duration: total frames / sample rate
    pub expected_seconds: f64,
    /// Relative deviation scaled by 10^6
    pub drift_ppm: f64,
}

impl TimingResult {
    /// Human-readable round summary: seconds to 3 decimals, ppm to 2
    pub fn summary(&self) -> String {
        format!(
            "act:{:.3}s set:{:.3}s diff:{:.2}ppm",
            self.actual_seconds, self.expected_seconds, self.drift_ppm
        )
    }
}

impl std::fmt::Display for TimingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Expected playback duration in seconds for a frame count at a nominal rate
///
/// # Errors
/// [`DriftError`] if the rate or the frame count is zero — zero-length data
/// must be rejected rather than producing a zero expected duration
pub fn expected_seconds(total_frames: u64, sample_rate: u32) -> Result<f64, DriftError> {
    if sample_rate == 0 {
        return Err(DriftError::ZeroSampleRate);
    }
    if total_frames == 0 {
        return Err(DriftError::ZeroDuration);
    }
    Ok(total_frames as f64 / sample_rate as f64)
}

/// Compute the drift result for a measured playback interval
///
/// # Arguments
/// * `actual_seconds` - Measured interval between start and end markers
/// * `total_frames` - Frames in the PCM region
/// * `sample_rate` - Nominal sample rate in Hz
pub fn compute(
    actual_seconds: f64,
    total_frames: u64,
    sample_rate: u32,
) -> Result<TimingResult, DriftError> {
    let expected = expected_seconds(total_frames, sample_rate)?;
    let drift_ppm = (actual_seconds - expected) / expected * 1_000_000.0;
    Ok(TimingResult {
        actual_seconds,
        expected_seconds: expected,
        drift_ppm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_expected_seconds_scenario() {
        // 16-bit stereo at 44100 Hz, 176400 data bytes -> 44100 frames -> 1s
        let expected = expected_seconds(44100, 44100).unwrap();
        assert_relative_eq!(expected, 1.0);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let result = expected_seconds(44100, 0);
        assert!(matches!(result, Err(DriftError::ZeroSampleRate)));
    }

    #[test]
    fn test_zero_frames_rejected() {
        let result = expected_seconds(0, 44100);
        assert!(matches!(result, Err(DriftError::ZeroDuration)));
    }

    #[test]
    fn test_drift_ppm_formula() {
        // 1ms over a 1s expected duration is 1000 ppm
        let result = compute(1.001, 48000, 48000).unwrap();
        assert_relative_eq!(result.expected_seconds, 1.0);
        assert_relative_eq!(result.drift_ppm, 1000.0, max_relative = 1e-9);
    }

    #[test]
    fn test_negative_drift() {
        let result = compute(0.999, 48000, 48000).unwrap();
        assert_relative_eq!(result.drift_ppm, -1000.0, max_relative = 1e-9);
    }

    #[test]
    fn test_zero_drift() {
        let result = compute(2.0, 96000, 48000).unwrap();
        assert_relative_eq!(result.drift_ppm, 0.0);
    }

    #[test]
    fn test_summary_format() {
        let result = TimingResult {
            actual_seconds: 60.0129,
            expected_seconds: 60.0,
            drift_ppm: 215.0,
        };
        assert_eq!(result.summary(), "act:60.013s set:60.000s diff:215.00ppm");
    }
}
