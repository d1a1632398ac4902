//! Output device abstraction
//!
//! Defines the capability set the player and timer need from an audio sink:
//! frame-granular writes, start/stop, and a frame-position counter that
//! reports how much has actually been rendered, decoupled from how much has
//! been written. Device release is `Drop`.

use crate::wav::parser::WavFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while opening or driving an output device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no output device available")]
    NoDevice,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("device rejected format ({channels} ch, {sample_rate} Hz): {reason}")]
    UnsupportedConfig {
        channels: u16,
        sample_rate: u32,
        reason: String,
    },

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("write of {0} bytes is not frame-aligned")]
    UnalignedWrite(usize),
}

/// PCM delivery strategy for a playback round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Incremental chunk feeding while playback is underway; the device
    /// buffer is sized to the platform minimum doubled for headroom
    Streaming,
    /// Single bulk submission of the entire PCM region before start
    Static,
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Streaming => write!(f, "stream"),
            PlaybackMode::Static => write!(f, "static"),
        }
    }
}

/// Everything a factory needs to open a device for one round
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest {
    /// PCM format the device must be opened with
    pub format: WavFormat,
    /// Delivery strategy (determines buffer sizing)
    pub mode: PlaybackMode,
    /// Total frames the round will submit (static mode buffers all of them)
    pub total_frames: u64,
}

/// An open audio output sink
///
/// `start` causes the device to begin advancing its frame-position counter
/// from zero; that counter is the sole source of truth for elapsed playback
/// progress. Implementations advance it only for frames actually rendered.
pub trait AudioOutput {
    /// Offer frame-aligned PCM bytes to the device
    ///
    /// # Returns
    /// Number of whole frames accepted; 0 means the device buffer is full
    /// and the caller should back off briefly and retry.
    fn write(&mut self, pcm: &[u8]) -> Result<usize, DeviceError>;

    /// Begin playback; the frame-position counter starts advancing from zero
    fn start(&mut self) -> Result<(), DeviceError>;

    /// Stop playback; the frame-position counter freezes
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Frames actually rendered so far
    fn frame_position(&self) -> u64;

    /// Preferred byte size for streaming-mode feed chunks
    fn preferred_chunk_bytes(&self) -> usize;
}

/// Opens a fresh output device for each playback round
///
/// One device per round keeps rounds fully independent; the orchestrator
/// never holds a device across rounds. Tests inject a simulated factory.
pub trait OutputFactory: Send {
    /// Open a device for the given format, mode, and frame count
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn AudioOutput>, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_display() {
        assert_eq!(PlaybackMode::Streaming.to_string(), "stream");
        assert_eq!(PlaybackMode::Static.to_string(), "static");
    }

    #[test]
    fn test_mode_serde_round_trip() {
        let json = serde_json::to_string(&PlaybackMode::Static).unwrap();
        assert_eq!(json, "\"static\"");
        let mode: PlaybackMode = serde_json::from_str("\"streaming\"").unwrap();
        assert_eq!(mode, PlaybackMode::Streaming);
    }
}
