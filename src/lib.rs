//! Wavdrift - audio output clock-drift measurement
//!
//! This library measures whether an audio device's playback clock runs at
//! the nominal sample rate. It plays linear-PCM WAV files and brackets the
//! playback interval using the device frame-position counter:
//!
//! - [`wav`] parses the RIFF/WAVE container into format and data region
//! - [`audio`] drives the output device (streaming or static delivery) and
//!   times the interval between the first and last rendered frame
//! - [`drift`] converts measured vs. expected duration into ppm deviation
//! - [`runner`] repeats the pipeline across a test plan and forwards each
//!   round's result to a channel-based sink

pub mod audio;
pub mod config;
pub mod drift;
pub mod runner;
pub mod wav;

pub use audio::output::{AudioOutput, OpenRequest, OutputFactory, PlaybackMode};
pub use audio::player::Player;
pub use drift::TimingResult;
pub use runner::{Runner, TestResultEntry};
pub use wav::parser::{DataRegion, WavFormat};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default polling interval for position waits (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Default number of rounds per (file, mode) plan entry
pub const DEFAULT_ROUNDS: u32 = 5;

/// Streaming buffer headroom: device minimum buffer size is multiplied
/// by this factor when sizing the feed buffer
pub const STREAM_BUFFER_HEADROOM: u32 = 2;
