//! RIFF/WAVE header parsing
//!
//! Decodes a WAV container into format metadata (channel count, sample rate,
//! bits per sample) and locates the raw PCM data region. Only linear PCM is
//! supported: 8 or 16 bits per sample, mono or stereo.
//!
//! The parser reads the 12-byte RIFF header, then walks chunks (4-byte ASCII
//! id + u32-LE size) until the `data` chunk. It stops there and leaves the
//! reader positioned at the first PCM byte, so playback can continue from
//! the same stream without reopening the file.

use serde::{Deserialize, Serialize};
use std::io::Read;
use thiserror::Error;

/// Byte offset of the channel count within the `fmt ` chunk payload
const FMT_CHANNELS_OFFSET: usize = 2;

/// Byte offset of the sample rate within the `fmt ` chunk payload
const FMT_SAMPLE_RATE_OFFSET: usize = 4;

/// Byte offset of bits-per-sample within the `fmt ` chunk payload
const FMT_BITS_OFFSET: usize = 14;

/// Minimum `fmt ` chunk payload size covering all fields we read
const FMT_MIN_SIZE: u32 = 16;

/// Errors that can occur while parsing a WAV header
#[derive(Error, Debug)]
pub enum WavError {
    #[error("not a RIFF/WAVE file")]
    NotRiffWave,

    #[error("fmt chunk too short: {0} bytes")]
    ShortFmtChunk(u32),

    #[error("data chunk found before fmt chunk")]
    DataBeforeFmt,

    #[error("no data chunk found before end of file")]
    MissingDataChunk,

    #[error("unsupported format: {channels} channel(s), {bits_per_sample}-bit, {sample_rate} Hz")]
    UnsupportedFormat {
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
    },

    #[error("data chunk is empty")]
    EmptyData,

    #[error("data size {size} is not a multiple of the frame size {frame_size}")]
    MisalignedData { size: u32, frame_size: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// PCM format metadata extracted from the `fmt ` chunk
///
/// Immutable once parsed. The frame size (bytes per frame, one sample per
/// channel) is derived via [`WavFormat::frame_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavFormat {
    /// Number of interleaved channels (1 or 2)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample (8 or 16)
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Bytes per frame: channels × (bits per sample / 8)
    pub fn frame_size(&self) -> u32 {
        self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }
}

/// Location and extent of the raw PCM payload within the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegion {
    /// Absolute byte offset of the first PCM byte from the start of the file
    pub byte_offset: u64,
    /// Size of the PCM payload in bytes
    pub size_bytes: u32,
}

impl DataRegion {
    /// Number of frames in the region for the given format
    ///
    /// The parser guarantees `size_bytes` divides exactly by the frame size.
    pub fn frame_count(&self, format: &WavFormat) -> u64 {
        (self.size_bytes / format.frame_size()) as u64
    }
}

/// Parser strictness options
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Honor the RIFF convention that odd-sized chunks are padded to an
    /// even boundary. Off by default: common fixture files are even-aligned
    /// and some writers omit the pad byte.
    #[serde(default)]
    pub pad_odd_chunks: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            pad_odd_chunks: false,
        }
    }
}

/// Parse a WAV header from a byte source
///
/// On success the reader is left positioned at the first PCM byte of the
/// `data` chunk. Chunks other than `fmt ` and `data` are skipped; scanning
/// stops at the `data` chunk and never continues past it.
///
/// # Arguments
/// * `reader` - Byte source starting at the beginning of the file
/// * `options` - Strictness options (odd-chunk padding)
///
/// # Returns
/// Format metadata and the PCM data region descriptor
///
/// # Errors
/// [`WavError`] if the signature is missing, the `fmt ` chunk is missing or
/// short, no `data` chunk appears before end of source, the format is not
/// 8/16-bit mono/stereo PCM, or the data size is zero or frame-misaligned.
pub fn parse<R: Read>(
    reader: &mut R,
    options: ParseOptions,
) -> Result<(WavFormat, DataRegion), WavError> {
    let mut riff_header = [0u8; 12];
    reader.read_exact(&mut riff_header)?;
    if &riff_header[0..4] != b"RIFF" || &riff_header[8..12] != b"WAVE" {
        return Err(WavError::NotRiffWave);
    }

    let mut offset: u64 = 12;
    let mut format: Option<WavFormat> = None;

    loop {
        let mut chunk_id = [0u8; 4];
        if let Err(e) = reader.read_exact(&mut chunk_id) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(WavError::MissingDataChunk);
            }
            return Err(e.into());
        }
        let mut size_bytes = [0u8; 4];
        reader.read_exact(&mut size_bytes)?;
        let chunk_size = u32::from_le_bytes(size_bytes);
        offset += 8;

        match &chunk_id {
            b"fmt " => {
                if chunk_size < FMT_MIN_SIZE {
                    return Err(WavError::ShortFmtChunk(chunk_size));
                }
                // Only the first 16 payload bytes carry the fields we read;
                // the declared size is untrusted, so the remainder is
                // skipped rather than buffered
                let mut payload = [0u8; FMT_MIN_SIZE as usize];
                reader.read_exact(&mut payload)?;
                skip_exact(reader, (chunk_size - FMT_MIN_SIZE) as u64)?;
                offset += chunk_size as u64;
                offset += skip_pad(reader, chunk_size, options)?;

                let channels = u16::from_le_bytes([
                    payload[FMT_CHANNELS_OFFSET],
                    payload[FMT_CHANNELS_OFFSET + 1],
                ]);
                let sample_rate = u32::from_le_bytes([
                    payload[FMT_SAMPLE_RATE_OFFSET],
                    payload[FMT_SAMPLE_RATE_OFFSET + 1],
                    payload[FMT_SAMPLE_RATE_OFFSET + 2],
                    payload[FMT_SAMPLE_RATE_OFFSET + 3],
                ]);
                let bits_per_sample =
                    u16::from_le_bytes([payload[FMT_BITS_OFFSET], payload[FMT_BITS_OFFSET + 1]]);

                let parsed = WavFormat {
                    channels,
                    sample_rate,
                    bits_per_sample,
                };
                if !matches!(channels, 1 | 2)
                    || !matches!(bits_per_sample, 8 | 16)
                    || sample_rate == 0
                {
                    return Err(WavError::UnsupportedFormat {
                        channels,
                        sample_rate,
                        bits_per_sample,
                    });
                }
                format = Some(parsed);
            }
            b"data" => {
                let format = format.ok_or(WavError::DataBeforeFmt)?;
                if chunk_size == 0 {
                    return Err(WavError::EmptyData);
                }
                let frame_size = format.frame_size();
                if chunk_size % frame_size != 0 {
                    return Err(WavError::MisalignedData {
                        size: chunk_size,
                        frame_size,
                    });
                }
                let region = DataRegion {
                    byte_offset: offset,
                    size_bytes: chunk_size,
                };
                tracing::debug!(
                    channels = format.channels,
                    sample_rate = format.sample_rate,
                    bits = format.bits_per_sample,
                    data_bytes = chunk_size,
                    frames = region.frame_count(&format),
                    "wav_header_parsed"
                );
                return Ok((format, region));
            }
            _ => {
                skip_exact(reader, chunk_size as u64)?;
                offset += chunk_size as u64;
                offset += skip_pad(reader, chunk_size, options)?;
            }
        }
    }
}

/// Skip the RIFF pad byte after an odd-sized chunk when enabled
fn skip_pad<R: Read>(reader: &mut R, chunk_size: u32, options: ParseOptions) -> Result<u64, WavError> {
    if options.pad_odd_chunks && chunk_size % 2 == 1 {
        skip_exact(reader, 1)?;
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Consume exactly `count` bytes from a non-seekable reader
fn skip_exact<R: Read>(reader: &mut R, count: u64) -> Result<(), WavError> {
    let copied = std::io::copy(&mut reader.take(count), &mut std::io::sink())?;
    if copied < count {
        return Err(WavError::MissingDataChunk);
    }
    Ok(())
}
