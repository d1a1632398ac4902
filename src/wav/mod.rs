//! WAV container handling
//!
//! This module contains the RIFF/WAVE header parser ([`parser`]) that
//! extracts format metadata and locates the raw PCM data region.

pub mod parser;
