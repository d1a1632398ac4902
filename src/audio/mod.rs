//! Audio output and playback timing
//!
//! This module contains all playback-related functionality including:
//! - Output device abstraction and delivery modes ([`output`])
//! - cpal-backed output device and enumeration ([`engine`])
//! - Simulated output for tests and machines without audio hardware ([`sim`])
//! - Frame-position based playback interval timing ([`timer`])
//! - Strategy-selected playback session driver ([`player`])

pub mod engine;
pub mod output;
pub mod player;
pub mod sim;
pub mod timer;
