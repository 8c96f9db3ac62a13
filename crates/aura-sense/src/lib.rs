//! AURA Sense - Raw sensor and microphone samples as signals
//!
//! This is NOT device capture. Samples arrive from the sensor and audio
//! collaborators; this crate smooths them and decides when something
//! happened.
//!
//! - Motion: smoothed tilt, device roll, shake detection, proximity edges
//! - Audio: normalized loudness, loud/speech/silence events with cooldown

pub mod audio;
pub mod motion;

pub use audio::*;
pub use motion::*;
