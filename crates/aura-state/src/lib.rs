//! AURA State Engine - Reactive emotional state machine
//!
//! This crate implements the authoritative state machine:
//! - Transition table application
//! - Hold windows (hysteresis after expressive transitions)
//! - Strong-signal priority during holds
//! - Inactivity deadline management
//! - Continuous value tracking (amplitude, tilt, roll)

pub mod machine;

pub use machine::*;
