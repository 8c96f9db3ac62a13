//! AURA Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the AURA engine:
//! - Signals (discrete events and continuous payloads)
//! - Emotional states and the transition table
//! - Time primitives for producers (SenseTime)
//! - Backend identities and the error taxonomy

pub mod backend;
pub mod error;
pub mod signal;
pub mod state;
pub mod time;

pub use backend::*;
pub use error::*;
pub use signal::*;
pub use state::*;
pub use time::*;
