//! AURA Runtime - Engine orchestration
//!
//! Wires the pieces into one running engine:
//! 1. Producers publish into the signal bus from any task
//! 2. One consumer task drains the bus in order and drives the state machine
//! 3. The consumer sleeps on the inactivity deadline between messages
//! 4. The inference loop classifies the latest face snapshot and publishes
//!    emotion signals plus latency telemetry
//! 5. Every change is folded into a render view that observers subscribe to

pub mod bus;
pub mod engine;
pub mod feeds;
pub mod inference;
pub mod view;

pub use bus::*;
pub use engine::*;
pub use feeds::*;
pub use inference::*;
pub use view::*;
