//! AURA Vision - Faces as perception state
//!
//! This is NOT a face detector. Landmarks and blendshape scores arrive from
//! the vision collaborator; this crate turns one detection result into
//! meaning the engine can act on.
//!
//! # Pipeline
//!
//! FaceFrame → FaceMetrics (blendshapes + head pose) → EmotionResult → Signals
//!
//! Metrics are recomputed for every frame and never retained across frames.

pub mod classifier;
pub mod landmark;
pub mod metrics;
pub mod producer;

pub use classifier::*;
pub use landmark::*;
pub use metrics::*;
pub use producer::*;
