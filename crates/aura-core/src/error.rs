//! Error types for the AURA engine

use thiserror::Error;

use crate::BackendKind;

/// Core AURA errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuraError {
    // Backend errors
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(BackendKind),

    #[error("Backend {backend} failed to initialize: {reason}")]
    BackendInit { backend: BackendKind, reason: String },

    // Inference errors
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    // Input errors
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    // Engine errors
    #[error("Engine stopped")]
    EngineStopped,
}

/// Result type for AURA operations
pub type AuraResult<T> = Result<T, AuraError>;
