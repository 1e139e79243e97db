//! Error types shared across the canvas engine.

use crate::layers::LayerId;
use thiserror::Error;

/// Errors raised by the canvas engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CanvasError {
    /// Malformed input, e.g. a stroke with fewer than two samples.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A mutation referenced a layer that is not in the store.
    #[error("Layer not found: {0}")]
    NotFound(LayerId),
    /// A mutation was attempted without an identity.
    #[error("Unauthorized: no identity attached to this canvas")]
    Unauthorized,
    /// The replicated document rejected an operation or an import.
    #[error("CRDT error: {0}")]
    Crdt(String),
    /// Wire message or configuration (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<loro::LoroError> for CanvasError {
    fn from(err: loro::LoroError) -> Self {
        CanvasError::Crdt(err.to_string())
    }
}

impl From<serde_json::Error> for CanvasError {
    fn from(err: serde_json::Error) -> Self {
        CanvasError::Serialization(err.to_string())
    }
}

/// Result type for canvas operations.
pub type CanvasResult<T> = Result<T, CanvasError>;
