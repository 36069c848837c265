//! Error types for the snap engine.

use thiserror::Error;

use crate::stream::ElementId;

/// Errors raised while loading requests, scenes and settings.
///
/// Snap outcomes themselves are reported through
/// [`SnapStatus`](crate::SnapStatus), not through this type.
#[derive(Error, Debug)]
pub enum SnapError {
    /// Malformed JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed settings file.
    #[error("invalid settings file: {0}")]
    Settings(#[from] toml::de::Error),

    /// Reading an input failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings parsed but out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// An opaque geometry payload could not be decoded.
    #[error("undecodable payload: {0}")]
    Payload(String),

    /// An object id that the store does not hold.
    #[error("unknown object {0}")]
    UnknownObject(ElementId),
}

/// Result type for snap engine operations.
pub type Result<T> = std::result::Result<T, SnapError>;
