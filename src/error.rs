//! Custom error types for the signal-stream-server.
//!
//! Errors are grouped by how far they are allowed to travel: configuration
//! errors stop at the request that caused them, analysis errors stop at the
//! session that raised them, and capture errors are process-level.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;
use thiserror::Error;

use crate::types::SessionId;

/// Configuration errors: bad startup values, unknown property names,
/// invalid property values or resize targets.
///
/// A failing request leaves all state untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The property name is not declared by the target.
    #[error("Unknown property name {0:?}")]
    UnknownProperty(String),

    /// The property exists but cannot be written.
    #[error("Property {0:?} is read-only")]
    ReadOnlyProperty(String),

    /// The value could not be converted to the property's type.
    #[error("Invalid value for property {name:?}: {reason}")]
    InvalidValue { name: String, reason: String },

    /// No analyzer factory is registered under this name.
    #[error("Unknown analyzer {0:?}")]
    UnknownAnalyzer(String),

    /// Window sizes must be in `1..=MAX_WINDOW_SIZE`.
    #[error("Invalid window size {requested} (must be between 1 and {max})")]
    InvalidWindowSize { requested: usize, max: usize },

    /// Startup configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// Configuration sources could not be read or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid_value(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Session-local failures raised while an analyzer runs.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The analyzer rejected the snapshot.
    #[error("Analysis failed: {0}")]
    Failed(String),

    /// A configured channel does not exist in the snapshot.
    #[error("Channel {channel} out of range for a {channels}-channel snapshot")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// The analyzer panicked; the payload message is preserved.
    #[error("Analyzer panicked: {0}")]
    Panicked(String),
}

/// Errors from the capture side: device setup and block shape mismatches.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The input device could not be opened or configured.
    #[error("Capture device error: {0}")]
    Device(String),

    /// The requested capture source is not compiled in.
    #[error("Capture source unavailable: {0}")]
    Unsupported(String),

    /// A block's sample count is not a whole number of frames.
    #[error("Block of {len} samples is not a multiple of {channels} channels")]
    BlockShape { len: usize, channels: usize },

    /// The capture thread could not be spawned.
    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Errors decoding a binary result frame.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("Frame truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("Bad frame magic")]
    BadMagic,

    #[error("Shape {shape:?} does not match {len} values")]
    ShapeMismatch { shape: Vec<usize>, len: usize },
}

/// Outbound delivery failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// The session has no live connection.
    #[error("Session {0} is unreachable")]
    Unreachable(SessionId),
}

/// Primary error type for the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session vanished before its lock could be taken.
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    /// The pipeline has already been shut down.
    #[error("Pipeline closed")]
    PipelineClosed,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PipelineClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type Result<T> = std::result::Result<T, AppError>;
