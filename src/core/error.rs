//! Error types for Muro.

use thiserror::Error;

/// Errors raised while building calibration state.
///
/// These are configuration faults and surface before any I/O happens.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    /// A dial needs at least two output items to be worth quantizing.
    #[error("dial map needs at least 2 output items, got {count}")]
    TooFewItems {
        /// Number of items supplied.
        count: usize,
    },

    /// Dead zone must lie in `[0, 100)` percent.
    #[error("dead zone must be within [0, 100) percent, got {0}")]
    InvalidDeadzone(f64),

    /// Item generation needs a positive step.
    #[error("dial step must be positive, got {0}")]
    InvalidStep(i64),

    /// Output interval is empty or inverted.
    #[error("output interval [{start}, {stop}) is empty")]
    EmptyOutputRange {
        /// Interval start.
        start: f64,
        /// Interval stop.
        stop: f64,
    },
}

/// Errors in the payload encoding layer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload was not valid UTF-8.
    #[error("invalid utf-8 payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Payload was not the expected JSON shape.
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level Muro errors.
#[derive(Debug, Error)]
pub enum MuroError {
    /// Calibration error.
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Transport error.
    #[cfg(feature = "transport")]
    #[error("transport error: {0}")]
    Peer(#[from] crate::transport::PeerError),

    /// Hardware backend error.
    #[cfg(feature = "telemetry")]
    #[error("hardware error: {0}")]
    Hardware(#[from] crate::telemetry::HardwareError),

    /// Configuration error.
    #[cfg(feature = "telemetry")]
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for top-level operations.
pub type MuroResult<T> = Result<T, MuroError>;
